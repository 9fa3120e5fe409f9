use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid YouTube link: {0}")]
    InvalidLink(String),

    #[error("Failed to fetch video metadata: {0}")]
    MetadataFetch(String),

    #[error("yt-dlp failed (code {code:?}): {detail}")]
    AudioDownload { code: Option<i32>, detail: String },

    #[error("Failed to transcribe audio: {0}")]
    Transcription(String),

    #[error("Failed to generate blog content: {0}")]
    Generation(String),

    #[error("{0}")]
    Validation(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Errors caused by the caller's input rather than an external service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, PipelineError::InvalidLink(_) | PipelineError::Validation(_))
    }
}

impl From<sled::Error> for PipelineError {
    fn from(e: sled::Error) -> Self {
        PipelineError::Cache(e.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::Cache(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
