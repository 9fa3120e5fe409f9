use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::core::error::{PipelineError, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub youtube: YoutubeConfig,
    pub transcription: TranscriptionConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct YoutubeConfig {
    #[serde(default = "default_oembed_url")]
    pub oembed_url: String,
    #[serde(default = "default_downloader")]
    pub downloader: String,
    pub ffmpeg_location: Option<String>,
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,
}

impl Default for YoutubeConfig {
    fn default() -> Self {
        Self {
            oembed_url: default_oembed_url(),
            downloader: default_downloader(),
            ffmpeg_location: None,
            media_dir: default_media_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TranscriptionConfig {
    #[serde(default = "default_assembly_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_wait")]
    pub max_wait_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_gemini_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Directory of the sled database. Unset keeps entries in memory only.
    pub path: Option<PathBuf>,
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            ttl_secs: default_ttl(),
        }
    }
}

fn default_oembed_url() -> String {
    "https://www.youtube.com/oembed".to_string()
}

fn default_downloader() -> String {
    "yt-dlp".to_string()
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("media")
}

fn default_assembly_url() -> String {
    "https://api.assemblyai.com".to_string()
}

fn default_poll_interval() -> u64 {
    3
}

fn default_max_wait() -> u64 {
    30 * 60
}

fn default_gemini_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_ttl() -> u64 {
    60 * 60 * 24
}

pub const STARTER_CONFIG: &str = r#"
[youtube]
media_dir = "media"

[transcription]
# api_key = "..."  (falls back to ASSEMBLY_API_KEY)
poll_interval_secs = 3

[llm]
# api_key = "..."  (falls back to GEMINI_API_KEY)
model = "gemini-2.5-flash"

[cache]
path = "cache"
ttl_secs = 86400
"#;

pub fn load_config(path: &str) -> Result<Config> {
    let content = fs::read_to_string(path)
        .map_err(|e| PipelineError::Config(format!("cannot read {}: {}", path, e)))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let mut config: Config =
        toml::from_str(content).map_err(|e| PipelineError::Config(e.to_string()))?;

    // Credentials are resolved once here; clients only ever see the struct.
    if config.transcription.api_key.is_empty() {
        config.transcription.api_key = std::env::var("ASSEMBLY_API_KEY").unwrap_or_default();
    }
    if config.llm.api_key.is_empty() {
        config.llm.api_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();
    }

    if config.transcription.api_key.is_empty() {
        return Err(PipelineError::Config("ASSEMBLY_API_KEY is not configured.".into()));
    }
    if config.llm.api_key.is_empty() {
        return Err(PipelineError::Config("GEMINI_API_KEY is not configured.".into()));
    }
    if config.transcription.poll_interval_secs == 0 {
        config.transcription.poll_interval_secs = default_poll_interval();
    }

    Ok(config)
}
