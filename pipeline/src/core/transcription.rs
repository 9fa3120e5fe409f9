use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::{Duration, Instant};

use crate::core::config::TranscriptionConfig;
use crate::core::error::{PipelineError, Result};

/// Turns an audio file into plain text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptJob {
    id: String,
    status: String,
    text: Option<String>,
    error: Option<String>,
}

/// Outcome of one poll of a transcript job.
#[derive(Debug, PartialEq)]
enum JobState {
    Pending,
    Done(String),
    Failed(String),
}

impl TranscriptJob {
    fn state(&self) -> JobState {
        match self.status.as_str() {
            "completed" => match self.text.as_deref().map(str::trim) {
                Some(text) if !text.is_empty() => JobState::Done(text.to_string()),
                _ => JobState::Failed("service returned no text".to_string()),
            },
            "error" => JobState::Failed(
                self.error
                    .clone()
                    .unwrap_or_else(|| "transcription job failed".to_string()),
            ),
            _ => JobState::Pending,
        }
    }
}

/// AssemblyAI client: upload, create a job, poll until it settles.
pub struct AssemblyAiClient {
    client: Client,
    config: TranscriptionConfig,
}

impl AssemblyAiClient {
    pub fn new(config: TranscriptionConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(300))
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
            config,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/v2/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    async fn upload(&self, audio_path: &Path) -> Result<String> {
        let data = tokio::fs::read(audio_path).await.map_err(|e| {
            PipelineError::Transcription(format!("cannot read {}: {}", audio_path.display(), e))
        })?;
        log::info!("Uploading {} bytes of audio to AssemblyAI", data.len());

        let res = self
            .client
            .post(self.endpoint("upload"))
            .header("authorization", &self.config.api_key)
            .header("content-type", "application/octet-stream")
            .body(data)
            .send()
            .await
            .map_err(|e| PipelineError::Transcription(format!("upload failed: {}", e)))?;

        let upload: UploadResponse = Self::read_json(res, "upload").await?;
        Ok(upload.upload_url)
    }

    async fn create_job(&self, audio_url: &str) -> Result<TranscriptJob> {
        let res = self
            .client
            .post(self.endpoint("transcript"))
            .header("authorization", &self.config.api_key)
            .json(&json!({ "audio_url": audio_url }))
            .send()
            .await
            .map_err(|e| PipelineError::Transcription(format!("job request failed: {}", e)))?;

        Self::read_json(res, "transcript").await
    }

    async fn poll_job(&self, id: &str) -> Result<TranscriptJob> {
        let res = self
            .client
            .get(self.endpoint(&format!("transcript/{}", id)))
            .header("authorization", &self.config.api_key)
            .send()
            .await
            .map_err(|e| PipelineError::Transcription(format!("poll failed: {}", e)))?;

        Self::read_json(res, "poll").await
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        res: reqwest::Response,
        step: &str,
    ) -> Result<T> {
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            log::error!("AssemblyAI {} error {}: {}", step, status, body);
            return Err(PipelineError::Transcription(format!(
                "{} returned {}: {}",
                step, status, body
            )));
        }
        res.json()
            .await
            .map_err(|e| PipelineError::Transcription(format!("bad {} response: {}", step, e)))
    }
}

#[async_trait]
impl Transcriber for AssemblyAiClient {
    async fn transcribe(&self, audio_path: &Path) -> Result<String> {
        let started = Instant::now();
        let audio_url = self.upload(audio_path).await?;
        let mut job = self.create_job(&audio_url).await?;
        log::info!("Transcript job {} created", job.id);

        let deadline = Duration::from_secs(self.config.max_wait_secs);
        let interval = Duration::from_secs(self.config.poll_interval_secs.max(1));

        loop {
            match job.state() {
                JobState::Done(text) => {
                    log::info!(
                        "Transcript job {} completed in {:.1?} ({} chars)",
                        job.id,
                        started.elapsed(),
                        text.len()
                    );
                    return Ok(text);
                }
                JobState::Failed(reason) => {
                    log::error!("Transcript job {} failed: {}", job.id, reason);
                    return Err(PipelineError::Transcription(reason));
                }
                JobState::Pending => {}
            }

            if started.elapsed() >= deadline {
                return Err(PipelineError::Transcription(format!(
                    "job {} still '{}' after {}s",
                    job.id,
                    job.status,
                    deadline.as_secs()
                )));
            }

            tokio::time::sleep(interval).await;
            job = self.poll_job(&job.id).await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(status: &str, text: Option<&str>, error: Option<&str>) -> TranscriptJob {
        TranscriptJob {
            id: "job-1".to_string(),
            status: status.to_string(),
            text: text.map(str::to_string),
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn queued_and_processing_jobs_are_pending() {
        assert_eq!(job("queued", None, None).state(), JobState::Pending);
        assert_eq!(job("processing", None, None).state(), JobState::Pending);
    }

    #[test]
    fn completed_job_yields_text() {
        assert_eq!(
            job("completed", Some(" hello world "), None).state(),
            JobState::Done("hello world".to_string())
        );
    }

    #[test]
    fn completed_job_without_text_fails() {
        assert!(matches!(job("completed", None, None).state(), JobState::Failed(_)));
        assert!(matches!(job("completed", Some("   "), None).state(), JobState::Failed(_)));
    }

    #[test]
    fn error_job_carries_service_reason() {
        assert_eq!(
            job("error", None, Some("audio too short")).state(),
            JobState::Failed("audio too short".to_string())
        );
    }

    #[test]
    fn parses_service_payload() {
        let body = r#"{"id":"abc","status":"completed","text":"hi","error":null,"words":[]}"#;
        let parsed: TranscriptJob = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.state(), JobState::Done("hi".to_string()));
    }

    #[test]
    fn endpoints_join_cleanly() {
        let client = AssemblyAiClient::new(TranscriptionConfig {
            api_url: "https://api.assemblyai.com/".to_string(),
            api_key: "k".to_string(),
            poll_interval_secs: 1,
            max_wait_secs: 10,
        });
        assert_eq!(client.endpoint("upload"), "https://api.assemblyai.com/v2/upload");
    }

    #[tokio::test]
    async fn unreadable_file_is_a_transcription_error() {
        let client = AssemblyAiClient::new(TranscriptionConfig {
            api_url: "http://127.0.0.1:9".to_string(),
            api_key: "k".to_string(),
            poll_interval_secs: 1,
            max_wait_secs: 10,
        });
        let err = client
            .transcribe(Path::new("/nonexistent/audio.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Transcription(_)));
    }
}
