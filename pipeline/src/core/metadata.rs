use async_trait::async_trait;
use reqwest::Client;

use crate::core::error::{PipelineError, Result};
use crate::core::video::VideoReference;

pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// Looks up a human-readable title for a video.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn title(&self, video: &VideoReference) -> Result<String>;
}

/// Title lookup through YouTube's oEmbed endpoint (no API key required).
pub struct OEmbedClient {
    client: Client,
    endpoint: String,
}

impl OEmbedClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(20))
                .build()
                .unwrap_or_else(|_| Client::new()),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl MetadataSource for OEmbedClient {
    async fn title(&self, video: &VideoReference) -> Result<String> {
        let canonical = video.canonical_url();
        let res = self
            .client
            .get(&self.endpoint)
            .query(&[("url", canonical.as_str()), ("format", "json")])
            .send()
            .await
            .map_err(|e| {
                log::warn!("oEmbed request for {} failed: {}", video, e);
                PipelineError::MetadataFetch(e.to_string())
            })?;

        if !res.status().is_success() {
            let status = res.status();
            log::error!("oEmbed returned {} for {}", status, video);
            return Err(PipelineError::MetadataFetch(format!(
                "oEmbed returned {} for {}",
                status, canonical
            )));
        }

        let body: serde_json::Value = res
            .json()
            .await
            .map_err(|e| PipelineError::MetadataFetch(e.to_string()))?;

        Ok(title_from_oembed(&body))
    }
}

pub fn title_from_oembed(body: &serde_json::Value) -> String {
    body["title"]
        .as_str()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(UNKNOWN_TITLE)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_title_field() {
        let body = json!({ "title": "Rust in 100 Seconds", "author_name": "Fireship" });
        assert_eq!(title_from_oembed(&body), "Rust in 100 Seconds");
    }

    #[test]
    fn falls_back_when_title_is_missing_or_blank() {
        assert_eq!(title_from_oembed(&json!({ "author_name": "x" })), UNKNOWN_TITLE);
        assert_eq!(title_from_oembed(&json!({ "title": "  " })), UNKNOWN_TITLE);
        assert_eq!(title_from_oembed(&json!({ "title": 42 })), UNKNOWN_TITLE);
    }
}
