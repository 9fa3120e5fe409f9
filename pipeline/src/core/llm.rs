use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use crate::core::config::LlmConfig;
use crate::core::error::{PipelineError, Result};

/// A generative text service: prompt in, text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

pub struct GeminiClient {
    client: Client,
    config: LlmConfig,
}

impl GeminiClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_else(|_| Client::new()),
            config,
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "contents": [
                {
                    "role": "user",
                    "parts": [{ "text": prompt }]
                }
            ]
        });

        let url = format!(
            "{}/models/{}:generateContent",
            self.config.api_url.trim_end_matches('/'),
            self.config.model
        );

        log::info!("Sending generation request to {} ({} prompt chars)", url, prompt.len());

        let res = match self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                log::warn!("Failed to connect to Gemini at {}: {}", url, e);
                return Err(PipelineError::Generation(format!("connection failed: {}", e)));
            }
        };

        if !res.status().is_success() {
            let status = res.status();
            let error_text = res.text().await.unwrap_or_default();
            log::error!("Gemini error {}: {}", status, error_text);
            return Err(PipelineError::Generation(format!(
                "API error {}: {}",
                status, error_text
            )));
        }

        let response_json: serde_json::Value = res
            .json()
            .await
            .map_err(|e| PipelineError::Generation(e.to_string()))?;

        let text = text_from_response(&response_json);
        if text.is_empty() {
            log::warn!("Unexpected Gemini response format: {:?}", response_json);
        }
        Ok(text)
    }
}

/// Concatenate `candidates[0].content.parts[*].text`, dropping any `<think>` preamble.
pub fn text_from_response(response: &serde_json::Value) -> String {
    let mut text: String = response["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect::<String>())
        .unwrap_or_default();

    if let Some(idx) = text.find("</think>") {
        text = text[idx + "</think>".len()..].to_string();
    }

    text.trim().to_string()
}
