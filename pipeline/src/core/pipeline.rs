use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::article::{parse_style, ArticleGenerator, Length, Tone};
use crate::core::audio::{discard_artifact, AudioSource, YtDlpDownloader};
use crate::core::cache::{GenerationCache, MemoryCache, SledCache};
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::llm::GeminiClient;
use crate::core::metadata::{MetadataSource, OEmbedClient};
use crate::core::transcription::{AssemblyAiClient, Transcriber};
use crate::core::video::VideoReference;

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub user_id: i64,
    pub link: String,
    pub tone: Option<String>,
    pub length: Option<String>,
}

/// The payload handed back to the caller and stored in the article cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedArticle {
    pub content: String,
    pub title: String,
    pub tone: Tone,
    pub length: Length,
}

/// Runs metadata → audio → transcript → article, with the caching policy around it.
///
/// Identical `(user, video, tone, length)` requests within the TTL are served
/// from the article cache. Transcripts are cached by video alone, so a style
/// change for a known video costs one generation call and nothing more.
/// Concurrent first requests for the same key are not serialized; both run and
/// the last write wins.
pub struct ArticlePipeline {
    metadata: Arc<dyn MetadataSource>,
    audio: Arc<dyn AudioSource>,
    transcriber: Arc<dyn Transcriber>,
    generator: ArticleGenerator,
    cache: Arc<dyn GenerationCache>,
    ttl: Duration,
}

impl ArticlePipeline {
    pub fn new(
        metadata: Arc<dyn MetadataSource>,
        audio: Arc<dyn AudioSource>,
        transcriber: Arc<dyn Transcriber>,
        generator: ArticleGenerator,
        cache: Arc<dyn GenerationCache>,
        ttl: Duration,
    ) -> Self {
        Self {
            metadata,
            audio,
            transcriber,
            generator,
            cache,
            ttl,
        }
    }

    /// Wire the production clients described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let cache: Arc<dyn GenerationCache> = match &config.cache.path {
            Some(dir) => {
                let cache = SledCache::open(dir)?;
                let pruned = cache.prune()?;
                log::info!(
                    "Using persistent generation cache at {} ({} expired entries pruned)",
                    dir.display(),
                    pruned
                );
                Arc::new(cache)
            }
            None => Arc::new(MemoryCache::new()),
        };

        Ok(Self::new(
            Arc::new(OEmbedClient::new(config.youtube.oembed_url.clone())),
            Arc::new(YtDlpDownloader::new(&config.youtube)),
            Arc::new(AssemblyAiClient::new(config.transcription.clone())),
            ArticleGenerator::new(Arc::new(GeminiClient::new(config.llm.clone()))),
            cache,
            Duration::from_secs(config.cache.ttl_secs),
        ))
    }

    pub async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedArticle> {
        let (tone, length) = parse_style(request.tone.as_deref(), request.length.as_deref())?;
        let video = VideoReference::normalize(&request.link)?;

        if let Some(cached) = self
            .cache
            .lookup(request.user_id, video.video_id(), tone, length)
            .await?
        {
            log::info!(
                "Article cache hit for user {} video {} ({}, {})",
                request.user_id,
                video,
                tone,
                length
            );
            return Ok(cached);
        }

        let started = Instant::now();
        let title = self.metadata.title(&video).await?;
        let transcript = self.transcript_for(&video).await?;
        let content = self.generator.generate(&transcript, tone, length).await?;

        let article = GeneratedArticle {
            content,
            title,
            tone,
            length,
        };
        self.cache
            .store(request.user_id, video.video_id(), tone, length, &article, self.ttl)
            .await?;

        log::info!(
            "Generated article for user {} video {} ({}, {}) in {:.1?}",
            request.user_id,
            video,
            tone,
            length,
            started.elapsed()
        );
        Ok(article)
    }

    async fn transcript_for(&self, video: &VideoReference) -> Result<String> {
        if let Some(text) = self.cache.lookup_transcript(video.video_id()).await? {
            log::info!("Transcript cache hit for {}", video);
            return Ok(text);
        }

        let audio_path = self.audio.download(video).await?;
        let transcribed = self.transcriber.transcribe(&audio_path).await;
        // Audio is dead weight past this point; a retry downloads again.
        discard_artifact(&audio_path).await;
        let text = transcribed?;
        self.cache
            .store_transcript(video.video_id(), &text, self.ttl)
            .await?;
        Ok(text)
    }
}
