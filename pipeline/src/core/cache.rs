//! TTL caches in front of the generation pipeline.
//!
//! Two key families share one store:
//! `generated_blog:{user_id}:{video_id}:{tone}:{length}` holds a finished
//! article payload, `youtube_transcript:{video_id}` holds the raw transcript,
//! which is style independent and therefore shared by every user.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sled::Db;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use crate::core::article::{Length, Tone};
use crate::core::error::{PipelineError, Result};
use crate::core::pipeline::GeneratedArticle;

pub fn article_key(user_id: i64, video_id: &str, tone: Tone, length: Length) -> String {
    format!("generated_blog:{}:{}:{}:{}", user_id, video_id, tone, length)
}

pub fn transcript_key(video_id: &str) -> String {
    format!("youtube_transcript:{}", video_id)
}

#[async_trait]
pub trait GenerationCache: Send + Sync {
    /// Raw value for `key`, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or overwrite `key`; it reads as absent once `ttl` has elapsed.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    async fn lookup(
        &self,
        user_id: i64,
        video_id: &str,
        tone: Tone,
        length: Length,
    ) -> Result<Option<GeneratedArticle>> {
        let key = article_key(user_id, video_id, tone, length);
        match self.get(&key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn store(
        &self,
        user_id: i64,
        video_id: &str,
        tone: Tone,
        length: Length,
        payload: &GeneratedArticle,
        ttl: Duration,
    ) -> Result<()> {
        let key = article_key(user_id, video_id, tone, length);
        self.set(&key, serde_json::to_string(payload)?, ttl).await
    }

    async fn lookup_transcript(&self, video_id: &str) -> Result<Option<String>> {
        self.get(&transcript_key(video_id)).await
    }

    async fn store_transcript(&self, video_id: &str, text: &str, ttl: Duration) -> Result<()> {
        self.set(&transcript_key(video_id), text.to_string(), ttl).await
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    value: String,
    /// Unix milliseconds.
    expires_at: i64,
}

impl Entry {
    fn new(value: String, ttl: Duration) -> Self {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = Utc::now().timestamp_millis().saturating_add(ttl_ms);
        Self { value, expires_at }
    }

    fn is_live(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Sweep expired entries once the map reaches this size.
const SWEEP_THRESHOLD: usize = 256;

struct Entries {
    map: HashMap<String, Entry>,
    next_sweep: usize,
}

/// Process-local cache. Entries vanish with the process.
pub struct MemoryCache {
    entries: Mutex<Entries>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                next_sweep: SWEEP_THRESHOLD,
            }),
        }
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Entries>> {
        self.entries
            .lock()
            .map_err(|e| PipelineError::Cache(format!("cache lock poisoned: {}", e)))
    }

    /// Drop every expired entry. Returns the number removed.
    pub fn prune(&self) -> Result<usize> {
        let mut entries = self.lock()?;
        Ok(entries.sweep(now_ms()))
    }
}

impl Entries {
    fn sweep(&mut self, now_ms: i64) -> usize {
        let before = self.map.len();
        self.map.retain(|_, entry| entry.is_live(now_ms));
        self.next_sweep = (self.map.len() * 2).max(SWEEP_THRESHOLD);
        before - self.map.len()
    }
}

#[async_trait]
impl GenerationCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.lock()?;
        match entries.map.get(key) {
            Some(entry) if entry.is_live(now_ms()) => return Ok(Some(entry.value.clone())),
            Some(_) => {}
            None => return Ok(None),
        }
        entries.map.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let mut entries = self.lock()?;
        if entries.map.len() >= entries.next_sweep {
            let removed = entries.sweep(now_ms());
            if removed > 0 {
                log::debug!("Swept {} expired cache entries", removed);
            }
        }
        entries.map.insert(key.to_string(), Entry::new(value, ttl));
        Ok(())
    }
}

/// Cache persisted in a sled tree, so entries survive restarts.
pub struct SledCache {
    db: Db,
}

impl SledCache {
    pub fn open(dir: &Path) -> Result<Self> {
        let db = sled::open(dir.join("generation_cache_v1"))?;
        Ok(Self { db })
    }

    /// Drop every expired entry. Returns the number removed.
    pub fn prune(&self) -> Result<usize> {
        let now = now_ms();
        let mut count = 0;
        for item in self.db.iter() {
            let (key, val) = item?;
            let live = serde_json::from_slice::<Entry>(&val)
                .map(|entry| entry.is_live(now))
                .unwrap_or(false);
            if !live {
                self.db.remove(key)?;
                count += 1;
            }
        }
        self.db.flush()?;
        Ok(count)
    }
}

#[async_trait]
impl GenerationCache for SledCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let Some(val) = self.db.get(key)? else {
            return Ok(None);
        };
        let entry: Entry = serde_json::from_slice(&val)?;
        if entry.is_live(now_ms()) {
            return Ok(Some(entry.value));
        }
        self.db.remove(key)?;
        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        let val = serde_json::to_vec(&Entry::new(value, ttl))?;
        self.db.insert(key.as_bytes(), val)?;
        self.db.flush()?;
        Ok(())
    }
}
