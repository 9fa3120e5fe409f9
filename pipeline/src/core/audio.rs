use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::core::config::YoutubeConfig;
use crate::core::error::{PipelineError, Result};
use crate::core::video::VideoReference;

const STDERR_LIMIT: usize = 400;

/// Produces a local audio file for a video.
#[async_trait]
pub trait AudioSource: Send + Sync {
    async fn download(&self, video: &VideoReference) -> Result<PathBuf>;
}

/// Extracts MP3 audio with yt-dlp into the shared media directory.
pub struct YtDlpDownloader {
    binary: String,
    ffmpeg_location: Option<String>,
    media_dir: PathBuf,
}

impl YtDlpDownloader {
    pub fn new(config: &YoutubeConfig) -> Self {
        Self {
            binary: config.downloader.clone(),
            ffmpeg_location: config.ffmpeg_location.clone(),
            media_dir: config.media_dir.clone(),
        }
    }

    /// `{video_id}_{uuid}.mp3`. The random suffix keeps concurrent downloads apart.
    fn output_path(&self, video: &VideoReference) -> PathBuf {
        let name = format!("{}_{}.mp3", video.video_id(), uuid::Uuid::new_v4().simple());
        self.media_dir.join(name)
    }

    fn build_args(&self, video: &VideoReference, output: &Path) -> Vec<String> {
        let mut args = vec![
            "-x".to_string(),
            "--audio-format".to_string(),
            "mp3".to_string(),
        ];
        if let Some(ffmpeg) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".to_string());
            args.push(ffmpeg.clone());
        }
        args.push("-o".to_string());
        args.push(output.to_string_lossy().to_string());
        args.push(video.canonical_url());
        args
    }
}

#[async_trait]
impl AudioSource for YtDlpDownloader {
    async fn download(&self, video: &VideoReference) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.media_dir)
            .await
            .map_err(|e| PipelineError::AudioDownload {
                code: None,
                detail: format!("cannot create {}: {}", self.media_dir.display(), e),
            })?;

        let output_file = self.output_path(video);
        let args = self.build_args(video, &output_file);
        log::info!("Downloading audio for {} into {}", video, output_file.display());

        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .await
            .map_err(|e| PipelineError::AudioDownload {
                code: None,
                detail: format!("failed to start {}: {}", self.binary, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::error!("yt-dlp error for {}: {}", video, stderr);
            return Err(PipelineError::AudioDownload {
                code: output.status.code(),
                detail: truncate(&stderr, STDERR_LIMIT),
            });
        }

        if !tokio::fs::try_exists(&output_file).await.unwrap_or(false) {
            return Err(PipelineError::AudioDownload {
                code: output.status.code(),
                detail: "Audio file was not created by yt-dlp.".to_string(),
            });
        }

        Ok(output_file)
    }
}

fn truncate(text: &str, limit: usize) -> String {
    text.trim().chars().take(limit).collect()
}

/// Matches `{video_id}_{32 hex}.mp3` exactly, since ids may themselves contain `_`.
fn is_artifact_of(file_name: &str, video_id: &str) -> bool {
    file_name
        .strip_prefix(video_id)
        .and_then(|rest| rest.strip_prefix('_'))
        .and_then(|rest| rest.strip_suffix(".mp3"))
        .map(|suffix| suffix.len() == 32 && suffix.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

/// Remove one downloaded file once it has been transcribed. A file that is already gone is fine.
pub async fn discard_artifact(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => log::debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// Remove every audio artifact downloaded for `video_id`. Returns how many files went.
pub async fn remove_artifacts(media_dir: &Path, video_id: &str) -> std::io::Result<usize> {
    let mut entries = match tokio::fs::read_dir(media_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if is_artifact_of(&name, video_id) {
            tokio::fs::remove_file(entry.path()).await?;
            removed += 1;
        }
    }
    if removed > 0 {
        log::info!("Removed {} audio file(s) for {}", removed, video_id);
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn downloader(binary: &str, media_dir: &Path) -> YtDlpDownloader {
        YtDlpDownloader::new(&YoutubeConfig {
            downloader: binary.to_string(),
            ffmpeg_location: Some("/opt/ffmpeg/bin".to_string()),
            media_dir: media_dir.to_path_buf(),
            ..YoutubeConfig::default()
        })
    }

    fn video() -> VideoReference {
        VideoReference::normalize("https://youtu.be/dQw4w9WgXcQ").unwrap()
    }

    #[test]
    fn output_names_are_unique_and_keyed_by_video() {
        let dl = downloader("yt-dlp", Path::new("media"));
        let a = dl.output_path(&video());
        let b = dl.output_path(&video());
        assert_ne!(a, b);
        let name = a.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("dQw4w9WgXcQ_"));
        assert!(name.ends_with(".mp3"));
    }

    #[test]
    fn args_target_canonical_url() {
        let dl = downloader("yt-dlp", Path::new("media"));
        let args = dl.build_args(&video(), Path::new("media/out.mp3"));
        assert_eq!(&args[..3], &["-x", "--audio-format", "mp3"]);
        assert!(args.windows(2).any(|w| w[0] == "--ffmpeg-location" && w[1] == "/opt/ffmpeg/bin"));
        assert!(args.windows(2).any(|w| w[0] == "-o" && w[1] == "media/out.mp3"));
        assert_eq!(args.last().unwrap(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }

    #[test]
    fn truncates_long_diagnostics() {
        let long = "e".repeat(1000);
        assert_eq!(truncate(&long, STDERR_LIMIT).len(), STDERR_LIMIT);
        assert_eq!(truncate("  short \n", STDERR_LIMIT), "short");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_reports_code() {
        let dir = tempfile::tempdir().unwrap();
        let err = downloader("false", dir.path()).download(&video()).await.unwrap_err();
        match err {
            PipelineError::AudioDownload { code, .. } => assert_eq!(code, Some(1)),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_exit_without_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = downloader("true", dir.path()).download(&video()).await.unwrap_err();
        match err {
            PipelineError::AudioDownload { detail, .. } => assert!(detail.contains("not created")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_binary_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = downloader("definitely-not-yt-dlp-xyz", dir.path())
            .download(&video())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::AudioDownload { code: None, .. }));
    }

    #[tokio::test]
    async fn remove_artifacts_only_touches_matching_video() {
        let dir = tempfile::tempdir().unwrap();
        let hex = "0123456789abcdef0123456789abcdef";
        let keep = [
            format!("abcd_{}.mp3", hex),
            format!("abc_def_{}.mp3", hex),
            format!("xyz_{}.mp3", hex),
            "abc_notes.mp3".to_string(),
        ];
        let gone = [
            format!("abc_{}.mp3", hex),
            format!("abc_{}.mp3", hex.replace('0', "f")),
        ];
        for name in keep.iter().chain(gone.iter()) {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let removed = remove_artifacts(dir.path(), "abc").await.unwrap();
        assert_eq!(removed, 2);
        for name in &keep {
            assert!(dir.path().join(name).exists(), "{} should survive", name);
        }
        for name in &gone {
            assert!(!dir.path().join(name).exists(), "{} should be removed", name);
        }

        let missing = dir.path().join("nope");
        assert_eq!(remove_artifacts(&missing, "abc").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn discard_removes_file_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc_0123456789abcdef0123456789abcdef.mp3");
        std::fs::write(&path, b"x").unwrap();

        discard_artifact(&path).await;
        assert!(!path.exists());
        discard_artifact(&path).await;
    }
}
