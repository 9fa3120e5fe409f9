use regex::Regex;
use std::fmt;
use std::sync::OnceLock;
use url::Url;

use crate::core::error::{PipelineError, Result};

const SHORT_HOST: &str = "youtu.be";
const MAIN_HOST: &str = "youtube.com";

/// Canonical identifier of a YouTube video.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoReference {
    video_id: String,
}

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid regex"))
}

impl VideoReference {
    /// Extract the video id from any accepted link shape.
    ///
    /// Accepted: `youtu.be/<id>`, `youtube.com/watch?v=<id>` and the
    /// `/shorts/`, `/embed/`, `/live/` paths, on `www.`, `m.` and `music.`
    /// subdomains. A missing scheme is read as `https://`.
    pub fn normalize(link: &str) -> Result<Self> {
        let trimmed = link.trim();
        if trimmed.is_empty() {
            return Err(PipelineError::InvalidLink("link is empty".into()));
        }

        let with_scheme = if has_scheme(trimmed) {
            trimmed.to_string()
        } else {
            format!("https://{}", trimmed)
        };

        let url = Url::parse(&with_scheme)
            .map_err(|e| PipelineError::InvalidLink(format!("{}: {}", trimmed, e)))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(PipelineError::InvalidLink(format!("unsupported scheme in {}", trimmed)));
        }

        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);

        let candidate = if host == SHORT_HOST {
            url.path_segments().and_then(|mut s| s.next()).map(str::to_string)
        } else if is_main_host(host) {
            Self::id_from_main_host(&url)
        } else {
            None
        };

        match candidate {
            Some(id) if id_pattern().is_match(&id) => Ok(Self { video_id: id }),
            Some(id) if !id.is_empty() => Err(PipelineError::InvalidLink(format!(
                "malformed video id '{}' in {}",
                id, trimmed
            ))),
            _ => Err(PipelineError::InvalidLink(format!(
                "no video id found in {}",
                trimmed
            ))),
        }
    }

    fn id_from_main_host(url: &Url) -> Option<String> {
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|p| !p.is_empty()).collect())
            .unwrap_or_default();

        match segments.as_slice() {
            ["watch"] => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            ["shorts" | "embed" | "live", id, ..] => Some((*id).to_string()),
            _ => None,
        }
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn canonical_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }
}

/// A `scheme://` prefix, as opposed to `://` somewhere in the query string.
fn has_scheme(link: &str) -> bool {
    let first_delim = link.find(|c: char| c == '/' || c == '?' || c == '#');
    match (link.find("://"), first_delim) {
        (Some(scheme_end), Some(first_delim)) => scheme_end < first_delim,
        _ => false,
    }
}

fn is_main_host(host: &str) -> bool {
    host == MAIN_HOST || host == "m.youtube.com" || host == "music.youtube.com"
}

impl fmt::Display for VideoReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.video_id)
    }
}
