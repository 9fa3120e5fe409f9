use pulldown_cmark::{html, Options, Parser};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::core::error::{PipelineError, Result};
use crate::core::llm::TextGenerator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Professional,
    Casual,
    Witty,
    Technical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Length {
    Short,
    #[default]
    Medium,
    Long,
}

impl Tone {
    pub const ALL: [Tone; 4] = [Tone::Professional, Tone::Casual, Tone::Witty, Tone::Technical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Casual => "casual",
            Tone::Witty => "witty",
            Tone::Technical => "technical",
        }
    }

    fn directive(&self) -> &'static str {
        match self {
            Tone::Professional => {
                "Use a professional, authoritative tone suitable for an industry publication."
            }
            Tone::Casual => "Use a casual, friendly and conversational tone, as if talking to a friend.",
            Tone::Witty => "Use a witty, playful tone with light humor, without losing the substance.",
            Tone::Technical => {
                "Use a precise, technical tone with accurate terminology and concrete detail."
            }
        }
    }
}

impl Length {
    pub const ALL: [Length; 3] = [Length::Short, Length::Medium, Length::Long];

    pub fn as_str(&self) -> &'static str {
        match self {
            Length::Short => "short",
            Length::Medium => "medium",
            Length::Long => "long",
        }
    }

    fn directive(&self) -> &'static str {
        match self {
            Length::Short => "Keep the article short, around 300 words.",
            Length::Medium => "Aim for a medium-length article of around 600 words.",
            Length::Long => "Write a long, in-depth article of 1000 words or more.",
        }
    }
}

impl FromStr for Tone {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Tone::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| {
                PipelineError::Validation(format!(
                    "Invalid tone '{}'. Allowed: professional, casual, witty, technical.",
                    s
                ))
            })
    }
}

impl FromStr for Length {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Length::ALL
            .into_iter()
            .find(|l| l.as_str() == wanted)
            .ok_or_else(|| {
                PipelineError::Validation(format!(
                    "Invalid length '{}'. Allowed: short, medium, long.",
                    s
                ))
            })
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse an optional style value strictly; absent or blank means the default.
pub fn parse_style(tone: Option<&str>, length: Option<&str>) -> Result<(Tone, Length)> {
    let tone = match tone.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => t.parse()?,
        None => Tone::default(),
    };
    let length = match length.map(str::trim).filter(|l| !l.is_empty()) {
        Some(l) => l.parse()?,
        None => Length::default(),
    };
    Ok((tone, length))
}

const STRUCTURE_DIRECTIVE: &str = "Based on the following transcript from a YouTube video, write a comprehensive \
blog article. Write it based on the transcript, but do not make it sound like a YouTube video. \
Make it read as a polished, structured blog article with an engaging intro, clear sections, \
and a concise conclusion. Format the article in Markdown.";

pub fn build_prompt(transcript: &str, tone: Tone, length: Length) -> String {
    format!(
        "{}\n{}\n{}\n\nTranscript:\n{}\n\nArticle:",
        STRUCTURE_DIRECTIVE,
        tone.directive(),
        length.directive(),
        transcript
    )
}

pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let parser = Parser::new_ext(markdown, options);
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

/// Turns a transcript into the article's HTML body.
pub struct ArticleGenerator {
    llm: Arc<dyn TextGenerator>,
}

impl ArticleGenerator {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self { llm }
    }

    pub async fn generate(&self, transcript: &str, tone: Tone, length: Length) -> Result<String> {
        let prompt = build_prompt(transcript, tone, length);
        let markdown = self.llm.complete(&prompt).await?;
        if markdown.trim().is_empty() {
            return Err(PipelineError::Generation(
                "Failed to generate blog content from transcript.".into(),
            ));
        }

        let html = markdown_to_html(strip_code_fence(&markdown));
        if html.trim().is_empty() {
            return Err(PipelineError::Generation(
                "Generated content rendered to empty HTML.".into(),
            ));
        }
        Ok(html)
    }
}

/// Models sometimes wrap the whole answer in ```markdown ... ```.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    match body.split_once('\n') {
        Some((lang, inner)) if lang.trim().chars().all(|c| c.is_ascii_alphabetic()) => inner.trim(),
        _ => trimmed,
    }
}
