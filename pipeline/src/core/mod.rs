pub mod article;
pub mod audio;
pub mod cache;
pub mod config;
pub mod error;
pub mod llm;
pub mod metadata;
pub mod pipeline;
pub mod transcription;
pub mod video;
