pub mod core;

pub use crate::core::error::{PipelineError, Result};
pub use crate::core::pipeline::{ArticlePipeline, GeneratedArticle, GenerationRequest};
