use axum::extract::{Json, State};
use serde::Deserialize;
use tubeblog_pipeline::{GeneratedArticle, GenerationRequest};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::AppState;

#[derive(Deserialize)]
pub struct GenerateBlogRequest {
    pub link: Option<String>,
    pub tone: Option<String>,
    pub length: Option<String>,
}

/// POST /api/generate-blog. Returns `{content, title, tone, length}`; nothing is persisted here.
pub async fn generate_blog(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<GenerateBlogRequest>,
) -> Result<Json<GeneratedArticle>, ApiError> {
    let link = payload
        .link
        .filter(|l| !l.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Missing 'link' field.".to_string()))?;

    let request = GenerationRequest {
        user_id: user.id,
        link,
        tone: payload.tone,
        length: payload.length,
    };

    let article = state.pipeline.generate(&request).await?;
    Ok(Json(article))
}
