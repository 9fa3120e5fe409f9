use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tubeblog_pipeline::core::audio::remove_artifacts;
use tubeblog_pipeline::core::video::VideoReference;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::store::{ArticlePost, ArticleStore, SaveOutcome, SaveRequest, SaveStatus};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct ArticleView {
    pub id: i64,
    pub title: String,
    pub link: String,
    pub content: String,
    pub tone: String,
    pub length: String,
    pub created_at: String,
}

impl From<ArticlePost> for ArticleView {
    fn from(post: ArticlePost) -> Self {
        let created_at = DateTime::<Utc>::from_timestamp(post.created_at, 0)
            .unwrap_or_default()
            .to_rfc3339();
        Self {
            id: post.id,
            title: post.youtube_title,
            link: post.youtube_link,
            content: post.generated_content,
            tone: post.tone,
            length: post.length,
            created_at,
        }
    }
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
}

pub async fn list_blogs(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ArticleView>>, ApiError> {
    let posts = ArticleStore::new(state.db.clone())
        .list_for_user(user.id, query.q.as_deref())
        .await?;
    Ok(Json(posts.into_iter().map(ArticleView::from).collect()))
}

pub async fn save_blog(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SaveRequest>,
) -> Result<(StatusCode, Json<SaveOutcome>), ApiError> {
    let outcome = ArticleStore::new(state.db.clone())
        .save(user.id, &payload)
        .await?;

    let status = match outcome.status {
        SaveStatus::Created => StatusCode::CREATED,
        SaveStatus::Exists | SaveStatus::Updated => StatusCode::OK,
    };
    Ok((status, Json(outcome)))
}

pub async fn get_blog(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ArticleView>, ApiError> {
    let post = ArticleStore::new(state.db.clone()).get_owned(user.id, id).await?;
    Ok(Json(post.into()))
}

/// Owner-only delete. Also drops any audio downloaded for the article's video.
pub async fn delete_blog(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let store = ArticleStore::new(state.db.clone());
    let post = store.get_owned(user.id, id).await?;
    store.delete(&post).await?;

    if let Ok(video) = VideoReference::normalize(&post.youtube_link) {
        if let Err(e) = remove_artifacts(&state.media_dir, video.video_id()).await {
            tracing::warn!("failed to remove audio for {}: {}", video, e);
        }
    }

    tracing::info!("user {} deleted article {}", user.id, id);
    Ok(StatusCode::NO_CONTENT)
}
