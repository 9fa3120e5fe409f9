use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Sqlite};
use thiserror::Error;
use tubeblog_pipeline::core::article::{parse_style, Length, Tone};
use tubeblog_pipeline::core::video::VideoReference;

use crate::db::DbPool;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("An article with this link, tone and length already exists.")]
    Duplicate,

    #[error("Not found.")]
    NotFound,

    #[error("{0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ArticlePost {
    pub id: i64,
    pub user_id: i64,
    pub youtube_title: String,
    pub youtube_link: String,
    pub generated_content: String,
    pub tone: String,
    pub length: String,
    pub created_at: i64,
}

const COLUMNS: &str =
    "id, user_id, youtube_title, youtube_link, generated_content, tone, length, created_at";

#[derive(Debug, Clone, Deserialize)]
pub struct SaveRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub link: String,
    pub tone: Option<String>,
    pub length: Option<String>,
    #[serde(default)]
    pub force_update: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    Created,
    Exists,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub status: SaveStatus,
    pub id: i64,
}

/// A validated article ready to be written.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub link: String,
    pub content: String,
    pub tone: Tone,
    pub length: Length,
}

impl SaveRequest {
    /// Required fields present, style values allowed, link normalized to its canonical form.
    pub fn validate(&self) -> Result<NewArticle> {
        let mut missing = Vec::new();
        if self.title.trim().is_empty() {
            missing.push("title");
        }
        if self.content.trim().is_empty() {
            missing.push("content");
        }
        if self.link.trim().is_empty() {
            missing.push("link");
        }
        if !missing.is_empty() {
            return Err(StoreError::Validation(format!(
                "Missing required field(s): {}.",
                missing.join(", ")
            )));
        }

        let (tone, length) = parse_style(self.tone.as_deref(), self.length.as_deref())
            .map_err(|e| StoreError::Validation(e.to_string()))?;
        let video = VideoReference::normalize(&self.link)
            .map_err(|e| StoreError::Validation(e.to_string()))?;

        Ok(NewArticle {
            title: self.title.trim().to_string(),
            link: video.canonical_url(),
            content: self.content.clone(),
            tone,
            length,
        })
    }
}

async fn find_in<'e, E>(
    executor: E,
    user_id: i64,
    link: &str,
    tone: Tone,
    length: Length,
) -> Result<Option<ArticlePost>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let post = sqlx::query_as::<_, ArticlePost>(&format!(
        "SELECT {} FROM article_posts WHERE user_id = ? AND youtube_link = ? AND tone = ? AND length = ?",
        COLUMNS
    ))
    .bind(user_id)
    .bind(link)
    .bind(tone.as_str())
    .bind(length.as_str())
    .fetch_optional(executor)
    .await?;
    Ok(post)
}

async fn create_in<'e, E>(executor: E, user_id: i64, article: &NewArticle) -> Result<ArticlePost>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let created_at = chrono::Utc::now().timestamp();

    sqlx::query_as::<_, ArticlePost>(&format!(
        r#"
        INSERT INTO article_posts (user_id, youtube_title, youtube_link, generated_content, tone, length, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING {}
        "#,
        COLUMNS
    ))
    .bind(user_id)
    .bind(&article.title)
    .bind(&article.link)
    .bind(&article.content)
    .bind(article.tone.as_str())
    .bind(article.length.as_str())
    .bind(created_at)
    .fetch_one(executor)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => StoreError::Duplicate,
        other => StoreError::Database(other),
    })
}

/// Insert unless the `(user, link, tone, length)` tuple exists. `None` on conflict.
async fn insert_or_ignore_in<'e, E>(
    executor: E,
    user_id: i64,
    article: &NewArticle,
) -> Result<Option<ArticlePost>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let created_at = chrono::Utc::now().timestamp();

    let post = sqlx::query_as::<_, ArticlePost>(&format!(
        r#"
        INSERT INTO article_posts (user_id, youtube_title, youtube_link, generated_content, tone, length, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (user_id, youtube_link, tone, length) DO NOTHING
        RETURNING {}
        "#,
        COLUMNS
    ))
    .bind(user_id)
    .bind(&article.title)
    .bind(&article.link)
    .bind(&article.content)
    .bind(article.tone.as_str())
    .bind(article.length.as_str())
    .bind(created_at)
    .fetch_optional(executor)
    .await?;
    Ok(post)
}

async fn update_content_in<'e, E>(executor: E, id: i64, content: &str) -> Result<ArticlePost>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, ArticlePost>(&format!(
        "UPDATE article_posts SET generated_content = ? WHERE id = ? RETURNING {}",
        COLUMNS
    ))
    .bind(content)
    .bind(id)
    .fetch_optional(executor)
    .await?
    .ok_or(StoreError::NotFound)
}

/// Durable articles. At most one row per `(user, link, tone, length)`.
#[derive(Clone)]
pub struct ArticleStore {
    pool: DbPool,
}

impl ArticleStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find(
        &self,
        user_id: i64,
        link: &str,
        tone: Tone,
        length: Length,
    ) -> Result<Option<ArticlePost>> {
        find_in(&self.pool, user_id, link, tone, length).await
    }

    pub async fn create(&self, user_id: i64, article: &NewArticle) -> Result<ArticlePost> {
        create_in(&self.pool, user_id, article).await
    }

    pub async fn update_content(&self, post: &ArticlePost, content: &str) -> Result<ArticlePost> {
        update_content_in(&self.pool, post.id, content).await
    }

    pub async fn delete(&self, post: &ArticlePost) -> Result<()> {
        let result = sqlx::query("DELETE FROM article_posts WHERE id = ? AND user_id = ?")
            .bind(post.id)
            .bind(post.user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// The post with `id`, provided `user_id` owns it.
    pub async fn get_owned(&self, user_id: i64, id: i64) -> Result<ArticlePost> {
        sqlx::query_as::<_, ArticlePost>(&format!(
            "SELECT {} FROM article_posts WHERE id = ? AND user_id = ?",
            COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    /// Most recent first, optionally filtered by a case-insensitive title substring.
    pub async fn list_for_user(&self, user_id: i64, query: Option<&str>) -> Result<Vec<ArticlePost>> {
        let query = query.map(str::trim).filter(|q| !q.is_empty());

        let posts = sqlx::query_as::<_, ArticlePost>(&format!(
            r#"
            SELECT {} FROM article_posts
            WHERE user_id = ? AND (? IS NULL OR instr(lower(youtube_title), lower(?)) > 0)
            ORDER BY id DESC
            "#,
            COLUMNS
        ))
        .bind(user_id)
        .bind(query)
        .bind(query)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    /// Validate, then create, report the existing row, or update it, all in one transaction.
    ///
    /// The insert runs first so the transaction takes SQLite's write lock before
    /// reading. A read-then-write transaction cannot wait for a concurrent writer
    /// and fails with `SQLITE_BUSY` instead.
    pub async fn save(&self, user_id: i64, request: &SaveRequest) -> Result<SaveOutcome> {
        let article = request.validate()?;

        let mut tx = self.pool.begin().await?;
        let outcome = match insert_or_ignore_in(&mut *tx, user_id, &article).await? {
            Some(post) => SaveOutcome { status: SaveStatus::Created, id: post.id },
            None => {
                let post = find_in(&mut *tx, user_id, &article.link, article.tone, article.length)
                    .await?
                    .ok_or(StoreError::NotFound)?;
                if request.force_update {
                    update_content_in(&mut *tx, post.id, &article.content).await?;
                    SaveOutcome { status: SaveStatus::Updated, id: post.id }
                } else {
                    SaveOutcome { status: SaveStatus::Exists, id: post.id }
                }
            }
        };

        tx.commit().await?;
        tracing::info!(
            "save for user {} link {} ({}, {}): {:?} id {}",
            user_id,
            article.link,
            article.tone,
            article.length,
            outcome.status,
            outcome.id
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(link: &str, tone: Option<&str>, length: Option<&str>) -> SaveRequest {
        SaveRequest {
            title: "A title".to_string(),
            content: "<p>body</p>".to_string(),
            link: link.to_string(),
            tone: tone.map(str::to_string),
            length: length.map(str::to_string),
            force_update: false,
        }
    }

    #[test]
    fn validation_reports_every_missing_field() {
        let mut req = request("", None, None);
        req.title = " ".to_string();
        match req.validate() {
            Err(StoreError::Validation(msg)) => {
                assert!(msg.contains("title"));
                assert!(msg.contains("link"));
                assert!(!msg.contains("content"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn validation_rejects_unknown_style_and_bad_links() {
        assert!(matches!(
            request("https://youtu.be/abc", Some("grumpy"), None).validate(),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            request("https://youtu.be/abc", None, Some("tiny")).validate(),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            request("https://example.com/abc", None, None).validate(),
            Err(StoreError::Validation(_))
        ));
    }

    #[test]
    fn validation_canonicalizes_link_and_defaults_style() {
        let article = request("https://youtu.be/abc", None, None).validate().unwrap();
        assert_eq!(article.link, "https://www.youtube.com/watch?v=abc");
        assert_eq!(article.tone, Tone::Professional);
        assert_eq!(article.length, Length::Medium);
    }
}
