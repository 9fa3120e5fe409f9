use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tubeblog_pipeline::ArticlePipeline;

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod store;

use auth::AuthKeys;
use db::DbPool;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub pipeline: Arc<ArticlePipeline>,
    pub auth: Arc<AuthKeys>,
    /// Where downloaded audio lands; cleaned per video when an article is deleted.
    pub media_dir: PathBuf,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/signup", post(routes::auth::signup))
        .route("/api/login", post(routes::auth::login))
        .route("/api/token/refresh", post(routes::auth::refresh))
        .route("/api/logout", post(routes::auth::logout))
        .route("/api/me", get(routes::auth::me))
        .route("/api/generate-blog", post(routes::generate::generate_blog))
        .route("/api/blogs", get(routes::blogs::list_blogs))
        .route("/api/blogs/save", post(routes::blogs::save_blog))
        .route(
            "/api/blogs/{id}",
            get(routes::blogs::get_blog).delete(routes::blogs::delete_blog),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
        .with_state(state)
}
