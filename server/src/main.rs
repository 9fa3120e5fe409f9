use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tubeblog_pipeline::core::config::load_config;
use tubeblog_pipeline::ArticlePipeline;
use tubeblog_server::auth::AuthKeys;
use tubeblog_server::config::ServerConfig;
use tubeblog_server::{app, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| {
                "tubeblog_server=debug,tubeblog_pipeline=info,tower_http=debug".into()
            }),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();

    let db_pool = db::init_db(&config.database_url)
        .await
        .context("Failed to initialize DB")?;

    let pipeline_config = load_config(&config.pipeline_config)
        .with_context(|| format!("Failed to load pipeline config from {}", config.pipeline_config))?;

    // Ensure media directory exists
    let media_dir = pipeline_config.youtube.media_dir.clone();
    tokio::fs::create_dir_all(&media_dir)
        .await
        .with_context(|| format!("Failed to create media dir {}", media_dir.display()))?;

    let pipeline = ArticlePipeline::from_config(&pipeline_config)?;
    let auth = AuthKeys::from_optional_secret(config.jwt_secret.as_deref(), config.token_ttl_hours)
        .with_refresh_ttl_hours(config.refresh_ttl_hours);

    let state = AppState {
        db: db_pool,
        pipeline: Arc::new(pipeline),
        auth: Arc::new(auth),
        media_dir,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}
