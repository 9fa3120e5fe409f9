use std::env;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub port: u16,
    pub pipeline_config: String,
    pub jwt_secret: Option<String>,
    pub token_ttl_hours: i64,
    pub refresh_ttl_hours: i64,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:tubeblog.db".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(8000),
            pipeline_config: env::var("PIPELINE_CONFIG").unwrap_or_else(|_| "config.toml".to_string()),
            jwt_secret: env::var("JWT_SECRET").ok().filter(|s| !s.is_empty()),
            token_ttl_hours: env::var("TOKEN_TTL_HOURS")
                .ok()
                .and_then(|h| h.parse::<i64>().ok())
                .filter(|h| *h > 0)
                .unwrap_or(24),
            refresh_ttl_hours: env::var("REFRESH_TOKEN_TTL_HOURS")
                .ok()
                .and_then(|h| h.parse::<i64>().ok())
                .filter(|h| *h > 0)
                .unwrap_or(24 * 7),
        }
    }
}
