use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use bcrypt::{hash, verify};
use serde::{Deserialize, Serialize};
use sqlx::Row; // Import Row trait for get()

use crate::auth::{AuthUser, TokenKind};
use crate::error::ApiError;
use crate::AppState;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Deserialize)]
pub struct SignupRequest {
    username: String,
    #[serde(default)]
    email: String,
    password: String,
    repeat_password: String,
}

#[derive(Serialize)]
pub struct SignupResponse {
    success: bool,
    username: String,
    access: String,
    refresh: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    access: String,
    refresh: String,
    username: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    refresh: String,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    access: String,
}

#[derive(Serialize)]
pub struct MeResponse {
    username: String,
}

// Public: Signup, returns a token so the client can log straight in
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    let username = payload.username.trim().to_string();
    if username.is_empty() {
        return Err(ApiError::BadRequest("Username is required.".to_string()));
    }
    if payload.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters.",
            MIN_PASSWORD_LEN
        )));
    }
    if payload.password != payload.repeat_password {
        return Err(ApiError::BadRequest("Passwords do not match.".to_string()));
    }

    let password_hash = hash(&payload.password, state.auth.bcrypt_cost)
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))?;
    let now = chrono::Utc::now().timestamp();

    let res = sqlx::query(
        "INSERT INTO users (username, email, password_hash, created_at) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(&username)
    .bind(payload.email.trim())
    .bind(&password_hash)
    .bind(now)
    .fetch_one(&state.db)
    .await;

    let user_id: i64 = match res {
        Ok(row) => row.try_get("id")?,
        Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
            return Err(ApiError::Conflict("A user with that username already exists.".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!("created user {} ({})", username, user_id);
    let access = state.auth.issue(user_id, &username)?;
    let refresh = state.auth.issue_refresh(user_id, &username)?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            success: true,
            username,
            access,
            refresh,
        }),
    ))
}

// Public: Login
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let row = sqlx::query("SELECT id, username, password_hash FROM users WHERE username = ?")
        .bind(payload.username.trim())
        .fetch_optional(&state.db)
        .await?;

    if let Some(row) = row {
        let id: i64 = row.try_get("id")?;
        let stored_hash: String = row.try_get("password_hash").unwrap_or_default();
        let username: String = row.try_get("username").unwrap_or_default();

        if verify(&payload.password, &stored_hash).unwrap_or(false) {
            let access = state.auth.issue(id, &username)?;
            let refresh = state.auth.issue_refresh(id, &username)?;
            return Ok(Json(LoginResponse {
                access,
                refresh,
                username,
            }));
        }
    }

    Err(ApiError::Unauthorized(
        "No active account found with the given credentials.".to_string(),
    ))
}

pub async fn me(user: AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        username: user.username,
    })
}

async fn is_revoked(state: &AppState, jti: &str) -> Result<bool, ApiError> {
    let hit: Option<String> = sqlx::query_scalar("SELECT jti FROM revoked_tokens WHERE jti = ?")
        .bind(jti)
        .fetch_optional(&state.db)
        .await?;
    Ok(hit.is_some())
}

fn blacklisted() -> ApiError {
    ApiError::Unauthorized("Token is blacklisted.".to_string())
}

// Public: trade a refresh token for a new access token
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let claims = state.auth.verify_kind(&payload.refresh, TokenKind::Refresh)?;
    if is_revoked(&state, &claims.jti).await? {
        return Err(blacklisted());
    }

    let access = state.auth.issue(claims.user_id()?, &claims.username)?;
    Ok(Json(RefreshResponse { access }))
}

// Public: revoke a refresh token; access tokens simply run out
pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let claims = state.auth.verify_kind(&payload.refresh, TokenKind::Refresh)?;

    let inserted = sqlx::query(
        "INSERT INTO revoked_tokens (jti, expires_at) VALUES (?, ?) ON CONFLICT (jti) DO NOTHING",
    )
    .bind(&claims.jti)
    .bind(claims.exp)
    .execute(&state.db)
    .await?
    .rows_affected();
    if inserted == 0 {
        return Err(blacklisted());
    }

    // Rows past their expiry guard nothing; the signature check already rejects those tokens.
    let pruned = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < ?")
        .bind(chrono::Utc::now().timestamp())
        .execute(&state.db)
        .await?
        .rows_affected();

    tracing::info!("user {} logged out (pruned {} revoked tokens)", claims.username, pruned);
    Ok(Json(serde_json::json!({})))
}
