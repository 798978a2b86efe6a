use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, ChangePasswordRequest, GoogleSignInRequest, LoginRequest, PublicUser,
            RefreshRequest, RegisterRequest,
        },
        jwt::{AuthUser, JwtKeys},
        password::{hash_password, verify_password},
    },
    error::ApiError,
    state::AppState,
    users::repo::User,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/google", post(google_sign_in))
        .route("/auth/refresh", post(refresh))
        .route("/auth/whoami", get(whoami))
        .route("/auth/change-password", post(change_password))
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9_.-]{3,32}$").unwrap();
    }
    USERNAME_RE.is_match(username)
}

fn sign_pair(keys: &JwtKeys, user: &User) -> Result<(String, String), ApiError> {
    let access = keys.sign_access(user.id).map_err(ApiError::Internal)?;
    let refresh = keys.sign_refresh(user.id).map_err(ApiError::Internal)?;
    Ok((access, refresh))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    if !is_valid_username(&payload.username) {
        warn!(username = %payload.username, "invalid username");
        return Err(ApiError::validation("Invalid username"));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::validation("Password too short"));
    }
    if payload.name.trim().is_empty() {
        return Err(ApiError::validation("Name is required"));
    }

    if User::find_by_username(&state.db, &payload.username)
        .await?
        .is_some()
    {
        warn!(username = %payload.username, "username already exists");
        return Err(ApiError::Conflict("Username already exists".into()));
    }

    let hash = hash_password(&payload.password).map_err(ApiError::Internal)?;
    let user = User::create_local(&state.db, &payload.username, &hash, payload.name.trim())
        .await
        .map_err(ApiError::Internal)?;

    let keys = JwtKeys::from_ref(&state);
    let (access_token, refresh_token) = sign_pair(&keys, &user)?;

    info!(user_id = %user.id, username = %payload.username, "user registered");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = User::find_by_username(&state.db, &payload.username)
        .await?
        .ok_or_else(|| {
            warn!(username = %payload.username, "login unknown username");
            ApiError::Unauthorized("Invalid credentials".into())
        })?;

    let hash = user
        .password_hash
        .as_deref()
        .ok_or_else(|| ApiError::Unauthorized("Invalid credentials".into()))?;

    let ok = verify_password(&payload.password, hash).map_err(ApiError::Internal)?;
    if !ok {
        warn!(username = %payload.username, user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized("Invalid credentials".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    let (access_token, refresh_token) = sign_pair(&keys, &user)?;

    info!(user_id = %user.id, username = %payload.username, "user logged in");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(user),
    }))
}

/// Google sign-in. Verifies the ID token through the injected verifier
/// and creates the user on first sign-in.
#[instrument(skip(state, payload))]
pub async fn google_sign_in(
    State(state): State<AppState>,
    Json(payload): Json<GoogleSignInRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    if payload.id_token.is_empty() {
        return Err(ApiError::validation("Google token not provided"));
    }

    let claims = state.google.verify(&payload.id_token).await?;

    let user = match User::find_by_google_id(&state.db, &claims.sub).await? {
        Some(u) => u,
        None => {
            let name = claims.name.as_deref().unwrap_or("User");
            let user =
                User::create_google(&state.db, &claims.sub, claims.email.as_deref(), name).await?;
            info!(user_id = %user.id, "google user created on first sign-in");
            user
        }
    };

    let keys = JwtKeys::from_ref(&state);
    let (access_token, refresh_token) = sign_pair(&keys, &user)?;

    info!(user_id = %user.id, "google sign-in successful");
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(user),
    }))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;

    let (access_token, refresh_token) = sign_pair(&keys, &user)?;
    Ok(Json(AuthResponse {
        access_token,
        refresh_token,
        user: PublicUser::from(user),
    }))
}

/// Token introspection: echoes back the verified identity.
#[instrument(skip(state))]
pub async fn whoami(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;
    Ok(Json(json!({
        "message": "User verified",
        "user": PublicUser::from(user),
    })))
}

#[instrument(skip(state, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, ApiError> {
    if payload.password.len() < 8 {
        return Err(ApiError::validation("Password too short"));
    }

    let hash = hash_password(&payload.password).map_err(ApiError::Internal)?;
    let user = User::update_password(&state.db, &payload.username, &hash)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    info!(user_id = %user.id, "password changed");
    Ok(Json(json!({ "message": "Password updated" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_validation() {
        assert!(is_valid_username("john_doe"));
        assert!(is_valid_username("a.b-c_1"));
        assert!(!is_valid_username("ab")); // too short
        assert!(!is_valid_username("has space"));
        assert!(!is_valid_username(""));
    }
}
