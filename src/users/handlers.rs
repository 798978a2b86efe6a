use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::auth::jwt::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::repo::User;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(get_my_profile))
        .route("/users", get(list_users))
        .route(
            "/users/:username",
            get(get_user_by_username).delete(delete_user_by_username),
        )
}

/// Caller's own record. `User`'s serializer strips the password hash.
#[instrument(skip(state))]
pub async fn get_my_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(json!({ "message": "Profile found", "user": user })))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let users = User::list_all(&state.db).await?;
    Ok(Json(json!({ "message": "All users", "users": users })))
}

#[instrument(skip(state))]
pub async fn get_user_by_username(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(username): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = User::find_by_username(&state.db, &username)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(json!({ "message": "User found", "user": user })))
}

/// Hard delete. The only path through which a user record leaves the store.
#[instrument(skip(state))]
pub async fn delete_user_by_username(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    Path(username): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = User::delete_by_username(&state.db, &username)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    info!(username = %username, "user deleted");
    Ok(Json(json!({ "message": "User deleted", "user": user })))
}
