//! User management routes

use anime_auth::{AuthUser, RequireAdmin, RequireAuth};
use anime_db::{NewUser, Roles};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

use super::types::{SaveUserRequest, UserResponse};

// ==================== Input Validation ====================

/// Maximum allowed username length
const MAX_USERNAME_LENGTH: usize = 64;
/// Maximum allowed password length
const MAX_PASSWORD_LENGTH: usize = 256;
/// Minimum allowed password length
const MIN_PASSWORD_LENGTH: usize = 8;

/// Validate username format and length
fn validate_username(username: &str) -> Result<(), ApiError> {
    if username.is_empty() {
        return Err(ApiError::field("username", "Username cannot be empty"));
    }
    if username.len() > MAX_USERNAME_LENGTH {
        return Err(ApiError::field(
            "username",
            &format!(
                "Username exceeds maximum length of {} characters",
                MAX_USERNAME_LENGTH
            ),
        ));
    }
    // A colon would make the basic credentials ambiguous
    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(ApiError::field(
            "username",
            "Username can only contain alphanumeric characters, dots, underscores, and hyphens",
        ));
    }
    Ok(())
}

/// Validate password length
fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::field(
            "password",
            &format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LENGTH
            ),
        ));
    }
    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ApiError::field(
            "password",
            &format!(
                "Password exceeds maximum length of {} characters",
                MAX_PASSWORD_LENGTH
            ),
        ));
    }
    Ok(())
}

fn validate_roles(labels: &[String]) -> Result<Roles, ApiError> {
    let roles = Roles::from_labels(labels).map_err(|e| ApiError::field("roles", &e.to_string()))?;
    if roles.is_empty() {
        return Err(ApiError::field("roles", "At least one role is required"));
    }
    Ok(roles)
}

// ==================== User Routes ====================

/// GET /users/me
async fn me(RequireAuth(user): RequireAuth) -> Json<AuthUser> {
    Json(user)
}

/// GET /users (Admin only)
async fn list_users(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state.db.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// POST /users (Admin only)
///
/// Creates the user, or replaces the name, password and roles of an
/// existing user with the same username.
async fn save_user(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(request): Json<SaveUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let username = request.username.trim().to_string();
    validate_username(&username)?;
    validate_password(&request.password)?;
    let roles = validate_roles(&request.roles)?;

    debug!("Saving user: {}", username);

    let hasher = state.gate.hasher().clone();
    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("hashing task failed: {}", e)))??;

    let user = state
        .gate
        .store()
        .save(NewUser {
            name: request
                .name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| username.clone()),
            username,
            password_hash,
            roles,
        })
        .await?;

    info!("User {} saved user {} ({})", admin.username, user.username, user.roles);

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// GET /users/{username} (Admin only)
async fn get_user(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .gate
        .store()
        .find_by_username(&username)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User: {}", username)))?;

    Ok(Json(UserResponse::from(user)))
}

/// Create user routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(save_user))
        .route("/users/me", get(me))
        .route("/users/{username}", get(get_user))
}
