//! Anime CRUD routes
//!
//! Reads need the USER role through the path policy. Writes additionally
//! require ADMIN: the `/animes/admin/**` variants get it from the policy,
//! the plain `/animes` variants check it in the handler.

use anime_auth::{RequireAdmin, RequireAuth};
use anime_db::{Anime, AnimeSort};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

use super::types::{AnimePostRequestBody, AnimePutRequestBody, FindParams, Page, PageParams};

/// Default page size
const DEFAULT_PAGE_SIZE: i64 = 20;
/// Largest page a client may request
const MAX_PAGE_SIZE: i64 = 100;
/// Highest page index whose offset fits in an i64 at any allowed size
const MAX_PAGE_INDEX: i64 = i64::MAX / MAX_PAGE_SIZE;
/// Maximum allowed anime name length
const MAX_NAME_LENGTH: usize = 255;

const NAME_EMPTY: &str = "The anime name cannot be empty";
const ANIME_NOT_FOUND: &str = "Anime not found";

// ==================== Input Validation ====================

/// Validate and trim an anime name
fn validate_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::field("name", NAME_EMPTY));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(ApiError::field(
            "name",
            &format!("The anime name cannot exceed {} characters", MAX_NAME_LENGTH),
        ));
    }
    Ok(name.to_string())
}

fn page_request(params: &PageParams) -> Result<(i64, i64, AnimeSort), ApiError> {
    let page = params.page.unwrap_or(0);
    if !(0..=MAX_PAGE_INDEX).contains(&page) {
        return Err(ApiError::field(
            "page",
            &format!("Page index must be between 0 and {}", MAX_PAGE_INDEX),
        ));
    }

    let size = params.size.unwrap_or(DEFAULT_PAGE_SIZE);
    if !(1..=MAX_PAGE_SIZE).contains(&size) {
        return Err(ApiError::field(
            "size",
            &format!("Page size must be between 1 and {}", MAX_PAGE_SIZE),
        ));
    }

    let sort = match params.sort.as_deref() {
        Some(sort) => sort
            .parse::<AnimeSort>()
            .map_err(|e| ApiError::field("sort", &e.to_string()))?,
        None => AnimeSort::default(),
    };

    Ok((page, size, sort))
}

async fn find_by_id_or_bad_request(state: &AppState, id: i64) -> Result<Anime, ApiError> {
    state
        .db
        .get_anime(id)
        .await?
        .ok_or_else(|| ApiError::BadRequest(ANIME_NOT_FOUND.to_string()))
}

// ==================== Anime Routes ====================

/// GET /animes
async fn list(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<Anime>>, ApiError> {
    let (page, size, sort) = page_request(&params)?;

    let total = state.db.count_animes().await?;
    let content = state.db.list_animes(page * size, size, sort).await?;

    Ok(Json(Page::new(content, page, size, total)))
}

/// GET /animes/all
async fn list_all(State(state): State<AppState>) -> Result<Json<Vec<Anime>>, ApiError> {
    Ok(Json(state.db.list_all_animes().await?))
}

/// GET /animes/{id}
async fn find_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Anime>, ApiError> {
    Ok(Json(find_by_id_or_bad_request(&state, id).await?))
}

/// GET /animes/by-id/{id}
async fn find_by_id_audited(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Anime>, ApiError> {
    info!("User {} requested anime {}", user.username, id);
    Ok(Json(find_by_id_or_bad_request(&state, id).await?))
}

/// GET /animes/find?name=
async fn find_by_name(
    State(state): State<AppState>,
    Query(params): Query<FindParams>,
) -> Result<Json<Vec<Anime>>, ApiError> {
    Ok(Json(state.db.find_animes_by_name(&params.name).await?))
}

async fn create(
    state: &AppState,
    username: &str,
    request: AnimePostRequestBody,
) -> Result<(StatusCode, Json<Anime>), ApiError> {
    let name = validate_name(&request.name)?;

    let anime = state.db.insert_anime(&name).await?;
    metrics::counter!("anime_animes_created_total").increment(1);
    info!("User {} created anime {} ({})", username, anime.id, anime.name);

    Ok((StatusCode::CREATED, Json(anime)))
}

/// POST /animes (Admin only)
async fn save(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(request): Json<AnimePostRequestBody>,
) -> Result<(StatusCode, Json<Anime>), ApiError> {
    create(&state, &admin.username, request).await
}

/// POST /animes/admin
async fn save_admin(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Json(request): Json<AnimePostRequestBody>,
) -> Result<(StatusCode, Json<Anime>), ApiError> {
    create(&state, &user.username, request).await
}

/// PUT /animes (Admin only)
async fn replace(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(request): Json<AnimePutRequestBody>,
) -> Result<StatusCode, ApiError> {
    let name = validate_name(&request.name)?;
    debug!("Replacing anime {}", request.id);

    if !state.db.update_anime(request.id, &name).await? {
        return Err(ApiError::BadRequest(ANIME_NOT_FOUND.to_string()));
    }

    info!("User {} renamed anime {} to {}", admin.username, request.id, name);
    Ok(StatusCode::NO_CONTENT)
}

async fn remove(state: &AppState, username: &str, id: i64) -> Result<StatusCode, ApiError> {
    if !state.db.delete_anime(id).await? {
        return Err(ApiError::BadRequest(ANIME_NOT_FOUND.to_string()));
    }

    info!("User {} deleted anime {}", username, id);
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /animes/{id} (Admin only)
async fn delete_anime(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    remove(&state, &admin.username, id).await
}

/// DELETE /animes/admin/{id}
async fn delete_anime_admin(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    remove(&state, &user.username, id).await
}

/// Create anime routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/animes", get(list).post(save).put(replace))
        .route("/animes/all", get(list_all))
        .route("/animes/find", get(find_by_name))
        .route("/animes/by-id/{id}", get(find_by_id_audited))
        .route("/animes/admin", post(save_admin))
        .route("/animes/admin/{id}", delete(delete_anime_admin))
        .route("/animes/{id}", get(find_by_id).delete(delete_anime))
}
