//! Request/Response DTOs

use anime_db::{Roles, User};
use serde::{Deserialize, Serialize};

// ==================== Anime Types ====================

/// Body for creating an anime
#[derive(Debug, Deserialize, Serialize)]
pub struct AnimePostRequestBody {
    #[serde(default)]
    pub name: String,
}

/// Body for replacing an anime
#[derive(Debug, Deserialize, Serialize)]
pub struct AnimePutRequestBody {
    pub id: i64,
    #[serde(default)]
    pub name: String,
}

/// Paging query parameters
#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub size: Option<i64>,
    pub sort: Option<String>,
}

/// Name lookup query parameters
#[derive(Debug, Deserialize)]
pub struct FindParams {
    pub name: String,
}

/// One page of results
#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_elements: i64,
    pub total_pages: i64,
    /// Zero-based page number
    pub number: i64,
    pub size: i64,
    pub number_of_elements: usize,
    pub first: bool,
    pub last: bool,
    pub empty: bool,
}

impl<T> Page<T> {
    pub fn new(content: Vec<T>, number: i64, size: i64, total_elements: i64) -> Self {
        let total_pages = if size > 0 {
            (total_elements + size - 1) / size
        } else {
            0
        };

        Self {
            number_of_elements: content.len(),
            empty: content.is_empty(),
            content,
            total_elements,
            total_pages,
            number,
            size,
            first: number == 0,
            last: number + 1 >= total_pages,
        }
    }
}

// ==================== User Types ====================

/// Create or update user request
#[derive(Deserialize)]
pub struct SaveUserRequest {
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    pub password: String,
    pub roles: Vec<String>,
}

/// User response (without password)
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub roles: Roles,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            name: user.name,
            roles: user.roles,
            created_at: user.created_at.to_rfc3339(),
            updated_at: user.updated_at.to_rfc3339(),
        }
    }
}
