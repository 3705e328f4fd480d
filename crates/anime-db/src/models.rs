//! Database models

use crate::utils::parse_datetime_or_now;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Error type for parsing models from strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    InvalidRole(String),
    InvalidSortField(String),
    InvalidSortDirection(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidRole(s) => write!(f, "Invalid role: {}", s),
            ParseError::InvalidSortField(s) => write!(f, "Invalid sort field: {}", s),
            ParseError::InvalidSortDirection(s) => write!(f, "Invalid sort direction: {}", s),
        }
    }
}

impl std::error::Error for ParseError {}

/// Prefix accepted (and dropped) on role labels, e.g. `ROLE_ADMIN`
const ROLE_PREFIX: &str = "ROLE_";

/// Well-known role labels
pub const ROLE_ADMIN: &str = "ADMIN";
pub const ROLE_USER: &str = "USER";

/// Normalize a role label: trimmed, upper case, `ROLE_` prefix removed.
pub fn normalize_role(label: &str) -> Result<String, ParseError> {
    let upper = label.trim().to_ascii_uppercase();
    let name = upper.strip_prefix(ROLE_PREFIX).unwrap_or(&upper);

    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(ParseError::InvalidRole(label.to_string()));
    }

    Ok(name.to_string())
}

/// Set of role labels held by a user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Roles(BTreeSet<String>);

impl Roles {
    /// Build from labels, normalizing each one
    pub fn from_labels<I, S>(labels: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        labels
            .into_iter()
            .map(|l| normalize_role(l.as_ref()))
            .collect::<Result<BTreeSet<_>, _>>()
            .map(Roles)
    }

    pub fn contains(&self, role: &str) -> bool {
        normalize_role(role).is_ok_and(|r| self.0.contains(&r))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Comma separated form used for the `roles` column
    pub fn as_db_string(&self) -> String {
        self.iter().collect::<Vec<_>>().join(",")
    }
}

impl FromStr for Roles {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Roles::from_labels(s.split(',').map(str::trim).filter(|l| !l.is_empty()))
    }
}

impl TryFrom<Vec<String>> for Roles {
    type Error = ParseError;

    fn try_from(labels: Vec<String>) -> Result<Self, Self::Error> {
        Roles::from_labels(labels)
    }
}

impl From<Roles> for Vec<String> {
    fn from(roles: Roles) -> Self {
        roles.0.into_iter().collect()
    }
}

impl fmt::Display for Roles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_db_string())
    }
}

/// User model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Display name
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub roles: Roles,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New user (for upsert)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub name: String,
    pub password_hash: String,
    pub roles: Roles,
}

/// Anime record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Anime {
    pub id: i64,
    pub name: String,
}

/// Column used to order anime listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    Id,
    Name,
}

impl SortField {
    pub fn as_column(&self) -> &'static str {
        match self {
            SortField::Id => "id",
            SortField::Name => "name",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Ordering for paged anime listings, parsed from `field[,direction]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnimeSort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl FromStr for AnimeSort {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(2, ',').map(str::trim);

        let field = match parts.next().unwrap_or_default().to_lowercase().as_str() {
            "" | "id" => SortField::Id,
            "name" => SortField::Name,
            other => return Err(ParseError::InvalidSortField(other.to_string())),
        };

        let direction = match parts.next().map(str::to_lowercase).as_deref() {
            None | Some("") | Some("asc") => SortDirection::Asc,
            Some("desc") => SortDirection::Desc,
            Some(other) => return Err(ParseError::InvalidSortDirection(other.to_string())),
        };

        Ok(AnimeSort { field, direction })
    }
}

// ==================== Row Conversions ====================

impl TryFrom<&sqlx::sqlite::SqliteRow> for User {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        let roles_str: String = row.try_get("roles")?;
        let roles = Roles::from_str(&roles_str).map_err(|e| sqlx::Error::ColumnDecode {
            index: "roles".to_string(),
            source: Box::new(e),
        })?;

        Ok(User {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            name: row.try_get("name")?,
            password_hash: row.try_get("password_hash")?,
            roles,
            created_at: parse_datetime_or_now(&row.try_get::<String, _>("created_at")?),
            updated_at: parse_datetime_or_now(&row.try_get::<String, _>("updated_at")?),
        })
    }
}

impl TryFrom<&sqlx::sqlite::SqliteRow> for Anime {
    type Error = sqlx::Error;

    fn try_from(row: &sqlx::sqlite::SqliteRow) -> Result<Self, Self::Error> {
        Ok(Anime {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_role() {
        assert_eq!(normalize_role("ADMIN").unwrap(), "ADMIN");
        assert_eq!(normalize_role("ROLE_ADMIN").unwrap(), "ADMIN");
        assert_eq!(normalize_role(" user ").unwrap(), "USER");
        assert_eq!(normalize_role("role_user").unwrap(), "USER");
        assert!(normalize_role("").is_err());
        assert!(normalize_role("ROLE_").is_err());
        assert!(normalize_role("has space").is_err());
    }

    #[test]
    fn test_roles_from_str() {
        let roles: Roles = "ROLE_ADMIN, user".parse().unwrap();
        assert!(roles.contains("ADMIN"));
        assert!(roles.contains("ROLE_USER"));
        assert!(!roles.contains("GUEST"));
        assert_eq!(roles.as_db_string(), "ADMIN,USER");

        let empty: Roles = "".parse().unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_roles_serde() {
        let roles: Roles = serde_json::from_str(r#"["role_user","ADMIN","USER"]"#).unwrap();
        assert_eq!(roles.iter().collect::<Vec<_>>(), vec!["ADMIN", "USER"]);
        assert_eq!(serde_json::to_string(&roles).unwrap(), r#"["ADMIN","USER"]"#);

        assert!(serde_json::from_str::<Roles>(r#"["bad role"]"#).is_err());
    }

    #[test]
    fn test_anime_sort_parse() {
        assert_eq!(AnimeSort::from_str("").unwrap(), AnimeSort::default());

        let sort = AnimeSort::from_str("name,desc").unwrap();
        assert_eq!(sort.field, SortField::Name);
        assert_eq!(sort.direction, SortDirection::Desc);

        let sort = AnimeSort::from_str("NAME").unwrap();
        assert_eq!(sort.field, SortField::Name);
        assert_eq!(sort.direction, SortDirection::Asc);

        assert!(AnimeSort::from_str("password").is_err());
        assert!(AnimeSort::from_str("id,sideways").is_err());
    }

    #[test]
    fn test_user_hash_not_serialized() {
        let user = User {
            id: 1,
            username: "devdojo".to_string(),
            name: "DevDojo".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            roles: "USER".parse().unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("argon2id"));
    }
}
