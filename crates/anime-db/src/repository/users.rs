//! User operations

use chrono::Utc;
use sqlx::Row;

use crate::error::DbError;
use crate::models::{NewUser, User};
use crate::repository::Database;
use crate::utils::parse_datetime_or_now;

impl Database {
    // ==================== User Operations ====================

    /// Insert or update a user, keyed by username
    ///
    /// An existing row keeps its id and `created_at`.
    pub async fn save_user(&self, user: NewUser) -> Result<User, DbError> {
        let now = Utc::now();

        let row = sqlx::query(
            r#"
            INSERT INTO users (username, name, password_hash, roles, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(username) DO UPDATE SET
                name = excluded.name,
                password_hash = excluded.password_hash,
                roles = excluded.roles,
                updated_at = excluded.updated_at
            RETURNING id, created_at
            "#,
        )
        .bind(&user.username)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.roles.as_db_string())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = row.get("id");
        let created_at: String = row.get("created_at");

        Ok(User {
            id,
            username: user.username,
            name: user.name,
            password_hash: user.password_hash,
            roles: user.roles,
            created_at: parse_datetime_or_now(&created_at),
            updated_at: now,
        })
    }

    /// Get a user by username
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let result = sqlx::query(
            r#"
            SELECT id, username, name, password_hash, roles, created_at, updated_at
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        result.map(|row| User::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// List all users
    pub async fn list_users(&self) -> Result<Vec<User>, DbError> {
        let rows = sqlx::query(
            r#"
            SELECT id, username, name, password_hash, roles, created_at, updated_at
            FROM users
            ORDER BY username
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| User::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// Check if any users exist
    pub async fn has_users(&self) -> Result<bool, DbError> {
        let result = sqlx::query("SELECT COUNT(*) as count FROM users")
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = result.get("count");
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::models::{NewUser, Roles};
    use crate::repository::Database;

    fn new_user(username: &str, roles: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            name: username.to_uppercase(),
            password_hash: format!("hash-of-{}", username),
            roles: roles.parse::<Roles>().unwrap(),
        }
    }

    #[tokio::test]
    async fn test_save_and_find_user() {
        let db = Database::in_memory().await.unwrap();
        assert!(!db.has_users().await.unwrap());

        let saved = db.save_user(new_user("devdojo", "ROLE_USER")).await.unwrap();
        assert!(saved.id > 0);

        let found = db.get_user_by_username("devdojo").await.unwrap().unwrap();
        assert_eq!(found.id, saved.id);
        assert_eq!(found.name, "DEVDOJO");
        assert_eq!(found.password_hash, "hash-of-devdojo");
        assert!(found.roles.contains("USER"));
        assert!(db.has_users().await.unwrap());

        assert!(db.get_user_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_user_is_upsert() {
        let db = Database::in_memory().await.unwrap();

        let first = db.save_user(new_user("nicholas", "USER")).await.unwrap();

        let mut update = new_user("nicholas", "ADMIN,USER");
        update.password_hash = "rotated".to_string();
        let second = db.save_user(update).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at.timestamp(), second.created_at.timestamp());

        let users = db.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].password_hash, "rotated");
        assert!(users[0].roles.contains("ADMIN"));
        assert!(users[0].roles.contains("USER"));
    }

    #[tokio::test]
    async fn test_list_users_ordered_by_username() {
        let db = Database::in_memory().await.unwrap();
        db.save_user(new_user("zed", "USER")).await.unwrap();
        db.save_user(new_user("amy", "USER")).await.unwrap();

        let names: Vec<_> = db
            .list_users()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["amy", "zed"]);
    }
}
