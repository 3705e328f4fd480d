//! Anime operations

use sqlx::Row;

use crate::error::DbError;
use crate::models::{Anime, AnimeSort};
use crate::repository::Database;

impl Database {
    // ==================== Anime Operations ====================

    /// Insert a new anime
    pub async fn insert_anime(&self, name: &str) -> Result<Anime, DbError> {
        let row = sqlx::query("INSERT INTO animes (name) VALUES (?) RETURNING id")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;

        Ok(Anime {
            id: row.get("id"),
            name: name.to_string(),
        })
    }

    /// Get an anime by ID
    pub async fn get_anime(&self, id: i64) -> Result<Option<Anime>, DbError> {
        let result = sqlx::query("SELECT id, name FROM animes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        result.map(|row| Anime::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// List one page of animes
    pub async fn list_animes(
        &self,
        offset: i64,
        limit: i64,
        sort: AnimeSort,
    ) -> Result<Vec<Anime>, DbError> {
        // Column and direction come from closed enums, never from user text
        let sql = format!(
            "SELECT id, name FROM animes ORDER BY {} {}, id ASC LIMIT ? OFFSET ?",
            sort.field.as_column(),
            sort.direction.as_sql()
        );

        let rows = sqlx::query(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| Anime::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// Count all animes
    pub async fn count_animes(&self) -> Result<i64, DbError> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM animes")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("count"))
    }

    /// List every anime, ordered by ID
    pub async fn list_all_animes(&self) -> Result<Vec<Anime>, DbError> {
        let rows = sqlx::query("SELECT id, name FROM animes ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| Anime::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// Find animes with exactly this name
    pub async fn find_animes_by_name(&self, name: &str) -> Result<Vec<Anime>, DbError> {
        let rows = sqlx::query("SELECT id, name FROM animes WHERE name = ? ORDER BY id")
            .bind(name)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| Anime::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// Rename an anime
    pub async fn update_anime(&self, id: i64, name: &str) -> Result<bool, DbError> {
        let result = sqlx::query("UPDATE animes SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete an anime
    pub async fn delete_anime(&self, id: i64) -> Result<bool, DbError> {
        let result = sqlx::query("DELETE FROM animes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::models::AnimeSort;
    use crate::repository::Database;

    async fn seeded(names: &[&str]) -> Database {
        let db = Database::in_memory().await.unwrap();
        for name in names {
            db.insert_anime(name).await.unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = seeded(&[]).await;

        let anime = db.insert_anime("Hajime no Ippo").await.unwrap();
        assert!(anime.id > 0);

        let found = db.get_anime(anime.id).await.unwrap();
        assert_eq!(found, Some(anime));

        assert!(db.get_anime(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_paging_and_sorting() {
        let db = seeded(&["Naruto", "Berserk", "Monster", "Akira", "Trigun"]).await;
        assert_eq!(db.count_animes().await.unwrap(), 5);

        let first = db.list_animes(0, 2, AnimeSort::default()).await.unwrap();
        let names: Vec<_> = first.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Naruto", "Berserk"]);

        let last = db.list_animes(4, 2, AnimeSort::default()).await.unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].name, "Trigun");

        let by_name = db
            .list_animes(0, 10, "name,desc".parse().unwrap())
            .await
            .unwrap();
        let names: Vec<_> = by_name.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Trigun", "Naruto", "Monster", "Berserk", "Akira"]);
    }

    #[tokio::test]
    async fn test_find_by_name_is_exact() {
        let db = seeded(&["Dragon Ball", "Dragon Ball Z", "Dragon Ball"]).await;

        assert_eq!(db.find_animes_by_name("Dragon Ball").await.unwrap().len(), 2);
        assert_eq!(db.find_animes_by_name("Dragon Ball Z").await.unwrap().len(), 1);
        assert!(db.find_animes_by_name("dbz").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let db = seeded(&["Samurai Champloo"]).await;
        let id = db.list_all_animes().await.unwrap()[0].id;

        assert!(db.update_anime(id, "Samurai Champloo 2").await.unwrap());
        assert_eq!(db.get_anime(id).await.unwrap().unwrap().name, "Samurai Champloo 2");
        assert!(!db.update_anime(id + 100, "ghost").await.unwrap());

        assert!(db.delete_anime(id).await.unwrap());
        assert!(!db.delete_anime(id).await.unwrap());
        assert!(db.list_all_animes().await.unwrap().is_empty());
    }
}
