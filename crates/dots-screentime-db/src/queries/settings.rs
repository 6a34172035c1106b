use crate::connection::Database;
use crate::error::{DbError, Result};

pub struct SettingsQueries;

impl SettingsQueries {
    pub async fn get(db: &Database, key: &str) -> Result<Option<String>> {
        let pool = db.pool()?;

        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await
            .map_err(DbError::Sqlx)
    }

    pub async fn set(db: &Database, key: &str, value: &str) -> Result<()> {
        let pool = db.pool()?;

        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Remove a setting. Returns whether it existed.
    pub async fn delete(db: &Database, key: &str) -> Result<bool> {
        let pool = db.pool()?;

        let result = sqlx::query("DELETE FROM settings WHERE key = ?").bind(key).execute(pool).await?;

        Ok(result.rows_affected() > 0)
    }
}
