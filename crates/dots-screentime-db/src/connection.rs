use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::error::{DbError, Result};

/// Writers from the sampler and the control socket contend for the lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
}

impl DatabaseConfig {
    pub fn at(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_string_lossy().to_string() }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "screentime.db".to_string() }
    }
}

/// Shared handle to the SQLite pool. Cloning is cheap; closing any clone
/// closes the pool for all of them.
#[derive(Debug, Clone)]
pub struct Database {
    pub pool: Option<Pool<Sqlite>>,
}

impl Database {
    pub async fn new(config: DatabaseConfig) -> Result<Self> {
        ensure_parent_dir(Path::new(&config.path))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options(&config.path)?)
            .await?;
        info!("Database connection pool created: {}", config.path);

        Ok(Self { pool: Some(pool) })
    }

    pub fn pool(&self) -> Result<&Pool<Sqlite>> {
        self.pool
            .as_ref()
            .ok_or_else(|| DbError::InvalidData("Database pool not initialized".to_string()))
    }

    pub async fn close(mut self) {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
            info!("Database connection pool closed");
        }
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            std::fs::create_dir_all(parent)?;
            info!("Created database directory: {}", parent.display());
            Ok(())
        }
        _ => Ok(()),
    }
}

fn connect_options(path: &str) -> Result<SqliteConnectOptions> {
    Ok(SqliteConnectOptions::from_str(&format!("sqlite://{}", path))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT)
        .foreign_keys(true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_new_database_is_wal_with_foreign_keys() {
        let dir = tempdir().unwrap();
        let db = Database::new(DatabaseConfig::at(dir.path().join("test.db"))).await.unwrap();
        let pool = db.pool().unwrap();

        let journal: String = sqlx::query_scalar("PRAGMA journal_mode").fetch_one(pool).await.unwrap();
        assert_eq!(journal.to_lowercase(), "wal");

        let foreign_keys: i64 =
            sqlx::query_scalar("PRAGMA foreign_keys").fetch_one(pool).await.unwrap();
        assert_eq!(foreign_keys, 1);
    }

    #[tokio::test]
    async fn test_missing_directories_are_created() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("a").join("b").join("test.db");

        let db = Database::new(DatabaseConfig::at(&db_path)).await.unwrap();
        assert!(db.pool.is_some());
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_close_shuts_down_shared_pool() {
        let dir = tempdir().unwrap();
        let db = Database::new(DatabaseConfig::at(dir.path().join("test.db"))).await.unwrap();
        let handle = db.clone();
        db.close().await;

        assert!(handle.pool().unwrap().is_closed());
    }
}
