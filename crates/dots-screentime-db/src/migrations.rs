use crate::connection::Database;
use crate::error::Result;
use sqlx::migrate::Migrator;
use tracing::info;

static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

impl Database {
    pub async fn run_migrations(&self) -> Result<()> {
        let pool = self.pool()?;

        info!("Running database migrations");
        MIGRATOR.run(pool).await?;
        info!("Database migrations completed successfully");

        Ok(())
    }

    pub async fn schema_version(&self) -> Result<i64> {
        let pool = self.pool()?;

        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM _sqlx_migrations").fetch_one(pool).await?;

        Ok(version.unwrap_or(0))
    }
}
