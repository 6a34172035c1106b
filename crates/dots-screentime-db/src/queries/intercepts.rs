use crate::connection::Database;
use crate::error::{DbError, Result};
use crate::models::{DbInterceptEvent, NewInterceptEvent};
use chrono::Utc;

pub struct InterceptQueries;

impl InterceptQueries {
    pub async fn create(db: &Database, event: NewInterceptEvent) -> Result<()> {
        let pool = db.pool()?;

        sqlx::query("INSERT INTO intercept_events (time, app_id, reason, detail) VALUES (?, ?, ?, ?)")
            .bind(Utc::now())
            .bind(&event.app_id)
            .bind(&event.reason)
            .bind(&event.detail)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn list_recent(db: &Database, limit: i64) -> Result<Vec<DbInterceptEvent>> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbInterceptEvent>(
            "SELECT * FROM intercept_events ORDER BY time DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(DbError::Sqlx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_test_db;

    #[tokio::test]
    async fn test_intercepts_newest_first() {
        let (db, _dir) = setup_test_db().await;

        InterceptQueries::create(&db, NewInterceptEvent::new(None, "DailyLimit", None)).await.unwrap();
        InterceptQueries::create(&db, NewInterceptEvent::new(None, "Curfew", Some("22:00-07:00".into())))
            .await
            .unwrap();

        let events = InterceptQueries::list_recent(&db, 10).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].reason, "Curfew");
        assert_eq!(events[0].detail.as_deref(), Some("22:00-07:00"));
    }
}
