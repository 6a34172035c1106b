use crate::connection::Database;
use crate::error::{DbError, Result};
use crate::models::{DbAppUsage, DbDailyAggregate};
use chrono::NaiveDate;

pub struct AggregateQueries;

impl AggregateQueries {
    pub async fn total_for_date(db: &Database, date: NaiveDate) -> Result<i64> {
        let pool = db.pool()?;

        sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_seconds), 0) FROM daily_aggregates WHERE date_local = ?",
        )
        .bind(date)
        .fetch_one(pool)
        .await
        .map_err(DbError::Sqlx)
    }

    /// Per-app totals for one date, largest first.
    pub async fn usage_for_date(db: &Database, date: NaiveDate) -> Result<Vec<DbAppUsage>> {
        Self::usage_between(db, date, date).await
    }

    /// Per-app totals summed over an inclusive date range, largest first.
    pub async fn usage_between(
        db: &Database,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<DbAppUsage>> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbAppUsage>(
            r#"
            SELECT d.app_id, a.process_name, a.display_name, a.category,
                   SUM(d.total_seconds) AS total_seconds
            FROM daily_aggregates d JOIN apps a ON a.id = d.app_id
            WHERE d.date_local >= ? AND d.date_local <= ?
            GROUP BY d.app_id
            ORDER BY total_seconds DESC
            "#,
        )
        .bind(start_date)
        .bind(end_date)
        .fetch_all(pool)
        .await
        .map_err(DbError::Sqlx)
    }

    pub async fn list_between(
        db: &Database,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<DbDailyAggregate>> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbDailyAggregate>(
            "SELECT * FROM daily_aggregates WHERE date_local >= ? AND date_local <= ? ORDER BY date_local",
        )
        .bind(start_date)
        .bind(end_date)
        .fetch_all(pool)
        .await
        .map_err(DbError::Sqlx)
    }

    pub async fn total_for_app_between(
        db: &Database,
        app_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<i64> {
        let pool = db.pool()?;

        sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(total_seconds), 0) FROM daily_aggregates
            WHERE app_id = ? AND date_local >= ? AND date_local <= ?
            "#,
        )
        .bind(app_id)
        .bind(start_date)
        .bind(end_date)
        .fetch_one(pool)
        .await
        .map_err(DbError::Sqlx)
    }

    pub async fn list_all(db: &Database) -> Result<Vec<DbDailyAggregate>> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbDailyAggregate>(
            "SELECT * FROM daily_aggregates ORDER BY date_local, app_id",
        )
        .fetch_all(pool)
        .await
        .map_err(DbError::Sqlx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewApp;
    use crate::queries::test_support::setup_test_db;
    use crate::queries::{AppQueries, SessionQueries};
    use chrono::{TimeZone, Utc};
    use dots_screentime_common::UsageSession;
    use uuid::Uuid;

    async fn record(db: &Database, app_id: Uuid, day: u32, minutes: i64) {
        let start = Utc.with_ymd_and_hms(2024, 6, day, 9, 0, 0).unwrap();
        let end = start + chrono::Duration::minutes(minutes);
        let session = UsageSession::closed(app_id, "", start, end);
        let date = NaiveDate::from_ymd_opt(2024, 6, day).unwrap();
        SessionQueries::record_closed(db, &session, date).await.unwrap();
    }

    #[tokio::test]
    async fn test_aggregate_totals_are_order_independent() {
        let (db, _dir) = setup_test_db().await;
        let app = AppQueries::create(&db, NewApp::new("code", "VS Code")).await.unwrap();
        let app_id = Uuid::parse_str(&app.id).unwrap();

        for minutes in [25, 5, 40, 10] {
            record(&db, app_id, 3, minutes).await;
        }

        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        assert_eq!(AggregateQueries::total_for_date(&db, date).await.unwrap(), 80 * 60);

        let usage = AggregateQueries::usage_for_date(&db, date).await.unwrap();
        assert_eq!(usage.len(), 1);
        assert_eq!(usage[0].display_name, "VS Code");
        assert_eq!(usage[0].total_seconds, 80 * 60);
    }

    #[tokio::test]
    async fn test_usage_between_groups_by_app() {
        let (db, _dir) = setup_test_db().await;
        let code = AppQueries::create(&db, NewApp::new("code", "VS Code")).await.unwrap();
        let steam = AppQueries::create(&db, NewApp::new("steam", "Steam")).await.unwrap();
        let code_id = Uuid::parse_str(&code.id).unwrap();
        let steam_id = Uuid::parse_str(&steam.id).unwrap();

        record(&db, code_id, 3, 30).await;
        record(&db, code_id, 4, 30).await;
        record(&db, steam_id, 4, 90).await;
        record(&db, steam_id, 9, 90).await;

        let start = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap();

        let usage = AggregateQueries::usage_between(&db, start, end).await.unwrap();
        assert_eq!(usage.len(), 2);
        assert_eq!(usage[0].process_name, "steam");
        assert_eq!(usage[0].total_seconds, 90 * 60);
        assert_eq!(usage[1].total_seconds, 60 * 60);

        let code_total =
            AggregateQueries::total_for_app_between(&db, &code.id, start, end).await.unwrap();
        assert_eq!(code_total, 60 * 60);

        assert_eq!(AggregateQueries::list_between(&db, start, end).await.unwrap().len(), 3);
        assert_eq!(AggregateQueries::list_all(&db).await.unwrap().len(), 4);
    }
}
