use crate::connection::Database;
use crate::error::{DbError, Result};
use crate::models::{DbSessionDetail, DbTitleUsage, DbUsageSession};
use chrono::{DateTime, NaiveDate, Utc};
use dots_screentime_common::UsageSession;
use tracing::debug;

const DETAIL_COLUMNS: &str = r#"
    s.id, s.app_id, a.process_name, a.display_name, a.category,
    s.window_title, s.site_domain, s.start_time, s.end_time, s.duration_seconds
"#;

pub struct SessionQueries;

impl SessionQueries {
    /// Persist a closed session and add its duration to the daily aggregate.
    ///
    /// Both writes share one transaction. Recording the same session id a
    /// second time is a no-op, so a retried write never double counts.
    pub async fn record_closed(
        db: &Database,
        session: &UsageSession,
        date_local: NaiveDate,
    ) -> Result<bool> {
        let pool = db.pool()?;
        let mut transaction = pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT OR IGNORE INTO usage_sessions
                (id, app_id, window_title, site_domain, start_time, end_time, duration_seconds)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(session.id.to_string())
        .bind(session.app_id.to_string())
        .bind(&session.window_title)
        .bind(&session.site_domain)
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(session.duration_seconds)
        .execute(&mut *transaction)
        .await?
        .rows_affected()
            == 1;

        if inserted {
            sqlx::query(
                r#"
                INSERT INTO daily_aggregates (date_local, app_id, total_seconds)
                VALUES (?, ?, ?)
                ON CONFLICT(date_local, app_id)
                DO UPDATE SET total_seconds = total_seconds + excluded.total_seconds
                "#,
            )
            .bind(date_local)
            .bind(session.app_id.to_string())
            .bind(session.duration_seconds)
            .execute(&mut *transaction)
            .await?;
        } else {
            debug!("Session {} already recorded, skipping aggregate update", session.id);
        }

        transaction.commit().await?;
        Ok(inserted)
    }

    pub async fn get_by_id(db: &Database, id: &str) -> Result<DbUsageSession> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbUsageSession>("SELECT * FROM usage_sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("Session {} not found", id)))
    }

    /// Sessions with any overlap with `[start, end)`.
    pub async fn list_overlapping(
        db: &Database,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DbSessionDetail>> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbSessionDetail>(&format!(
            r#"
            SELECT {DETAIL_COLUMNS}
            FROM usage_sessions s JOIN apps a ON a.id = s.app_id
            WHERE s.start_time < ? AND s.end_time > ?
            ORDER BY s.start_time
            "#
        ))
        .bind(end)
        .bind(start)
        .fetch_all(pool)
        .await
        .map_err(DbError::Sqlx)
    }

    /// Newest sessions first, optionally for one app.
    pub async fn list_recent(
        db: &Database,
        app_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<DbSessionDetail>> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbSessionDetail>(&format!(
            r#"
            SELECT {DETAIL_COLUMNS}
            FROM usage_sessions s JOIN apps a ON a.id = s.app_id
            WHERE (?1 IS NULL OR s.app_id = ?1)
            ORDER BY s.start_time DESC
            LIMIT ?2
            "#
        ))
        .bind(app_id)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(DbError::Sqlx)
    }

    pub async fn list_all(db: &Database) -> Result<Vec<DbSessionDetail>> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbSessionDetail>(&format!(
            r#"
            SELECT {DETAIL_COLUMNS}
            FROM usage_sessions s JOIN apps a ON a.id = s.app_id
            ORDER BY s.start_time
            "#
        ))
        .fetch_all(pool)
        .await
        .map_err(DbError::Sqlx)
    }

    pub async fn count_started_between(
        db: &Database,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64> {
        let pool = db.pool()?;

        sqlx::query_scalar(
            "SELECT COUNT(*) FROM usage_sessions WHERE start_time >= ? AND start_time < ?",
        )
        .bind(start)
        .bind(end)
        .fetch_one(pool)
        .await
        .map_err(DbError::Sqlx)
    }

    /// Window titles with the most time for an app since `since`.
    pub async fn top_titles(
        db: &Database,
        app_id: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<DbTitleUsage>> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbTitleUsage>(
            r#"
            SELECT window_title, SUM(duration_seconds) AS total_seconds, COUNT(*) AS session_count
            FROM usage_sessions
            WHERE app_id = ? AND start_time >= ? AND window_title != ''
            GROUP BY window_title
            ORDER BY total_seconds DESC
            LIMIT ?
            "#,
        )
        .bind(app_id)
        .bind(since)
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(DbError::Sqlx)
    }

    /// Delete usage history: sessions, aggregates, intercepts and finished
    /// focus sessions. Apps, rules and settings survive.
    pub async fn clear_history(db: &Database) -> Result<()> {
        let pool = db.pool()?;
        let mut transaction = pool.begin().await?;

        for statement in [
            "DELETE FROM usage_sessions",
            "DELETE FROM daily_aggregates",
            "DELETE FROM intercept_events",
            "DELETE FROM focus_sessions WHERE closed = 1",
        ] {
            sqlx::query(statement).execute(&mut *transaction).await?;
        }

        transaction.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewApp;
    use crate::queries::test_support::setup_test_db;
    use crate::queries::{AggregateQueries, AppQueries};
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    async fn create_app(db: &Database, name: &str) -> Uuid {
        let app = AppQueries::create(db, NewApp::new(name, name)).await.unwrap();
        Uuid::parse_str(&app.id).unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, hour, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn test_record_closed_updates_aggregate() {
        let (db, _dir) = setup_test_db().await;
        let app_id = create_app(&db, "firefox").await;

        let first = UsageSession::closed(app_id, "Docs", at(9, 0), at(9, 30));
        let second = UsageSession::closed(app_id, "Mail", at(10, 0), at(10, 10));

        assert!(SessionQueries::record_closed(&db, &first, date()).await.unwrap());
        assert!(SessionQueries::record_closed(&db, &second, date()).await.unwrap());

        let total = AggregateQueries::total_for_date(&db, date()).await.unwrap();
        assert_eq!(total, 40 * 60);

        let stored = SessionQueries::get_by_id(&db, &first.id.to_string()).await.unwrap();
        assert_eq!(stored.duration_seconds, 30 * 60);
        assert_eq!(stored.window_title, "Docs");
    }

    #[tokio::test]
    async fn test_recording_twice_does_not_double_count() {
        let (db, _dir) = setup_test_db().await;
        let app_id = create_app(&db, "code").await;

        let session = UsageSession::closed(app_id, "main.rs", at(9, 0), at(9, 15));
        assert!(SessionQueries::record_closed(&db, &session, date()).await.unwrap());
        assert!(!SessionQueries::record_closed(&db, &session, date()).await.unwrap());

        assert_eq!(AggregateQueries::total_for_date(&db, date()).await.unwrap(), 15 * 60);
    }

    #[tokio::test]
    async fn test_list_overlapping_and_recent() {
        let (db, _dir) = setup_test_db().await;
        let firefox = create_app(&db, "firefox").await;
        let code = create_app(&db, "code").await;

        for (app, start, end) in
            [(firefox, at(8, 0), at(8, 30)), (code, at(9, 0), at(10, 0)), (firefox, at(11, 0), at(11, 5))]
        {
            let session = UsageSession::closed(app, "", start, end);
            SessionQueries::record_closed(&db, &session, date()).await.unwrap();
        }

        let overlapping = SessionQueries::list_overlapping(&db, at(8, 15), at(9, 30)).await.unwrap();
        assert_eq!(overlapping.len(), 2);

        let recent = SessionQueries::list_recent(&db, None, 10).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].start_time, at(11, 0));

        let firefox_only =
            SessionQueries::list_recent(&db, Some(&firefox.to_string()), 10).await.unwrap();
        assert_eq!(firefox_only.len(), 2);
        assert!(firefox_only.iter().all(|s| s.process_name == "firefox"));

        let started = SessionQueries::count_started_between(&db, at(0, 0), at(9, 0) + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(started, 2);
    }

    #[tokio::test]
    async fn test_top_titles_ranked_by_time() {
        let (db, _dir) = setup_test_db().await;
        let app_id = create_app(&db, "code").await;

        for (title, start, end) in [
            ("lib.rs", at(9, 0), at(9, 10)),
            ("main.rs", at(9, 10), at(9, 40)),
            ("lib.rs", at(10, 0), at(10, 5)),
            ("", at(11, 0), at(11, 30)),
        ] {
            let session = UsageSession::closed(app_id, title, start, end);
            SessionQueries::record_closed(&db, &session, date()).await.unwrap();
        }

        let titles = SessionQueries::top_titles(&db, &app_id.to_string(), at(0, 0), 5).await.unwrap();
        assert_eq!(titles.len(), 2);
        assert_eq!(titles[0].window_title, "main.rs");
        assert_eq!(titles[0].total_seconds, 30 * 60);
        assert_eq!(titles[1].total_seconds, 15 * 60);
        assert_eq!(titles[1].session_count, 2);
    }

    #[tokio::test]
    async fn test_clear_history_keeps_apps() {
        let (db, _dir) = setup_test_db().await;
        let app_id = create_app(&db, "steam").await;

        let session = UsageSession::closed(app_id, "", at(9, 0), at(9, 30));
        SessionQueries::record_closed(&db, &session, date()).await.unwrap();

        SessionQueries::clear_history(&db).await.unwrap();

        assert!(SessionQueries::list_all(&db).await.unwrap().is_empty());
        assert_eq!(AggregateQueries::total_for_date(&db, date()).await.unwrap(), 0);
        assert_eq!(AppQueries::list_all(&db).await.unwrap().len(), 1);
    }
}
