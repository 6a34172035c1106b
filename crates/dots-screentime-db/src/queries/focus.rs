use crate::connection::Database;
use crate::error::{DbError, Result};
use crate::models::DbFocusSession;
use chrono::{DateTime, Utc};
use dots_screentime_common::FocusSession;

pub struct FocusQueries;

impl FocusQueries {
    pub async fn create(db: &Database, session: &FocusSession) -> Result<DbFocusSession> {
        let pool = db.pool()?;
        let id = session.id.to_string();

        sqlx::query(
            r#"
            INSERT INTO focus_sessions
                (id, start_time, end_time, mode, list_type, app_ids, duration_minutes, label)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(session.mode.as_str())
        .bind(session.list_type.as_str())
        .bind(serde_json::to_string(&session.app_ids)?)
        .bind(session.duration_minutes)
        .bind(&session.label)
        .execute(pool)
        .await?;

        Self::get_by_id(db, &id).await
    }

    pub async fn get_by_id(db: &Database, id: &str) -> Result<DbFocusSession> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbFocusSession>("SELECT * FROM focus_sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("Focus session {} not found", id)))
    }

    /// Sessions that were started but never closed, newest first.
    pub async fn list_unclosed(db: &Database) -> Result<Vec<DbFocusSession>> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbFocusSession>(
            "SELECT * FROM focus_sessions WHERE closed = 0 ORDER BY start_time DESC",
        )
        .fetch_all(pool)
        .await
        .map_err(DbError::Sqlx)
    }

    /// Mark a session closed, recording when it actually ended.
    pub async fn close(
        db: &Database,
        id: &str,
        end_time: DateTime<Utc>,
        completed: bool,
    ) -> Result<()> {
        let pool = db.pool()?;

        let result = sqlx::query(
            "UPDATE focus_sessions SET end_time = ?, completed = ?, closed = 1 WHERE id = ?",
        )
        .bind(end_time)
        .bind(completed)
        .bind(id)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            Err(DbError::NotFound(format!("Focus session {} not found", id)))
        } else {
            Ok(())
        }
    }

    pub async fn list_started_between(
        db: &Database,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<DbFocusSession>> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbFocusSession>(
            "SELECT * FROM focus_sessions WHERE start_time >= ? AND start_time < ? ORDER BY start_time",
        )
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await
        .map_err(DbError::Sqlx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_test_db;
    use chrono::{Duration, SubsecRound};
    use dots_screentime_common::{FocusListType, FocusMode};
    use uuid::Uuid;

    fn focus_session(start: DateTime<Utc>, minutes: i64) -> FocusSession {
        FocusSession {
            id: Uuid::new_v4(),
            start_time: start,
            end_time: Some(start + Duration::minutes(minutes)),
            mode: FocusMode::Pomodoro,
            list_type: FocusListType::Whitelist,
            app_ids: vec![Uuid::new_v4()],
            duration_minutes: Some(minutes),
            label: Some("Reading".to_string()),
            completed: false,
        }
    }

    #[tokio::test]
    async fn test_create_and_close_focus_session() {
        let (db, _dir) = setup_test_db().await;
        let now = Utc::now().trunc_subsecs(0);
        let session = focus_session(now, 25);

        let stored = FocusQueries::create(&db, &session).await.unwrap();
        assert!(!stored.closed);
        assert_eq!(FocusSession::try_from(stored).unwrap(), session);

        let unclosed = FocusQueries::list_unclosed(&db).await.unwrap();
        assert_eq!(unclosed.len(), 1);

        let id = session.id.to_string();
        FocusQueries::close(&db, &id, now + Duration::minutes(10), false).await.unwrap();

        let closed = FocusQueries::get_by_id(&db, &id).await.unwrap();
        assert!(closed.closed);
        assert!(!closed.completed);
        assert_eq!(closed.end_time, Some(now + Duration::minutes(10)));
        assert!(FocusQueries::list_unclosed(&db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_started_between() {
        let (db, _dir) = setup_test_db().await;
        let now = Utc::now().trunc_subsecs(0);

        FocusQueries::create(&db, &focus_session(now - Duration::days(2), 25)).await.unwrap();
        FocusQueries::create(&db, &focus_session(now - Duration::hours(1), 50)).await.unwrap();

        let recent =
            FocusQueries::list_started_between(&db, now - Duration::days(1), now).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].duration_minutes, Some(50));
    }
}
