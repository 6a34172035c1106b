use crate::connection::Database;
use crate::error::{DbError, Result};
use crate::models::{DbLimitRule, DbRuleBinding};
use dots_screentime_common::time::format_time_of_day;
use dots_screentime_common::LimitRule;

pub struct RuleQueries;

impl RuleQueries {
    /// Insert or replace the single rule for `rule.app_id`.
    pub async fn upsert(db: &Database, rule: &LimitRule) -> Result<DbLimitRule> {
        let pool = db.pool()?;
        let app_id = rule.app_id.to_string();

        sqlx::query(
            r#"
            INSERT INTO limit_rules
                (app_id, daily_limit_minutes, curfew_start, curfew_end, action_on_limit, enabled, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(app_id) DO UPDATE SET
                daily_limit_minutes = excluded.daily_limit_minutes,
                curfew_start = excluded.curfew_start,
                curfew_end = excluded.curfew_end,
                action_on_limit = excluded.action_on_limit,
                enabled = excluded.enabled,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&app_id)
        .bind(rule.daily_limit_minutes)
        .bind(rule.curfew_start.map(format_time_of_day))
        .bind(rule.curfew_end.map(format_time_of_day))
        .bind(rule.action_on_limit.as_str())
        .bind(rule.enabled)
        .execute(pool)
        .await?;

        Self::get_for_app(db, &app_id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("Rule for app {} not found", app_id)))
    }

    pub async fn get_for_app(db: &Database, app_id: &str) -> Result<Option<DbLimitRule>> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbLimitRule>("SELECT * FROM limit_rules WHERE app_id = ?")
            .bind(app_id)
            .fetch_optional(pool)
            .await
            .map_err(DbError::Sqlx)
    }

    pub async fn list_all(db: &Database) -> Result<Vec<DbLimitRule>> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbLimitRule>("SELECT * FROM limit_rules ORDER BY id")
            .fetch_all(pool)
            .await
            .map_err(DbError::Sqlx)
    }

    /// Enabled rules keyed by the process name of their app.
    pub async fn list_enabled_bindings(db: &Database) -> Result<Vec<DbRuleBinding>> {
        let pool = db.pool()?;

        sqlx::query_as::<_, DbRuleBinding>(
            r#"
            SELECT r.*, a.process_name
            FROM limit_rules r JOIN apps a ON a.id = r.app_id
            WHERE r.enabled = 1
            ORDER BY r.id
            "#,
        )
        .fetch_all(pool)
        .await
        .map_err(DbError::Sqlx)
    }

    pub async fn delete_for_app(db: &Database, app_id: &str) -> Result<()> {
        let pool = db.pool()?;

        let result =
            sqlx::query("DELETE FROM limit_rules WHERE app_id = ?").bind(app_id).execute(pool).await?;

        if result.rows_affected() == 0 {
            Err(DbError::NotFound(format!("Rule for app {} not found", app_id)))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewApp;
    use crate::queries::test_support::setup_test_db;
    use crate::queries::AppQueries;
    use chrono::NaiveTime;
    use dots_screentime_common::ActionOnLimit;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_upsert_replaces_existing_rule() {
        let (db, _dir) = setup_test_db().await;
        let app = AppQueries::create(&db, NewApp::new("steam", "Steam")).await.unwrap();
        let app_id = Uuid::parse_str(&app.id).unwrap();

        let mut rule = LimitRule::new(app_id);
        rule.daily_limit_minutes = Some(60);
        RuleQueries::upsert(&db, &rule).await.unwrap();

        rule.daily_limit_minutes = Some(90);
        rule.action_on_limit = ActionOnLimit::ForceClose;
        rule.curfew_start = NaiveTime::from_hms_opt(22, 0, 0);
        rule.curfew_end = NaiveTime::from_hms_opt(7, 0, 0);
        let stored = RuleQueries::upsert(&db, &rule).await.unwrap();

        assert_eq!(stored.daily_limit_minutes, Some(90));
        assert_eq!(stored.action_on_limit, "ForceClose");
        assert_eq!(stored.curfew_start.as_deref(), Some("22:00"));
        assert_eq!(RuleQueries::list_all(&db).await.unwrap().len(), 1);

        let round_trip = LimitRule::try_from(stored).unwrap();
        assert_eq!(round_trip, rule);
    }

    #[tokio::test]
    async fn test_enabled_bindings_skip_disabled_rules() {
        let (db, _dir) = setup_test_db().await;
        let steam = AppQueries::create(&db, NewApp::new("steam", "Steam")).await.unwrap();
        let code = AppQueries::create(&db, NewApp::new("code", "VS Code")).await.unwrap();

        let mut enabled = LimitRule::new(Uuid::parse_str(&steam.id).unwrap());
        enabled.daily_limit_minutes = Some(30);
        RuleQueries::upsert(&db, &enabled).await.unwrap();

        let mut disabled = LimitRule::new(Uuid::parse_str(&code.id).unwrap());
        disabled.enabled = false;
        RuleQueries::upsert(&db, &disabled).await.unwrap();

        let bindings = RuleQueries::list_enabled_bindings(&db).await.unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].process_name, "steam");
        assert_eq!(bindings[0].rule.daily_limit_minutes, Some(30));

        RuleQueries::delete_for_app(&db, &steam.id).await.unwrap();
        assert!(RuleQueries::get_for_app(&db, &steam.id).await.unwrap().is_none());
    }
}
