use chrono::{DateTime, NaiveDate, Utc};
use dots_screentime_common::time::parse_time_of_day;
use dots_screentime_common::{AppIdentity, FocusSession, LimitRule, UsageSession};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::DbError;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbApp {
    pub id: String,
    pub process_name: String,
    pub display_name: String,
    pub category: Option<String>,
    pub file_path: Option<String>,
    pub icon_base64: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewApp {
    pub id: String,
    pub process_name: String,
    pub display_name: String,
    pub category: Option<String>,
    pub file_path: Option<String>,
    pub icon_base64: Option<String>,
}

impl NewApp {
    pub fn new(process_name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            process_name: process_name.into(),
            display_name: display_name.into(),
            category: None,
            file_path: None,
            icon_base64: None,
        }
    }
}

impl TryFrom<DbApp> for AppIdentity {
    type Error = DbError;

    fn try_from(app: DbApp) -> Result<Self, Self::Error> {
        Ok(AppIdentity {
            id: Uuid::parse_str(&app.id)?,
            process_name: app.process_name,
            display_name: app.display_name,
            category: app.category,
            file_path: app.file_path,
            icon_base64: app.icon_base64,
        })
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbUsageSession {
    pub id: String,
    pub app_id: String,
    pub window_title: String,
    pub site_domain: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: i64,
}

impl TryFrom<DbUsageSession> for UsageSession {
    type Error = DbError;

    fn try_from(session: DbUsageSession) -> Result<Self, Self::Error> {
        Ok(UsageSession {
            id: Uuid::parse_str(&session.id)?,
            app_id: Uuid::parse_str(&session.app_id)?,
            window_title: session.window_title,
            site_domain: session.site_domain,
            start_time: session.start_time,
            end_time: session.end_time,
            duration_seconds: session.duration_seconds,
        })
    }
}

/// Session row joined with the owning app.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbSessionDetail {
    pub id: String,
    pub app_id: String,
    pub process_name: String,
    pub display_name: String,
    pub category: Option<String>,
    pub window_title: String,
    pub site_domain: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbDailyAggregate {
    pub date_local: NaiveDate,
    pub app_id: String,
    pub total_seconds: i64,
}

/// Seconds per app over a date or date range, with app labels.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbAppUsage {
    pub app_id: String,
    pub process_name: String,
    pub display_name: String,
    pub category: Option<String>,
    pub total_seconds: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbTitleUsage {
    pub window_title: String,
    pub total_seconds: i64,
    pub session_count: i64,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbLimitRule {
    pub id: i64,
    pub app_id: String,
    pub daily_limit_minutes: Option<i64>,
    pub curfew_start: Option<String>,
    pub curfew_end: Option<String>,
    pub action_on_limit: String,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbLimitRule> for LimitRule {
    type Error = DbError;

    fn try_from(rule: DbLimitRule) -> Result<Self, Self::Error> {
        Ok(LimitRule {
            app_id: Uuid::parse_str(&rule.app_id)?,
            daily_limit_minutes: rule.daily_limit_minutes,
            curfew_start: rule.curfew_start.as_deref().map(parse_time_of_day).transpose()?,
            curfew_end: rule.curfew_end.as_deref().map(parse_time_of_day).transpose()?,
            action_on_limit: rule.action_on_limit.parse()?,
            enabled: rule.enabled,
        })
    }
}

/// Rule row joined with the process name it applies to.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbRuleBinding {
    pub process_name: String,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub rule: DbLimitRule,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbFocusSession {
    pub id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub mode: String,
    pub list_type: String,
    pub app_ids: String, // JSON array
    pub duration_minutes: Option<i64>,
    pub label: Option<String>,
    pub completed: bool,
    pub closed: bool,
}

impl TryFrom<DbFocusSession> for FocusSession {
    type Error = DbError;

    fn try_from(session: DbFocusSession) -> Result<Self, Self::Error> {
        Ok(FocusSession {
            id: Uuid::parse_str(&session.id)?,
            start_time: session.start_time,
            end_time: session.end_time,
            mode: session.mode.parse()?,
            list_type: session.list_type.parse()?,
            app_ids: serde_json::from_str(&session.app_ids)?,
            duration_minutes: session.duration_minutes,
            label: session.label,
            completed: session.completed,
        })
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbInterceptEvent {
    pub id: i64,
    pub time: DateTime<Utc>,
    pub app_id: Option<String>,
    pub reason: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewInterceptEvent {
    pub app_id: Option<String>,
    pub reason: String,
    pub detail: Option<String>,
}

impl NewInterceptEvent {
    pub fn new(app_id: Option<Uuid>, reason: impl Into<String>, detail: Option<String>) -> Self {
        Self { app_id: app_id.map(|id| id.to_string()), reason: reason.into(), detail }
    }
}
