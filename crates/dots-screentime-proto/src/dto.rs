// Request and response bodies carried in `payloadJson` / `dataJson`

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use dots_screentime_common::{ActionOnLimit, AppIdentity, FocusListType, FocusMode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use dots_screentime_common::Notification;

/// Upper bound on `GetRecentSessions.maxCount`.
pub const MAX_RECENT_SESSIONS: u32 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinRequest {
    pub pin: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPinRequest {
    #[serde(default)]
    pub old_pin: String,
    pub new_pin: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageByDateRequest {
    pub date_local: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySummaryRequest {
    /// Defaults to the Sunday starting the current week
    #[serde(default)]
    pub week_start_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDetailsRequest {
    pub app_id: Uuid,
}

fn default_max_count() -> u32 {
    20
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentSessionsRequest {
    #[serde(default)]
    pub app_id: Option<Uuid>,
    #[serde(default = "default_max_count")]
    pub max_count: u32,
}

impl Default for RecentSessionsRequest {
    fn default() -> Self {
        Self { app_id: None, max_count: default_max_count() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartFocusRequest {
    pub duration_minutes: i64,
    #[serde(default)]
    pub whitelist_app_ids: Vec<Uuid>,
    #[serde(default)]
    pub list_type: FocusListType,
    #[serde(default)]
    pub mode: FocusMode,
    #[serde(default)]
    pub label: Option<String>,
}

fn default_extra_minutes() -> i64 {
    5
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddExtraTimeRequest {
    pub app_id: Uuid,
    #[serde(default = "default_extra_minutes")]
    pub extra_minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(format!("unsupported export format '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    #[serde(default)]
    pub format: ExportFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PingResponse {
    pub running: bool,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppUsageDto {
    pub app_id: Uuid,
    pub process_name: String,
    pub display_name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_base64: Option<String>,
    pub total_seconds: i64,
}

/// Answer to `GetTodaySummary` and `GetUsageByDate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummaryResponse {
    pub date_local: NaiveDate,
    pub total_seconds: i64,
    pub total_seconds_yesterday: i64,
    pub app_switches: i64,
    pub top_apps: Vec<AppUsageDto>,
    pub hourly_usage: Vec<i64>,
    pub category_usage: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySummaryResponse {
    pub week_start_date: NaiveDate,
    pub total_seconds: i64,
    pub total_seconds_last_week: i64,
    pub change_percent: f64,
    pub daily_usage: Vec<i64>,
    pub category_usage: BTreeMap<String, i64>,
    pub top_apps: Vec<AppUsageDto>,
    pub focus_sessions_completed: i64,
    pub focus_total_seconds: i64,
}

/// A rule as listed for editing. Apps without a rule appear with no limit
/// and `enabled = false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitRuleDto {
    pub app_id: Uuid,
    #[serde(default)]
    pub process_name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub daily_limit_minutes: Option<i64>,
    /// `HH:MM` local time
    #[serde(default)]
    pub curfew_start: Option<String>,
    #[serde(default)]
    pub curfew_end: Option<String>,
    #[serde(default)]
    pub action_on_limit: ActionOnLimit,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDto {
    pub session_id: Uuid,
    pub app_id: Uuid,
    pub process_name: String,
    pub display_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_seconds: i64,
    pub window_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleUsageDto {
    pub title: String,
    pub total_seconds: i64,
    pub session_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppDetailsResponse {
    pub app: AppIdentity,
    pub today_seconds: i64,
    pub seven_day_average_seconds: i64,
    pub week_total_seconds: i64,
    pub limit_rule: Option<LimitRuleDto>,
    pub recent_sessions: Vec<SessionDto>,
    pub top_titles: Vec<TitleUsageDto>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusStatusResponse {
    pub is_active: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub remaining_seconds: i64,
    pub mode: Option<FocusMode>,
    pub list_type: Option<FocusListType>,
    pub label: Option<String>,
    pub whitelist_app_ids: Vec<Uuid>,
}

impl FocusStatusResponse {
    pub fn inactive() -> Self {
        Self {
            is_active: false,
            start_time: None,
            end_time: None,
            remaining_seconds: 0,
            mode: None,
            list_type: None,
            label: None,
            whitelist_app_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub path: String,
}
