use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::time::{split_at_local_midnight, CurfewWindow};

/// Category bucket for apps that no rule classified.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Stable identity of an application, one per distinct process name.
///
/// Created lazily the first time a process is observed and mutated only to
/// fill in category or icon data, or when the user relabels the category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppIdentity {
    /// Unique identifier for the app
    pub id: Uuid,
    /// Lower-cased process name used for matching
    pub process_name: String,
    /// Human readable name shown to the user
    pub display_name: String,
    /// Category assigned by the classification table, if any
    pub category: Option<String>,
    /// Executable path seen when the app was first resolved
    pub file_path: Option<String>,
    /// Cached icon, base64 encoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_base64: Option<String>,
}

impl AppIdentity {
    pub fn category_or_default(&self) -> &str {
        match self.category.as_deref() {
            Some(category) if !category.is_empty() => category,
            _ => UNCATEGORIZED,
        }
    }
}

/// One contiguous interval during which a process was tracked.
///
/// Closed sessions always satisfy `end_time >= start_time` and
/// `duration_seconds == end_time - start_time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSession {
    pub id: Uuid,
    pub app_id: Uuid,
    pub window_title: String,
    pub site_domain: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: i64,
}

impl UsageSession {
    pub fn closed(
        app_id: Uuid,
        window_title: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        let end_time = end_time.max(start_time);
        Self {
            id: Uuid::new_v4(),
            app_id,
            window_title: window_title.into(),
            site_domain: None,
            start_time,
            end_time,
            duration_seconds: (end_time - start_time).num_seconds(),
        }
    }

    pub fn with_site_domain(mut self, site_domain: Option<String>) -> Self {
        self.site_domain = site_domain;
        self
    }

    /// Split the session at every local midnight it crosses.
    ///
    /// Each part inherits the app, title and domain. The first part keeps
    /// the original id. Parts are contiguous and their durations sum to the
    /// original duration.
    pub fn split_at_midnight<Tz: TimeZone>(&self, tz: &Tz) -> Vec<UsageSession> {
        split_at_local_midnight(self.start_time, self.end_time, tz)
            .into_iter()
            .enumerate()
            .map(|(index, (start, end))| UsageSession {
                id: if index == 0 { self.id } else { Uuid::new_v4() },
                app_id: self.app_id,
                window_title: self.window_title.clone(),
                site_domain: self.site_domain.clone(),
                start_time: start,
                end_time: end,
                duration_seconds: (end - start).num_seconds(),
            })
            .collect()
    }
}

/// What to do when an app goes over its limit or into its curfew.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ActionOnLimit {
    #[default]
    NotifyOnly,
    BlockNew,
    ForceClose,
}

impl ActionOnLimit {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionOnLimit::NotifyOnly => "NotifyOnly",
            ActionOnLimit::BlockNew => "BlockNew",
            ActionOnLimit::ForceClose => "ForceClose",
        }
    }

    pub fn terminates(&self) -> bool {
        !matches!(self, ActionOnLimit::NotifyOnly)
    }
}

impl fmt::Display for ActionOnLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionOnLimit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "notifyonly" | "notify" => Ok(ActionOnLimit::NotifyOnly),
            "blocknew" | "block" => Ok(ActionOnLimit::BlockNew),
            "forceclose" | "close" => Ok(ActionOnLimit::ForceClose),
            other => Err(Error::InvalidValue(format!("unknown limit action '{}'", other))),
        }
    }
}

/// Per-app usage rule. At most one exists per app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitRule {
    pub app_id: Uuid,
    pub daily_limit_minutes: Option<i64>,
    pub curfew_start: Option<NaiveTime>,
    pub curfew_end: Option<NaiveTime>,
    pub action_on_limit: ActionOnLimit,
    pub enabled: bool,
}

impl LimitRule {
    pub fn new(app_id: Uuid) -> Self {
        Self {
            app_id,
            daily_limit_minutes: None,
            curfew_start: None,
            curfew_end: None,
            action_on_limit: ActionOnLimit::default(),
            enabled: true,
        }
    }

    /// Curfew window, present only when both ends are set.
    pub fn curfew(&self) -> Option<CurfewWindow> {
        match (self.curfew_start, self.curfew_end) {
            (Some(start), Some(end)) => Some(CurfewWindow::new(start, end)),
            _ => None,
        }
    }
}

/// Why an app is over its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LimitReason {
    DailyLimit,
    Curfew,
}

impl LimitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitReason::DailyLimit => "daily_limit",
            LimitReason::Curfew => "curfew",
        }
    }
}

impl fmt::Display for LimitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FocusMode {
    #[default]
    Normal,
    Pomodoro,
    DeepWork,
}

impl FocusMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FocusMode::Normal => "Normal",
            FocusMode::Pomodoro => "Pomodoro",
            FocusMode::DeepWork => "DeepWork",
        }
    }
}

impl FromStr for FocusMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(FocusMode::Normal),
            "pomodoro" => Ok(FocusMode::Pomodoro),
            "deepwork" | "deep-work" | "deep_work" => Ok(FocusMode::DeepWork),
            other => Err(Error::InvalidValue(format!("unknown focus mode '{}'", other))),
        }
    }
}

/// Whether the focus app set lists what may run or what may not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FocusListType {
    #[default]
    Whitelist,
    Blacklist,
}

impl FocusListType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FocusListType::Whitelist => "Whitelist",
            FocusListType::Blacklist => "Blacklist",
        }
    }
}

impl FromStr for FocusListType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "whitelist" | "allow" => Ok(FocusListType::Whitelist),
            "blacklist" | "deny" => Ok(FocusListType::Blacklist),
            other => Err(Error::InvalidValue(format!("unknown focus list type '{}'", other))),
        }
    }
}

/// Persisted focus session.
///
/// While active `end_time` holds the planned deadline; once stopped it
/// holds the actual stop time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSession {
    pub id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub mode: FocusMode,
    pub list_type: FocusListType,
    pub app_ids: Vec<Uuid>,
    pub duration_minutes: Option<i64>,
    pub label: Option<String>,
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum NotificationKind {
    #[default]
    Info,
    Warning,
    Error,
}

/// User-facing message produced by the enforcement path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self { title: title.into(), message: message.into(), kind, timestamp: Utc::now() }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Info, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Warning, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotificationKind::Error, title, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn test_action_on_limit_parsing() {
        assert_eq!("NotifyOnly".parse::<ActionOnLimit>().unwrap(), ActionOnLimit::NotifyOnly);
        assert_eq!("blocknew".parse::<ActionOnLimit>().unwrap(), ActionOnLimit::BlockNew);
        assert_eq!("ForceClose".parse::<ActionOnLimit>().unwrap(), ActionOnLimit::ForceClose);
        assert!("Explode".parse::<ActionOnLimit>().is_err());

        assert!(!ActionOnLimit::NotifyOnly.terminates());
        assert!(ActionOnLimit::ForceClose.terminates());
    }

    #[test]
    fn test_category_or_default() {
        let mut app = AppIdentity {
            id: Uuid::new_v4(),
            process_name: "firefox".to_string(),
            display_name: "Firefox".to_string(),
            category: None,
            file_path: None,
            icon_base64: None,
        };
        assert_eq!(app.category_or_default(), UNCATEGORIZED);

        app.category = Some(String::new());
        assert_eq!(app.category_or_default(), UNCATEGORIZED);

        app.category = Some("Browser".to_string());
        assert_eq!(app.category_or_default(), "Browser");
    }

    #[test]
    fn test_rule_curfew_requires_both_ends() {
        let mut rule = LimitRule::new(Uuid::new_v4());
        rule.curfew_start = NaiveTime::from_hms_opt(22, 0, 0);
        assert!(rule.curfew().is_none());

        rule.curfew_end = NaiveTime::from_hms_opt(7, 0, 0);
        assert!(rule.curfew().is_some());
    }

    #[test]
    fn test_session_split_keeps_identity_and_duration() {
        let tz = FixedOffset::east_opt(3600).unwrap();
        let start = tz.with_ymd_and_hms(2024, 3, 9, 23, 55, 0).unwrap().with_timezone(&Utc);
        let end = tz.with_ymd_and_hms(2024, 3, 10, 0, 5, 0).unwrap().with_timezone(&Utc);

        let session = UsageSession::closed(Uuid::new_v4(), "Editor", start, end)
            .with_site_domain(Some("example.com".to_string()));
        let parts = session.split_at_midnight(&tz);

        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].id, session.id);
        assert_ne!(parts[1].id, session.id);
        assert_eq!(parts[0].end_time, parts[1].start_time);
        assert_eq!(parts[0].duration_seconds + parts[1].duration_seconds, 600);
        assert!(parts.iter().all(|p| p.app_id == session.app_id && p.window_title == "Editor"));
        assert!(parts.iter().all(|p| p.site_domain.as_deref() == Some("example.com")));
    }

    #[test]
    fn test_closed_session_never_negative() {
        let now = Utc::now();
        let session = UsageSession::closed(Uuid::new_v4(), "", now, now - chrono::Duration::seconds(5));
        assert_eq!(session.duration_seconds, 0);
        assert_eq!(session.start_time, session.end_time);
    }
}
