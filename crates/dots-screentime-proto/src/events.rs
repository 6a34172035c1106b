use chrono::{DateTime, Utc};
use dots_screentime_common::{ActionOnLimit, LimitReason};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Engine events pushed to any interested consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// The set of tracked apps changed this tick
    AppsUpdated { open_sessions: usize, timestamp: DateTime<Utc> },
    SessionClosed {
        app_id: Uuid,
        process_name: String,
        duration_seconds: i64,
        timestamp: DateTime<Utc>,
    },
    LimitReached {
        app_id: Uuid,
        process_name: String,
        reason: LimitReason,
        action: ActionOnLimit,
        timestamp: DateTime<Utc>,
    },
    FocusStarted { session_id: Uuid, end_time: DateTime<Utc>, timestamp: DateTime<Utc> },
    FocusEnded { session_id: Uuid, completed: bool, timestamp: DateTime<Utc> },
    BreakReminder { session_id: Uuid, break_minutes: i64, timestamp: DateTime<Utc> },
    EnforcementFailed {
        app_id: Uuid,
        process_name: String,
        pid: u32,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            DomainEvent::AppsUpdated { timestamp, .. }
            | DomainEvent::SessionClosed { timestamp, .. }
            | DomainEvent::LimitReached { timestamp, .. }
            | DomainEvent::FocusStarted { timestamp, .. }
            | DomainEvent::FocusEnded { timestamp, .. }
            | DomainEvent::BreakReminder { timestamp, .. }
            | DomainEvent::EnforcementFailed { timestamp, .. } => *timestamp,
        }
    }
}
