use std::sync::Arc;

use chrono::Utc;
use dots_screentime_common::{LimitReason, Notification};
use dots_screentime_db::queries::InterceptQueries;
use dots_screentime_db::{Database, NewInterceptEvent};
use dots_screentime_probe::{OsProbe, ProbeError};
use dots_screentime_proto::DomainEvent;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::events::EventBus;
use crate::focus::FocusBlock;
use crate::limits::Verdict;
use crate::notifications::NotificationQueue;

/// The app an enforcement action is about.
#[derive(Debug, Clone)]
pub struct Target<'a> {
    pub app_id: Uuid,
    pub process_name: &'a str,
    pub display_name: &'a str,
}

/// Turns limit and focus decisions into notifications, events, intercept
/// log entries and process terminations.
pub struct EnforcementEngine {
    probe: Arc<dyn OsProbe>,
    notifications: NotificationQueue,
    events: EventBus,
    db: Database,
    dry_run: bool,
}

impl EnforcementEngine {
    pub fn new(
        probe: Arc<dyn OsProbe>,
        notifications: NotificationQueue,
        events: EventBus,
        db: Database,
        dry_run: bool,
    ) -> Self {
        info!("Initializing enforcement engine (dry_run: {})", dry_run);
        Self { probe, notifications, events, db, dry_run }
    }

    pub async fn apply_limit(&self, target: &Target<'_>, verdict: &Verdict) {
        if verdict.notify {
            let (title, message) = match verdict.reason {
                LimitReason::DailyLimit => (
                    "Time limit reached".to_string(),
                    format!("You have reached today's limit for {}.", target.display_name),
                ),
                LimitReason::Curfew => (
                    "Curfew".to_string(),
                    format!("{} is not allowed at this time.", target.display_name),
                ),
            };
            self.notifications.push(Notification::warning(title, message));
            self.events.publish(DomainEvent::LimitReached {
                app_id: target.app_id,
                process_name: target.process_name.to_string(),
                reason: verdict.reason,
                action: verdict.action,
                timestamp: Utc::now(),
            });
            self.log_intercept(
                target.app_id,
                verdict.reason.as_str(),
                Some(format!("{} ({})", target.process_name, verdict.action)),
            )
            .await;
            info!(
                "Limit reached for {}: {} ({})",
                target.process_name, verdict.reason, verdict.action
            );
        }

        for pid in &verdict.terminate {
            self.terminate(target, *pid, verdict.reason.as_str()).await;
        }
    }

    /// Report an app running against the active focus session and close
    /// the given processes.
    pub async fn block_for_focus(&self, target: &Target<'_>, block: &FocusBlock) {
        if block.first_time {
            self.notifications.push(Notification::warning(
                "Blocked by focus mode",
                format!("{} is not allowed during this focus session.", target.display_name),
            ));
            self.log_intercept(target.app_id, "focus_block", Some(target.process_name.to_string()))
                .await;
            info!("Focus mode blocked {}", target.process_name);
        }

        for pid in &block.terminate {
            self.terminate(target, *pid, "focus_block").await;
        }
    }

    async fn terminate(&self, target: &Target<'_>, pid: u32, reason: &str) {
        info!("Attempting to terminate process {} ({}, reason: {})", pid, target.process_name, reason);

        if self.dry_run {
            warn!("DRY RUN: Would terminate process {} ({})", pid, target.process_name);
            return;
        }

        match self.probe.terminate(pid).await {
            Ok(()) => {
                info!("Terminated process {} ({})", pid, target.process_name);
                self.log_intercept(
                    target.app_id,
                    "terminated",
                    Some(format!("{} pid {} ({})", target.process_name, pid, reason)),
                )
                .await;
            }
            Err(ProbeError::ProcessNotFound(_)) => {
                debug!("Process {} already exited", pid);
            }
            Err(e) => {
                error!("Failed to terminate process {} ({}): {}", pid, target.process_name, e);
                self.notifications.push(Notification::error(
                    "Could not close app",
                    format!("{} could not be closed: {}", target.display_name, e),
                ));
                self.events.publish(DomainEvent::EnforcementFailed {
                    app_id: target.app_id,
                    process_name: target.process_name.to_string(),
                    pid,
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
                self.log_intercept(
                    target.app_id,
                    "termination_failed",
                    Some(format!("{} pid {}: {}", target.process_name, pid, e)),
                )
                .await;
            }
        }
    }

    async fn log_intercept(&self, app_id: Uuid, reason: &str, detail: Option<String>) {
        let event = NewInterceptEvent::new(Some(app_id), reason, detail);
        if let Err(e) = InterceptQueries::create(&self.db, event).await {
            warn!("Failed to record intercept event: {}", e);
        }
    }
}
