use std::collections::HashSet;
use std::sync::{Arc, Weak};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, SubsecRound, Utc};
use dots_screentime_common::{FocusListType, FocusSession, Notification};
use dots_screentime_db::queries::FocusQueries;
use dots_screentime_db::Database;
use dots_screentime_proto::dto::{FocusStatusResponse, StartFocusRequest};
use dots_screentime_proto::DomainEvent;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::FocusConfig;
use crate::events::EventBus;
use crate::notifications::NotificationQueue;

#[derive(Debug, Clone)]
struct ActiveFocus {
    session: FocusSession,
    planned_end: DateTime<Utc>,
    app_ids: HashSet<Uuid>,
    blocked_notified: HashSet<Uuid>,
    closed_pids: HashSet<u32>,
}

/// What the sampler should do about an app the running session blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusBlock {
    /// First time this app was seen during the session.
    pub first_time: bool,
    /// Processes not yet asked to close. Empty unless closing is enabled.
    pub terminate: Vec<u32>,
}

#[derive(Default)]
struct FocusState {
    active: Option<ActiveFocus>,
    expiry: Option<JoinHandle<()>>,
    breaks: Option<JoinHandle<()>>,
}

impl FocusState {
    fn cancel_timers(&mut self) {
        if let Some(handle) = self.expiry.take() {
            handle.abort();
        }
        if let Some(handle) = self.breaks.take() {
            handle.abort();
        }
    }
}

struct FocusInner {
    db: Database,
    events: EventBus,
    notifications: NotificationQueue,
    config: FocusConfig,
    state: Mutex<FocusState>,
}

/// Time-boxed allow or deny list of apps.
///
/// Sessions are persisted when they start so a restart can resume them.
/// Expiry and break reminders run on their own tokio tasks and only hold
/// a weak reference to the manager.
#[derive(Clone)]
pub struct FocusManager {
    inner: Arc<FocusInner>,
}

impl FocusManager {
    pub fn new(
        db: Database,
        events: EventBus,
        notifications: NotificationQueue,
        config: FocusConfig,
    ) -> Self {
        Self {
            inner: Arc::new(FocusInner {
                db,
                events,
                notifications,
                config,
                state: Mutex::new(FocusState::default()),
            }),
        }
    }

    pub async fn start(&self, request: StartFocusRequest, now: DateTime<Utc>) -> Result<FocusSession> {
        anyhow::ensure!(request.duration_minutes > 0, "Focus duration must be positive");

        if self.stop(now).await? {
            info!("Replaced running focus session");
        }

        let now = now.trunc_subsecs(0);
        let planned_end = Duration::try_minutes(request.duration_minutes)
            .and_then(|duration| now.checked_add_signed(duration))
            .with_context(|| {
                format!("Focus duration of {} minutes is too long", request.duration_minutes)
            })?;
        let session = FocusSession {
            id: Uuid::new_v4(),
            start_time: now,
            end_time: Some(planned_end),
            mode: request.mode,
            list_type: request.list_type,
            app_ids: request.whitelist_app_ids,
            duration_minutes: Some(request.duration_minutes),
            label: request.label,
            completed: false,
        };

        FocusQueries::create(&self.inner.db, &session)
            .await
            .context("Failed to persist focus session")?;

        self.arm(session.clone(), planned_end, now);

        info!(
            "Focus session {} started: {} minutes, {} ({} apps)",
            session.id,
            request.duration_minutes,
            session.list_type.as_str(),
            session.app_ids.len()
        );
        self.inner.events.publish(DomainEvent::FocusStarted {
            session_id: session.id,
            end_time: planned_end,
            timestamp: now,
        });
        self.inner.notifications.push(Notification::info(
            "Focus session started",
            format!("Focus mode is on for {} minutes.", request.duration_minutes),
        ));

        Ok(session)
    }

    /// End the running session early. Returns false when none was running.
    pub async fn stop(&self, now: DateTime<Utc>) -> Result<bool> {
        let active = {
            let mut state = self.inner.state.lock();
            state.cancel_timers();
            state.active.take()
        };

        let Some(active) = active else {
            return Ok(false);
        };

        let now = now.trunc_subsecs(0);
        FocusQueries::close(&self.inner.db, &active.session.id.to_string(), now, false)
            .await
            .context("Failed to close focus session")?;

        info!("Focus session {} stopped", active.session.id);
        self.inner.events.publish(DomainEvent::FocusEnded {
            session_id: active.session.id,
            completed: false,
            timestamp: now,
        });
        Ok(true)
    }

    async fn expire(&self, session_id: Uuid) {
        let active = {
            let mut state = self.inner.state.lock();
            if state.active.as_ref().map(|a| a.session.id) != Some(session_id) {
                return;
            }
            // The expiry handle belongs to the task running this call
            state.expiry.take();
            if let Some(handle) = state.breaks.take() {
                handle.abort();
            }
            state.active.take()
        };

        let Some(active) = active else {
            return;
        };

        let id = active.session.id.to_string();
        if let Err(e) = FocusQueries::close(&self.inner.db, &id, active.planned_end, true).await {
            warn!("Failed to close expired focus session {}: {}", id, e);
        }

        info!("Focus session {} completed", session_id);
        self.inner.events.publish(DomainEvent::FocusEnded {
            session_id,
            completed: true,
            timestamp: Utc::now(),
        });
        self.inner.notifications.push(Notification::info(
            "Focus session complete",
            "Your focus session has ended.",
        ));
    }

    fn remind_break(&self, session_id: Uuid) {
        let start = {
            let state = self.inner.state.lock();
            match &state.active {
                Some(active) if active.session.id == session_id => active.session.start_time,
                _ => return,
            }
        };

        let focused_minutes = (Utc::now() - start).num_minutes();
        let break_minutes = self.inner.config.break_duration_minutes;
        debug!("Break reminder after {} focused minutes", focused_minutes);

        self.inner.events.publish(DomainEvent::BreakReminder {
            session_id,
            break_minutes,
            timestamp: Utc::now(),
        });
        self.inner.notifications.push(Notification::info(
            "Time for a break",
            format!(
                "You have been focused for {} minutes. Take a {} minute break.",
                focused_minutes, break_minutes
            ),
        ));
    }

    /// Break reminders only run for sessions at least one interval long.
    fn break_period(&self, duration_minutes: Option<i64>) -> Option<std::time::Duration> {
        let config = &self.inner.config;
        let interval = config.break_interval_minutes;
        let long_enough = duration_minutes.unwrap_or(0) >= interval;
        (config.break_reminders && interval > 0 && long_enough)
            .then(|| std::time::Duration::from_secs(interval as u64 * 60))
    }

    fn arm(&self, session: FocusSession, planned_end: DateTime<Utc>, now: DateTime<Utc>) {
        let session_id = session.id;
        let remaining = (planned_end - now).to_std().unwrap_or_default();

        let weak: Weak<FocusInner> = Arc::downgrade(&self.inner);
        let expiry = tokio::spawn(async move {
            sleep(remaining).await;
            if let Some(inner) = weak.upgrade() {
                FocusManager { inner }.expire(session_id).await;
            }
        });

        let breaks = self.break_period(session.duration_minutes).map(|period| {
            let focused = (now - session.start_time).to_std().unwrap_or_default();
            let first = first_break_delay(period, focused);
            let weak: Weak<FocusInner> = Arc::downgrade(&self.inner);
            tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + first, period);
                loop {
                    ticker.tick().await;
                    match weak.upgrade() {
                        Some(inner) => FocusManager { inner }.remind_break(session_id),
                        None => break,
                    }
                }
            })
        });

        let app_ids = session.app_ids.iter().copied().collect();
        let mut state = self.inner.state.lock();
        state.cancel_timers();
        state.active = Some(ActiveFocus {
            session,
            planned_end,
            app_ids,
            blocked_notified: HashSet::new(),
            closed_pids: HashSet::new(),
        });
        state.expiry = Some(expiry);
        state.breaks = breaks;
    }

    /// Resume the newest unfinished session if its deadline is still ahead
    /// and close every stale one at its scheduled end.
    pub async fn recover(&self, now: DateTime<Utc>) -> Result<Option<FocusSession>> {
        let mut unclosed = Vec::new();
        for row in FocusQueries::list_unclosed(&self.inner.db).await? {
            unclosed.push(FocusSession::try_from(row)?);
        }
        unclosed.sort_by(|a, b| b.start_time.cmp(&a.start_time));

        let mut resumed = None;
        for session in unclosed {
            let planned_end = session.end_time.unwrap_or(session.start_time);
            if resumed.is_none() && planned_end > now {
                info!(
                    "Resuming focus session {} with {} minutes remaining",
                    session.id,
                    (planned_end - now).num_minutes()
                );
                self.arm(session.clone(), planned_end, now);
                resumed = Some(session);
            } else {
                info!("Closing stale focus session {}", session.id);
                FocusQueries::close(&self.inner.db, &session.id.to_string(), planned_end, false)
                    .await?;
            }
        }

        Ok(resumed)
    }

    pub fn is_active(&self) -> bool {
        self.inner.state.lock().active.is_some()
    }

    pub fn is_allowed(&self, app_id: Uuid) -> bool {
        let state = self.inner.state.lock();
        match &state.active {
            None => true,
            Some(active) => match active.session.list_type {
                FocusListType::Whitelist => active.app_ids.contains(&app_id),
                FocusListType::Blacklist => !active.app_ids.contains(&app_id),
            },
        }
    }

    /// `Some` when the running session blocks the app. Each pid is handed
    /// out for termination at most once per session.
    pub fn check_blocked(&self, app_id: Uuid, pids: &[u32]) -> Option<FocusBlock> {
        let close = self.inner.config.close_blocked_apps;
        let mut state = self.inner.state.lock();
        let active = state.active.as_mut()?;
        let allowed = match active.session.list_type {
            FocusListType::Whitelist => active.app_ids.contains(&app_id),
            FocusListType::Blacklist => !active.app_ids.contains(&app_id),
        };
        if allowed {
            return None;
        }

        let first_time = active.blocked_notified.insert(app_id);
        let terminate = if close {
            pids.iter().copied().filter(|pid| active.closed_pids.insert(*pid)).collect()
        } else {
            Vec::new()
        };
        Some(FocusBlock { first_time, terminate })
    }

    pub fn status(&self, now: DateTime<Utc>) -> FocusStatusResponse {
        let state = self.inner.state.lock();
        match &state.active {
            None => FocusStatusResponse::inactive(),
            Some(active) => FocusStatusResponse {
                is_active: true,
                start_time: Some(active.session.start_time),
                end_time: Some(active.planned_end),
                remaining_seconds: (active.planned_end - now).num_seconds().max(0),
                mode: Some(active.session.mode),
                list_type: Some(active.session.list_type),
                label: active.session.label.clone(),
                whitelist_app_ids: active.session.app_ids.clone(),
            },
        }
    }

    pub fn active_session_id(&self) -> Option<Uuid> {
        self.inner.state.lock().active.as_ref().map(|a| a.session.id)
    }
}

/// Time until the next whole multiple of `period` since the session began.
fn first_break_delay(
    period: std::time::Duration,
    focused: std::time::Duration,
) -> std::time::Duration {
    let period_secs = period.as_secs();
    if period_secs == 0 {
        return period;
    }
    std::time::Duration::from_secs(period_secs - focused.as_secs() % period_secs)
}
