use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use dots_screentime_common::time::ensure_supported_date;
use dots_screentime_common::{AppIdentity, LimitRule, UsageSession, UNCATEGORIZED};
use dots_screentime_db::queries::{
    AggregateQueries, AppQueries, FocusQueries, RuleQueries, SessionQueries,
};
use dots_screentime_db::{Database, DbAppUsage, DbSessionDetail};
use dots_screentime_proto::dto::{
    AppDetailsResponse, AppUsageDto, SessionDto, TitleUsageDto, UsageSummaryResponse,
    WeeklySummaryResponse, MAX_RECENT_SESSIONS,
};
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::limits::rule_to_dto;
use crate::tracker::{ClosedProcess, SessionTracker, TrackedProcess};
use crate::zone::LocalZone;

const TOP_APPS: usize = 10;
const TOP_TITLES: i64 = 5;
const DETAIL_RECENT_SESSIONS: u32 = 10;

/// Persisted seconds per app for one local date.
#[derive(Debug, Default)]
struct TodayCache {
    date: Option<NaiveDate>,
    seconds: HashMap<Uuid, i64>,
}

/// Folds closed sessions into daily aggregates and answers usage queries.
///
/// Every query that covers a date merges persisted history with the time
/// accrued so far by sessions the tracker still holds open.
pub struct Aggregator {
    db: Database,
    tracker: Arc<SessionTracker>,
    zone: LocalZone,
    pending: Mutex<Vec<UsageSession>>,
    today: Mutex<TodayCache>,
}

impl Aggregator {
    pub fn new(db: Database, tracker: Arc<SessionTracker>) -> Self {
        let zone = tracker.zone();
        Self {
            db,
            tracker,
            zone,
            pending: Mutex::new(Vec::new()),
            today: Mutex::new(TodayCache::default()),
        }
    }

    pub fn zone(&self) -> LocalZone {
        self.zone
    }

    /// Queue the closed parts and write everything pending.
    pub async fn record_closed(&self, closed: &[ClosedProcess]) -> usize {
        {
            let mut pending = self.pending.lock();
            for process in closed {
                pending.extend(process.sessions.iter().cloned());
            }
        }
        self.flush_pending().await
    }

    /// Write queued sessions. Failed writes stay queued for the next call.
    ///
    /// Returns how many sessions are still pending.
    pub async fn flush_pending(&self) -> usize {
        let batch: Vec<UsageSession> = std::mem::take(&mut *self.pending.lock());
        if batch.is_empty() {
            return 0;
        }

        let mut failed = Vec::new();
        for session in batch {
            let date = self.zone.local_date(session.start_time);
            match SessionQueries::record_closed(&self.db, &session, date).await {
                Ok(inserted) => {
                    if inserted {
                        self.add_to_today_cache(date, session.app_id, session.duration_seconds);
                    }
                }
                Err(e) => {
                    warn!("Failed to persist session {}: {}", session.id, e);
                    failed.push(session);
                }
            }
        }

        let mut pending = self.pending.lock();
        pending.extend(failed);
        if !pending.is_empty() {
            warn!("{} sessions waiting to be persisted", pending.len());
        }
        pending.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Forget cached totals after history was cleared.
    pub fn reset_cache(&self) {
        *self.today.lock() = TodayCache::default();
        self.pending.lock().clear();
    }

    fn add_to_today_cache(&self, date: NaiveDate, app_id: Uuid, seconds: i64) {
        let mut cache = self.today.lock();
        if cache.date == Some(date) {
            *cache.seconds.entry(app_id).or_insert(0) += seconds;
        }
    }

    /// Seconds an app has used today, persisted plus live.
    pub async fn app_seconds_today(&self, app_id: Uuid, now: DateTime<Utc>) -> Result<i64> {
        let today = self.zone.local_date(now);

        let cached = {
            let cache = self.today.lock();
            (cache.date == Some(today)).then(|| cache.seconds.get(&app_id).copied().unwrap_or(0))
        };

        let persisted = match cached {
            Some(seconds) => seconds,
            None => {
                let usage = AggregateQueries::usage_for_date(&self.db, today).await?;
                let mut seconds = HashMap::new();
                for row in usage {
                    seconds.insert(Uuid::parse_str(&row.app_id)?, row.total_seconds);
                }
                let total = seconds.get(&app_id).copied().unwrap_or(0);
                debug!("Loaded today cache for {} with {} apps", today, seconds.len());
                *self.today.lock() = TodayCache { date: Some(today), seconds };
                total
            }
        };

        let live: i64 = self
            .tracker
            .open_sessions()
            .iter()
            .filter(|p| p.app_id == app_id)
            .map(|p| self.zone.seconds_on(p.first_seen, now, today))
            .sum();

        Ok(persisted + live)
    }

    fn live_sessions_on(&self, date: NaiveDate, now: DateTime<Utc>) -> Vec<(TrackedProcess, i64)> {
        self.tracker
            .open_sessions()
            .into_iter()
            .map(|p| {
                let seconds = self.zone.seconds_on(p.first_seen, now, date);
                (p, seconds)
            })
            .filter(|(_, seconds)| *seconds > 0)
            .collect()
    }

    pub async fn total_seconds_for_date(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<i64> {
        let persisted = AggregateQueries::total_for_date(&self.db, date).await?;
        let live: i64 = self.live_sessions_on(date, now).iter().map(|(_, s)| s).sum();
        Ok(persisted + live)
    }

    pub async fn hourly_usage(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<[i64; 24]> {
        let (day_start, day_end) = self.zone.day_bounds(date);
        let mut buckets = [0i64; 24];

        for session in SessionQueries::list_overlapping(&self.db, day_start, day_end).await? {
            self.zone.distribute_hourly(session.start_time, session.end_time, date, &mut buckets);
        }
        for process in self.tracker.open_sessions() {
            self.zone.distribute_hourly(process.first_seen, now, date, &mut buckets);
        }

        Ok(buckets)
    }

    /// Per-app totals over an inclusive date range, live time included,
    /// largest first.
    async fn app_usage_between(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<AppUsageDto>> {
        let mut by_app: HashMap<Uuid, AppUsageDto> = HashMap::new();

        for row in AggregateQueries::usage_between(&self.db, start_date, end_date).await? {
            let dto = usage_row_to_dto(row)?;
            by_app.insert(dto.app_id, dto);
        }

        let mut date = start_date;
        while date <= end_date {
            for (process, seconds) in self.live_sessions_on(date, now) {
                by_app
                    .entry(process.app_id)
                    .or_insert_with(|| AppUsageDto {
                        app_id: process.app_id,
                        process_name: process.process_name.clone(),
                        display_name: process.display_name.clone(),
                        category: process.category.clone(),
                        icon_base64: None,
                        total_seconds: 0,
                    })
                    .total_seconds += seconds;
            }
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }

        let mut usage: Vec<AppUsageDto> = by_app.into_values().collect();
        usage.sort_by(|a, b| {
            b.total_seconds.cmp(&a.total_seconds).then_with(|| a.display_name.cmp(&b.display_name))
        });
        Ok(usage)
    }

    pub async fn category_usage(
        &self,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<BTreeMap<String, i64>> {
        let usage = self.app_usage_between(date, date, now).await?;
        Ok(group_by_category(&usage))
    }

    async fn attach_icons(&self, apps: &mut [AppUsageDto]) -> Result<()> {
        if apps.is_empty() {
            return Ok(());
        }
        let icons: HashMap<String, String> = AppQueries::list_all(&self.db)
            .await?
            .into_iter()
            .filter_map(|app| app.icon_base64.map(|icon| (app.id, icon)))
            .collect();
        for app in apps.iter_mut() {
            app.icon_base64 = icons.get(&app.app_id.to_string()).cloned();
        }
        Ok(())
    }

    pub async fn summary(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<UsageSummaryResponse> {
        let date = ensure_supported_date(date)?;
        let today = self.zone.local_date(now);
        let usage = self.app_usage_between(date, date, now).await?;

        let total_seconds = usage.iter().map(|app| app.total_seconds).sum();
        let total_seconds_yesterday = match date.pred_opt() {
            Some(yesterday) => self.total_seconds_for_date(yesterday, now).await?,
            None => 0,
        };

        let app_switches = if date == today {
            self.tracker.switch_count()
        } else {
            let (day_start, day_end) = self.zone.day_bounds(date);
            SessionQueries::count_started_between(&self.db, day_start, day_end).await?
        };

        let category_usage = group_by_category(&usage);
        let mut top_apps: Vec<AppUsageDto> = usage.into_iter().take(TOP_APPS).collect();
        self.attach_icons(&mut top_apps).await?;

        Ok(UsageSummaryResponse {
            date_local: date,
            total_seconds,
            total_seconds_yesterday,
            app_switches,
            top_apps,
            hourly_usage: self.hourly_usage(date, now).await?.to_vec(),
            category_usage,
        })
    }

    /// Seven days from `week_start`, by default the Sunday on or before today.
    pub async fn weekly_summary(
        &self,
        week_start: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> Result<WeeklySummaryResponse> {
        let today = self.zone.local_date(now);
        let week_start = week_start.unwrap_or_else(|| default_week_start(today));
        let week_start = ensure_supported_date(week_start)?;
        let week_end = week_start + Duration::days(6);
        let last_week_start = week_start - Duration::days(7);

        let mut daily_usage = Vec::with_capacity(7);
        for offset in 0..7 {
            let date = week_start + Duration::days(offset);
            daily_usage.push(self.total_seconds_for_date(date, now).await?);
        }
        let total_seconds: i64 = daily_usage.iter().sum();

        let mut total_seconds_last_week = 0;
        for offset in 0..7 {
            let date = last_week_start + Duration::days(offset);
            total_seconds_last_week += self.total_seconds_for_date(date, now).await?;
        }

        let usage = self.app_usage_between(week_start, week_end, now).await?;
        let category_usage = group_by_category(&usage);
        let mut top_apps: Vec<AppUsageDto> = usage.into_iter().take(TOP_APPS).collect();
        self.attach_icons(&mut top_apps).await?;

        let (range_start, _) = self.zone.day_bounds(week_start);
        let (_, range_end) = self.zone.day_bounds(week_end);
        let mut focus_sessions_completed = 0;
        let mut focus_total_seconds = 0;
        for session in FocusQueries::list_started_between(&self.db, range_start, range_end).await? {
            if session.completed {
                focus_sessions_completed += 1;
            }
            if session.closed {
                if let Some(end) = session.end_time {
                    focus_total_seconds += (end - session.start_time).num_seconds().max(0);
                }
            }
        }

        Ok(WeeklySummaryResponse {
            week_start_date: week_start,
            total_seconds,
            total_seconds_last_week,
            change_percent: change_percent(total_seconds, total_seconds_last_week),
            daily_usage,
            category_usage,
            top_apps,
            focus_sessions_completed,
            focus_total_seconds,
        })
    }

    pub async fn app_details(&self, app_id: Uuid, now: DateTime<Utc>) -> Result<AppDetailsResponse> {
        let id = app_id.to_string();
        let row = AppQueries::get_by_id(&self.db, &id)
            .await
            .with_context(|| format!("Unknown app {}", app_id))?;
        let process_name = row.process_name.clone();
        let display_name = row.display_name.clone();
        let app = AppIdentity::try_from(row)?;

        let today = self.zone.local_date(now);
        let window_start = today - Duration::days(6);

        let today_seconds = self.app_seconds_today(app_id, now).await?;
        let earlier = match today.pred_opt() {
            Some(yesterday) => {
                AggregateQueries::total_for_app_between(&self.db, &id, window_start, yesterday)
                    .await?
            }
            None => 0,
        };
        let week_total_seconds = earlier + today_seconds;

        let limit_rule = match RuleQueries::get_for_app(&self.db, &id).await? {
            Some(rule) => {
                let rule = LimitRule::try_from(rule)?;
                Some(rule_to_dto(&rule, &process_name, &display_name))
            }
            None => None,
        };

        let (since, _) = self.zone.day_bounds(window_start);
        let top_titles = SessionQueries::top_titles(&self.db, &id, since, TOP_TITLES)
            .await?
            .into_iter()
            .map(|title| TitleUsageDto {
                title: title.window_title,
                total_seconds: title.total_seconds,
                session_count: title.session_count,
            })
            .collect();

        Ok(AppDetailsResponse {
            app,
            today_seconds,
            seven_day_average_seconds: week_total_seconds / 7,
            week_total_seconds,
            limit_rule,
            recent_sessions: self
                .recent_sessions(Some(app_id), DETAIL_RECENT_SESSIONS, now)
                .await?,
            top_titles,
        })
    }

    /// Newest first: live sessions, then persisted ones.
    pub async fn recent_sessions(
        &self,
        app_id: Option<Uuid>,
        max_count: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<SessionDto>> {
        let max_count = max_count.min(MAX_RECENT_SESSIONS) as usize;

        let mut live: Vec<TrackedProcess> = self
            .tracker
            .open_sessions()
            .into_iter()
            .filter(|p| app_id.map_or(true, |id| p.app_id == id))
            .collect();
        live.sort_by(|a, b| b.first_seen.cmp(&a.first_seen));

        let mut sessions: Vec<SessionDto> =
            live.into_iter().take(max_count).map(|p| live_session_dto(&p, now)).collect();

        let remaining = max_count - sessions.len();
        if remaining > 0 {
            let filter = app_id.map(|id| id.to_string());
            for row in
                SessionQueries::list_recent(&self.db, filter.as_deref(), remaining as i64).await?
            {
                sessions.push(stored_session_dto(row)?);
            }
        }

        Ok(sessions)
    }

    /// Delete usage history and restart the live view from `now`.
    pub async fn clear_history(&self, now: DateTime<Utc>) -> Result<()> {
        SessionQueries::clear_history(&self.db).await.context("Failed to clear usage history")?;
        self.tracker.reset(now);
        self.reset_cache();
        info!("Usage history cleared");
        Ok(())
    }
}

/// The Sunday on or before `date`.
pub fn default_week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

pub fn change_percent(this_week: i64, last_week: i64) -> f64 {
    if last_week == 0 {
        0.0
    } else {
        (this_week - last_week) as f64 / last_week as f64 * 100.0
    }
}

fn group_by_category(usage: &[AppUsageDto]) -> BTreeMap<String, i64> {
    let mut categories = BTreeMap::new();
    for app in usage {
        *categories.entry(app.category.clone()).or_insert(0) += app.total_seconds;
    }
    categories
}

fn usage_row_to_dto(row: DbAppUsage) -> Result<AppUsageDto> {
    Ok(AppUsageDto {
        app_id: Uuid::parse_str(&row.app_id)?,
        process_name: row.process_name,
        display_name: row.display_name,
        category: match row.category {
            Some(category) if !category.is_empty() => category,
            _ => UNCATEGORIZED.to_string(),
        },
        icon_base64: None,
        total_seconds: row.total_seconds,
    })
}

fn live_session_dto(process: &TrackedProcess, now: DateTime<Utc>) -> SessionDto {
    SessionDto {
        session_id: process.session_id,
        app_id: process.app_id,
        process_name: process.process_name.clone(),
        display_name: process.display_name.clone(),
        start_time: process.first_seen,
        end_time: None,
        duration_seconds: (now - process.first_seen).num_seconds().max(0),
        window_title: process.window_title.clone(),
        site_domain: process.site_domain.clone(),
    }
}

fn stored_session_dto(row: DbSessionDetail) -> Result<SessionDto> {
    Ok(SessionDto {
        session_id: Uuid::parse_str(&row.id)?,
        app_id: Uuid::parse_str(&row.app_id)?,
        process_name: row.process_name,
        display_name: row.display_name,
        start_time: row.start_time,
        end_time: Some(row.end_time),
        duration_seconds: row.duration_seconds,
        window_title: row.window_title,
        site_domain: row.site_domain,
    })
}
