use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dots_screentime_probe::{OsProbe, ProbeSnapshot, ProcessWindow};
use dots_screentime_proto::DomainEvent;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregator::Aggregator;
use crate::config::{SamplingConfig, TrackingMode};
use crate::enforcement::{EnforcementEngine, Target};
use crate::enrichment::SiteDomainExtractor;
use crate::events::EventBus;
use crate::focus::FocusManager;
use crate::identity::IdentityResolver;
use crate::limits::LimitEvaluator;
use crate::tracker::{Observation, SessionTracker, TickOutcome, TrackedProcess};

const BROWSER_CATEGORY: &str = "Browser";

/// The components one sampling tick drives, in order.
pub struct SamplerParts {
    pub probe: Arc<dyn OsProbe>,
    pub identity: IdentityResolver,
    pub tracker: Arc<SessionTracker>,
    pub aggregator: Arc<Aggregator>,
    pub limits: Arc<LimitEvaluator>,
    pub enforcement: EnforcementEngine,
    pub focus: FocusManager,
    pub events: EventBus,
    pub site_domains: Option<SiteDomainExtractor>,
}

/// Counts from one tick, mostly for logs and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub opened: usize,
    pub closed: usize,
    pub open: usize,
    pub idle: bool,
}

/// Fixed-interval sampling loop: probe, resolve, track, persist, enforce.
pub struct Sampler {
    parts: SamplerParts,
    mode: TrackingMode,
    interval: Duration,
    idle_threshold: Option<Duration>,
    idle: AtomicBool,
}

impl Sampler {
    pub fn new(parts: SamplerParts, config: &SamplingConfig) -> Self {
        let idle_threshold = (config.idle_threshold_seconds > 0)
            .then(|| Duration::from_secs(config.idle_threshold_seconds));
        Self {
            parts,
            mode: config.mode,
            interval: Duration::from_millis(config.interval_ms.max(100)),
            idle_threshold,
            idle: AtomicBool::new(false),
        }
    }

    /// Run until `shutdown` flips, then close and persist every open session.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Sampling every {:?} with {} ({:?} mode)",
            self.interval,
            self.parts.probe.name(),
            self.mode
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.tick(Utc::now()).await;
                    if report.opened > 0 || report.closed > 0 {
                        debug!(
                            "Tick: {} opened, {} closed, {} open",
                            report.opened, report.closed, report.open
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.drain(Utc::now()).await;
    }

    /// One sampling pass at `now`.
    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let snapshot = match self.parts.probe.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Probe snapshot failed: {}", e);
                return TickReport { open: self.parts.tracker.open_count(), ..TickReport::default() };
            }
        };

        let idle = self.check_idle().await;
        let snapshot = if idle { ProbeSnapshot::default() } else { snapshot };

        let foreground_pid = snapshot.foreground_pid;
        let observations = self.observe(snapshot).await;
        let outcome = self.parts.tracker.tick(observations, foreground_pid, now);
        self.persist(&outcome, now).await;

        let open = self.parts.tracker.open_sessions();
        self.enforce(&open, now).await;

        TickReport {
            opened: outcome.opened.len(),
            closed: outcome.closed.len(),
            open: open.len(),
            idle,
        }
    }

    /// Close every open session and write it out.
    pub async fn drain(&self, now: DateTime<Utc>) {
        let closed = self.parts.tracker.close_all(now);
        let count = closed.len();
        let pending = self.parts.aggregator.record_closed(&closed).await;
        if pending > 0 {
            warn!("{} sessions could not be persisted on shutdown", pending);
        }
        info!("Closed {} open sessions", count);
    }

    async fn check_idle(&self) -> bool {
        let Some(threshold) = self.idle_threshold else {
            return false;
        };

        let idle = self.parts.probe.idle_time().await.is_some_and(|idle| idle >= threshold);
        let was_idle = self.idle.swap(idle, Ordering::Relaxed);
        if idle && !was_idle {
            info!("User idle for {:?}, pausing tracking", threshold);
        } else if !idle && was_idle {
            info!("User active again, resuming tracking");
        }
        idle
    }

    async fn observe(&self, snapshot: ProbeSnapshot) -> Vec<Observation> {
        let windows: Vec<ProcessWindow> = match self.mode {
            TrackingMode::Foreground => snapshot.foreground().cloned().into_iter().collect(),
            TrackingMode::Running => snapshot.windows,
        };

        let mut observations = Vec::with_capacity(windows.len());
        for window in windows {
            if self.parts.tracker.is_ignored(&window.process_name) {
                continue;
            }

            let app = match self
                .parts
                .identity
                .resolve(&window.process_name, window.file_path.as_deref())
                .await
            {
                Ok(app) => app,
                Err(e) => {
                    warn!("Failed to resolve {} (pid {}): {:#}", window.process_name, window.pid, e);
                    continue;
                }
            };

            let site_domain = match &self.parts.site_domains {
                Some(extractor) if app.category_or_default() == BROWSER_CATEGORY => {
                    extractor.extract(&window.window_title)
                }
                _ => None,
            };

            observations.push(Observation {
                pid: window.pid,
                app,
                window_title: window.window_title,
                site_domain,
            });
        }
        observations
    }

    async fn persist(&self, outcome: &TickOutcome, now: DateTime<Utc>) {
        if outcome.closed.is_empty() {
            if self.parts.aggregator.pending_count() > 0 {
                self.parts.aggregator.flush_pending().await;
            }
        } else {
            self.parts.aggregator.record_closed(&outcome.closed).await;
            for closed in &outcome.closed {
                self.parts.events.publish(DomainEvent::SessionClosed {
                    app_id: closed.process.app_id,
                    process_name: closed.process.process_name.clone(),
                    duration_seconds: closed.duration_seconds(),
                    timestamp: now,
                });
            }
        }

        if outcome.changed() {
            self.parts.events.publish(DomainEvent::AppsUpdated {
                open_sessions: self.parts.tracker.open_count(),
                timestamp: now,
            });
        }
    }

    async fn enforce(&self, open: &[TrackedProcess], now: DateTime<Utc>) {
        let mut apps: BTreeMap<Uuid, (&TrackedProcess, Vec<u32>)> = BTreeMap::new();
        for process in open {
            apps.entry(process.app_id).or_insert_with(|| (process, Vec::new())).1.push(process.pid);
        }

        let local = self.parts.aggregator.zone().local_datetime(now);
        for (app_id, (process, mut pids)) in apps {
            pids.sort_unstable();
            let target = Target {
                app_id,
                process_name: &process.process_name,
                display_name: &process.display_name,
            };

            if self.parts.limits.rule_for(&process.process_name).is_some() {
                match self.parts.aggregator.app_seconds_today(app_id, now).await {
                    Ok(used) => {
                        if let Some(verdict) =
                            self.parts.limits.evaluate(&process.process_name, &pids, used, local)
                        {
                            self.parts.enforcement.apply_limit(&target, &verdict).await;
                        }
                    }
                    Err(e) => warn!("Failed to read usage for {}: {:#}", process.process_name, e),
                }
            }

            if let Some(block) = self.parts.focus.check_blocked(app_id, &pids) {
                self.parts.enforcement.block_for_focus(&target, &block).await;
            }
        }
    }
}
