use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use dots_screentime_db::Database;
use dots_screentime_probe::OsProbe;
use tracing::{info, warn};

use crate::aggregator::Aggregator;
use crate::config::DaemonConfig;
use crate::enforcement::EnforcementEngine;
use crate::enrichment::SiteDomainExtractor;
use crate::events::EventBus;
use crate::focus::FocusManager;
use crate::identity::{CategoryTable, IdentityResolver};
use crate::limits::LimitEvaluator;
use crate::notifications::NotificationQueue;
use crate::sampler::{Sampler, SamplerParts};
use crate::service::ScreenTime;
use crate::tracker::SessionTracker;
use crate::zone::LocalZone;

/// The wired-up daemon without its OS loops: one sampler plus the
/// service the control socket talks to.
pub struct Engine {
    pub service: Arc<ScreenTime>,
    pub sampler: Arc<Sampler>,
    pub tracker: Arc<SessionTracker>,
    pub aggregator: Arc<Aggregator>,
    pub limits: Arc<LimitEvaluator>,
    pub focus: FocusManager,
    pub events: EventBus,
}

impl Engine {
    /// Build every component on an already migrated database and resume
    /// any focus session still running at `now`.
    pub async fn build(
        config: &DaemonConfig,
        db: Database,
        probe: Arc<dyn OsProbe>,
        zone: LocalZone,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let events = EventBus::new();
        let mut notifications = NotificationQueue::new(config.notifications.capacity);
        if config.notifications.desktop {
            notifications = notifications.with_desktop_delivery();
        }

        let categories = match &config.categories.rules_path {
            Some(path) => CategoryTable::with_overrides(Path::new(path)).unwrap_or_else(|e| {
                warn!("Ignoring category overrides from {}: {:#}", path, e);
                CategoryTable::builtin()
            }),
            None => CategoryTable::builtin(),
        };

        let tracker = Arc::new(SessionTracker::new(&config.sampling.ignored_processes, zone));
        let aggregator = Arc::new(Aggregator::new(db.clone(), tracker.clone()));

        let limits = Arc::new(LimitEvaluator::new());
        let loaded = limits.reload_rules(&db).await.context("Failed to load limit rules")?;
        info!("Loaded {} enabled limit rules", loaded);

        let focus =
            FocusManager::new(db.clone(), events.clone(), notifications.clone(), config.focus.clone());
        if let Some(session) = focus.recover(now).await.context("Failed to recover focus session")? {
            info!("Focus session {} resumed", session.id);
        }

        let site_domains = if config.enrichment.site_domains {
            Some(SiteDomainExtractor::new().context("Failed to build site domain pattern")?)
        } else {
            None
        };

        let enforcement = EnforcementEngine::new(
            probe.clone(),
            notifications.clone(),
            events.clone(),
            db.clone(),
            config.enforcement.dry_run,
        );

        let sampler = Sampler::new(
            SamplerParts {
                probe: probe.clone(),
                identity: IdentityResolver::new(db.clone(), probe, categories),
                tracker: tracker.clone(),
                aggregator: aggregator.clone(),
                limits: limits.clone(),
                enforcement,
                focus: focus.clone(),
                events: events.clone(),
                site_domains,
            },
            &config.sampling,
        );

        let service = ScreenTime::new(
            db,
            aggregator.clone(),
            limits.clone(),
            focus.clone(),
            notifications,
            config.export_dir(),
        );

        Ok(Self {
            service: Arc::new(service),
            sampler: Arc::new(sampler),
            tracker,
            aggregator,
            limits,
            focus,
            events,
        })
    }
}
