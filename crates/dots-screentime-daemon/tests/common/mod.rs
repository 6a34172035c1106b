#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use dots_screentime_daemon::config::{DaemonConfig, TrackingMode};
use dots_screentime_daemon::zone::LocalZone;
use dots_screentime_daemon::Engine;
use dots_screentime_db::queries::AppQueries;
use dots_screentime_db::{Database, DatabaseConfig};
use dots_screentime_probe::{OsProbe, ProbeError, ProbeSnapshot, ProcessWindow};
use parking_lot::Mutex;
use tempfile::TempDir;
use uuid::Uuid;

/// Scriptable probe: tests set the windows, idle time and failures.
#[derive(Default)]
pub struct FakeProbe {
    snapshot: Mutex<ProbeSnapshot>,
    idle: Mutex<Option<Duration>>,
    failing: Mutex<bool>,
    terminated: Mutex<Vec<u32>>,
}

impl FakeProbe {
    pub fn show(&self, windows: &[(u32, &str, &str)], foreground_pid: Option<u32>) {
        *self.snapshot.lock() = ProbeSnapshot {
            windows: windows
                .iter()
                .map(|(pid, name, title)| ProcessWindow {
                    pid: *pid,
                    process_name: name.to_string(),
                    window_title: title.to_string(),
                    file_path: Some(format!("/usr/bin/{}", name)),
                })
                .collect(),
            foreground_pid,
        };
    }

    pub fn set_idle(&self, idle: Option<Duration>) {
        *self.idle.lock() = idle;
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn terminated(&self) -> Vec<u32> {
        self.terminated.lock().clone()
    }
}

#[async_trait]
impl OsProbe for FakeProbe {
    async fn snapshot(&self) -> dots_screentime_probe::Result<ProbeSnapshot> {
        if *self.failing.lock() {
            return Err(ProbeError::X11("display went away".to_string()));
        }
        Ok(self.snapshot.lock().clone())
    }

    async fn idle_time(&self) -> Option<Duration> {
        *self.idle.lock()
    }

    async fn terminate(&self, pid: u32) -> dots_screentime_probe::Result<()> {
        self.terminated.lock().push(pid);
        Ok(())
    }

    fn icon_base64(&self, _process_name: &str) -> Option<String> {
        None
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

pub struct Harness {
    pub engine: Engine,
    pub probe: Arc<FakeProbe>,
    pub db: Database,
    pub config: DaemonConfig,
    pub dir: TempDir,
}

impl Harness {
    pub async fn app_id(&self, process_name: &str) -> Uuid {
        let app = AppQueries::get_by_process_name(&self.db, process_name).await.unwrap().unwrap();
        Uuid::parse_str(&app.id).unwrap()
    }

    /// Build a second engine on the same database, as after a restart.
    pub async fn restart(&self, now: DateTime<Utc>) -> Engine {
        Engine::build(&self.config, self.db.clone(), self.probe.clone(), utc_zone(), now)
            .await
            .unwrap()
    }
}

pub fn test_config(dir: &TempDir) -> DaemonConfig {
    let mut config = DaemonConfig::default();
    config.database.path = Some(dir.path().join("screentime.db").to_string_lossy().to_string());
    config.export.dir = Some(dir.path().join("exports").to_string_lossy().to_string());
    config.control.socket_path = dir.path().join("screentime.sock").to_string_lossy().to_string();
    config.notifications.desktop = false;
    config.sampling.idle_threshold_seconds = 60;
    config
}

pub async fn setup(configure: impl FnOnce(&mut DaemonConfig)) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&dir);
    configure(&mut config);

    let db = Database::new(DatabaseConfig::at(config.database_path())).await.unwrap();
    db.run_migrations().await.unwrap();

    let probe = Arc::new(FakeProbe::default());
    let engine = Engine::build(&config, db.clone(), probe.clone(), utc_zone(), Utc::now())
        .await
        .unwrap();

    Harness { engine, probe, db, config, dir }
}

pub fn running_mode(config: &mut DaemonConfig) {
    config.sampling.mode = TrackingMode::Running;
}

pub fn utc_zone() -> LocalZone {
    LocalZone::Fixed(FixedOffset::east_opt(0).unwrap())
}

pub fn at(date: NaiveDate, h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(h, m, s).unwrap())
}

pub fn may_first() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}
