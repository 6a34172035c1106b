use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dots_screentime_common::config::{ControlConfig, GeneralConfig, APP_DIR_NAME};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "DOTS_SCREENTIME_CONFIG";

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DaemonConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub sampling: SamplingConfig,

    #[serde(default)]
    pub categories: CategoriesConfig,

    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default)]
    pub focus: FocusConfig,

    #[serde(default)]
    pub enforcement: EnforcementConfig,

    #[serde(default)]
    pub notifications: NotificationsConfig,

    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Defaults to `<data_dir>/screentime.db`
    pub path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    /// Only the focused window's process accrues time
    #[default]
    Foreground,
    /// Every process with a visible window accrues time
    Running,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub interval_ms: u64,
    pub mode: TrackingMode,
    /// Input idle time after which usage stops counting; 0 disables
    pub idle_threshold_seconds: u64,
    pub ignored_processes: Vec<String>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            mode: TrackingMode::Foreground,
            idle_threshold_seconds: 300,
            ignored_processes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CategoriesConfig {
    pub rules_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FocusConfig {
    pub break_interval_minutes: i64,
    pub break_duration_minutes: i64,
    pub break_reminders: bool,
    pub close_blocked_apps: bool,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            break_interval_minutes: 25,
            break_duration_minutes: 5,
            break_reminders: true,
            close_blocked_apps: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EnforcementConfig {
    pub dry_run: bool,
    /// Time a process gets to exit after SIGTERM before SIGKILL
    pub kill_grace_ms: u64,
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self { dry_run: false, kill_grace_ms: 3000 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub capacity: usize,
    pub desktop: bool,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { capacity: 50, desktop: true }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub site_domains: bool,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self { site_domains: true }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ExportConfig {
    /// Defaults to the user's documents folder
    pub dir: Option<String>,
}

impl DaemonConfig {
    /// Default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(APP_DIR_NAME)
            .join("daemon.toml")
    }

    /// Load from `$DOTS_SCREENTIME_CONFIG` or the default path, creating a
    /// default file if none exists.
    pub fn load() -> Result<Self> {
        let config_path = match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.is_empty() => PathBuf::from(path),
            _ => Self::default_config_path(),
        };
        Self::load_from_path(&config_path)
    }

    pub fn load_from_path(config_path: &Path) -> Result<Self> {
        debug!("Loading daemon configuration from {:?}", config_path);

        if !config_path.exists() {
            info!(
                "Configuration file not found at {:?}, creating default configuration",
                config_path
            );
            let default_config = Self::default();
            default_config.save_to_path(config_path)?;
            return Ok(default_config);
        }

        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let config: DaemonConfig = toml::from_str(&config_content)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        info!("Loaded daemon configuration from {:?}", config_path);
        Ok(config)
    }

    pub fn save_to_path(&self, config_path: &Path) -> Result<()> {
        debug!("Saving daemon configuration to {:?}", config_path);

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let config_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(config_path, config_content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        info!("Saved daemon configuration to {:?}", config_path);
        Ok(())
    }

    /// Log filter used when `RUST_LOG` is unset. Accepts a bare level or
    /// filter directives; anything else falls back to `info`.
    pub fn log_filter(&self) -> EnvFilter {
        let level = self.general.log_level.trim();
        if level.is_empty() {
            return EnvFilter::new("info");
        }
        if let Ok(filter) = level.parse::<LevelFilter>() {
            return EnvFilter::default().add_directive(filter.into());
        }
        if level.contains('=') {
            if let Ok(filter) = EnvFilter::try_new(level) {
                return filter;
            }
        }
        EnvFilter::new("info")
    }

    pub fn database_path(&self) -> PathBuf {
        match &self.database.path {
            Some(path) => PathBuf::from(path),
            None => self.general.data_dir().join("screentime.db"),
        }
    }

    /// Where exports are written: the configured dir, the documents folder,
    /// else the data dir.
    pub fn export_dir(&self) -> PathBuf {
        match &self.export.dir {
            Some(dir) => PathBuf::from(dir),
            None => dirs::document_dir().unwrap_or_else(|| self.general.data_dir()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::default();
        assert_eq!(config.sampling.interval_ms, 1000);
        assert_eq!(config.sampling.mode, TrackingMode::Foreground);
        assert_eq!(config.sampling.idle_threshold_seconds, 300);
        assert_eq!(config.focus.break_interval_minutes, 25);
        assert_eq!(config.focus.break_duration_minutes, 5);
        assert_eq!(config.notifications.capacity, 50);
        assert!(!config.enforcement.dry_run);
        assert!(config.database_path().ends_with("screentime.db"));
    }

    #[test]
    fn test_log_filter_follows_general_log_level() {
        let mut config = DaemonConfig::default();
        assert_eq!(config.log_filter().to_string(), "info");

        config.general.log_level = "debug".to_string();
        assert_eq!(config.log_filter().to_string(), "debug");

        config.general.log_level = "warn,dots_screentime_daemon=trace".to_string();
        assert!(config.log_filter().to_string().contains("dots_screentime_daemon=trace"));

        config.general.log_level = "   ".to_string();
        assert_eq!(config.log_filter().to_string(), "info");

        config.general.log_level = "chatty".to_string();
        assert_eq!(config.log_filter().to_string(), "info");
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("daemon.toml");

        let config = DaemonConfig::load_from_path(&path).unwrap();

        assert!(path.exists());
        assert_eq!(config.control.timeout_ms, 5000);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("daemon.toml");
        fs::write(
            &path,
            r#"
[sampling]
mode = "running"
ignored_processes = ["conky"]

[enforcement]
dry_run = true

[database]
path = "/var/lib/screentime/usage.db"
"#,
        )
        .unwrap();

        let config = DaemonConfig::load_from_path(&path).unwrap();

        assert_eq!(config.sampling.mode, TrackingMode::Running);
        assert_eq!(config.sampling.interval_ms, 1000);
        assert_eq!(config.sampling.ignored_processes, vec!["conky".to_string()]);
        assert!(config.enforcement.dry_run);
        assert_eq!(config.enforcement.kill_grace_ms, 3000);
        assert_eq!(config.database_path(), PathBuf::from("/var/lib/screentime/usage.db"));
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("daemon.toml");

        let mut config = DaemonConfig::default();
        config.focus.close_blocked_apps = true;
        config.save_to_path(&path).unwrap();

        let loaded = DaemonConfig::load_from_path(&path).unwrap();
        assert!(loaded.focus.close_blocked_apps);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("daemon.toml");
        fs::write(&path, "[sampling\ninterval_ms = ").unwrap();

        assert!(DaemonConfig::load_from_path(&path).is_err());
    }
}
