use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const APP_DIR_NAME: &str = "dots-screentime";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub data_dir: Option<String>,
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { data_dir: None, log_level: "info".to_string() }
    }
}

impl GeneralConfig {
    /// Directory for the database and exports
    pub fn data_dir(&self) -> PathBuf {
        match &self.data_dir {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir(),
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from("/tmp")).join(APP_DIR_NAME)
}

/// Settings shared by the control server and its clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub socket_path: String,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub max_frame_bytes: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path().to_string_lossy().to_string(),
            timeout_ms: 5000,
            max_retries: 3,
            retry_delay_ms: 500,
            max_frame_bytes: 10 * 1024 * 1024,
        }
    }
}

pub fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(format!("{}.sock", APP_DIR_NAME))
}
