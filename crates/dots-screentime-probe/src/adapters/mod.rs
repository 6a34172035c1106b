mod generic;
mod hyprland;
mod niri;
mod sway;
mod x11;

pub use generic::GenericAdapter;
pub use hyprland::{parse_hyprland_clients, HyprlandAdapter};
pub use niri::{parse_niri_windows, NiriAdapter};
pub use sway::{parse_sway_tree, SwayAdapter};
pub use x11::X11Adapter;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{ProbeError, Result};
use crate::types::WindowInfo;

/// Source of top-level windows for one display server.
#[async_trait]
pub trait WindowSource: Send + Sync {
    async fn list_windows(&self) -> Result<Vec<WindowInfo>>;
    fn name(&self) -> &'static str;
}

/// Run a compositor IPC command and parse its JSON output.
///
/// Empty output parses as `null`, which some commands print when nothing
/// is focused.
pub(crate) async fn run_json(command: &'static str, args: &[&str]) -> Result<serde_json::Value> {
    let output = Command::new(command)
        .args(args)
        .output()
        .await
        .map_err(|source| ProbeError::Command { command, source })?;

    if !output.status.success() {
        debug!("{} {:?} failed", command, args);
        return Err(ProbeError::CommandFailed { command, status: output.status });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if stdout.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(&stdout).map_err(|source| ProbeError::Json { command, source })
}

pub(crate) fn str_field(value: &serde_json::Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| v.as_str()).filter(|s| !s.is_empty()).map(String::from)
}

pub(crate) fn pid_field(value: &serde_json::Value, key: &str) -> Option<u32> {
    value.get(key).and_then(|v| v.as_u64()).and_then(|p| u32::try_from(p).ok()).filter(|p| *p > 0)
}
