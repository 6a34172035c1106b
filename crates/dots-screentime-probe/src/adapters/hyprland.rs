use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{pid_field, run_json, str_field, WindowSource};
use crate::error::Result;
use crate::types::WindowInfo;

#[derive(Default)]
pub struct HyprlandAdapter;

impl HyprlandAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn is_available() -> bool {
        std::env::var("HYPRLAND_INSTANCE_SIGNATURE").is_ok() && which::which("hyprctl").is_ok()
    }
}

#[async_trait]
impl WindowSource for HyprlandAdapter {
    async fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        let clients = run_json("hyprctl", &["clients", "-j"]).await?;

        // A failed activewindow query only loses focus information
        let active = match run_json("hyprctl", &["activewindow", "-j"]).await {
            Ok(value) => str_field(&value, "address"),
            Err(e) => {
                debug!("hyprctl activewindow failed: {}", e);
                None
            }
        };

        let windows = parse_hyprland_clients(&clients, active.as_deref());
        debug!("Hyprland reported {} windows", windows.len());
        Ok(windows)
    }

    fn name(&self) -> &'static str {
        "Hyprland"
    }
}

/// Parse `hyprctl clients -j`, marking the client whose address matches
/// the active window as focused.
pub fn parse_hyprland_clients(clients: &Value, active_address: Option<&str>) -> Vec<WindowInfo> {
    let Some(clients) = clients.as_array() else {
        return Vec::new();
    };

    clients
        .iter()
        .filter(|client| client.get("mapped").and_then(|v| v.as_bool()).unwrap_or(true))
        .map(|client| {
            let address = client.get("address").and_then(|v| v.as_str());
            WindowInfo {
                app_id: str_field(client, "class"),
                title: str_field(client, "title"),
                pid: pid_field(client, "pid"),
                focused: active_address.is_some() && address == active_address,
            }
        })
        .collect()
}
