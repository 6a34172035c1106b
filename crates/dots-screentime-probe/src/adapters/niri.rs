use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{pid_field, run_json, str_field, WindowSource};
use crate::error::Result;
use crate::types::WindowInfo;

#[derive(Default)]
pub struct NiriAdapter;

impl NiriAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn is_available() -> bool {
        std::env::var("NIRI_SOCKET").is_ok() && which::which("niri").is_ok()
    }
}

#[async_trait]
impl WindowSource for NiriAdapter {
    async fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        let value = run_json("niri", &["msg", "--json", "windows"]).await?;
        let windows = parse_niri_windows(&value);
        debug!("Niri reported {} windows", windows.len());
        Ok(windows)
    }

    fn name(&self) -> &'static str {
        "Niri"
    }
}

/// Parse `niri msg --json windows`.
pub fn parse_niri_windows(value: &Value) -> Vec<WindowInfo> {
    let Some(windows) = value.as_array() else {
        return Vec::new();
    };

    windows
        .iter()
        .map(|window| WindowInfo {
            app_id: str_field(window, "app_id"),
            title: str_field(window, "title"),
            pid: pid_field(window, "pid"),
            focused: window.get("is_focused").and_then(|v| v.as_bool()).unwrap_or(false),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_niri_windows() {
        let value = json!([
            { "id": 1, "title": "Inbox", "app_id": "thunderbird", "pid": 3100,
              "workspace_id": 1, "is_focused": false },
            { "id": 2, "title": "main.rs - code", "app_id": "code", "pid": 3200,
              "workspace_id": 1, "is_focused": true },
            { "id": 3, "title": "orphan", "app_id": "ghost", "pid": null,
              "workspace_id": 2, "is_focused": false }
        ]);

        let windows = parse_niri_windows(&value);

        assert_eq!(windows.len(), 3);
        assert_eq!(windows[1].pid, Some(3200));
        assert!(windows[1].focused);
        assert_eq!(windows[2].pid, None);
    }
}
