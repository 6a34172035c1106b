use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{pid_field, run_json, str_field, WindowSource};
use crate::error::Result;
use crate::types::WindowInfo;

#[derive(Default)]
pub struct SwayAdapter;

impl SwayAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn is_available() -> bool {
        std::env::var("SWAYSOCK").is_ok() && which::which("swaymsg").is_ok()
    }
}

#[async_trait]
impl WindowSource for SwayAdapter {
    async fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        let tree = run_json("swaymsg", &["-t", "get_tree"]).await?;
        let windows = parse_sway_tree(&tree);
        debug!("Sway reported {} windows", windows.len());
        Ok(windows)
    }

    fn name(&self) -> &'static str {
        "Sway"
    }
}

/// Collect every window leaf of a `swaymsg -t get_tree` document.
///
/// XWayland windows have no `app_id`; their X11 class is used instead.
pub fn parse_sway_tree(tree: &Value) -> Vec<WindowInfo> {
    let mut windows = Vec::new();
    collect_windows(tree, &mut windows);
    windows
}

fn collect_windows(node: &Value, windows: &mut Vec<WindowInfo>) {
    if let Some(pid) = pid_field(node, "pid") {
        let app_id = str_field(node, "app_id").or_else(|| {
            node.get("window_properties").and_then(|props| str_field(props, "class"))
        });
        windows.push(WindowInfo {
            app_id,
            title: str_field(node, "name"),
            pid: Some(pid),
            focused: node.get("focused").and_then(|v| v.as_bool()).unwrap_or(false),
        });
    }

    for key in ["nodes", "floating_nodes"] {
        if let Some(children) = node.get(key).and_then(|n| n.as_array()) {
            for child in children {
                collect_windows(child, windows);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> Value {
        json!({
            "type": "root",
            "focused": false,
            "nodes": [{
                "type": "output",
                "name": "eDP-1",
                "nodes": [{
                    "type": "workspace",
                    "name": "1",
                    "nodes": [
                        { "type": "con", "pid": 4100, "app_id": "firefox",
                          "name": "GitHub - Mozilla Firefox", "focused": true, "nodes": [] },
                        { "type": "con", "pid": 4200, "app_id": null,
                          "window_properties": { "class": "Steam" },
                          "name": "Steam", "focused": false, "nodes": [] }
                    ],
                    "floating_nodes": [
                        { "type": "floating_con", "pid": 4300, "app_id": "pavucontrol",
                          "name": "Volume Control", "focused": false, "nodes": [] }
                    ]
                }]
            }]
        })
    }

    #[test]
    fn test_parse_sway_tree_collects_tiled_and_floating() {
        let windows = parse_sway_tree(&fixture());
        let pids: Vec<_> = windows.iter().filter_map(|w| w.pid).collect();
        assert_eq!(pids, vec![4100, 4200, 4300]);
    }

    #[test]
    fn test_parse_sway_tree_marks_focus_and_xwayland_class() {
        let windows = parse_sway_tree(&fixture());

        let focused: Vec<_> = windows.iter().filter(|w| w.focused).collect();
        assert_eq!(focused.len(), 1);
        assert_eq!(focused[0].app_id.as_deref(), Some("firefox"));

        assert_eq!(windows[1].app_id.as_deref(), Some("Steam"));
    }

    #[test]
    fn test_sway_availability() {
        if std::env::var("SWAYSOCK").is_ok() {
            assert!(SwayAdapter::is_available() || which::which("swaymsg").is_err());
        }
    }
}
