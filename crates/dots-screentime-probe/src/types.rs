use serde::{Deserialize, Serialize};

/// A top-level window as reported by the compositor or X server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub app_id: Option<String>,
    pub title: Option<String>,
    pub pid: Option<u32>,
    pub focused: bool,
}

/// One visible process, resolved from its window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessWindow {
    pub pid: u32,
    pub process_name: String,
    pub window_title: String,
    pub file_path: Option<String>,
}

/// Everything the tracker needs from one sampling tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeSnapshot {
    pub windows: Vec<ProcessWindow>,
    pub foreground_pid: Option<u32>,
}

impl ProbeSnapshot {
    pub fn foreground(&self) -> Option<&ProcessWindow> {
        let pid = self.foreground_pid?;
        self.windows.iter().find(|w| w.pid == pid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositorType {
    Niri,
    Sway,
    Hyprland,
    X11,
    Unknown,
}

impl std::fmt::Display for CompositorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompositorType::Niri => write!(f, "Niri"),
            CompositorType::Sway => write!(f, "Sway"),
            CompositorType::Hyprland => write!(f, "Hyprland"),
            CompositorType::X11 => write!(f, "X11"),
            CompositorType::Unknown => write!(f, "Unknown"),
        }
    }
}
