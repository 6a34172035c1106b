pub mod adapters;
pub mod detection;
pub mod error;
pub mod icon;
pub mod process;
pub mod terminate;
pub mod types;
pub mod x11;

pub use adapters::*;
pub use detection::*;
pub use error::{ProbeError, Result};
pub use types::*;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::process::{ProcessInfo, ProcessResolver};
use crate::x11::X11Session;

/// Platform query and command surface used by the tracker and enforcement.
///
/// Implementations hold no tracking state. Failures for a single window or
/// process are skipped inside `snapshot` rather than failing the whole call.
#[async_trait]
pub trait OsProbe: Send + Sync {
    /// Visible processes with their window titles plus the foreground pid.
    async fn snapshot(&self) -> Result<ProbeSnapshot>;

    /// Time since the last keyboard or pointer input, when the platform
    /// exposes it.
    async fn idle_time(&self) -> Option<Duration>;

    async fn terminate(&self, pid: u32) -> Result<()>;

    fn icon_base64(&self, process_name: &str) -> Option<String>;

    fn name(&self) -> &'static str;
}

/// Linux desktop probe: compositor IPC or X11 for windows, sysinfo for
/// processes, signals for termination.
pub struct DesktopProbe {
    source: Box<dyn WindowSource>,
    compositor: CompositorType,
    processes: ProcessResolver,
    x11: Option<Arc<X11Session>>,
    icon_dirs: Vec<PathBuf>,
    kill_grace: Duration,
}

impl DesktopProbe {
    pub fn new(kill_grace: Duration) -> Self {
        let compositor = detect_compositor();
        let x11 = X11Session::connect().map(Arc::new);
        let source = create_source(compositor, x11.clone());
        info!("Window probe using {} ({})", source.name(), compositor);

        if !compositor_command_exists(compositor) {
            match ipc_command(compositor) {
                Some(command) => {
                    tracing::warn!("{} not found in PATH, window listing will fail", command)
                }
                None => debug!("No window source for {}, reporting no windows", compositor),
            }
        }

        Self {
            source,
            compositor,
            processes: ProcessResolver::new(),
            x11,
            icon_dirs: icon::icon_search_dirs(),
            kill_grace,
        }
    }

    pub fn compositor(&self) -> CompositorType {
        self.compositor
    }
}

fn create_source(compositor: CompositorType, x11: Option<Arc<X11Session>>) -> Box<dyn WindowSource> {
    match (compositor, x11) {
        (CompositorType::Niri, _) => Box::new(NiriAdapter::new()),
        (CompositorType::Sway, _) => Box::new(SwayAdapter::new()),
        (CompositorType::Hyprland, _) => Box::new(HyprlandAdapter::new()),
        (CompositorType::X11, Some(session)) => Box::new(X11Adapter::new(session)),
        _ => Box::new(GenericAdapter::new()),
    }
}

#[async_trait]
impl OsProbe for DesktopProbe {
    async fn snapshot(&self) -> Result<ProbeSnapshot> {
        let windows = self.source.list_windows().await?;
        let pids: Vec<u32> = windows.iter().filter_map(|w| w.pid).collect();
        let resolved = self.processes.resolve(&pids);
        Ok(build_snapshot(windows, &resolved))
    }

    async fn idle_time(&self) -> Option<Duration> {
        let session = Arc::clone(self.x11.as_ref()?);
        match tokio::task::spawn_blocking(move || session.idle_time()).await {
            Ok(Ok(idle)) => Some(idle),
            Ok(Err(e)) => {
                debug!("Idle query failed: {}", e);
                None
            }
            Err(e) => {
                debug!("Idle query task failed: {}", e);
                None
            }
        }
    }

    async fn terminate(&self, pid: u32) -> Result<()> {
        if !self.processes.is_alive(pid) {
            return Err(ProbeError::ProcessNotFound(pid));
        }
        terminate::terminate_process(pid, self.kill_grace).await
    }

    fn icon_base64(&self, process_name: &str) -> Option<String> {
        icon::extract_icon_base64(process_name, &self.icon_dirs)
    }

    fn name(&self) -> &'static str {
        self.source.name()
    }
}

/// Join windows with their resolved processes, one entry per pid.
///
/// A process with several windows is reported once, titled after its
/// focused window if it has one, otherwise its first window. Windows
/// without a pid, or whose process could not be resolved, are dropped.
pub fn build_snapshot(windows: Vec<WindowInfo>, resolved: &HashMap<u32, ProcessInfo>) -> ProbeSnapshot {
    let mut snapshot = ProbeSnapshot::default();
    let mut index: HashMap<u32, usize> = HashMap::new();

    for window in windows {
        let Some(pid) = window.pid else {
            continue;
        };
        let Some(process) = resolved.get(&pid) else {
            debug!("Skipping window of unresolvable process {}", pid);
            continue;
        };
        let title = window.title.unwrap_or_default();

        if window.focused {
            snapshot.foreground_pid = Some(pid);
        }

        match index.get(&pid) {
            Some(&i) => {
                if window.focused {
                    snapshot.windows[i].window_title = title;
                }
            }
            None => {
                index.insert(pid, snapshot.windows.len());
                snapshot.windows.push(ProcessWindow {
                    pid,
                    process_name: process.name.clone(),
                    window_title: title,
                    file_path: process.exe.clone(),
                });
            }
        }
    }

    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(pid: Option<u32>, title: &str, focused: bool) -> WindowInfo {
        WindowInfo { app_id: None, title: Some(title.to_string()), pid, focused }
    }

    fn resolved() -> HashMap<u32, ProcessInfo> {
        HashMap::from([
            (10, ProcessInfo { name: "firefox".to_string(), exe: Some("/usr/lib/firefox/firefox".to_string()) }),
            (20, ProcessInfo { name: "kitty".to_string(), exe: None }),
        ])
    }

    #[test]
    fn test_build_snapshot_merges_windows_per_pid() {
        let windows = vec![
            window(Some(10), "Docs", false),
            window(Some(20), "vim", false),
            window(Some(10), "Mail", true),
        ];

        let snapshot = build_snapshot(windows, &resolved());

        assert_eq!(snapshot.windows.len(), 2);
        assert_eq!(snapshot.foreground_pid, Some(10));
        let foreground = snapshot.foreground().unwrap();
        assert_eq!(foreground.window_title, "Mail");
        assert_eq!(foreground.file_path.as_deref(), Some("/usr/lib/firefox/firefox"));
    }

    #[test]
    fn test_build_snapshot_drops_unresolvable_windows() {
        let windows = vec![window(None, "no pid", true), window(Some(99), "gone", false)];

        let snapshot = build_snapshot(windows, &resolved());

        assert!(snapshot.windows.is_empty());
        assert_eq!(snapshot.foreground_pid, None);
    }
}
