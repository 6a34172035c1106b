use std::collections::HashMap;
use std::path::Path;

use parking_lot::Mutex;
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Name and executable of a live process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub name: String,
    pub exe: Option<String>,
}

/// Resolves pids to process names through a reused `sysinfo::System`.
pub struct ProcessResolver {
    system: Mutex<System>,
}

impl Default for ProcessResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessResolver {
    pub fn new() -> Self {
        Self { system: Mutex::new(System::new()) }
    }

    /// Resolve the given pids. Pids that exited or cannot be read are left
    /// out of the result.
    pub fn resolve(&self, pids: &[u32]) -> HashMap<u32, ProcessInfo> {
        let wanted: Vec<Pid> = pids.iter().map(|pid| Pid::from_u32(*pid)).collect();
        let mut system = self.system.lock();
        system.refresh_processes(ProcessesToUpdate::Some(&wanted));

        wanted
            .iter()
            .filter_map(|pid| {
                let process = system.process(*pid)?;
                let exe = process.exe().map(|p| p.to_string_lossy().to_string());
                let name = process_name(&process.name().to_string_lossy(), exe.as_deref())?;
                Some((pid.as_u32(), ProcessInfo { name, exe }))
            })
            .collect()
    }

    pub fn is_alive(&self, pid: u32) -> bool {
        let pid = Pid::from_u32(pid);
        let mut system = self.system.lock();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]));
        system.process(pid).is_some()
    }
}

/// Pick the name a process is tracked under.
///
/// The kernel truncates `comm` to 15 bytes, so the executable's file name
/// wins when it extends the short name.
pub fn process_name(comm: &str, exe: Option<&str>) -> Option<String> {
    let exe_name = exe
        .and_then(|exe| Path::new(exe).file_name())
        .map(|name| name.to_string_lossy().trim_end_matches(" (deleted)").to_string())
        .filter(|name| !name.is_empty());

    let comm = comm.trim();
    match exe_name {
        Some(exe_name) if comm.is_empty() || exe_name.starts_with(comm) => Some(exe_name),
        _ if !comm.is_empty() => Some(comm.to_string()),
        _ => None,
    }
}
