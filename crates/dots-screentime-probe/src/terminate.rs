use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use crate::error::{ProbeError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Ask a process to exit with SIGTERM, escalating to SIGKILL once `grace`
/// has passed. A process that is already gone counts as terminated.
pub async fn terminate_process(pid: u32, grace: Duration) -> Result<()> {
    if pid <= 1 || pid == std::process::id() {
        return Err(ProbeError::Protected(pid));
    }
    let target = Pid::from_raw(i32::try_from(pid).map_err(|_| ProbeError::ProcessNotFound(pid))?);

    match kill(target, Signal::SIGTERM) {
        Ok(()) => info!("Sent SIGTERM to process {}", pid),
        Err(Errno::ESRCH) => {
            debug!("Process {} already exited", pid);
            return Ok(());
        }
        Err(source) => return Err(ProbeError::Signal { pid, source }),
    }

    if wait_for_exit(target, grace).await {
        return Ok(());
    }

    warn!("Process {} ignored SIGTERM, sending SIGKILL", pid);
    match kill(target, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(source) => return Err(ProbeError::Signal { pid, source }),
    }

    if wait_for_exit(target, grace).await {
        Ok(())
    } else {
        Err(ProbeError::StillRunning(pid))
    }
}

async fn wait_for_exit(target: Pid, grace: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + grace;
    loop {
        if !is_running(target) {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn is_running(target: Pid) -> bool {
    !matches!(kill(target, None), Err(Errno::ESRCH))
}
