use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::WindowSource;
use crate::error::{ProbeError, Result};
use crate::types::WindowInfo;
use crate::x11::X11Session;

/// Window source for plain X11 sessions, reading the EWMH client list.
pub struct X11Adapter {
    session: Arc<X11Session>,
}

impl X11Adapter {
    pub fn new(session: Arc<X11Session>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl WindowSource for X11Adapter {
    async fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        let session = Arc::clone(&self.session);
        let windows = tokio::task::spawn_blocking(move || session.list_windows())
            .await
            .map_err(|e| ProbeError::X11(format!("window query task failed: {}", e)))??;
        debug!("X11 reported {} windows", windows.len());
        Ok(windows)
    }

    fn name(&self) -> &'static str {
        "X11"
    }
}
