use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use dots_screentime_common::config::ControlConfig;
use dots_screentime_proto::frame::{read_message, write_message};
use dots_screentime_proto::IpcRequest;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::service::ScreenTime;

/// Local control socket. Handles one connection at a time: read one
/// request, answer it, close.
pub struct ControlServer {
    service: Arc<ScreenTime>,
    listener: UnixListener,
    socket_path: PathBuf,
    timeout: Duration,
    max_frame_bytes: usize,
}

impl ControlServer {
    /// Bind the socket, replacing a stale file left by a crashed daemon.
    pub async fn bind(service: Arc<ScreenTime>, config: &ControlConfig) -> Result<Self> {
        let socket_path = PathBuf::from(&config.socket_path);
        prepare_socket_path(&socket_path).await?;

        let listener = UnixListener::bind(&socket_path)
            .with_context(|| format!("Failed to bind control socket: {:?}", socket_path))?;
        std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to restrict control socket: {:?}", socket_path))?;

        info!("Control socket listening on {:?}", socket_path);
        Ok(Self {
            service,
            listener,
            socket_path,
            timeout: Duration::from_millis(config.timeout_ms),
            max_frame_bytes: config.max_frame_bytes,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Serve until `shutdown` flips, then remove the socket file.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => self.serve(stream).await,
                    Err(e) => error!("Failed to accept control connection: {}", e),
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            warn!("Failed to remove control socket {:?}: {}", self.socket_path, e);
        }
        info!("Control socket closed");
    }

    async fn serve(&self, mut stream: UnixStream) {
        let request = match timeout(
            self.timeout,
            read_message::<_, IpcRequest>(&mut stream, self.max_frame_bytes),
        )
        .await
        {
            Ok(Ok(request)) => request,
            Ok(Err(e)) => {
                warn!("Rejected control request: {}", e);
                return;
            }
            Err(_) => {
                warn!("Control client sent nothing within {:?}", self.timeout);
                return;
            }
        };

        let response = self.service.handle(request).await;
        match timeout(self.timeout, write_message(&mut stream, &response, self.max_frame_bytes)).await
        {
            Ok(Ok(())) => debug!("Answered {} (success: {})", response.request_id, response.success),
            Ok(Err(e)) => warn!("Failed to send control response: {}", e),
            Err(_) => warn!("Control client stopped reading"),
        }
    }
}

async fn prepare_socket_path(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create socket directory: {:?}", parent))?;
        }
    }

    if !path.exists() {
        return Ok(());
    }

    if UnixStream::connect(path).await.is_ok() {
        bail!("Another daemon is already listening on {:?}", path);
    }

    info!("Removing stale control socket {:?}", path);
    tokio::fs::remove_file(path)
        .await
        .with_context(|| format!("Failed to remove stale socket: {:?}", path))
}
