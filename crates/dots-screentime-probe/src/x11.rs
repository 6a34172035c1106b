// Thin EWMH and MIT-SCREEN-SAVER client over x11rb

use std::time::Duration;

use x11rb::connection::Connection;
use x11rb::protocol::screensaver;
use x11rb::protocol::xproto::{Atom, AtomEnum, ConnectionExt, Window};
use x11rb::rust_connection::RustConnection;

use crate::error::{ProbeError, Result};
use crate::types::WindowInfo;

pub struct X11Session {
    conn: RustConnection,
    root: Window,
}

impl X11Session {
    /// Connect to `$DISPLAY`. Returns None on Wayland-only or headless hosts.
    pub fn connect() -> Option<Self> {
        let (conn, screen_num) = match x11rb::connect(None) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::debug!("No X server available: {}", e);
                return None;
            }
        };
        let root = conn.setup().roots.get(screen_num)?.root;
        Some(Self { conn, root })
    }

    fn atom(&self, name: &str) -> Result<Atom> {
        self.conn
            .intern_atom(false, name.as_bytes())
            .map_err(x11_error)?
            .reply()
            .map(|r| r.atom)
            .map_err(x11_error)
    }

    fn property(&self, window: Window, atom: Atom, kind: impl Into<Atom>) -> Result<Vec<u8>> {
        self.conn
            .get_property(false, window, atom, kind.into(), 0, 1024)
            .map_err(x11_error)?
            .reply()
            .map(|r| r.value)
            .map_err(x11_error)
    }

    fn property_u32s(&self, window: Window, atom: Atom, kind: impl Into<Atom>) -> Result<Vec<u32>> {
        let bytes = self.property(window, atom, kind)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    pub fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        let client_list = self.atom("_NET_CLIENT_LIST")?;
        let active_atom = self.atom("_NET_ACTIVE_WINDOW")?;
        let pid_atom = self.atom("_NET_WM_PID")?;
        let name_atom = self.atom("_NET_WM_NAME")?;

        let active = self.property_u32s(self.root, active_atom, AtomEnum::WINDOW)?.first().copied();
        let clients = self.property_u32s(self.root, client_list, AtomEnum::WINDOW)?;

        let mut windows = Vec::with_capacity(clients.len());
        for window in clients {
            // Windows can vanish between the list and the property reads
            let pid = self
                .property_u32s(window, pid_atom, AtomEnum::CARDINAL)
                .ok()
                .and_then(|v| v.first().copied())
                .filter(|pid| *pid > 0);
            let title = self
                .property(window, name_atom, AtomEnum::ANY)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .filter(|s| !s.is_empty());
            let app_id = self
                .property(window, AtomEnum::WM_CLASS.into(), AtomEnum::STRING)
                .ok()
                .and_then(|bytes| parse_wm_class(&bytes));

            windows.push(WindowInfo { app_id, title, pid, focused: Some(window) == active });
        }
        Ok(windows)
    }

    pub fn idle_time(&self) -> Result<Duration> {
        let info = screensaver::query_info(&self.conn, self.root)
            .map_err(x11_error)?
            .reply()
            .map_err(x11_error)?;
        Ok(Duration::from_millis(u64::from(info.ms_since_user_input)))
    }
}

/// WM_CLASS holds `instance\0class\0`; the instance is the process-like part.
fn parse_wm_class(bytes: &[u8]) -> Option<String> {
    bytes
        .split(|b| *b == 0)
        .next()
        .and_then(|s| std::str::from_utf8(s).ok())
        .filter(|s| !s.is_empty())
        .map(String::from)
}

fn x11_error(e: impl std::fmt::Display) -> ProbeError {
    ProbeError::X11(e.to_string())
}
