use std::env;

use crate::types::CompositorType;

/// Session variables that decide which window source lists windows.
///
/// Empty values count as unset; login managers sometimes export them blank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionEnv {
    pub niri_socket: Option<String>,
    pub sway_socket: Option<String>,
    pub hyprland_signature: Option<String>,
    pub display: Option<String>,
    pub wayland_display: Option<String>,
}

impl SessionEnv {
    pub fn from_process() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            niri_socket: read("NIRI_SOCKET"),
            sway_socket: read("SWAYSOCK"),
            hyprland_signature: read("HYPRLAND_INSTANCE_SIGNATURE"),
            display: read("DISPLAY"),
            wayland_display: read("WAYLAND_DISPLAY"),
        }
    }

    /// Compositor IPC wins over X11. A Wayland session without a known
    /// compositor is `Unknown` even when XWayland sets `DISPLAY`, since X11
    /// would only see XWayland clients.
    pub fn compositor(&self) -> CompositorType {
        if self.niri_socket.is_some() {
            CompositorType::Niri
        } else if self.sway_socket.is_some() {
            CompositorType::Sway
        } else if self.hyprland_signature.is_some() {
            CompositorType::Hyprland
        } else if self.display.is_some() && self.wayland_display.is_none() {
            CompositorType::X11
        } else {
            CompositorType::Unknown
        }
    }
}

pub fn detect_compositor() -> CompositorType {
    SessionEnv::from_process().compositor()
}

/// Binary the window source shells out to, if any.
pub fn ipc_command(compositor: CompositorType) -> Option<&'static str> {
    match compositor {
        CompositorType::Niri => Some("niri"),
        CompositorType::Sway => Some("swaymsg"),
        CompositorType::Hyprland => Some("hyprctl"),
        CompositorType::X11 | CompositorType::Unknown => None,
    }
}

/// Whether the source for `compositor` can list windows on this machine.
pub fn compositor_command_exists(compositor: CompositorType) -> bool {
    match ipc_command(compositor) {
        Some(command) => which::which(command).is_ok(),
        None => compositor == CompositorType::X11,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn session(vars: &[(&str, &str)]) -> SessionEnv {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        SessionEnv::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_compositor_sockets_take_precedence() {
        let env = session(&[
            ("SWAYSOCK", "/run/user/1000/sway-ipc.sock"),
            ("NIRI_SOCKET", "/run/user/1000/niri.sock"),
            ("WAYLAND_DISPLAY", "wayland-1"),
            ("DISPLAY", ":0"),
        ]);
        assert_eq!(env.compositor(), CompositorType::Niri);

        let env = session(&[("HYPRLAND_INSTANCE_SIGNATURE", "abc"), ("DISPLAY", ":1")]);
        assert_eq!(env.compositor(), CompositorType::Hyprland);
    }

    #[test]
    fn test_plain_x_session_uses_x11() {
        assert_eq!(session(&[("DISPLAY", ":0")]).compositor(), CompositorType::X11);
    }

    #[test]
    fn test_xwayland_alone_is_unknown() {
        let env = session(&[("DISPLAY", ":0"), ("WAYLAND_DISPLAY", "wayland-0")]);
        assert_eq!(env.compositor(), CompositorType::Unknown);
        assert_eq!(session(&[]).compositor(), CompositorType::Unknown);
    }

    #[test]
    fn test_blank_variables_are_ignored() {
        let env = session(&[("NIRI_SOCKET", ""), ("SWAYSOCK", "  "), ("DISPLAY", ":0")]);
        assert_eq!(env.niri_socket, None);
        assert_eq!(env.compositor(), CompositorType::X11);
    }

    #[test]
    fn test_ipc_commands() {
        assert_eq!(ipc_command(CompositorType::Sway), Some("swaymsg"));
        assert_eq!(ipc_command(CompositorType::X11), None);
        assert!(compositor_command_exists(CompositorType::X11));
        assert!(!compositor_command_exists(CompositorType::Unknown));
    }
}
