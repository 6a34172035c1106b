use std::collections::{HashMap, HashSet};

use chrono::{DateTime, SubsecRound, Utc};
use dots_screentime_common::{AppIdentity, UsageSession};
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::zone::LocalZone;

/// Shells, desktop plumbing and our own binaries never get a session.
const DEFAULT_IGNORED: &[&str] = &[
    "bash",
    "sh",
    "zsh",
    "fish",
    "systemd",
    "dbus-daemon",
    "xorg",
    "xwayland",
    "gnome-shell",
    "gnome-session-binary",
    "plasmashell",
    "kwin_x11",
    "kwin_wayland",
    "ksmserver",
    "xfwm4",
    "xfdesktop",
    "xfce4-panel",
    "waybar",
    "swaybg",
    "swaylock",
    "mako",
    "dunst",
    "pipewire",
    "wireplumber",
    "polkit-gnome-authentication-agent-1",
    "dots-screentime-daemon",
    "dots-screentime-ctl",
];

/// One visible process for this tick, already resolved to its app.
#[derive(Debug, Clone)]
pub struct Observation {
    pub pid: u32,
    pub app: AppIdentity,
    pub window_title: String,
    pub site_domain: Option<String>,
}

/// Runtime record of an open session. Never persisted directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedProcess {
    /// Id the first persisted part will carry
    pub session_id: Uuid,
    pub pid: u32,
    pub app_id: Uuid,
    pub process_name: String,
    pub display_name: String,
    pub category: String,
    pub window_title: String,
    pub site_domain: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub total_seconds: i64,
    pub foreground_seconds: i64,
    pub is_foreground: bool,
}

impl TrackedProcess {
    fn open(observation: Observation, now: DateTime<Utc>, is_foreground: bool) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            pid: observation.pid,
            app_id: observation.app.id,
            category: observation.app.category_or_default().to_string(),
            process_name: observation.app.process_name,
            display_name: observation.app.display_name,
            window_title: observation.window_title,
            site_domain: observation.site_domain,
            first_seen: now,
            last_seen: now,
            total_seconds: 0,
            foreground_seconds: 0,
            is_foreground,
        }
    }

    /// Close at `end` and cut the interval at local midnight.
    fn close(&self, end: DateTime<Utc>, zone: &LocalZone) -> Vec<UsageSession> {
        let mut session =
            UsageSession::closed(self.app_id, &self.window_title, self.first_seen, end)
                .with_site_domain(self.site_domain.clone());
        session.id = self.session_id;
        if session.duration_seconds == 0 {
            return Vec::new();
        }
        zone.split_session(&session)
    }
}

/// A process whose session ended this tick, with its persisted parts.
#[derive(Debug, Clone)]
pub struct ClosedProcess {
    pub process: TrackedProcess,
    pub sessions: Vec<UsageSession>,
}

impl ClosedProcess {
    pub fn duration_seconds(&self) -> i64 {
        self.sessions.iter().map(|s| s.duration_seconds).sum()
    }
}

#[derive(Debug, Default)]
pub struct TickOutcome {
    pub opened: Vec<TrackedProcess>,
    pub closed: Vec<ClosedProcess>,
}

impl TickOutcome {
    pub fn changed(&self) -> bool {
        !self.opened.is_empty() || !self.closed.is_empty()
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    open: HashMap<u32, TrackedProcess>,
    last_foreground: Option<u32>,
    switches: i64,
}

/// Per-process session state machine driven once per sampling tick.
///
/// Only the sampling loop mutates it; the control server reads live
/// sessions concurrently through `open_sessions`.
pub struct SessionTracker {
    state: RwLock<TrackerState>,
    ignored: HashSet<String>,
    zone: LocalZone,
}

impl SessionTracker {
    pub fn new(extra_ignored: &[String], zone: LocalZone) -> Self {
        let ignored = DEFAULT_IGNORED
            .iter()
            .map(|name| name.to_string())
            .chain(extra_ignored.iter().map(|name| name.to_lowercase()))
            .collect();

        Self { state: RwLock::new(TrackerState::default()), ignored, zone }
    }

    pub fn is_ignored(&self, process_name: &str) -> bool {
        self.ignored.contains(&process_name.to_lowercase())
    }

    pub fn zone(&self) -> LocalZone {
        self.zone
    }

    /// Advance every session by one snapshot.
    ///
    /// Processes seen for the first time open a session at `now`, processes
    /// seen again extend theirs, and processes missing from `observations`
    /// are closed at `now`.
    pub fn tick(
        &self,
        observations: Vec<Observation>,
        foreground_pid: Option<u32>,
        now: DateTime<Utc>,
    ) -> TickOutcome {
        let now = now.trunc_subsecs(0);
        let mut outcome = TickOutcome::default();
        let mut state = self.state.write();

        if foreground_pid.is_some() && foreground_pid != state.last_foreground {
            state.switches += 1;
        }
        state.last_foreground = foreground_pid;

        let mut seen = HashSet::with_capacity(observations.len());
        for observation in observations {
            if self.is_ignored(&observation.app.process_name) || !seen.insert(observation.pid) {
                continue;
            }
            let is_foreground = foreground_pid == Some(observation.pid);

            // A reused pid now belonging to another app starts over
            let reused = state
                .open
                .get(&observation.pid)
                .is_some_and(|existing| existing.app_id != observation.app.id);
            if reused {
                if let Some(process) = state.open.remove(&observation.pid) {
                    let sessions = process.close(now, &self.zone);
                    outcome.closed.push(ClosedProcess { process, sessions });
                }
            }

            match state.open.get_mut(&observation.pid) {
                Some(process) => {
                    let elapsed = (now - process.last_seen).num_seconds().max(0);
                    process.total_seconds += elapsed;
                    if is_foreground {
                        process.foreground_seconds += elapsed;
                    }
                    process.last_seen = now;
                    process.is_foreground = is_foreground;
                    if !observation.window_title.is_empty() {
                        process.window_title = observation.window_title;
                    }
                    if observation.site_domain.is_some() {
                        process.site_domain = observation.site_domain;
                    }
                }
                None => {
                    let process = TrackedProcess::open(observation, now, is_foreground);
                    debug!("Opened session for {} (pid {})", process.process_name, process.pid);
                    outcome.opened.push(process.clone());
                    state.open.insert(process.pid, process);
                }
            }
        }

        let gone: Vec<u32> = state.open.keys().filter(|pid| !seen.contains(pid)).copied().collect();
        for pid in gone {
            if let Some(process) = state.open.remove(&pid) {
                let sessions = process.close(now, &self.zone);
                debug!(
                    "Closed session for {} (pid {}) after {}s",
                    process.process_name,
                    pid,
                    (now - process.first_seen).num_seconds()
                );
                outcome.closed.push(ClosedProcess { process, sessions });
            }
        }

        outcome
    }

    /// Close every open session at `now`. Used when the engine stops.
    pub fn close_all(&self, now: DateTime<Utc>) -> Vec<ClosedProcess> {
        let now = now.trunc_subsecs(0);
        let mut state = self.state.write();
        state.last_foreground = None;
        state
            .open
            .drain()
            .map(|(_, process)| {
                let sessions = process.close(now, &self.zone);
                ClosedProcess { process, sessions }
            })
            .collect()
    }

    /// Forget accumulated history: zero the switch counter and restart
    /// every open session at `now`.
    pub fn reset(&self, now: DateTime<Utc>) {
        let now = now.trunc_subsecs(0);
        let mut state = self.state.write();
        state.switches = 0;
        for process in state.open.values_mut() {
            process.session_id = Uuid::new_v4();
            process.first_seen = now;
            process.last_seen = now;
            process.total_seconds = 0;
            process.foreground_seconds = 0;
        }
    }

    pub fn open_sessions(&self) -> Vec<TrackedProcess> {
        self.state.read().open.values().cloned().collect()
    }

    pub fn switch_count(&self) -> i64 {
        self.state.read().switches
    }

    pub fn open_count(&self) -> usize {
        self.state.read().open.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, TimeZone};

    fn zone() -> LocalZone {
        LocalZone::Fixed(FixedOffset::east_opt(2 * 3600).unwrap())
    }

    fn app(name: &str) -> AppIdentity {
        AppIdentity {
            id: Uuid::new_v4(),
            process_name: name.to_string(),
            display_name: name.to_string(),
            category: None,
            file_path: None,
            icon_base64: None,
        }
    }

    fn seen(pid: u32, app: &AppIdentity, title: &str) -> Observation {
        Observation { pid, app: app.clone(), window_title: title.to_string(), site_domain: None }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_bdd_given_new_process_when_first_seen_then_session_opens() {
        let tracker = SessionTracker::new(&[], zone());
        let editor = app("code");

        let outcome = tracker.tick(vec![seen(100, &editor, "main.rs")], Some(100), t0());

        assert_eq!(outcome.opened.len(), 1);
        assert!(outcome.closed.is_empty());
        let open = tracker.open_sessions();
        assert_eq!(open[0].first_seen, t0());
        assert!(open[0].is_foreground);
    }

    #[test]
    fn test_bdd_given_open_session_when_process_disappears_then_duration_matches_presence() {
        let tracker = SessionTracker::new(&[], zone());
        let editor = app("code");

        for second in 0..=30 {
            let now = t0() + Duration::seconds(second);
            tracker.tick(vec![seen(100, &editor, "main.rs")], Some(100), now);
        }
        let outcome = tracker.tick(vec![], None, t0() + Duration::seconds(31));

        assert_eq!(outcome.closed.len(), 1);
        let closed = &outcome.closed[0];
        assert_eq!(closed.sessions.len(), 1);
        assert_eq!(closed.duration_seconds(), 31);
        assert_eq!(closed.process.total_seconds, 30);
        assert_eq!(closed.process.foreground_seconds, 30);
        assert_eq!(tracker.open_count(), 0);
    }

    #[test]
    fn test_bdd_given_background_process_when_ticking_then_only_total_grows() {
        let tracker = SessionTracker::new(&[], zone());
        let editor = app("code");
        let player = app("spotify");

        for second in 0..5 {
            let now = t0() + Duration::seconds(second);
            tracker.tick(vec![seen(1, &editor, ""), seen(2, &player, "")], Some(1), now);
        }

        let open = tracker.open_sessions();
        let player_state = open.iter().find(|p| p.pid == 2).unwrap();
        assert_eq!(player_state.total_seconds, 4);
        assert_eq!(player_state.foreground_seconds, 0);
        assert!(!player_state.is_foreground);
    }

    #[test]
    fn test_bdd_given_session_across_midnight_when_closed_then_split_in_two() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let tracker = SessionTracker::new(&[], zone());
        let editor = app("code");
        let start = offset.with_ymd_and_hms(2024, 5, 1, 23, 55, 0).unwrap().with_timezone(&Utc);
        let end = offset.with_ymd_and_hms(2024, 5, 2, 0, 5, 0).unwrap().with_timezone(&Utc);

        tracker.tick(vec![seen(7, &editor, "notes")], Some(7), start);
        let outcome = tracker.tick(vec![], None, end);

        let parts = &outcome.closed[0].sessions;
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].end_time, parts[1].start_time);
        assert_eq!(parts[0].duration_seconds, 300);
        assert_eq!(parts[1].duration_seconds, 300);
        assert!(parts.iter().all(|p| p.app_id == editor.id && p.window_title == "notes"));
    }

    #[test]
    fn test_bdd_given_denylisted_process_when_seen_then_never_tracked() {
        let tracker = SessionTracker::new(&["Conky".to_string()], zone());

        let outcome = tracker.tick(
            vec![seen(1, &app("bash"), ""), seen(2, &app("conky"), "")],
            Some(1),
            t0(),
        );

        assert!(outcome.opened.is_empty());
        assert_eq!(tracker.open_count(), 0);
        assert!(tracker.is_ignored("gnome-shell"));
        assert!(!tracker.is_ignored("firefox"));
    }

    #[test]
    fn test_bdd_given_foreground_changes_when_ticking_then_switches_counted() {
        let tracker = SessionTracker::new(&[], zone());
        let a = app("code");
        let b = app("firefox");
        let both = || vec![seen(1, &a, ""), seen(2, &b, "")];

        tracker.tick(both(), Some(1), t0());
        tracker.tick(both(), Some(1), t0() + Duration::seconds(1));
        tracker.tick(both(), Some(2), t0() + Duration::seconds(2));
        tracker.tick(both(), Some(1), t0() + Duration::seconds(3));

        assert_eq!(tracker.switch_count(), 3);

        tracker.reset(t0() + Duration::seconds(4));
        assert_eq!(tracker.switch_count(), 0);
        assert!(tracker.open_sessions().iter().all(|p| p.first_seen == t0() + Duration::seconds(4)));
    }

    #[test]
    fn test_bdd_given_latest_title_when_closed_then_session_uses_it() {
        let tracker = SessionTracker::new(&[], zone());
        let browser = app("firefox");

        tracker.tick(vec![seen(3, &browser, "Inbox")], Some(3), t0());
        let mut later = seen(3, &browser, "News - example.org");
        later.site_domain = Some("example.org".to_string());
        tracker.tick(vec![later], Some(3), t0() + Duration::seconds(10));
        tracker.tick(vec![seen(3, &browser, "")], Some(3), t0() + Duration::seconds(20));

        let closed = tracker.close_all(t0() + Duration::seconds(25));
        let session = &closed[0].sessions[0];
        assert_eq!(session.window_title, "News - example.org");
        assert_eq!(session.site_domain.as_deref(), Some("example.org"));
        assert_eq!(session.duration_seconds, 25);
    }

    #[test]
    fn test_bdd_given_reused_pid_when_app_differs_then_old_session_closes() {
        let tracker = SessionTracker::new(&[], zone());
        let first = app("code");
        let second = app("vlc");

        tracker.tick(vec![seen(9, &first, "")], Some(9), t0());
        let outcome = tracker.tick(vec![seen(9, &second, "")], Some(9), t0() + Duration::seconds(5));

        assert_eq!(outcome.closed.len(), 1);
        assert_eq!(outcome.closed[0].process.app_id, first.id);
        assert_eq!(outcome.opened.len(), 1);
        let open = tracker.open_sessions();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].app_id, second.id);
    }

    #[test]
    fn test_zero_length_session_is_not_persisted() {
        let tracker = SessionTracker::new(&[], zone());
        tracker.tick(vec![seen(1, &app("code"), "")], Some(1), t0());

        let closed = tracker.close_all(t0());
        assert_eq!(closed.len(), 1);
        assert!(closed[0].sessions.is_empty());
    }
}
