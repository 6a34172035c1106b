use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use dots_screentime_common::AppIdentity;
use dots_screentime_db::queries::AppQueries;
use dots_screentime_db::{Database, NewApp};
use dots_screentime_probe::OsProbe;
use parking_lot::RwLock;
use tracing::{debug, info};

const BUILTIN_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Browser",
        &[
            "chrome", "google-chrome", "chromium", "chromium-browser", "msedge",
            "microsoft-edge", "firefox", "firefox-esr", "librewolf", "opera", "brave",
            "brave-browser", "vivaldi", "epiphany",
        ],
    ),
    (
        "Development",
        &[
            "devenv", "code", "code-oss", "codium", "idea", "pycharm", "rider", "clion",
            "goland", "webstorm", "nvim", "emacs", "zed", "gnome-builder",
        ],
    ),
    ("Games", &["steam", "steamwebhelper", "dota2", "csgo", "cs2", "lutris", "heroic", "minecraft-launcher"]),
    (
        "Communication",
        &[
            "slack", "discord", "teams", "teams-for-linux", "zoom", "skype", "signal-desktop",
            "telegram-desktop", "thunderbird", "element-desktop",
        ],
    ),
    (
        "Productivity",
        &[
            "winword", "excel", "powerpnt", "outlook", "onenote", "soffice.bin", "libreoffice",
            "obsidian", "evince", "okular",
        ],
    ),
    ("Media", &["spotify", "vlc", "mpc-hc", "mpv", "totem", "rhythmbox", "obs"]),
];

const DISPLAY_NAMES: &[(&str, &str)] = &[
    ("chrome", "Google Chrome"),
    ("google-chrome", "Google Chrome"),
    ("chromium", "Chromium"),
    ("msedge", "Microsoft Edge"),
    ("microsoft-edge", "Microsoft Edge"),
    ("firefox", "Firefox"),
    ("brave", "Brave"),
    ("opera", "Opera"),
    ("code", "VS Code"),
    ("code-oss", "VS Code"),
    ("codium", "VSCodium"),
    ("devenv", "Visual Studio"),
    ("idea", "IntelliJ IDEA"),
    ("pycharm", "PyCharm"),
    ("slack", "Slack"),
    ("discord", "Discord"),
    ("teams", "Microsoft Teams"),
    ("teams-for-linux", "Microsoft Teams"),
    ("zoom", "Zoom"),
    ("spotify", "Spotify"),
    ("vlc", "VLC"),
    ("steam", "Steam"),
    ("soffice.bin", "LibreOffice"),
    ("winword", "Microsoft Word"),
    ("excel", "Microsoft Excel"),
    ("powerpnt", "Microsoft PowerPoint"),
    ("outlook", "Microsoft Outlook"),
];

/// Process name to category lookup.
#[derive(Debug, Clone)]
pub struct CategoryTable {
    by_process: HashMap<String, String>,
}

impl CategoryTable {
    pub fn builtin() -> Self {
        let mut by_process = HashMap::new();
        for (category, names) in BUILTIN_CATEGORIES {
            for name in *names {
                by_process.insert(name.to_string(), category.to_string());
            }
        }
        Self { by_process }
    }

    /// Built-in table with entries from a `{ "Category": ["proc", ...] }`
    /// JSON file taking precedence.
    pub fn with_overrides(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read category rules: {:?}", path))?;
        let overrides: HashMap<String, Vec<String>> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse category rules: {:?}", path))?;

        let mut table = Self::builtin();
        let mut count = 0;
        for (category, names) in overrides {
            for name in names {
                table.by_process.insert(name.to_lowercase(), category.clone());
                count += 1;
            }
        }
        info!("Loaded {} category overrides from {:?}", count, path);
        Ok(table)
    }

    pub fn classify(&self, process_name: &str) -> Option<&str> {
        self.by_process.get(&process_name.to_lowercase()).map(String::as_str)
    }
}

/// Human readable name for a process.
pub fn display_name(process_name: &str) -> String {
    let lower = process_name.to_lowercase();
    if let Some((_, name)) = DISPLAY_NAMES.iter().find(|(process, _)| *process == lower) {
        return name.to_string();
    }

    let mut chars = process_name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Maps process names to persisted `AppIdentity` rows, creating them on
/// first sight.
pub struct IdentityResolver {
    db: Database,
    probe: Arc<dyn OsProbe>,
    categories: CategoryTable,
    cache: RwLock<HashMap<String, AppIdentity>>,
}

impl IdentityResolver {
    pub fn new(db: Database, probe: Arc<dyn OsProbe>, categories: CategoryTable) -> Self {
        Self { db, probe, categories, cache: RwLock::new(HashMap::new()) }
    }

    pub async fn resolve(&self, process_name: &str, file_path: Option<&str>) -> Result<AppIdentity> {
        let key = process_name.to_lowercase();
        if let Some(app) = self.cache.read().get(&key) {
            return Ok(app.clone());
        }

        let row = match AppQueries::get_by_process_name(&self.db, &key).await? {
            Some(existing) => {
                if existing.icon_base64.is_none() || existing.file_path.is_none() {
                    let icon = self.probe.icon_base64(&key);
                    AppQueries::fill_details(&self.db, &existing.id, file_path, icon.as_deref())
                        .await?;
                    AppQueries::get_by_id(&self.db, &existing.id).await?
                } else {
                    existing
                }
            }
            None => {
                let mut app = NewApp::new(key.clone(), display_name(process_name));
                app.category = self.categories.classify(&key).map(str::to_string);
                app.file_path = file_path.map(str::to_string);
                app.icon_base64 = self.probe.icon_base64(&key);

                let created = AppQueries::get_or_create(&self.db, app)
                    .await
                    .with_context(|| format!("Failed to create app identity for {}", key))?;
                info!(
                    "New app identified: {} ({})",
                    created.display_name,
                    created.category.as_deref().unwrap_or("uncategorized")
                );
                created
            }
        };

        let app = AppIdentity::try_from(row)?;
        debug!("Resolved {} to app {}", key, app.id);
        self.cache.write().insert(key, app.clone());
        Ok(app)
    }

    /// Drop cached identities, e.g. after a category relabel.
    pub fn invalidate(&self) {
        self.cache.write().clear();
    }
}
