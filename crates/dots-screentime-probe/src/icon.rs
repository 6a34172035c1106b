use std::path::{Path, PathBuf};

use base64::Engine;
use tracing::debug;

const MAX_ICON_BYTES: u64 = 512 * 1024;
const SIZES: [&str; 5] = ["256x256", "128x128", "64x64", "48x48", "scalable"];
const EXTENSIONS: [&str; 2] = ["png", "svg"];

/// Directories searched for application icons, most specific first.
pub fn icon_search_dirs() -> Vec<PathBuf> {
    let mut themes = Vec::new();
    if let Some(data) = dirs::data_dir() {
        themes.push(data.join("icons/hicolor"));
    }
    themes.push(PathBuf::from("/usr/local/share/icons/hicolor"));
    themes.push(PathBuf::from("/usr/share/icons/hicolor"));

    let mut dirs: Vec<PathBuf> = themes
        .iter()
        .flat_map(|theme| SIZES.iter().map(move |size| theme.join(size).join("apps")))
        .collect();
    dirs.push(PathBuf::from("/usr/share/pixmaps"));
    dirs
}

/// Find an icon file named after the process in any of `dirs`.
pub fn find_icon(process_name: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    let lower = process_name.to_lowercase();
    let mut names = vec![process_name.to_string()];
    if lower != process_name {
        names.push(lower);
    }

    dirs.iter().find_map(|dir| {
        names.iter().find_map(|name| {
            EXTENSIONS
                .iter()
                .map(|ext| dir.join(format!("{}.{}", name, ext)))
                .find(|candidate| candidate.is_file())
        })
    })
}

/// Best-effort icon lookup, returned base64 encoded.
pub fn extract_icon_base64(process_name: &str, dirs: &[PathBuf]) -> Option<String> {
    let path = find_icon(process_name, dirs)?;
    read_base64(&path)
}

fn read_base64(path: &Path) -> Option<String> {
    let size = std::fs::metadata(path).ok()?.len();
    if size > MAX_ICON_BYTES {
        debug!("Skipping oversized icon {}", path.display());
        return None;
    }

    match std::fs::read(path) {
        Ok(bytes) => Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
        Err(e) => {
            debug!("Failed to read icon {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_icon_by_lowercase_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("firefox.png"), b"\x89PNG").unwrap();

        let dirs = vec![dir.path().to_path_buf()];
        let found = find_icon("Firefox", &dirs).unwrap();
        assert!(found.ends_with("firefox.png"));

        let encoded = extract_icon_base64("Firefox", &dirs).unwrap();
        assert_eq!(encoded, "iVBORw==");
    }

    #[test]
    fn test_missing_icon_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(extract_icon_base64("nothing-here", &[dir.path().to_path_buf()]).is_none());
    }

    #[test]
    fn test_search_dirs_include_pixmaps() {
        let dirs = icon_search_dirs();
        assert!(dirs.iter().any(|d| d.ends_with("pixmaps")));
        assert!(dirs.iter().any(|d| d.ends_with("48x48/apps")));
    }
}
