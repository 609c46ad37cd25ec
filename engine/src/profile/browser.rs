//! Browser data capture/restore: bookmarks, extension list, and
//! settings for Chrome, Firefox, and Edge. The saved-password store is
//! captured only when both the engine-wide config and the per-mapping
//! `allow_password_capture` gate allow it.

use crate::error::EngineError;
use crate::fs_ops;
use crate::model::BrowserProfile;
use std::path::{Path, PathBuf};

/// Subpaths captured unconditionally for every supported browser.
fn always_captured_subpaths(browser: &str) -> Vec<&'static str> {
    match browser {
        "chrome" | "edge" => vec!["Bookmarks", "Extensions", "Preferences"],
        "firefox" => vec!["places.sqlite", "extensions.json", "prefs.js"],
        _ => vec![],
    }
}

/// The saved-password store's subpath for a browser, captured only
/// when password capture is allowed.
fn password_store_subpath(browser: &str) -> Option<&'static str> {
    match browser {
        "chrome" | "edge" => Some("Login Data"),
        "firefox" => Some("logins.json"),
        _ => None,
    }
}

/// Capture one browser profile into `out_dir`, returning the relative
/// paths actually copied.
pub fn capture_profile(profile: &BrowserProfile, out_dir: &Path, allow_password_capture: bool) -> Result<Vec<String>, EngineError> {
    let mut captured = Vec::new();
    std::fs::create_dir_all(out_dir).map_err(|e| EngineError::DirectoryCreationFailed { path: out_dir.to_path_buf(), source: e })?;

    let mut subpaths = always_captured_subpaths(&profile.browser);
    if allow_password_capture {
        if let Some(password_subpath) = password_store_subpath(&profile.browser) {
            subpaths.push(password_subpath);
        }
    }

    for subpath in subpaths {
        let src = profile.profile_path.join(subpath);
        if !src.exists() {
            continue;
        }
        let dst = out_dir.join(subpath);
        if src.is_dir() {
            fs_ops::copy_tree(&src, &dst)?;
        } else {
            fs_ops::copy_file_with_metadata(&src, &dst)?;
        }
        captured.push(subpath.to_string());
    }

    Ok(captured)
}

/// Restore a previously captured browser profile directory into
/// `destination_profile_path`.
pub fn restore_profile(captured_dir: &Path, destination_profile_path: &Path) -> Result<Vec<(PathBuf, String)>, EngineError> {
    fs_ops::copy_tree(captured_dir, destination_profile_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_skips_password_store_when_not_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let profile_path = dir.path().join("chrome-profile");
        std::fs::create_dir_all(&profile_path).unwrap();
        std::fs::write(profile_path.join("Bookmarks"), "{}").unwrap();
        std::fs::write(profile_path.join("Login Data"), "secret").unwrap();

        let profile = BrowserProfile { browser: "chrome".to_string(), profile_path: profile_path.clone(), profile_name: "Default".to_string() };
        let out_dir = dir.path().join("out");

        let captured = capture_profile(&profile, &out_dir, false).unwrap();
        assert!(captured.contains(&"Bookmarks".to_string()));
        assert!(!captured.contains(&"Login Data".to_string()));
        assert!(!out_dir.join("Login Data").exists());
    }

    #[test]
    fn capture_includes_password_store_when_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let profile_path = dir.path().join("chrome-profile");
        std::fs::create_dir_all(&profile_path).unwrap();
        std::fs::write(profile_path.join("Login Data"), "secret").unwrap();

        let profile = BrowserProfile { browser: "chrome".to_string(), profile_path, profile_name: "Default".to_string() };
        let out_dir = dir.path().join("out");

        let captured = capture_profile(&profile, &out_dir, true).unwrap();
        assert!(captured.contains(&"Login Data".to_string()));
    }
}
