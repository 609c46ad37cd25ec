//! Path remapping: rewrites occurrences of a source profile path inside
//! the several on-disk artifact kinds that embed it, whenever a
//! mapping's `requires_path_remapping` is true.

use crate::error::EngineError;
use crate::fs_ops;
use std::path::Path;

/// Extensions this module treats as plain-text configuration subject
/// to path rewriting (spec: "INI/XML/JSON detected by extension").
const PLAIN_TEXT_EXTENSIONS: &[&str] = &["ini", "xml", "json"];

/// `true` when `path`'s extension marks it as one of the artifact kinds
/// path remapping covers: shortcuts, URL shortcuts, and plain-text
/// config files. Registry export text is handled separately by the
/// tier migrators since it isn't a standalone file under a profile.
fn is_remappable_file(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some("lnk") | Some("url") => true,
        Some(ext) => PLAIN_TEXT_EXTENSIONS.contains(&ext),
        None => false,
    }
}

/// Rewrite every occurrence of `old_path` with `new_path` inside the
/// eligible files under `root`, in place. Binary `.lnk`/`.url` contents
/// are treated as byte sequences so a literal path embedded as ASCII/
/// UTF-16LE text still matches; this module does not try to parse the
/// shortcut's binary structure.
pub fn remap_tree(root: &Path, old_path: &str, new_path: &str) -> Result<Vec<(std::path::PathBuf, String)>, EngineError> {
    let mut rewritten = Vec::new();
    let entries = fs_ops::enumerate_tree(root, root)?;

    for entry in entries.iter().filter(|e| !e.is_dir && is_remappable_file(&e.source_path)) {
        match remap_file(&entry.source_path, old_path, new_path) {
            Ok(true) => rewritten.push((entry.source_path.clone(), "rewritten".to_string())),
            Ok(false) => {}
            Err(e) => rewritten.push((entry.source_path.clone(), e.to_string())),
        }
    }
    Ok(rewritten)
}

fn remap_file(path: &Path, old_path: &str, new_path: &str) -> Result<bool, EngineError> {
    let bytes = std::fs::read(path).map_err(|e| EngineError::ReadError { path: path.to_path_buf(), source: e })?;

    let old_needle = old_path.as_bytes();
    if !bytes.windows(old_needle.len().max(1)).any(|w| w == old_needle) {
        return Ok(false);
    }

    let text = String::from_utf8_lossy(&bytes);
    let rewritten = text.replace(old_path, new_path);
    std::fs::write(path, rewritten.as_bytes()).map_err(|e| EngineError::WriteError { path: path.to_path_buf(), source: e })?;
    Ok(true)
}

/// Rewrite the escaped `\\` form a path takes inside exported registry
/// text (spec: "exported registry text (where the path appears in
/// escaped `\\` form)").
pub fn remap_registry_text(text: &str, old_path: &str, new_path: &str) -> String {
    let escaped_old = old_path.replace('\\', "\\\\");
    let escaped_new = new_path.replace('\\', "\\\\");
    text.replace(&escaped_old, &escaped_new)
}

/// Rewrite an environment variable value that embeds the old profile
/// path, returning the rewritten value unchanged if it doesn't.
pub fn remap_environment_value(value: &str, old_path: &str, new_path: &str) -> String {
    value.replace(old_path, new_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn remap_tree_rewrites_json_and_ini_but_skips_others() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("settings.json"), br#"{"path":"C:\\Users\\bill\\Documents"}"#).unwrap();
        fs::write(root.join("app.ini"), b"home=C:\\Users\\bill\\Documents").unwrap();
        fs::write(root.join("data.bin"), b"C:\\Users\\bill\\Documents").unwrap();

        let rewritten = remap_tree(root, "C:\\Users\\bill", "C:\\Users\\william").unwrap();
        assert_eq!(rewritten.len(), 2);

        let json = fs::read_to_string(root.join("settings.json")).unwrap();
        assert!(json.contains("C:\\Users\\william"));
        let bin = fs::read(root.join("data.bin")).unwrap();
        assert_eq!(String::from_utf8_lossy(&bin), "C:\\Users\\bill\\Documents");
    }

    #[test]
    fn remap_registry_text_handles_escaped_backslashes() {
        let text = r#""ProfileImagePath"="C:\\\\Users\\\\bill""#;
        let rewritten = remap_registry_text(text, r"C:\Users\bill", r"C:\Users\william");
        assert!(rewritten.contains(r"C:\\Users\\william"));
    }

    #[test]
    fn remap_environment_value_rewrites_substring() {
        let value = "C:\\Users\\bill\\AppData\\Local\\Temp";
        let rewritten = remap_environment_value(value, "C:\\Users\\bill", "C:\\Users\\william");
        assert_eq!(rewritten, "C:\\Users\\william\\AppData\\Local\\Temp");
    }
}
