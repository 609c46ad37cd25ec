//! The three tier migrators, sharing a common capture/restore contract.

pub mod full_clone;
pub mod package;
pub mod registry_file;

use crate::error::EngineError;
use crate::model::{MigrationItem, UserMapping};
use crate::progress::ProgressCallback;
use std::path::Path;

/// Contract every tier migrator implements (spec §4.4). Items are
/// mutated in place by the implementation: Queued → InProgress →
/// {Completed, Failed, Skipped}, with an optional status message.
pub trait TierMigrator {
    fn capture(&self, items: &mut [MigrationItem], out_dir: &Path, progress: &dyn ProgressCallback) -> Result<(), EngineError>;

    fn restore(&self, in_dir: &Path, user_mappings: &[UserMapping], progress: &dyn ProgressCallback) -> Result<(), EngineError>;
}

/// Rewrite every occurrence of `old_prefix` with `new_prefix` at the
/// start of a captured path string, used whenever the destination
/// username differs from the source (spec §4.4 Package tier: "all old
/// user-path prefixes... are rewritten to the new prefix").
pub fn rewrite_user_path_prefix(text: &str, old_prefix: &str, new_prefix: &str) -> String {
    if old_prefix.is_empty() {
        return text.to_string();
    }
    text.replace(old_prefix, new_prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrite_user_path_prefix_replaces_every_occurrence() {
        let text = r#"C:\Users\bill\AppData\Local\App\config.json refers to C:\Users\bill\Documents"#;
        let rewritten = rewrite_user_path_prefix(text, r"C:\Users\bill", r"C:\Users\william");
        assert_eq!(
            rewritten,
            r#"C:\Users\william\AppData\Local\App\config.json refers to C:\Users\william\Documents"#
        );
    }
}
