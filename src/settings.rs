//! Settings infrastructure for toonsp.
//!
//! Settings come from a `settings.toml` next to (or above) the workspace:
//!
//! ```toml
//! [editor]
//! indent = 2
//! strict = true
//! history_limit = 50
//! debounce_ms = 300
//!
//! [lint]
//! indentation = true
//! array_header = true
//! unquoted_key = true
//! ```
//!
//! Every key is optional; missing keys take the defaults shown above.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::codec::DEFAULT_INDENT;
use crate::document::{DocumentOptions, DEFAULT_HISTORY_LIMIT};

pub const SETTINGS_FILE: &str = "settings.toml";

/// Root settings structure loaded from settings.toml.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub editor: EditorSettings,
    pub lint: LintSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EditorSettings {
    /// Indentation unit in spaces, for decoding, encoding and lint.
    pub indent: usize,
    /// Strict decoding.
    pub strict: bool,
    /// Maximum number of undo snapshots per document.
    pub history_limit: usize,
    /// Quiet period before a changed document is re-validated.
    pub debounce_ms: u64,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            indent: DEFAULT_INDENT,
            strict: true,
            history_limit: DEFAULT_HISTORY_LIMIT,
            debounce_ms: 300,
        }
    }
}

/// Toggles for the advisory line checks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LintSettings {
    pub indentation: bool,
    pub array_header: bool,
    pub unquoted_key: bool,
}

impl Default for LintSettings {
    fn default() -> Self {
        Self {
            indentation: true,
            array_header: true,
            unquoted_key: true,
        }
    }
}

impl Settings {
    pub fn document_options(&self) -> DocumentOptions {
        DocumentOptions {
            indent: self.editor.indent.max(1),
            strict: self.editor.strict,
            history_limit: self.editor.history_limit.max(1),
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.editor.debounce_ms)
    }
}

/// Load settings from a settings.toml file.
///
/// Returns default settings if the file doesn't exist or can't be parsed.
pub fn load_settings(path: &Path) -> Settings {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to parse settings.toml");
                Settings::default()
            }
        },
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no readable settings.toml");
            Settings::default()
        }
    }
}

/// Discover settings.toml by searching up the directory tree, then direct children.
///
/// Search order:
/// 1. Walk up from `start_dir` to filesystem root
/// 2. If not found, check immediate child directories of `start_dir`
///
/// Returns `(settings, settings_dir)`. If nothing is found, returns
/// `(Settings::default(), start_dir)`.
pub fn discover_settings(start_dir: &Path) -> (Settings, PathBuf) {
    let mut current = Some(start_dir);
    while let Some(dir) = current {
        let candidate = dir.join(SETTINGS_FILE);
        if candidate.is_file() {
            return (load_settings(&candidate), dir.to_path_buf());
        }
        current = dir.parent();
    }

    if let Ok(entries) = std::fs::read_dir(start_dir) {
        let mut dirs: Vec<PathBuf> = entries
            .flatten()
            .filter(|entry| entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect();
        dirs.sort();
        for dir in dirs {
            let candidate = dir.join(SETTINGS_FILE);
            if candidate.is_file() {
                return (load_settings(&candidate), dir);
            }
        }
    }

    (Settings::default(), start_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.editor.indent, 2);
        assert!(settings.editor.strict);
        assert_eq!(settings.editor.history_limit, 50);
        assert_eq!(settings.debounce(), Duration::from_millis(300));
        assert!(settings.lint.indentation && settings.lint.array_header && settings.lint.unquoted_key);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let settings: Settings = toml::from_str("[editor]\nindent = 4\n[lint]\nunquoted_key = false").unwrap();
        assert_eq!(settings.editor.indent, 4);
        assert_eq!(settings.editor.history_limit, 50);
        assert!(!settings.lint.unquoted_key);
        assert!(settings.lint.indentation);
        assert_eq!(settings.document_options().indent, 4);
    }

    #[test]
    fn unparsable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "[editor\nindent = ").unwrap();
        assert_eq!(load_settings(&path), Settings::default());
        assert_eq!(load_settings(&dir.path().join("missing.toml")), Settings::default());
    }

    #[test]
    fn discovers_settings_in_ancestor() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join(SETTINGS_FILE), "[editor]\nstrict = false").unwrap();
        let nested = root.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        let (settings, dir) = discover_settings(&nested);
        assert!(!settings.editor.strict);
        assert_eq!(dir, root.path());
    }

    #[test]
    fn discovers_settings_in_child_directory() {
        let root = tempfile::tempdir().unwrap();
        let child = root.path().join("config");
        std::fs::create_dir(&child).unwrap();
        std::fs::write(child.join(SETTINGS_FILE), "[editor]\nhistory_limit = 5").unwrap();

        let (settings, dir) = discover_settings(root.path());
        assert_eq!(settings.editor.history_limit, 5);
        assert_eq!(dir, child);
    }
}
