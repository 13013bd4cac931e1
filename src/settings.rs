//! Settings infrastructure for spanmark.
//!
//! This module loads `spanmark.toml` files that tune selection timing, the
//! cross-context request timeout, the notes document and the removal policy.
//! Every field is optional; accessors fill in the defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Name of the settings file looked up by [`discover_settings`].
pub const SETTINGS_FILE: &str = "spanmark.toml";

/// Root settings structure loaded from spanmark.toml.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct Settings {
    pub selection: Option<SelectionSettings>,
    pub transport: Option<TransportSettings>,
    pub notes: Option<NotesSettings>,
    pub highlight: Option<HighlightSettings>,
}

/// Selection change detection timing.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SelectionSettings {
    /// Quiet period before a burst of change notifications is checked.
    pub debounce_ms: Option<u64>,
    /// Delay before checking after a pointer or key interaction.
    pub prompt_check_ms: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct TransportSettings {
    /// Bounded wait for a reply from a document context.
    pub request_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct NotesSettings {
    /// URI scheme that marks a document as the notes document.
    pub scheme: Option<String>,
    /// `id` of the element that holds the notes.
    pub root_id: Option<String>,
    pub word_limit: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct HighlightSettings {
    /// Whether removal also strips background styling the engine did not
    /// author.
    pub strip_foreign_backgrounds: Option<bool>,
}

impl Settings {
    pub fn debounce(&self) -> Duration {
        let ms = self.selection.as_ref().and_then(|s| s.debounce_ms);
        Duration::from_millis(ms.unwrap_or(100))
    }

    pub fn prompt_check(&self) -> Duration {
        let ms = self.selection.as_ref().and_then(|s| s.prompt_check_ms);
        Duration::from_millis(ms.unwrap_or(10))
    }

    pub fn request_timeout(&self) -> Duration {
        let ms = self.transport.as_ref().and_then(|t| t.request_timeout_ms);
        Duration::from_millis(ms.unwrap_or(750))
    }

    pub fn notes_scheme(&self) -> &str {
        self.notes
            .as_ref()
            .and_then(|n| n.scheme.as_deref())
            .unwrap_or("notes")
    }

    pub fn notes_root_id(&self) -> &str {
        self.notes
            .as_ref()
            .and_then(|n| n.root_id.as_deref())
            .unwrap_or("notes")
    }

    pub fn word_limit(&self) -> usize {
        self.notes
            .as_ref()
            .and_then(|n| n.word_limit)
            .unwrap_or(350)
    }

    pub fn strip_foreign_backgrounds(&self) -> bool {
        self.highlight
            .as_ref()
            .and_then(|h| h.strip_foreign_backgrounds)
            .unwrap_or(true)
    }
}

/// Load settings from a TOML file.
///
/// A missing file yields defaults; a malformed one logs a warning and also
/// yields defaults.
pub fn load_settings(path: &Path) -> Settings {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to parse settings");
                Settings::default()
            }
        },
        Err(_) => Settings::default(),
    }
}

/// Find `spanmark.toml` by walking up from `start_dir`, then by checking
/// its immediate child directories.
///
/// Returns the settings and the directory they were found in (or
/// `start_dir` when none exist).
pub fn discover_settings(start_dir: &Path) -> (Settings, PathBuf) {
    // Phase 1: Walk up from start_dir
    let mut current = Some(start_dir);
    while let Some(dir) = current {
        let candidate = dir.join(SETTINGS_FILE);
        if candidate.is_file() {
            return (load_settings(&candidate), dir.to_path_buf());
        }
        current = dir.parent();
    }

    // Phase 2: Check immediate child directories
    if let Ok(entries) = std::fs::read_dir(start_dir) {
        for entry in entries.flatten() {
            if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
                let candidate = entry.path().join(SETTINGS_FILE);
                if candidate.is_file() {
                    return (load_settings(&candidate), entry.path());
                }
            }
        }
    }

    (Settings::default(), start_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create a unique temp directory for test isolation.
    fn make_test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("spanmark-test")
            .join(name)
            .join(format!("{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Clean up a test directory.
    fn cleanup_test_dir(dir: &Path) {
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert_eq!(settings.debounce(), Duration::from_millis(100));
        assert_eq!(settings.prompt_check(), Duration::from_millis(10));
        assert_eq!(settings.request_timeout(), Duration::from_millis(750));
        assert_eq!(settings.notes_scheme(), "notes");
        assert_eq!(settings.notes_root_id(), "notes");
        assert_eq!(settings.word_limit(), 350);
        assert!(settings.strip_foreign_backgrounds());
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let settings: Settings = toml::from_str(
            r#"
[selection]
debounce_ms = 40

[highlight]
strip_foreign_backgrounds = false
"#,
        )
        .unwrap();
        assert_eq!(settings.debounce(), Duration::from_millis(40));
        assert_eq!(settings.prompt_check(), Duration::from_millis(10));
        assert!(!settings.strip_foreign_backgrounds());
        assert_eq!(settings.word_limit(), 350);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = make_test_dir("malformed");
        let path = dir.join(SETTINGS_FILE);
        std::fs::write(&path, "[notes\nword_limit = ").unwrap();

        let settings = load_settings(&path);
        assert_eq!(settings.word_limit(), 350);

        cleanup_test_dir(&dir);
    }

    #[test]
    fn discover_settings_in_current_dir() {
        let dir = make_test_dir("discover-current");
        let settings_content = r#"
[notes]
word_limit = 100
"#;
        std::fs::write(dir.join(SETTINGS_FILE), settings_content).unwrap();

        let (settings, settings_dir) = discover_settings(&dir);
        assert_eq!(settings_dir, dir);
        assert_eq!(settings.word_limit(), 100);

        cleanup_test_dir(&dir);
    }

    #[test]
    fn discover_settings_in_parent_dir() {
        let parent = make_test_dir("discover-parent");
        let child = parent.join("subdir");
        std::fs::create_dir_all(&child).unwrap();

        let settings_content = r#"
[transport]
request_timeout_ms = 250
"#;
        std::fs::write(parent.join(SETTINGS_FILE), settings_content).unwrap();

        let (settings, settings_dir) = discover_settings(&child);
        assert_eq!(settings_dir, parent);
        assert_eq!(settings.request_timeout(), Duration::from_millis(250));

        cleanup_test_dir(&parent);
    }

    #[test]
    fn discover_settings_in_child_dir() {
        let parent = make_test_dir("discover-child");
        let child = parent.join("config");
        std::fs::create_dir_all(&child).unwrap();

        let settings_content = r#"
[notes]
scheme = "scratch"
"#;
        std::fs::write(child.join(SETTINGS_FILE), settings_content).unwrap();

        let (settings, settings_dir) = discover_settings(&parent);
        assert_eq!(settings_dir, child);
        assert_eq!(settings.notes_scheme(), "scratch");

        cleanup_test_dir(&parent);
    }

    #[test]
    fn discover_settings_not_found() {
        let dir = make_test_dir("discover-none");

        let (settings, settings_dir) = discover_settings(&dir);
        assert_eq!(settings_dir, dir);
        assert!(settings.notes.is_none());

        cleanup_test_dir(&dir);
    }
}
