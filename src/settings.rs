//! Settings infrastructure for exprdoc.
//!
//! This module provides support for loading and parsing `exprdoc.toml` files
//! to configure where records live, how many examples run concurrently, and
//! which external evaluator to call.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::verify::{CommandEvaluator, DEFAULT_TIMEOUT};

/// File name searched for by [`discover_settings`].
pub const SETTINGS_FILE: &str = "exprdoc.toml";

/// Root settings structure loaded from exprdoc.toml.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// Record source configuration.
    pub records: Option<RecordSettings>,

    /// Verification configuration.
    pub verify: Option<VerifySettings>,

    /// External evaluator configuration.
    pub evaluator: Option<EvaluatorSettings>,
}

/// Where documentation records are read from.
#[derive(Debug, Default, Deserialize)]
pub struct RecordSettings {
    /// A JSON file or a directory of JSON files.
    /// Relative paths are resolved against the settings file's directory.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifySettings {
    /// Maximum number of evaluations in flight.
    pub concurrency: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EvaluatorSettings {
    /// Program and leading arguments; the expression is appended.
    pub command: Option<Vec<String>>,

    /// Per-expression timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl Settings {
    /// Record path, resolved against `settings_dir` when relative.
    pub fn records_path(&self, settings_dir: &Path) -> Option<PathBuf> {
        let path = self.records.as_ref()?.path.as_ref()?;
        Some(resolve(path, settings_dir))
    }

    pub fn concurrency(&self) -> Option<usize> {
        self.verify.as_ref()?.concurrency
    }

    /// Build the configured command evaluator, if a command is set.
    pub fn command_evaluator(&self) -> Option<CommandEvaluator> {
        let evaluator = self.evaluator.as_ref()?;
        let command = CommandEvaluator::from_command_line(evaluator.command.as_deref()?)?;
        Some(command.with_timeout(self.evaluator_timeout()))
    }

    /// Configured per-expression timeout, or the default.
    pub fn evaluator_timeout(&self) -> Duration {
        self.evaluator
            .as_ref()
            .and_then(|e| e.timeout_ms)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_TIMEOUT)
    }
}

fn resolve(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Read `exprdoc.toml` at `path`.
///
/// Lenient: an unreadable file yields `Settings::default()`, and a file that
/// fails to parse is logged at warn level and also yields the defaults, so a
/// broken settings file never blocks verification.
pub fn load_settings(path: &Path) -> Settings {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Settings::default();
    };
    toml::from_str(&content).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "ignoring unparseable settings");
        Settings::default()
    })
}

/// Locate the `exprdoc.toml` that applies to `start_dir` and load it.
///
/// The nearest file in `start_dir` or any ancestor wins. Failing that, the
/// first immediate subdirectory (by name) holding one is used, which covers
/// running from a workspace root whose records live one level down.
///
/// Returns the settings with the directory they were found in, against which
/// relative record paths resolve. With no file anywhere, returns defaults
/// paired with `start_dir`.
pub fn discover_settings(start_dir: &Path) -> (Settings, PathBuf) {
    let found = start_dir
        .ancestors()
        .find(|dir| dir.join(SETTINGS_FILE).is_file())
        .map(Path::to_path_buf)
        .or_else(|| first_child_with_settings(start_dir));

    match found {
        Some(dir) => {
            let file = dir.join(SETTINGS_FILE);
            tracing::debug!(path = %file.display(), "using settings");
            (load_settings(&file), dir)
        }
        None => (Settings::default(), start_dir.to_path_buf()),
    }
}

fn first_child_with_settings(dir: &Path) -> Option<PathBuf> {
    let mut children: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .filter(|e| e.file_type().is_ok_and(|ft| ft.is_dir()))
        .map(|e| e.path())
        .collect();
    children.sort();
    children
        .into_iter()
        .find(|child| child.join(SETTINGS_FILE).is_file())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create a unique temp directory for test isolation.
    fn make_test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("exprdoc-settings-test")
            .join(name)
            .join(format!("{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Clean up a test directory.
    fn cleanup_test_dir(dir: &Path) {
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn parse_full_settings() {
        let settings: Settings = toml::from_str(
            r#"
[records]
path = "resources/function_help/json"

[verify]
concurrency = 8

[evaluator]
command = ["qgis_eval", "--expression"]
timeout_ms = 2500
"#,
        )
        .unwrap();

        assert_eq!(
            settings.records_path(Path::new("/repo")),
            Some(PathBuf::from("/repo/resources/function_help/json"))
        );
        assert_eq!(settings.concurrency(), Some(8));
        assert_eq!(settings.evaluator_timeout(), Duration::from_millis(2500));

        let evaluator = settings.command_evaluator().unwrap();
        assert_eq!(evaluator.program(), "qgis_eval");
        assert_eq!(evaluator.timeout(), Duration::from_millis(2500));
    }

    #[test]
    fn absolute_records_path_is_kept() {
        let settings: Settings = toml::from_str("[records]\npath = \"/data/json\"\n").unwrap();
        assert_eq!(
            settings.records_path(Path::new("/repo")),
            Some(PathBuf::from("/data/json"))
        );
    }

    #[test]
    fn empty_settings_have_defaults() {
        let settings = Settings::default();
        assert!(settings.records_path(Path::new(".")).is_none());
        assert!(settings.concurrency().is_none());
        assert!(settings.command_evaluator().is_none());
        assert_eq!(settings.evaluator_timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn empty_command_is_no_evaluator() {
        let settings: Settings = toml::from_str("[evaluator]\ncommand = []\n").unwrap();
        assert!(settings.command_evaluator().is_none());
    }

    #[test]
    fn load_settings_malformed_returns_default() {
        let dir = make_test_dir("malformed");
        let path = dir.join(SETTINGS_FILE);
        std::fs::write(&path, "[verify\nconcurrency = ").unwrap();

        let settings = load_settings(&path);
        assert!(settings.verify.is_none());

        cleanup_test_dir(&dir);
    }

    #[test]
    fn load_settings_missing_returns_default() {
        let settings = load_settings(Path::new("/nonexistent/exprdoc.toml"));
        assert!(settings.records.is_none());
    }

    #[test]
    fn discover_settings_in_current_dir() {
        let dir = make_test_dir("discover-current");
        std::fs::write(dir.join(SETTINGS_FILE), "[verify]\nconcurrency = 2\n").unwrap();

        let (settings, settings_dir) = discover_settings(&dir);
        assert_eq!(settings_dir, dir);
        assert_eq!(settings.concurrency(), Some(2));

        cleanup_test_dir(&dir);
    }

    #[test]
    fn discover_settings_in_parent_dir() {
        let parent = make_test_dir("discover-parent");
        let child = parent.join("subdir");
        std::fs::create_dir_all(&child).unwrap();
        std::fs::write(parent.join(SETTINGS_FILE), "[records]\npath = \"json\"\n").unwrap();

        let (settings, settings_dir) = discover_settings(&child);
        assert_eq!(settings_dir, parent);
        assert_eq!(
            settings.records_path(&settings_dir),
            Some(parent.join("json"))
        );

        cleanup_test_dir(&parent);
    }

    #[test]
    fn discover_settings_in_child_dir() {
        let parent = make_test_dir("discover-child");
        let child = parent.join("config");
        std::fs::create_dir_all(&child).unwrap();
        std::fs::write(child.join(SETTINGS_FILE), "[verify]\nconcurrency = 3\n").unwrap();

        let (settings, settings_dir) = discover_settings(&parent);
        assert_eq!(settings_dir, child);
        assert_eq!(settings.concurrency(), Some(3));

        cleanup_test_dir(&parent);
    }

    #[test]
    fn discover_settings_not_found() {
        let dir = make_test_dir("discover-none");

        let (settings, settings_dir) = discover_settings(&dir);
        assert_eq!(settings_dir, dir);
        assert!(settings.verify.is_none());

        cleanup_test_dir(&dir);
    }

    #[test]
    fn discover_settings_parent_preferred_over_child() {
        let parent = make_test_dir("discover-priority");
        let child = parent.join("nested");
        std::fs::create_dir_all(&child).unwrap();

        std::fs::write(parent.join(SETTINGS_FILE), "[verify]\nconcurrency = 1\n").unwrap();
        std::fs::write(child.join(SETTINGS_FILE), "[verify]\nconcurrency = 9\n").unwrap();

        // The start directory is its own first ancestor
        let (settings, settings_dir) = discover_settings(&parent);
        assert_eq!(settings_dir, parent);
        assert_eq!(settings.concurrency(), Some(1));

        cleanup_test_dir(&parent);
    }

    #[test]
    fn discover_settings_children_in_name_order() {
        let parent = make_test_dir("discover-order");
        for (name, jobs) in [("zeta", 7), ("alpha", 5)] {
            let child = parent.join(name);
            std::fs::create_dir_all(&child).unwrap();
            std::fs::write(
                child.join(SETTINGS_FILE),
                format!("[verify]\nconcurrency = {jobs}\n"),
            )
            .unwrap();
        }

        let (settings, settings_dir) = discover_settings(&parent);
        assert_eq!(settings_dir, parent.join("alpha"));
        assert_eq!(settings.concurrency(), Some(5));

        cleanup_test_dir(&parent);
    }
}
