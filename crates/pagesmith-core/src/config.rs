//! Configuration for the pagesmith conversion pipeline.
//!
//! All heuristic thresholds used by the classifier and the button detector
//! live here as named, documented fields so they can be tuned and tested
//! independently of the traversal logic. Configuration is stored in TOML
//! and supports environment variable overrides:
//!
//! - `PAGESMITH_DATA_DIR` — overrides the session storage root
//!
//! ## Example
//!
//! ```rust
//! use pagesmith_core::Config;
//!
//! let config = Config::default();
//! assert_eq!(config.classifier.container_min_width_px, 200.0);
//! assert_eq!(config.session.ttl_hours, 24);
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level configuration for the conversion pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Structural classifier thresholds.
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Asset downloader tuning.
    #[serde(default)]
    pub download: DownloadConfig,
    /// Session storage and TTL settings.
    #[serde(default)]
    pub session: SessionConfig,
    /// Cleanup sweep cadence.
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// Thresholds for the structural classifier and button detector.
///
/// These are pragmatic cutoffs for ambiguous DOM shapes (plain `div`
/// soup); tag semantics always take precedence over them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Minimum resolved width (px) for a generic container to be treated
    /// as a layout column when no stronger signal is present.
    pub container_min_width_px: f32,
    /// Fraction of content-tag children (0..=1) at which a generic
    /// container is considered a layout column.
    pub content_majority_ratio: f32,
    /// Minimum border-radius (px) contributing to the visual button
    /// affordance check.
    pub button_min_radius_px: f32,
    /// Minimum padding (px) required on all four sides for the visual
    /// button affordance check.
    pub button_min_padding_px: f32,
    /// Maximum tree depth walked during normalization and classification.
    /// Children past the bound are dropped so author-supplied markup can
    /// never cause unbounded recursion.
    pub max_tree_depth: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            container_min_width_px: 200.0,
            content_majority_ratio: 0.5,
            button_min_radius_px: 3.0,
            button_min_padding_px: 8.0,
            max_tree_depth: 50,
        }
    }
}

/// Tuning for the concurrent asset downloader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Maximum simultaneous fetches (clamped to 1..=16 at use sites).
    pub concurrency: usize,
    /// Total fetch attempts per URL, including the first.
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential retry backoff.
    pub backoff_base_ms: u64,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Maximum `@import` nesting depth resolved when inlining CSS.
    pub max_css_import_depth: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_attempts: 3,
            backoff_base_ms: 250,
            request_timeout_secs: 30,
            max_css_import_depth: 10,
        }
    }
}

/// Session storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How long a session lives before becoming eligible for cleanup.
    pub ttl_hours: u32,
    /// Attempts to acquire the metadata lock before giving up.
    pub lock_max_attempts: u32,
    /// Base delay in milliseconds for metadata lock retry backoff.
    pub lock_backoff_base_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: 24,
            lock_max_attempts: 10,
            lock_backoff_base_ms: 20,
        }
    }
}

/// Cleanup scheduler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Interval between expiry sweeps, in seconds.
    pub interval_secs: u64,
    /// Upper bound waited for an in-flight sweep during shutdown, seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            shutdown_grace_secs: 30,
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file, or returns defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Saves configuration to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config dir: {e}")))?;
        }
        let toml = toml::to_string_pretty(self)?;
        fs::write(path, toml).map_err(|e| Error::Config(format!("Failed to write config: {e}")))?;
        Ok(())
    }

    /// Resolves the session storage root.
    ///
    /// Honors `PAGESMITH_DATA_DIR` first, then falls back to the platform
    /// data directory, then to `~/.pagesmith`.
    pub fn sessions_root() -> Result<PathBuf> {
        if let Ok(dir) = std::env::var("PAGESMITH_DATA_DIR") {
            let trimmed = dir.trim();
            if !trimmed.is_empty() {
                return Ok(PathBuf::from(trimmed).join("sessions"));
            }
        }

        if let Some(dirs) = directories::ProjectDirs::from("dev", "pagesmith", "pagesmith") {
            return Ok(dirs.data_dir().join("sessions"));
        }

        let home = directories::BaseDirs::new()
            .ok_or_else(|| Error::Config("Failed to determine home directory".into()))?;
        Ok(home.home_dir().join(".pagesmith").join("sessions"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_match_documented_thresholds() {
        let config = Config::default();
        assert!((config.classifier.container_min_width_px - 200.0).abs() < f32::EPSILON);
        assert!((config.classifier.content_majority_ratio - 0.5).abs() < f32::EPSILON);
        assert_eq!(config.download.max_css_import_depth, 10);
        assert_eq!(config.cleanup.interval_secs, 3600);
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.session.ttl_hours, 24);
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.download.concurrency = 8;
        config.classifier.container_min_width_px = 320.0;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.download.concurrency, 8);
        assert!((loaded.classifier.container_min_width_px - 320.0).abs() < f32::EPSILON);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[download]\nconcurrency = 2\nmax_attempts = 5\nbackoff_base_ms = 100\nrequest_timeout_secs = 10\nmax_css_import_depth = 4\n").unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.download.concurrency, 2);
        assert_eq!(loaded.session.ttl_hours, 24);
    }
}
