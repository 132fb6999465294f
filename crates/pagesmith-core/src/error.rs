//! Error types and handling for pagesmith-core operations.
//!
//! All public functions return [`Result<T, Error>`]. Errors are categorized
//! for easier handling and carry a recoverability hint for retry logic:
//! network and lock-contention failures are typically transient, while
//! input-shape and schema failures are permanent.
//!
//! The conversion pipeline itself degrades gracefully wherever it can
//! (asset fetch misses, unresolved CSS imports, ambiguous classification);
//! only malformed scrape input and final schema validation are fatal to a
//! caller.

use thiserror::Error;

/// The main error type for pagesmith-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed.
    ///
    /// Covers file system operations on session directories and exported
    /// artifacts. The underlying `std::io::Error` is preserved.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Network operation failed.
    ///
    /// Covers HTTP requests for fetching page assets. The underlying
    /// `reqwest::Error` is preserved for detailed connection information.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The scraped input tree is malformed or empty.
    ///
    /// This is the only fatal input-side error: a root node with no tag,
    /// no text, and no children cannot produce a template. Partially
    /// populated nodes are normalized with defaults instead.
    #[error("Scrape input error: {0}")]
    ScrapeInput(String),

    /// Session storage operation failed.
    ///
    /// Covers session directory management, asset persistence, and
    /// metadata bookkeeping beyond basic file I/O.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The metadata lock could not be acquired within the retry budget.
    ///
    /// Many concurrent downloads append to the same session metadata
    /// document; acquisition is retried with exponential backoff and this
    /// error surfaces only after the budget is exhausted.
    #[error("Lock timeout: {0}")]
    LockTimeout(String),

    /// Configuration is invalid or inaccessible.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource was not found.
    ///
    /// Used for missing sessions, missing asset files, or queries against
    /// a session directory that no longer exists.
    #[error("Not found: {0}")]
    NotFound(String),

    /// URL is malformed or invalid.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Operation timed out.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A produced template failed the final schema gate.
    ///
    /// The export call is aborted and the caller receives the full list of
    /// violations; bytes for a schema-invalid template are never released.
    #[error("Schema validation failed with {} violation(s)", violations.len())]
    SchemaValidation {
        /// Structured list of violations, one entry per failed check.
        violations: Vec<String>,
    },

    /// Kit packaging failed.
    ///
    /// Raised when the produced archive is implausibly small relative to
    /// the assets it should contain, or when archive assembly itself fails.
    #[error("Export error: {0}")]
    Export(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Export(err.to_string())
    }
}

impl Error {
    /// Check if the error might be recoverable through retry logic.
    ///
    /// Returns `true` for failures that are typically temporary: network
    /// errors, timeouts, lock contention, and interrupted I/O. Input-shape
    /// and schema failures are permanent and return `false`.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::LockTimeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }

    /// Stable category label used in logs and error summaries.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Network(_) => "network",
            Self::ScrapeInput(_) => "scrape_input",
            Self::Storage(_) => "storage",
            Self::LockTimeout(_) => "lock",
            Self::Config(_) => "config",
            Self::NotFound(_) => "not_found",
            Self::InvalidUrl(_) => "url",
            Self::Timeout(_) => "timeout",
            Self::Serialization(_) => "serialization",
            Self::SchemaValidation { .. } => "schema",
            Self::Export(_) => "export",
        }
    }
}

/// Result alias used throughout pagesmith-core.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_classification() {
        assert!(Error::Timeout("fetch".into()).is_recoverable());
        assert!(Error::LockTimeout("metadata".into()).is_recoverable());
        assert!(!Error::ScrapeInput("empty root".into()).is_recoverable());
        assert!(
            !Error::SchemaValidation {
                violations: vec!["content is empty".into()]
            }
            .is_recoverable()
        );
    }

    #[test]
    fn categories_are_stable() {
        assert_eq!(Error::Storage("x".into()).category(), "storage");
        assert_eq!(
            Error::SchemaValidation { violations: vec![] }.category(),
            "schema"
        );
    }

    #[test]
    fn schema_violation_count_in_display() {
        let err = Error::SchemaValidation {
            violations: vec!["a".into(), "b".into()],
        };
        assert!(err.to_string().contains("2 violation(s)"));
    }
}
