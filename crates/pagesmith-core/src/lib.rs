//! # pagesmith-core
//!
//! Core functionality for pagesmith - converting scraped web pages into
//! importable Elementor page templates.
//!
//! This crate takes the DOM-and-style tree captured by a browser scraper and
//! produces a validated section/column/widget template, while managing the
//! page's binary assets (images, stylesheets, fonts) in short-lived on-disk
//! sessions.
//!
//! ## Architecture
//!
//! The crate is organized around several key components:
//!
//! - **Conversion**: Normalization, role classification, and template tree
//!   construction with style translation
//! - **Sessions**: UUID-named asset stores with atomic, lock-protected
//!   metadata and TTL expiry
//! - **Downloading**: A bounded-concurrency pool with CSS import inlining
//!   and `@font-face` resolution
//! - **Export**: Validated template JSON and self-contained kit archives
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pagesmith_core::{AssetUrlMap, Converter, ScrapedPage};
//!
//! let json = std::fs::read_to_string("page.json")?;
//! let page: ScrapedPage = serde_json::from_str(&json)?;
//!
//! let converter = Converter::with_defaults();
//! let template = converter.convert(&page, &AssetUrlMap::default())?;
//!
//! println!("{} sections", template.metadata.stats.sections);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`] with structured error
//! information; [`Error::is_recoverable`] distinguishes transient network
//! and locking failures from permanent ones.

/// Asset URL remapping between remote origins and session-local paths
pub mod assets;
/// Template tree construction from classified nodes
pub mod builder;
/// Role classification of normalized nodes
pub mod classify;
/// Background expiry sweeps over asset sessions
pub mod cleanup;
/// Configuration management with TOML persistence
pub mod config;
/// End-to-end page conversion entry point
pub mod convert;
/// Bounded-concurrency asset downloading
pub mod downloader;
/// Error types and result aliases
pub mod error;
/// Template JSON and kit archive export
pub mod export;
/// HTTP fetching with retry and backoff
pub mod fetcher;
/// Scraped-page input model and normalization
pub mod ir;
/// On-disk asset sessions with locked atomic metadata
pub mod session;
/// CSS value translation into widget settings
pub mod style;
/// Template output model
pub mod types;
/// Structural template validation
pub mod validate;

// Re-export commonly used types
pub use assets::AssetUrlMap;
pub use builder::BuiltContent;
pub use cleanup::{CleanupScheduler, CleanupSnapshot};
pub use classify::Role;
pub use config::{
    ClassifierConfig, CleanupConfig, Config, DownloadConfig, SessionConfig,
};
pub use convert::Converter;
pub use downloader::{DownloadReport, DownloaderPool, FailedAsset, FontFace, FontSource};
pub use error::{Error, Result};
pub use export::{export_kit, to_template_bytes};
pub use fetcher::AssetFetcher;
pub use ir::{IrNode, RawNode, ScrapedPage, StyleSnapshot};
pub use session::SessionStore;
pub use types::*;
pub use validate::{validate, ValidationReport};
