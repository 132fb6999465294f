//! Core data types: the exported template tree and asset/session records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Template format version emitted in every export.
pub const TEMPLATE_VERSION: &str = "0.4";

/// The three legal node roles in an exported template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElType {
    /// Top-level layout band; children are always columns.
    Section,
    /// Layout cell inside a section; children are always widgets.
    Column,
    /// Leaf content node; never has children.
    Widget,
}

/// One node in the exported template tree.
///
/// The hierarchy is strict: sections contain only columns, columns contain
/// only widgets, and widgets have empty `elements`. Ids are opaque 8-char
/// alphanumeric strings unique within one conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateNode {
    /// Generated opaque identifier.
    pub id: String,
    /// Node role.
    #[serde(rename = "elType")]
    pub el_type: ElType,
    /// Role-specific settings (typography, colors, spacing, links, ...).
    pub settings: serde_json::Map<String, serde_json::Value>,
    /// Widget kind (`heading`, `image`, `button`, `text-editor`); present
    /// only when `el_type` is [`ElType::Widget`].
    #[serde(rename = "widgetType", skip_serializing_if = "Option::is_none")]
    pub widget_type: Option<String>,
    /// Child nodes.
    pub elements: Vec<TemplateNode>,
}

/// Counters included in template metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateStats {
    /// Number of sections at the template root.
    pub sections: usize,
    /// Total widgets across all columns.
    pub widgets: usize,
    /// Unique image URLs encountered during the conversion.
    pub images: usize,
}

/// Provenance and statistics attached to an exported template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateMetadata {
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// URL of the page the template was converted from.
    pub source_url: String,
    /// Generator identifier and version.
    pub generator: String,
    /// Target builder version the template schema matches.
    pub elementor_version: String,
    /// Conversion counters.
    pub stats: TemplateStats,
}

/// A complete page-builder template, the pipeline's primary output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    /// Template format version, always [`TEMPLATE_VERSION`].
    pub version: String,
    /// Page title taken from the scraped page.
    pub title: String,
    /// Template kind, always `"page"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Root sections; never empty for a validated template.
    pub content: Vec<TemplateNode>,
    /// Page-level builder settings.
    pub page_settings: serde_json::Map<String, serde_json::Value>,
    /// Provenance and statistics.
    pub metadata: TemplateMetadata,
}

/// Kind of a downloaded asset, which also selects its session sub-area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    /// Raster or vector page images.
    Image,
    /// Web font binaries extracted from `@font-face` rules.
    Font,
    /// Stylesheets, with `@import`s already inlined.
    Css,
    /// Anything that does not fit the other kinds.
    Other,
}

impl AssetType {
    /// Directory name of this kind's sub-area inside a session.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Image => "images",
            Self::Font => "fonts",
            Self::Css => "css",
            Self::Other => "other",
        }
    }

    /// Parses a sub-area directory name back into an asset type.
    #[must_use]
    pub fn from_dir_name(name: &str) -> Option<Self> {
        match name {
            "images" => Some(Self::Image),
            "fonts" => Some(Self::Font),
            "css" => Some(Self::Css),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Record of one successfully downloaded and locally re-hosted asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetDescriptor {
    /// URL exactly as it appeared in the source document.
    pub original_url: String,
    /// URL after resolution against the page base.
    pub absolute_url: String,
    /// Filename within the session's sub-area for this asset type.
    pub local_filename: String,
    /// Asset kind.
    pub asset_type: AssetType,
    /// Size of the saved file in bytes.
    pub size_bytes: u64,
    /// When the file was saved.
    pub saved_at: DateTime<Utc>,
    /// Base64-encoded SHA-256 of the saved bytes.
    pub sha256: String,
}

/// Persisted per-session metadata document.
///
/// One JSON document per session directory. All mutations go through the
/// session store's atomic locked writer; `locked` protects the session
/// against deletion while it is being populated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    /// Session identifier; also the directory name.
    pub session_id: Uuid,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Expiry time, `created_at` plus the configured TTL.
    pub expires_at: DateTime<Utc>,
    /// When true, no cleanup path may delete this session.
    pub locked: bool,
    /// Downloaded assets grouped by kind.
    pub assets: BTreeMap<AssetType, Vec<AssetDescriptor>>,
}

impl SessionMeta {
    /// Whether the session is past its TTL at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Total number of recorded assets across all kinds.
    #[must_use]
    pub fn asset_count(&self) -> usize {
        self.assets.values().map(Vec::len).sum()
    }
}
