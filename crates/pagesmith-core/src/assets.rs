//! Asset URL rewriting: maps source URLs to locally hosted copies.
//!
//! Built from a session's asset lists and handed to the widget builder so
//! generated `image` widgets point at local files instead of the origin.

use crate::types::SessionMeta;
use std::collections::HashMap;
use uuid::Uuid;

/// Lookup from original/absolute source URL to a locally served URL.
///
/// Resolution runs three tiers, first match wins:
/// 1. exact match on the original or absolute URL;
/// 2. match on the URL with query string and fragment stripped;
/// 3. match on the trailing path segment (filename) as a last resort.
///
/// Tier 3 is a known limitation: unrelated assets that share a filename
/// across different origins can collide, and the first recorded one wins.
#[derive(Debug, Clone, Default)]
pub struct AssetUrlMap {
    exact: HashMap<String, String>,
    normalized: HashMap<String, String>,
    by_filename: HashMap<String, String>,
}

impl AssetUrlMap {
    /// Builds the map from a session's recorded assets.
    #[must_use]
    pub fn from_session(meta: &SessionMeta) -> Self {
        let mut map = Self::default();
        for (kind, descriptors) in &meta.assets {
            for descriptor in descriptors {
                let local = format!(
                    "/assets/{}/{}/{}",
                    meta.session_id,
                    kind.dir_name(),
                    descriptor.local_filename
                );
                map.insert(&descriptor.original_url, &descriptor.absolute_url, &local);
            }
        }
        map
    }

    /// Registers one asset under both its original and absolute URLs.
    ///
    /// Earlier registrations win on collision so resolution stays
    /// deterministic regardless of how often the map is rebuilt.
    pub fn insert(&mut self, original_url: &str, absolute_url: &str, local_url: &str) {
        for source in [original_url, absolute_url] {
            if source.is_empty() {
                continue;
            }
            self.exact
                .entry(source.to_string())
                .or_insert_with(|| local_url.to_string());
            self.normalized
                .entry(strip_query_and_fragment(source))
                .or_insert_with(|| local_url.to_string());
            if let Some(name) = trailing_segment(source) {
                self.by_filename
                    .entry(name)
                    .or_insert_with(|| local_url.to_string());
            }
        }
    }

    /// Resolves a source URL to a local URL through the three tiers.
    ///
    /// Returns `None` on a complete miss; callers keep the original remote
    /// URL in that case (graceful degradation, not a failure).
    #[must_use]
    pub fn resolve(&self, url: &str) -> Option<&str> {
        if url.is_empty() {
            return None;
        }
        if let Some(local) = self.exact.get(url) {
            return Some(local);
        }
        if let Some(local) = self.normalized.get(&strip_query_and_fragment(url)) {
            return Some(local);
        }
        trailing_segment(url)
            .and_then(|name| self.by_filename.get(&name))
            .map(String::as_str)
    }

    /// Number of distinct source URLs registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.exact.len()
    }

    /// True when no assets are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    /// The local URL prefix for a session, used by callers that construct
    /// asset references outside the map.
    #[must_use]
    pub fn local_prefix(session_id: Uuid) -> String {
        format!("/assets/{session_id}")
    }
}

/// Strips query string and fragment from a URL, tolerating relative URLs
/// that the `url` crate cannot parse on their own.
fn strip_query_and_fragment(raw: &str) -> String {
    if let Ok(mut parsed) = url::Url::parse(raw) {
        parsed.set_query(None);
        parsed.set_fragment(None);
        return parsed.to_string();
    }
    let end = raw.find(['?', '#']).unwrap_or(raw.len());
    raw[..end].to_string()
}

/// Trailing path segment of a URL, without query/fragment.
fn trailing_segment(raw: &str) -> Option<String> {
    let bare = strip_query_and_fragment(raw);
    let segment = bare.trim_end_matches('/').rsplit('/').next()?;
    if segment.is_empty() || segment.contains(':') {
        return None;
    }
    Some(segment.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_map() -> AssetUrlMap {
        let mut map = AssetUrlMap::default();
        map.insert(
            "/img/logo.png",
            "https://example.com/img/logo.png",
            "/assets/s1/images/logo.png",
        );
        map.insert(
            "https://cdn.example.com/hero.jpg?w=1200",
            "https://cdn.example.com/hero.jpg?w=1200",
            "/assets/s1/images/hero.jpg",
        );
        map
    }

    #[test]
    fn exact_match_wins() {
        let map = sample_map();
        assert_eq!(
            map.resolve("https://example.com/img/logo.png"),
            Some("/assets/s1/images/logo.png")
        );
        assert_eq!(map.resolve("/img/logo.png"), Some("/assets/s1/images/logo.png"));
    }

    #[test]
    fn normalized_match_ignores_query_and_fragment() {
        let map = sample_map();
        assert_eq!(
            map.resolve("https://example.com/img/logo.png?v=3#top"),
            Some("/assets/s1/images/logo.png")
        );
    }

    #[test]
    fn normalized_match_is_deterministic_with_exact() {
        // Tier-2 on a query-decorated URL must find the same descriptor an
        // exact query on the bare URL finds.
        let map = sample_map();
        let bare = map.resolve("https://example.com/img/logo.png");
        let decorated = map.resolve("https://example.com/img/logo.png?cache=1");
        assert_eq!(bare, decorated);
    }

    #[test]
    fn filename_fallback() {
        let map = sample_map();
        assert_eq!(
            map.resolve("https://other-origin.net/static/hero.jpg"),
            Some("/assets/s1/images/hero.jpg")
        );
    }

    #[test]
    fn miss_returns_none() {
        let map = sample_map();
        assert_eq!(map.resolve("https://example.com/missing.gif"), None);
        assert_eq!(map.resolve(""), None);
    }

    #[test]
    fn first_registration_wins_on_collision() {
        let mut map = AssetUrlMap::default();
        map.insert("https://a.com/x.png", "https://a.com/x.png", "/assets/s1/images/x.png");
        map.insert("https://b.com/x.png", "https://b.com/x.png", "/assets/s1/images/x-2.png");

        // Exact lookups stay distinct; the filename tier keeps the first.
        assert_eq!(map.resolve("https://b.com/x.png"), Some("/assets/s1/images/x-2.png"));
        assert_eq!(map.resolve("https://c.com/x.png"), Some("/assets/s1/images/x.png"));
    }

    #[test]
    fn from_session_builds_local_urls() {
        use crate::types::{AssetDescriptor, AssetType};
        use chrono::Utc;
        use std::collections::BTreeMap;

        let session_id = Uuid::new_v4();
        let mut assets = BTreeMap::new();
        assets.insert(
            AssetType::Image,
            vec![AssetDescriptor {
                original_url: "/logo.png".to_string(),
                absolute_url: "https://example.com/logo.png".to_string(),
                local_filename: "logo.png".to_string(),
                asset_type: AssetType::Image,
                size_bytes: 10,
                saved_at: Utc::now(),
                sha256: String::new(),
            }],
        );
        let meta = SessionMeta {
            session_id,
            created_at: Utc::now(),
            expires_at: Utc::now(),
            locked: false,
            assets,
        };

        let map = AssetUrlMap::from_session(&meta);
        assert_eq!(
            map.resolve("https://example.com/logo.png"),
            Some(format!("/assets/{session_id}/images/logo.png").as_str())
        );
    }
}
