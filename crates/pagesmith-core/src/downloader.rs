//! Concurrent asset downloader pool.
//!
//! Fetches images, stylesheets, and fonts with bounded concurrency. Each
//! worker settles independently: one bad URL never fails the batch, and
//! the report carries whatever subset succeeded plus the error list.
//!
//! Stylesheets get their `@import` chains inlined recursively (depth
//! bounded, cycle guarded) with relative `url()` references rewritten to
//! absolute first, and their `@font-face` declarations mined for font
//! binaries — only the best offered format is downloaded per declaration.

use crate::config::DownloadConfig;
use crate::fetcher::AssetFetcher;
use crate::session::SessionStore;
use crate::types::{AssetDescriptor, AssetType};
use crate::{Error, Result};
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

/// One asset that could not be downloaded.
#[derive(Debug, Clone)]
pub struct FailedAsset {
    /// Absolute URL that failed.
    pub url: String,
    /// Human-readable failure reason.
    pub error: String,
}

/// Outcome of one download batch.
#[derive(Debug, Default)]
pub struct DownloadReport {
    /// Descriptors for every asset that was fetched and persisted.
    pub saved: Vec<AssetDescriptor>,
    /// Assets dropped after their retry budget was exhausted.
    pub failed: Vec<FailedAsset>,
}

impl DownloadReport {
    fn absorb(&mut self, other: Self) {
        self.saved.extend(other.saved);
        self.failed.extend(other.failed);
    }
}

/// A parsed `@font-face` source candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontSource {
    /// Source URL as written in the stylesheet.
    pub url: String,
    /// `format()` hint, when present.
    pub format: Option<String>,
}

/// One parsed `@font-face` declaration.
#[derive(Debug, Clone)]
pub struct FontFace {
    /// Declared font family.
    pub family: String,
    /// Declared weight, defaulting to `"400"`.
    pub weight: String,
    /// Declared style, defaulting to `"normal"`.
    pub style: String,
    /// Offered sources in declaration order.
    pub sources: Vec<FontSource>,
}

/// Bounded-concurrency downloader writing into one asset session.
pub struct DownloaderPool {
    fetcher: AssetFetcher,
    store: Arc<SessionStore>,
    config: DownloadConfig,
}

impl DownloaderPool {
    /// Creates a pool over a session store.
    pub fn new(store: Arc<SessionStore>, config: DownloadConfig) -> Result<Self> {
        let fetcher = AssetFetcher::with_config(config.clone())?;
        Ok(Self {
            fetcher,
            store,
            config,
        })
    }

    fn concurrency(&self) -> usize {
        self.config.concurrency.clamp(1, 16)
    }

    /// Persists one fetched asset off the async runtime. `save_asset`
    /// does synchronous file I/O and lock backoff sleeps, so it must not
    /// run directly on a worker task.
    async fn persist(
        &self,
        session_id: Uuid,
        asset_type: AssetType,
        filename: String,
        bytes: Vec<u8>,
        original: String,
        absolute: String,
    ) -> std::result::Result<AssetDescriptor, FailedAsset> {
        let store = Arc::clone(&self.store);
        let url = absolute.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            store.save_asset(session_id, asset_type, &filename, &bytes, &original, &absolute)
        })
        .await;
        match outcome {
            Ok(Ok(descriptor)) => Ok(descriptor),
            Ok(Err(e)) => Err(FailedAsset {
                url,
                error: e.to_string(),
            }),
            Err(e) => Err(FailedAsset {
                url,
                error: e.to_string(),
            }),
        }
    }

    /// Flips the session lock flag off the async runtime; the flag write
    /// goes through the same blocking file-lock path as metadata updates.
    async fn set_session_lock(&self, session_id: Uuid, locked: bool) -> Result<()> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            if locked {
                store.lock_session(session_id)
            } else {
                store.unlock_session(session_id)
            }
        })
        .await
        .map_err(|e| Error::Storage(format!("session lock task failed: {e}")))??;
        Ok(())
    }

    /// Downloads a batch of image URLs into the session.
    ///
    /// The session is held locked for the duration of the batch so a
    /// cleanup sweep can never delete it mid-population.
    pub async fn download_images(
        &self,
        session_id: Uuid,
        urls: &[String],
        base_url: &str,
    ) -> Result<DownloadReport> {
        self.set_session_lock(session_id, true).await?;
        let report = self.image_batch(session_id, urls, base_url).await;
        self.set_session_lock(session_id, false).await?;
        Ok(report)
    }

    async fn image_batch(&self, session_id: Uuid, urls: &[String], base_url: &str) -> DownloadReport {
        let semaphore = Arc::new(Semaphore::new(self.concurrency()));

        let results: Vec<std::result::Result<AssetDescriptor, FailedAsset>> = stream::iter(urls)
            .map(|original| {
                let semaphore = Arc::clone(&semaphore);
                async move {
                    let _permit = semaphore.acquire().await;
                    let absolute = absolutize(original, base_url)
                        .ok_or_else(|| FailedAsset {
                            url: original.clone(),
                            error: "unresolvable URL".to_string(),
                        })?;

                    let bytes = self.fetcher.fetch_bytes(&absolute).await.map_err(|e| {
                        FailedAsset {
                            url: absolute.clone(),
                            error: e.to_string(),
                        }
                    })?;

                    let filename = filename_from_url(&absolute, "image");
                    self.persist(
                        session_id,
                        AssetType::Image,
                        filename,
                        bytes,
                        original.clone(),
                        absolute,
                    )
                    .await
                }
            })
            .buffer_unordered(self.concurrency())
            .collect()
            .await;

        partition(results)
    }

    /// Downloads stylesheets, inlining imports and harvesting their
    /// `@font-face` fonts, all into the session.
    pub async fn download_stylesheets(
        &self,
        session_id: Uuid,
        urls: &[String],
        base_url: &str,
    ) -> Result<DownloadReport> {
        self.set_session_lock(session_id, true).await?;

        let semaphore = Arc::new(Semaphore::new(self.concurrency()));
        let batches: Vec<DownloadReport> = stream::iter(urls)
            .map(|original| {
                let semaphore = Arc::clone(&semaphore);
                async move {
                    let _permit = semaphore.acquire().await;
                    self.one_stylesheet(session_id, original, base_url).await
                }
            })
            .buffer_unordered(self.concurrency())
            .collect()
            .await;

        self.set_session_lock(session_id, false).await?;

        let mut report = DownloadReport::default();
        for batch in batches {
            report.absorb(batch);
        }
        Ok(report)
    }

    async fn one_stylesheet(
        &self,
        session_id: Uuid,
        original: &str,
        base_url: &str,
    ) -> DownloadReport {
        let mut report = DownloadReport::default();

        let Some(absolute) = absolutize(original, base_url) else {
            report.failed.push(FailedAsset {
                url: original.to_string(),
                error: "unresolvable URL".to_string(),
            });
            return report;
        };
        let Ok(css_url) = Url::parse(&absolute) else {
            report.failed.push(FailedAsset {
                url: absolute,
                error: "unparsable URL".to_string(),
            });
            return report;
        };

        let text = match self.fetcher.fetch_text(&absolute).await {
            Ok(text) => text,
            Err(e) => {
                report.failed.push(FailedAsset {
                    url: absolute,
                    error: e.to_string(),
                });
                return report;
            },
        };

        let rewritten = rewrite_css_urls(&text, &css_url);
        let mut visited = HashSet::new();
        visited.insert(absolute.clone());
        let flattened = self.inline_imports(rewritten, css_url.clone(), 0, visited).await;

        // Fonts first so the flattened CSS and its fonts land in the same
        // report even when the CSS write itself fails.
        report.absorb(self.fonts_from_css(session_id, &flattened, &css_url).await);

        let filename = filename_from_url(&absolute, "stylesheet.css");
        match self
            .persist(
                session_id,
                AssetType::Css,
                filename,
                flattened.into_bytes(),
                original.to_string(),
                absolute,
            )
            .await
        {
            Ok(descriptor) => report.saved.push(descriptor),
            Err(failed) => report.failed.push(failed),
        }
        report
    }

    /// Recursively replaces `@import` statements with the imported text.
    ///
    /// Depth-bounded and cycle-guarded through `visited`; an import that
    /// fails, repeats, or exceeds the bound becomes a marker comment
    /// instead of aborting the stylesheet.
    fn inline_imports(
        &self,
        css: String,
        base: Url,
        depth: usize,
        visited: HashSet<String>,
    ) -> BoxFuture<'_, String> {
        Box::pin(async move {
            let mut visited = visited;
            let mut output = String::with_capacity(css.len());
            let mut cursor = 0;

            for capture in import_regex().captures_iter(&css) {
                let Some(whole) = capture.get(0) else { continue };
                let Some(href) = capture.get(1) else { continue };
                output.push_str(&css[cursor..whole.start()]);
                cursor = whole.end();

                let resolved = base.join(href.as_str()).map(|u| u.to_string());
                let replacement = match resolved {
                    Ok(import_url) => {
                        if depth >= self.config.max_css_import_depth
                            || !visited.insert(import_url.clone())
                        {
                            debug!("skipping css import {import_url}: depth or cycle");
                            marker_comment(&import_url)
                        } else {
                            match self.fetcher.fetch_text(&import_url).await {
                                Ok(imported) => {
                                    let import_base = Url::parse(&import_url)
                                        .unwrap_or_else(|_| base.clone());
                                    let rewritten =
                                        rewrite_css_urls(&imported, &import_base);
                                    self.inline_imports(
                                        rewritten,
                                        import_base,
                                        depth + 1,
                                        visited.clone(),
                                    )
                                    .await
                                },
                                Err(e) => {
                                    warn!("failed to inline css import {import_url}: {e}");
                                    marker_comment(&import_url)
                                },
                            }
                        }
                    },
                    Err(_) => marker_comment(href.as_str()),
                };
                output.push_str(&replacement);
            }

            output.push_str(&css[cursor..]);
            output
        })
    }

    /// Downloads the best-format font of every `@font-face` declaration
    /// found in `css`.
    async fn fonts_from_css(&self, session_id: Uuid, css: &str, css_url: &Url) -> DownloadReport {
        let faces = parse_font_faces(css);

        let mut targets: Vec<(String, String)> = Vec::new();
        let mut seen = HashSet::new();
        for face in &faces {
            let Some(source) = best_source(face) else { continue };
            let Ok(absolute) = css_url.join(&source.url) else { continue };
            let absolute = absolute.to_string();
            if seen.insert(absolute.clone()) {
                targets.push((source.url.clone(), absolute));
            }
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency()));
        let results: Vec<std::result::Result<AssetDescriptor, FailedAsset>> =
            stream::iter(targets)
                .map(|(original, absolute)| {
                    let semaphore = Arc::clone(&semaphore);
                    async move {
                        let _permit = semaphore.acquire().await;
                        let bytes =
                            self.fetcher.fetch_bytes(&absolute).await.map_err(|e| {
                                FailedAsset {
                                    url: absolute.clone(),
                                    error: e.to_string(),
                                }
                            })?;
                        let filename = filename_from_url(&absolute, "font");
                        self.persist(
                            session_id,
                            AssetType::Font,
                            filename,
                            bytes,
                            original,
                            absolute,
                        )
                        .await
                    }
                })
                .buffer_unordered(self.concurrency())
                .collect()
                .await;

        partition(results)
    }
}

fn partition(results: Vec<std::result::Result<AssetDescriptor, FailedAsset>>) -> DownloadReport {
    let mut report = DownloadReport::default();
    for result in results {
        match result {
            Ok(descriptor) => report.saved.push(descriptor),
            Err(failed) => report.failed.push(failed),
        }
    }
    report
}

fn marker_comment(url: &str) -> String {
    format!("/* pagesmith: could not inline {url} */")
}

/// Resolves a possibly relative URL against the page base.
fn absolutize(raw: &str, base_url: &str) -> Option<String> {
    if raw.trim().is_empty() || raw.starts_with("data:") {
        return None;
    }
    if let Ok(parsed) = Url::parse(raw) {
        return Some(parsed.to_string());
    }
    Url::parse(base_url)
        .ok()?
        .join(raw)
        .ok()
        .map(|u| u.to_string())
}

/// Trailing path segment of a URL, or `fallback` when there is none.
fn filename_from_url(url: &str, fallback: &str) -> String {
    let name = Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back().map(String::from))
        })
        .unwrap_or_default();
    if name.is_empty() {
        fallback.to_string()
    } else {
        name
    }
}

fn import_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r#"@import\s+(?:url\(\s*)?['"]?([^'")\s;]+)['"]?\s*\)?[^;]*;"#).unwrap()
    })
}

fn url_ref_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r#"url\(\s*['"]?([^'")]+)['"]?\s*\)"#).unwrap()
    })
}

fn font_face_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r"@font-face\s*\{([^}]*)\}").unwrap()
    })
}

fn font_src_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)]
        Regex::new(r#"url\(\s*['"]?([^'")]+)['"]?\s*\)(?:\s*format\(\s*['"]?([^'")]+)['"]?\s*\))?"#)
            .unwrap()
    })
}

/// Rewrites relative `url()` references to absolute, leaving absolute and
/// `data:` references untouched. Runs before import inlining so spliced
/// blocks keep pointing at their own origin.
#[must_use]
pub fn rewrite_css_urls(css: &str, base: &Url) -> String {
    url_ref_regex()
        .replace_all(css, |caps: &regex::Captures<'_>| {
            let reference = &caps[1];
            if reference.starts_with("data:")
                || reference.starts_with("http://")
                || reference.starts_with("https://")
            {
                return caps[0].to_string();
            }
            base.join(reference)
                .map_or_else(|_| caps[0].to_string(), |abs| format!("url({abs})"))
        })
        .into_owned()
}

/// Parses all `@font-face` declarations out of a stylesheet.
#[must_use]
pub fn parse_font_faces(css: &str) -> Vec<FontFace> {
    font_face_regex()
        .captures_iter(css)
        .filter_map(|block| {
            let body = block.get(1)?.as_str();
            let sources: Vec<FontSource> = font_src_regex()
                .captures_iter(body)
                .map(|src| FontSource {
                    url: src[1].to_string(),
                    format: src.get(2).map(|f| f.as_str().to_ascii_lowercase()),
                })
                .collect();
            if sources.is_empty() {
                return None;
            }
            Some(FontFace {
                family: property(body, "font-family").unwrap_or_default(),
                weight: property(body, "font-weight").unwrap_or_else(|| "400".to_string()),
                style: property(body, "font-style").unwrap_or_else(|| "normal".to_string()),
                sources,
            })
        })
        .collect()
}

fn property(body: &str, name: &str) -> Option<String> {
    for declaration in body.split(';') {
        let (key, value) = declaration.split_once(':')?;
        if key.trim().eq_ignore_ascii_case(name) {
            return Some(value.trim().trim_matches(['"', '\'']).to_string());
        }
    }
    None
}

/// Picks the preferred source of a declaration: `woff2 > woff > truetype
/// > opentype`, with unhinted sources ranked by file extension.
#[must_use]
pub fn best_source(face: &FontFace) -> Option<&FontSource> {
    face.sources.iter().min_by_key(|source| format_rank(source))
}

fn format_rank(source: &FontSource) -> u8 {
    let hint = source.format.as_deref().map(str::to_ascii_lowercase);
    match hint.as_deref() {
        Some("woff2") => 0,
        Some("woff") => 1,
        Some("truetype") => 2,
        Some("opentype") => 3,
        Some(_) => 9,
        None => {
            let url = source.url.to_ascii_lowercase();
            let bare = url.split(['?', '#']).next().unwrap_or("");
            if bare.ends_with(".woff2") {
                0
            } else if bare.ends_with(".woff") {
                1
            } else if bare.ends_with(".ttf") {
                2
            } else if bare.ends_with(".otf") {
                3
            } else {
                9
            }
        },
    }
}
