//! Ephemeral asset session storage.
//!
//! Each session is a UUID-named directory with four fixed sub-areas
//! (`images/`, `fonts/`, `css/`, `other/`) and one metadata JSON document.
//! Session metadata is the single shared mutable resource across
//! concurrent downloaders, so every mutation goes through
//! [`SessionStore::update_metadata`]: an exclusive advisory lock on a
//! sibling lock file (bounded retry with exponential backoff), a full
//! read-modify-write to a temp file, an atomic rename, and an
//! unconditional lock release.
//!
//! The `locked` flag inside the metadata is a different mechanism with a
//! different job: the file lock protects one write, the flag protects the
//! whole "session in use" window across many writes. Deletion re-reads the
//! metadata immediately before removing the directory so a lock acquired
//! after the first check still wins.

use crate::config::SessionConfig;
use crate::types::{AssetDescriptor, AssetType, SessionMeta};
use crate::{Config, Error, Result};
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{Duration, Utc};
use fs2::FileExt;
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

const METADATA_FILENAME: &str = "session.json";
const LOCK_FILENAME: &str = ".session.lock";

/// Filesystem store for asset sessions.
pub struct SessionStore {
    root_dir: PathBuf,
    config: SessionConfig,
}

impl SessionStore {
    /// Creates a store rooted at the default sessions directory.
    pub fn new() -> Result<Self> {
        Self::with_root(Config::sessions_root()?)
    }

    /// Creates a store rooted at a custom directory.
    pub fn with_root(root_dir: PathBuf) -> Result<Self> {
        Self::with_config(root_dir, SessionConfig::default())
    }

    /// Creates a store with explicit session settings.
    pub fn with_config(root_dir: PathBuf, config: SessionConfig) -> Result<Self> {
        fs::create_dir_all(&root_dir)
            .map_err(|e| Error::Storage(format!("Failed to create sessions root: {e}")))?;
        Ok(Self { root_dir, config })
    }

    /// Returns the sessions root directory.
    #[must_use]
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Returns the directory for a session.
    #[must_use]
    pub fn session_dir(&self, session_id: Uuid) -> PathBuf {
        self.root_dir.join(session_id.to_string())
    }

    fn metadata_path(&self, session_id: Uuid) -> PathBuf {
        self.session_dir(session_id).join(METADATA_FILENAME)
    }

    /// Allocates a new session: directory, sub-areas, initial metadata.
    pub fn create_session(&self) -> Result<SessionMeta> {
        let session_id = Uuid::new_v4();
        let dir = self.session_dir(session_id);

        for kind in [
            AssetType::Image,
            AssetType::Font,
            AssetType::Css,
            AssetType::Other,
        ] {
            fs::create_dir_all(dir.join(kind.dir_name()))
                .map_err(|e| Error::Storage(format!("Failed to create session dirs: {e}")))?;
        }

        let created_at = Utc::now();
        let meta = SessionMeta {
            session_id,
            created_at,
            expires_at: created_at + Duration::hours(i64::from(self.config.ttl_hours)),
            locked: false,
            assets: std::collections::BTreeMap::new(),
        };
        persist_metadata(&dir, &meta)?;

        info!(session = %session_id, "created asset session");
        Ok(meta)
    }

    /// Loads session metadata.
    ///
    /// Returns [`Error::NotFound`] when the session or its metadata file
    /// is missing and [`Error::Serialization`] when the document is
    /// corrupt; expiry scans treat both as "expired".
    pub fn load_metadata(&self, session_id: Uuid) -> Result<SessionMeta> {
        let path = self.metadata_path(session_id);
        if !path.exists() {
            return Err(Error::NotFound(format!("No metadata for session {session_id}")));
        }
        let json = fs::read_to_string(&path)
            .map_err(|e| Error::Storage(format!("Failed to read session metadata: {e}")))?;
        let meta = serde_json::from_str(&json)?;
        Ok(meta)
    }

    /// Writes an asset file into its sub-area and records the descriptor
    /// through the atomic metadata path.
    pub fn save_asset(
        &self,
        session_id: Uuid,
        asset_type: AssetType,
        filename: &str,
        bytes: &[u8],
        original_url: &str,
        absolute_url: &str,
    ) -> Result<AssetDescriptor> {
        let dir = self.session_dir(session_id).join(asset_type.dir_name());
        if !dir.exists() {
            return Err(Error::NotFound(format!("Session {session_id} does not exist")));
        }

        let mut name = sanitize_filename(filename);
        let mut path = dir.join(&name);
        if path.exists() {
            // Filename collision across origins; keep both files.
            let mut prefix = Uuid::new_v4().simple().to_string();
            prefix.truncate(8);
            name = format!("{prefix}-{name}");
            path = dir.join(&name);
        }

        fs::write(&path, bytes)
            .map_err(|e| Error::Storage(format!("Failed to write asset file: {e}")))?;

        let descriptor = AssetDescriptor {
            original_url: original_url.to_string(),
            absolute_url: absolute_url.to_string(),
            local_filename: name,
            asset_type,
            size_bytes: bytes.len() as u64,
            saved_at: Utc::now(),
            sha256: sha256_base64(bytes),
        };

        let recorded = descriptor.clone();
        self.update_metadata(session_id, move |meta| {
            meta.assets.entry(asset_type).or_default().push(recorded);
        })?;

        debug!(session = %session_id, file = %descriptor.local_filename, "saved asset");
        Ok(descriptor)
    }

    /// Applies a mutation to the session metadata under the exclusive
    /// file lock and persists the result atomically.
    ///
    /// The lock is always released, even when the read or write fails, so
    /// a failed writer can never deadlock future writers.
    pub fn update_metadata<F>(&self, session_id: Uuid, mutate: F) -> Result<SessionMeta>
    where
        F: FnOnce(&mut SessionMeta),
    {
        let dir = self.session_dir(session_id);
        if !dir.exists() {
            return Err(Error::NotFound(format!("Session {session_id} does not exist")));
        }

        let lock_path = dir.join(LOCK_FILENAME);
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| Error::Storage(format!("Failed to open metadata lock: {e}")))?;

        self.acquire_with_backoff(&lock, session_id)?;
        let result = self.mutate_locked(session_id, &dir, mutate);
        let _ = FileExt::unlock(&lock);
        result
    }

    fn acquire_with_backoff(&self, lock: &File, session_id: Uuid) -> Result<()> {
        let mut delay = std::time::Duration::from_millis(self.config.lock_backoff_base_ms);
        for attempt in 0..self.config.lock_max_attempts {
            match lock.try_lock_exclusive() {
                Ok(()) => return Ok(()),
                Err(_) if attempt + 1 < self.config.lock_max_attempts => {
                    std::thread::sleep(delay);
                    delay = delay.saturating_mul(2);
                },
                Err(e) => {
                    return Err(Error::LockTimeout(format!(
                        "metadata lock for session {session_id} not acquired after {} attempts: {e}",
                        self.config.lock_max_attempts
                    )));
                },
            }
        }
        Err(Error::LockTimeout(format!(
            "metadata lock for session {session_id} not acquired"
        )))
    }

    fn mutate_locked<F>(&self, session_id: Uuid, dir: &Path, mutate: F) -> Result<SessionMeta>
    where
        F: FnOnce(&mut SessionMeta),
    {
        let mut meta = self.load_metadata(session_id)?;
        mutate(&mut meta);
        persist_metadata(dir, &meta)?;
        Ok(meta)
    }

    /// Marks the session as in use, blocking deletion.
    pub fn lock_session(&self, session_id: Uuid) -> Result<SessionMeta> {
        self.update_metadata(session_id, |meta| meta.locked = true)
    }

    /// Clears the in-use flag, making the session deletable again.
    pub fn unlock_session(&self, session_id: Uuid) -> Result<SessionMeta> {
        self.update_metadata(session_id, |meta| meta.locked = false)
    }

    /// Deletes a session directory unless the session is locked.
    ///
    /// Returns `Ok(false)` without deleting when the metadata shows
    /// `locked`, including a second read immediately before the directory
    /// removal to catch a lock acquired after the first check. Unreadable
    /// metadata does not protect a session.
    pub fn delete_session(&self, session_id: Uuid) -> Result<bool> {
        let dir = self.session_dir(session_id);
        if !dir.exists() {
            return Ok(false);
        }

        match self.load_metadata(session_id) {
            Ok(meta) if meta.locked => {
                debug!(session = %session_id, "delete skipped: session locked");
                return Ok(false);
            },
            Ok(_) => {},
            Err(e) => {
                warn!(session = %session_id, error = %e, "metadata unreadable, deleting anyway");
            },
        }

        // Double-check: a downloader may have locked the session between
        // the first read and this point.
        if let Ok(meta) = self.load_metadata(session_id) {
            if meta.locked {
                debug!(session = %session_id, "delete aborted: lock acquired mid-delete");
                return Ok(false);
            }
        }

        fs::remove_dir_all(&dir)
            .map_err(|e| Error::Storage(format!("Failed to remove session directory: {e}")))?;
        info!(session = %session_id, "deleted session");
        Ok(true)
    }

    /// All sessions currently present on disk.
    #[must_use]
    pub fn list_sessions(&self) -> Vec<Uuid> {
        let mut sessions = Vec::new();
        if let Ok(entries) = fs::read_dir(&self.root_dir) {
            for entry in entries.flatten() {
                if !entry.path().is_dir() {
                    continue;
                }
                if let Some(name) = entry.file_name().to_str() {
                    if let Ok(id) = Uuid::parse_str(name) {
                        sessions.push(id);
                    }
                }
            }
        }
        sessions.sort();
        sessions
    }

    /// Sessions past their TTL, plus sessions whose metadata cannot be
    /// read (corrupt metadata is treated as expired so a damaged session
    /// is recreated rather than lingering forever).
    #[must_use]
    pub fn expired_sessions(&self) -> Vec<Uuid> {
        let now = Utc::now();
        self.list_sessions()
            .into_iter()
            .filter(|id| match self.load_metadata(*id) {
                Ok(meta) => meta.is_expired(now),
                Err(_) => true,
            })
            .collect()
    }

    /// Resolves the on-disk path for one asset, for the HTTP serving
    /// layer. The session id must parse as a UUID and the type must name
    /// a known sub-area; the filename is sanitized against traversal.
    pub fn asset_path(&self, session_id: &str, type_dir: &str, filename: &str) -> Result<PathBuf> {
        let id = Uuid::parse_str(session_id)
            .map_err(|_| Error::InvalidUrl(format!("Invalid session id '{session_id}'")))?;
        let kind = AssetType::from_dir_name(type_dir)
            .ok_or_else(|| Error::InvalidUrl(format!("Unknown asset area '{type_dir}'")))?;

        let path = self
            .session_dir(id)
            .join(kind.dir_name())
            .join(sanitize_filename(filename));
        if !path.exists() {
            return Err(Error::NotFound(format!(
                "Asset {filename} not found in session {id}"
            )));
        }
        Ok(path)
    }
}

/// MIME type for a served asset, derived from its file extension.
#[must_use]
pub fn content_type_for(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "css" => "text/css",
        _ => "application/octet-stream",
    }
}

/// Restricts a filename to a conservative character set and collapses
/// traversal sequences, so the path stays rooted in the session even for
/// hostile input.
fn sanitize_filename(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    while sanitized.contains("..") {
        sanitized = sanitized.replace("..", "_");
    }

    if sanitized.is_empty() {
        "asset".to_string()
    } else {
        sanitized
    }
}

/// Writes metadata to a temp file and renames it into place.
fn persist_metadata(dir: &Path, meta: &SessionMeta) -> Result<()> {
    let path = dir.join(METADATA_FILENAME);
    let json = serde_json::to_string_pretty(meta)?;

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &json)
        .map_err(|e| Error::Storage(format!("Failed to write temp metadata: {e}")))?;

    #[cfg(target_os = "windows")]
    if path.exists() {
        fs::remove_file(&path)
            .map_err(|e| Error::Storage(format!("Failed to remove existing metadata: {e}")))?;
    }
    fs::rename(&tmp_path, &path)
        .map_err(|e| Error::Storage(format!("Failed to persist metadata: {e}")))?;
    Ok(())
}

fn sha256_base64(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    STANDARD.encode(hasher.finalize())
}
