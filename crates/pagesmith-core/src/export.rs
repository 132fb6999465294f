//! Template JSON and kit archive export.
//!
//! Both paths re-validate before any bytes leave the process: an invalid
//! template is never serialized for a caller.

use crate::session::SessionStore;
use crate::types::{AssetDescriptor, Template};
use crate::validate::validate;
use crate::{Error, Result};
use serde::Serialize;
use std::io::{Cursor, Write};
use tracing::{debug, info};
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Entry in the kit manifest describing one bundled asset.
#[derive(Debug, Serialize)]
struct ManifestAsset {
    path: String,
    original_url: String,
    size_bytes: u64,
    sha256: String,
}

#[derive(Debug, Serialize)]
struct KitManifest {
    session_id: Uuid,
    generator: String,
    asset_count: usize,
    assets: Vec<ManifestAsset>,
}

/// Serializes a template to pretty-printed JSON after validating it.
pub fn to_template_bytes(template: &Template) -> Result<Vec<u8>> {
    let report = validate(template);
    if !report.is_valid() {
        return Err(Error::SchemaValidation {
            violations: report.violations,
        });
    }
    let bytes = serde_json::to_vec_pretty(template)?;
    debug!(bytes = bytes.len(), "serialized template");
    Ok(bytes)
}

/// Bundles a validated template together with a session's assets into a
/// zip archive: `template.json`, `manifest.json`, and
/// `assets/{type}/{filename}` entries.
///
/// Asset binaries are stored uncompressed; most are already compressed
/// formats, and storing them keeps the archive within a small constant
/// of the summed asset bytes.
pub fn export_kit(
    template: &Template,
    store: &SessionStore,
    session_id: Uuid,
) -> Result<Vec<u8>> {
    let template_bytes = to_template_bytes(template)?;
    let meta = store.load_metadata(session_id)?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file("template.json", deflated)?;
    writer.write_all(&template_bytes)?;

    let mut manifest_assets = Vec::new();
    let mut total_asset_bytes: u64 = 0;

    for (asset_type, descriptors) in &meta.assets {
        for descriptor in descriptors {
            let entry_path = format!("assets/{}/{}", asset_type.dir_name(), descriptor.local_filename);
            let disk_path = store
                .session_dir(session_id)
                .join(asset_type.dir_name())
                .join(&descriptor.local_filename);
            let bytes = std::fs::read(&disk_path).map_err(|e| {
                Error::Export(format!(
                    "missing asset file {}: {e}",
                    descriptor.local_filename
                ))
            })?;

            writer.start_file(&*entry_path, stored)?;
            writer.write_all(&bytes)?;

            total_asset_bytes += bytes.len() as u64;
            manifest_assets.push(manifest_entry(entry_path, descriptor));
        }
    }

    let manifest = KitManifest {
        session_id,
        generator: concat!("pagesmith/", env!("CARGO_PKG_VERSION")).to_string(),
        asset_count: manifest_assets.len(),
        assets: manifest_assets,
    };
    writer.start_file("manifest.json", deflated)?;
    writer.write_all(&serde_json::to_vec_pretty(&manifest)?)?;

    let cursor = writer.finish()?;
    let archive = cursor.into_inner();

    // Stored entries should keep the archive close to the raw asset
    // bytes. Falling well under that means entries went missing.
    let floor = total_asset_bytes / 10 * 9;
    if (archive.len() as u64) < floor {
        return Err(Error::Export(format!(
            "archive is {} bytes but assets total {total_asset_bytes}",
            archive.len()
        )));
    }

    info!(
        session = %session_id,
        assets = manifest.asset_count,
        bytes = archive.len(),
        "exported kit archive"
    );
    Ok(archive)
}

fn manifest_entry(path: String, descriptor: &AssetDescriptor) -> ManifestAsset {
    ManifestAsset {
        path,
        original_url: descriptor.original_url.clone(),
        size_bytes: descriptor.size_bytes,
        sha256: descriptor.sha256.clone(),
    }
}
