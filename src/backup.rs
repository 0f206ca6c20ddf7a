use crate::db::DB_FILE;
use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const DB_ENTRY: &str = "db/dashboard.sqlite3";
const META_WORKSPACE_ENTRY: &str = "meta/workspace.json";
pub const BUNDLE_FORMAT_V1: &str = "dashd-workspace-v1";
pub const RAW_SQLITE_FORMAT: &str = "raw-sqlite3";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub db_sha256: String,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
}

fn sha256_file(path: &Path) -> anyhow::Result<String> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open {}", path.to_string_lossy()))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut f, &mut hasher)
        .with_context(|| format!("failed to hash {}", path.to_string_lossy()))?;
    Ok(hex(&hasher.finalize()))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn export_workspace_bundle(
    workspace_path: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let db_path = workspace_path.join(DB_FILE);
    if !db_path.is_file() {
        return Err(anyhow!(
            "workspace database not found: {}",
            db_path.to_string_lossy()
        ));
    }

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let db_sha256 = sha256_file(&db_path)?;

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "dbSha256": db_sha256,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(DB_ENTRY, opts)
        .context("failed to start database entry")?;
    let mut db_file = File::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.to_string_lossy()))?;
    std::io::copy(&mut db_file, &mut zip).context("failed to write database entry")?;

    let workspace_meta = json!({
        "sourceWorkspace": workspace_path.to_string_lossy(),
    });
    zip.start_file(META_WORKSPACE_ENTRY, opts)
        .context("failed to start workspace metadata entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&workspace_meta)
            .context("failed to serialize workspace metadata")?
            .as_bytes(),
    )
    .context("failed to write workspace metadata entry")?;

    zip.finish().context("failed to finalize zip bundle")?;
    info!(out = %out_path.to_string_lossy(), sha256 = %db_sha256, "exported workspace bundle");

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: 3,
        db_sha256,
    })
}

/// What an input file turned out to be, judged by its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackupKind {
    Bundle,
    Sqlite,
}

fn leading_bytes(path: &Path) -> anyhow::Result<Vec<u8>> {
    let f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut head = Vec::with_capacity(SQLITE_MAGIC.len());
    f.take(SQLITE_MAGIC.len() as u64)
        .read_to_end(&mut head)
        .context("failed to read file signature")?;
    Ok(head)
}

fn sniff_backup_kind(path: &Path) -> anyhow::Result<BackupKind> {
    let head = leading_bytes(path)?;
    if head.starts_with(ZIP_MAGIC) {
        Ok(BackupKind::Bundle)
    } else if head.starts_with(SQLITE_MAGIC) {
        Ok(BackupKind::Sqlite)
    } else {
        Err(anyhow!(
            "{} is neither a workspace bundle nor a sqlite database",
            path.to_string_lossy()
        ))
    }
}

/// Unpacks the bundle database into `staged`, checking the manifest format
/// and checksum.
fn stage_bundle(in_path: &Path, staged: &Path) -> anyhow::Result<()> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }
    let expected_sha = manifest
        .get("dbSha256")
        .and_then(|v| v.as_str())
        .map(|s| s.to_ascii_lowercase());

    let mut db_out = File::create(staged)
        .with_context(|| format!("failed to create temp database {}", staged.to_string_lossy()))?;
    {
        let mut db_entry = archive
            .by_name(DB_ENTRY)
            .context("bundle missing db/dashboard.sqlite3")?;
        std::io::copy(&mut db_entry, &mut db_out).context("failed to extract database entry")?;
    }
    db_out.flush().context("failed to flush extracted database")?;
    drop(db_out);

    if let Some(expected) = expected_sha {
        let actual = sha256_file(staged)?;
        if actual != expected {
            return Err(anyhow!(
                "database checksum mismatch: manifest {} but extracted {}",
                expected,
                actual
            ));
        }
    }
    if !leading_bytes(staged)?.starts_with(SQLITE_MAGIC) {
        return Err(anyhow!("bundle database entry is not a sqlite database"));
    }
    Ok(())
}

/// Restores a workspace database from a bundle or a bare sqlite file. The
/// current database is only replaced once the input has been fully checked.
pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    let kind = sniff_backup_kind(in_path)?;
    std::fs::create_dir_all(workspace_path).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace_path.to_string_lossy()
        )
    })?;
    let dst = workspace_path.join(DB_FILE);
    let staged = workspace_path.join(format!("{}.importing", DB_FILE));
    if staged.exists() {
        let _ = std::fs::remove_file(&staged);
    }

    let staged_result = match kind {
        BackupKind::Bundle => stage_bundle(in_path, &staged),
        BackupKind::Sqlite => std::fs::copy(in_path, &staged)
            .map(|_| ())
            .with_context(|| {
                format!(
                    "failed to copy sqlite backup {}",
                    in_path.to_string_lossy()
                )
            }),
    };
    if let Err(e) = staged_result {
        let _ = std::fs::remove_file(&staged);
        return Err(e);
    }

    std::fs::rename(&staged, &dst).with_context(|| {
        format!(
            "failed to move extracted database to {}",
            dst.to_string_lossy()
        )
    })?;
    let detected = match kind {
        BackupKind::Bundle => BUNDLE_FORMAT_V1,
        BackupKind::Sqlite => RAW_SQLITE_FORMAT,
    };
    info!(
        workspace = %workspace_path.to_string_lossy(),
        format = detected,
        "restored workspace database"
    );

    Ok(ImportSummary {
        bundle_format_detected: detected.to_string(),
    })
}
