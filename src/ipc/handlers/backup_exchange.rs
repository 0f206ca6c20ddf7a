use crate::backup;
use crate::ipc::error::{err, no_workspace, ok};
use crate::ipc::helpers::open_workspace;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::warn;

fn handle_workspace_export_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_path = match req.params.get("outPath").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing outPath", None),
    };
    let workspace_path = req
        .params
        .get("workspacePath")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
        .or_else(|| state.workspace.clone());
    let Some(workspace_path) = workspace_path else {
        return no_workspace(&req.id);
    };

    if let Some(conn) = state.db.as_ref() {
        let _ = conn.execute_batch("PRAGMA wal_checkpoint(FULL)");
    }

    let out = PathBuf::from(&out_path);
    let export = match backup::export_workspace_bundle(&workspace_path, &out) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "export_failed",
                format!("{e:#}"),
                Some(json!({ "path": out_path })),
            )
        }
    };

    ok(
        &req.id,
        json!({
            "path": out_path,
            "bundleFormat": export.bundle_format,
            "entryCount": export.entry_count,
            "dbSha256": export.db_sha256
        }),
    )
}

fn handle_workspace_import_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let in_path = match req.params.get("inPath").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing inPath", None),
    };
    let workspace_path = req
        .params
        .get("workspacePath")
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
        .or_else(|| state.workspace.clone());
    let Some(workspace_path) = workspace_path else {
        return no_workspace(&req.id);
    };

    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return err(
            &req.id,
            "import_failed",
            "bundle file not found",
            Some(json!({ "path": in_path })),
        );
    }

    // The database file may be replaced underneath the open handle.
    let previous = state.workspace.clone();
    state.db = None;

    let import = match backup::import_workspace_bundle(&src, &workspace_path) {
        Ok(v) => v,
        Err(e) => {
            reopen_previous(state, previous.as_deref());
            return err(
                &req.id,
                "import_failed",
                format!("{e:#}"),
                Some(json!({ "path": src.to_string_lossy() })),
            );
        }
    };

    match open_workspace(state, &workspace_path) {
        Ok(counts) => ok(
            &req.id,
            json!({
                "workspacePath": workspace_path.to_string_lossy(),
                "bundleFormatDetected": import.bundle_format_detected,
                "counts": counts
            }),
        ),
        Err(e) => {
            reopen_previous(state, previous.as_deref());
            err(&req.id, "db_open_failed", format!("{e:#}"), None)
        }
    }
}

/// Puts the session back on the workspace it had before a failed restore.
fn reopen_previous(state: &mut AppState, previous: Option<&Path>) {
    let Some(path) = previous else {
        state.dataset = None;
        return;
    };
    if let Err(e) = open_workspace(state, path) {
        warn!(
            workspace = %path.to_string_lossy(),
            error = %format!("{e:#}"),
            "failed to reopen workspace"
        );
        state.workspace = None;
        state.dataset = None;
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "workspace.exportBundle" => Some(handle_workspace_export_bundle(state, req)),
        "workspace.importBundle" => Some(handle_workspace_import_bundle(state, req)),
        _ => None,
    }
}
