use crate::dataset;
use crate::db;
use crate::ipc::error::{dataset_err, err, no_workspace, ok};
use crate::ipc::helpers::{db_conn, loaded_dataset, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};

fn handle_dataset_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match required_str(req, "path") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    let Some(conn) = state.db.as_mut() else {
        return no_workspace(&req.id);
    };

    let (ds, report) = match dataset::load_validated(&path) {
        Ok(v) => v,
        Err(e) => {
            warn!(path = %path.to_string_lossy(), code = %e.code, "dataset rejected");
            return dataset_err(&req.id, e);
        }
    };
    for w in &report.warnings {
        warn!(path = %path.to_string_lossy(), "{}", w);
    }

    let record = match db::replace_dataset(conn, &ds, Some(&path)) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_update_failed", format!("{e:#}"), None),
    };
    info!(
        import_id = %record.import_id,
        facts = record.counts.facts,
        students = record.counts.student_details,
        "dataset imported"
    );
    state.dataset = Some(ds);

    ok(
        &req.id,
        json!({
            "importId": record.import_id,
            "importedAt": record.imported_at,
            "counts": record.counts,
            "warnings": report.warnings
        }),
    )
}

fn handle_dataset_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let last = match db::last_import(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let ds = match loaded_dataset(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(
        &req.id,
        json!({
            "counts": ds.counts(),
            "lastImport": last
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dataset.import" => Some(handle_dataset_import(state, req)),
        "dataset.summary" => Some(handle_dataset_summary(state, req)),
        _ => None,
    }
}
