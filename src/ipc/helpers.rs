use crate::db;
use crate::ipc::error::{err, no_workspace};
use crate::ipc::types::{AppState, Request};
use crate::model::{DataFilters, Dataset, DatasetCounts, ALL};
use rusqlite::Connection;
use std::path::Path;
use tracing::info;

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn db_conn<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| no_workspace(&req.id))
}

pub fn loaded_dataset<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a Dataset, serde_json::Value> {
    state
        .dataset
        .as_ref()
        .ok_or_else(|| no_workspace(&req.id))
}

/// Opens (or creates) the workspace database and caches its tables.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<DatasetCounts> {
    let conn = db::open_db(path)?;
    let dataset = db::load_dataset(&conn)?;
    let counts = dataset.counts();
    info!(
        workspace = %path.to_string_lossy(),
        schools = counts.schools,
        facts = counts.facts,
        students = counts.student_details,
        "workspace opened"
    );
    state.workspace = Some(path.to_path_buf());
    state.db = Some(conn);
    state.dataset = Some(dataset);
    Ok(counts)
}

fn parse_selection(
    obj: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<String, String> {
    match obj.get(key) {
        None | Some(serde_json::Value::Null) => Ok(ALL.to_string()),
        Some(v) => v
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| format!("filters.{} must be a string", key)),
    }
}

/// Missing or null selections mean `"all"`.
pub fn parse_filters(req: &Request) -> Result<DataFilters, serde_json::Value> {
    let raw = match req.params.get("filters") {
        None | Some(serde_json::Value::Null) => return Ok(DataFilters::default()),
        Some(v) => v,
    };
    let Some(obj) = raw.as_object() else {
        return Err(err(&req.id, "bad_params", "filters must be an object", None));
    };
    let parse =
        |key: &str| parse_selection(obj, key).map_err(|m| err(&req.id, "bad_params", m, None));
    Ok(DataFilters {
        selected_district: parse("selectedDistrict")?,
        selected_school: parse("selectedSchool")?,
        selected_grade: parse("selectedGrade")?,
    })
}

/// The search term is used verbatim; only a missing or null term is empty.
pub fn parse_search(req: &Request) -> Result<String, serde_json::Value> {
    match req.params.get("search") {
        None | Some(serde_json::Value::Null) => Ok(String::new()),
        Some(v) => v
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| err(&req.id, "bad_params", "search must be string or null", None)),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PageQuery {
    pub page: usize,
    pub page_size: Option<usize>,
}

pub fn parse_page_query(req: &Request) -> Result<PageQuery, serde_json::Value> {
    let query = req
        .params
        .get("query")
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_default();

    let page = match query.get("page") {
        None | Some(serde_json::Value::Null) => 1,
        Some(v) => match v.as_u64() {
            Some(0) => return Err(err(&req.id, "bad_params", "query.page must be >= 1", None)),
            Some(p) => p as usize,
            None => {
                return Err(err(
                    &req.id,
                    "bad_params",
                    "query.page must be a positive integer",
                    None,
                ))
            }
        },
    };
    let page_size = match query.get("pageSize") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => match v.as_u64() {
            Some(size) if (1..=500).contains(&size) => Some(size as usize),
            _ => {
                return Err(err(
                    &req.id,
                    "bad_params",
                    "query.pageSize must be in range 1..=500",
                    None,
                ))
            }
        },
    };
    Ok(PageQuery { page, page_size })
}
