use crate::db;
use crate::ipc::error::{err, no_workspace, ok};
use crate::ipc::types::{AppState, Request};
use crate::views::DEFAULT_PAGE_SIZE;
use serde_json::{json, Map, Value};

const DASHBOARD_KEY: &str = "setup.dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashboardSettings {
    pub students_page_size: usize,
    pub schools_page_size: usize,
}

fn default_dashboard() -> Value {
    json!({
        "studentsPageSize": DEFAULT_PAGE_SIZE,
        "schoolsPageSize": DEFAULT_PAGE_SIZE
    })
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn merge_dashboard_patch(current: &mut Value, patch: &Map<String, Value>) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match k.as_str() {
            "studentsPageSize" | "schoolsPageSize" => {
                obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 100)?));
            }
            _ => return Err(format!("unknown dashboard field: {}", k)),
        }
    }
    Ok(())
}

fn load_dashboard_section(conn: &rusqlite::Connection) -> anyhow::Result<Value> {
    let mut current = default_dashboard();
    if let Some(saved) = db::settings_get_json(conn, DASHBOARD_KEY)? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed saved values fall back to defaults.
            let mut candidate = current.clone();
            if merge_dashboard_patch(&mut candidate, saved_obj).is_ok() {
                current = candidate;
            }
        }
    }
    Ok(current)
}

pub fn load_dashboard_settings(conn: &rusqlite::Connection) -> anyhow::Result<DashboardSettings> {
    let section = load_dashboard_section(conn)?;
    let size = |key: &str| {
        section
            .get(key)
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_PAGE_SIZE)
    };
    Ok(DashboardSettings {
        students_page_size: size("studentsPageSize"),
        schools_page_size: size("schoolsPageSize"),
    })
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let dashboard = match load_dashboard_section(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "dashboard": dashboard }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let Some(section) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    if section != "dashboard" {
        return err(&req.id, "bad_params", "unknown section", None);
    }
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_dashboard_section(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_dashboard_patch(&mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, DASHBOARD_KEY, &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "dashboard": current }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
