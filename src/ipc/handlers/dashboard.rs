use crate::calc;
use crate::ipc::error::{err, no_workspace, ok};
use crate::ipc::handlers::setup::{load_dashboard_settings, DashboardSettings};
use crate::ipc::helpers::{loaded_dataset, parse_filters, parse_page_query, parse_search};
use crate::ipc::types::{AppState, Request};
use crate::views;
use serde_json::json;

fn page_settings(state: &AppState, req: &Request) -> Result<DashboardSettings, serde_json::Value> {
    let Some(conn) = state.db.as_ref() else {
        return Err(no_workspace(&req.id));
    };
    load_dashboard_settings(conn).map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))
}

fn handle_dashboard_view(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ds = match loaded_dataset(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let filters = match parse_filters(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let search = match parse_search(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let view = calc::compute_dashboard_view(ds, &filters, &search);
    let cards = views::dashboard_cards(&view, &filters);
    let gauge = views::participation_gauge(view.total_registered, view.total_participated);

    let mut result = json!(view);
    result["filters"] = json!(filters);
    result["search"] = json!(search);
    result["cards"] = json!(cards);
    result["gauge"] = json!(gauge);
    ok(&req.id, result)
}

fn handle_dashboard_schools_page(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ds = match loaded_dataset(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let filters = match parse_filters(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let query = match parse_page_query(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let settings = match page_settings(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let resolved = calc::resolve_filters(ds, &filters);
    let facts = calc::filter_facts(&ds.facts, &resolved);
    let rows = views::school_rows(&calc::school_performance(ds, &facts));
    let page = views::paginate(
        &rows,
        query.page,
        query.page_size.unwrap_or(settings.schools_page_size),
    );
    ok(&req.id, json!(page))
}

fn handle_dashboard_students_page(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ds = match loaded_dataset(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let filters = match parse_filters(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let search = match parse_search(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let query = match parse_page_query(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let settings = match page_settings(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let students = calc::filter_student_details(&ds.student_details, &filters, &search);
    let page = views::paginate(
        &students,
        query.page,
        query.page_size.unwrap_or(settings.students_page_size),
    );
    ok(&req.id, json!(page))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.view" => Some(handle_dashboard_view(state, req)),
        "dashboard.schools.page" => Some(handle_dashboard_schools_page(state, req)),
        "dashboard.students.page" => Some(handle_dashboard_students_page(state, req)),
        _ => None,
    }
}
