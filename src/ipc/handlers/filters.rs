use crate::calc;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{loaded_dataset, parse_filters};
use crate::ipc::types::{AppState, Request};
use crate::model::{FilterChange, School, ALL};
use crate::views;
use serde_json::json;

fn parse_change(req: &Request) -> Result<FilterChange, serde_json::Value> {
    let Some(field) = req.params.get("field").and_then(|v| v.as_str()) else {
        return Err(err(&req.id, "bad_params", "missing field", None));
    };
    let value = match req.params.get("value") {
        None | Some(serde_json::Value::Null) => ALL.to_string(),
        Some(v) => match v.as_str() {
            Some(s) => s.to_string(),
            None => return Err(err(&req.id, "bad_params", "value must be a string", None)),
        },
    };
    match field {
        "district" => Ok(FilterChange::District(value)),
        "school" => Ok(FilterChange::School(value)),
        "grade" => Ok(FilterChange::Grade(value)),
        other => Err(err(
            &req.id,
            "bad_params",
            "field must be one of: district, school, grade",
            Some(json!({ "field": other })),
        )),
    }
}

fn handle_filters_options(state: &mut AppState, req: &Request) -> serde_json::Value {
    let ds = match loaded_dataset(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let filters = match parse_filters(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let resolved = calc::resolve_filters(ds, &filters);
    let schools: Vec<School> = calc::schools_for_district(ds, &resolved)
        .into_iter()
        .cloned()
        .collect();
    ok(&req.id, json!(views::filter_options(ds, &schools)))
}

fn handle_filters_change(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let current = match parse_filters(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let change = match parse_change(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    ok(
        &req.id,
        json!({ "filters": calc::apply_filter_change(&current, change) }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "filters.options" => Some(handle_filters_options(state, req)),
        "filters.change" => Some(handle_filters_change(state, req)),
        _ => None,
    }
}
