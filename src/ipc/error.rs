use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Reply for methods that need a selected workspace.
pub fn no_workspace(id: &str) -> serde_json::Value {
    err(id, "no_workspace", "select a workspace first", None)
}

/// Converts a dataset rejection into the response envelope.
pub fn dataset_err(id: &str, e: crate::dataset::DatasetError) -> serde_json::Value {
    err(id, &e.code, e.message, e.details)
}
