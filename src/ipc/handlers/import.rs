use crate::import::extract_json_from_text;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{session_mut, HandlerResult};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};
use std::time::Instant;

/// `{payload}` takes a parsed object; `{text}` takes raw assistant output.
fn handle_partial_state(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let payload = match (req.params.get("payload"), req.params.get("text").and_then(|v| v.as_str())) {
        (Some(p), _) if !p.is_null() => p.clone(),
        (_, Some(text)) => extract_json_from_text(text)
            .map_err(|e| err(&req.id, "bad_params", format!("{e:#}"), None))?,
        _ => return Err(err(&req.id, "bad_params", "missing payload or text", None)),
    };
    let session = session_mut(state, req)?;
    let outcome = session
        .import_partial(&payload, Instant::now())
        .map_err(|e| err(&req.id, "validation_failed", format!("{e:#}"), None))?;
    let p = &outcome.partial;
    Ok(ok(
        &req.id,
        json!({
            "applied": {
                "teachers": p.teachers.as_ref().map(Vec::len),
                "classes": p.classes.as_ref().map(Vec::len),
                "periods": p.periods.as_ref().map(Vec::len),
                "courses": p.courses.as_ref().map(Vec::len),
                "units": p.schedule.as_ref().map(|s| s.unit_count()),
            },
            "skipped": outcome.skipped,
        }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "import.partialState" => handle_partial_state(state, req),
        _ => return None,
    };
    Some(resp.unwrap_or_else(|e| e))
}
