use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{required_str, session_mut, session_ref, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::timegrid::{format_ymd, week_start_from_ymd};
use serde_json::{json, Value};
use std::time::Instant;

fn week_param(req: &Request) -> HandlerResult<String> {
    let raw = required_str(req, "weekStart")?;
    week_start_from_ymd(&raw)
        .map(format_ymd)
        .ok_or_else(|| err(&req.id, "bad_params", format!("invalid weekStart: {raw}"), None))
}

fn handle_list(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let session = session_ref(state, req)?;
    let archives = session.list_archives().map_err(|e| store_err(&req.id, &e))?;
    Ok(ok(
        &req.id,
        json!({
            "archives": archives,
            "pendingDeletes": session.pending_deletes(),
        }),
    ))
}

/// Hidden right away; removed from storage by the next flush.
fn handle_mark_delete(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let week_start = week_param(req)?;
    let session = session_mut(state, req)?;
    let changed = session.mark_delete(&week_start, Instant::now());
    Ok(ok(
        &req.id,
        json!({ "weekStart": week_start, "changed": changed, "pendingDeletes": session.pending_deletes() }),
    ))
}

fn handle_unmark_delete(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let week_start = week_param(req)?;
    let session = session_mut(state, req)?;
    let changed = session.unmark_delete(&week_start, Instant::now());
    Ok(ok(
        &req.id,
        json!({ "weekStart": week_start, "changed": changed, "pendingDeletes": session.pending_deletes() }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "archives.list" => handle_list(state, req),
        "archives.markDelete" => handle_mark_delete(state, req),
        "archives.unmarkDelete" => handle_unmark_delete(state, req),
        _ => return None,
    };
    Some(resp.unwrap_or_else(|e| e))
}
