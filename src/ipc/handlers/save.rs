use crate::ipc::error::{ok, store_err};
use crate::ipc::helpers::{session_mut, session_ref, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::session::Session;
use serde_json::{json, Value};

fn status_json(session: &Session) -> Value {
    let autosave = session.autosave();
    json!({
        "status": autosave.status(),
        "lastSavedAt": autosave.last_saved_at(),
        "lastError": autosave.last_error(),
        "hasUnsaved": session.has_unsaved(),
        "pendingDeletes": session.pending_deletes(),
    })
}

fn handle_flush(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let session = session_mut(state, req)?;
    session.flush().map_err(|e| store_err(&req.id, &e))?;
    Ok(ok(&req.id, status_json(session)))
}

fn handle_status(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let session = session_ref(state, req)?;
    Ok(ok(&req.id, status_json(session)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "save.flush" => handle_flush(state, req),
        "save.status" => handle_status(state, req),
        _ => return None,
    };
    Some(resp.unwrap_or_else(|e| e))
}
