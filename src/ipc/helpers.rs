use crate::ipc::error::{err, schedule_err};
use crate::ipc::types::{AppState, Request};
use crate::mutation::UnitRef;
use crate::session::Session;
use crate::state::Action;
use crate::store::SqliteStore;
use crate::timegrid::{CellKey, Day};
use anyhow::Context;
use serde_json::Value;
use std::path::Path;
use std::time::Instant;

pub type HandlerResult<T> = Result<T, Value>;

/// Opens (or creates) the workspace database and loads its timetable. A
/// session already open is flushed first if it has unsaved edits.
pub fn open_workspace(state: &mut AppState, path: &Path) -> anyhow::Result<()> {
    if let Some(prev) = state.session.as_mut() {
        if prev.has_unsaved() {
            prev.flush().context("failed to save the previous workspace")?;
        }
    }
    let store = SqliteStore::open(path)?;
    let today = chrono::Local::now().date_naive();
    let session = Session::open(
        Box::new(store),
        &state.config.app_id,
        state.config.autosave_debounce,
        today,
        Instant::now(),
    )
    .context("failed to load timetable")?;
    state.workspace = Some(path.to_path_buf());
    state.session = Some(session);
    tracing::info!(workspace = %path.to_string_lossy(), "workspace selected");
    Ok(())
}

pub fn session_mut<'a>(state: &'a mut AppState, req: &Request) -> HandlerResult<&'a mut Session> {
    state
        .session
        .as_mut()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn session_ref<'a>(state: &'a AppState, req: &Request) -> HandlerResult<&'a Session> {
    state
        .session
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn str_field(req: &Request, obj: &Value, key: &str) -> HandlerResult<String> {
    obj.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {key}"), None))
}

pub fn required_str(req: &Request, key: &str) -> HandlerResult<String> {
    str_field(req, &req.params, key)
}

pub fn day_field(req: &Request, obj: &Value, key: &str) -> HandlerResult<Day> {
    let raw = str_field(req, obj, key)?;
    Day::parse(&raw).ok_or_else(|| err(&req.id, "bad_params", format!("unknown day: {raw}"), None))
}

/// `{classId, day, periodId}` read from `obj`.
pub fn cell_field(req: &Request, obj: &Value) -> HandlerResult<CellKey> {
    Ok(CellKey::new(
        str_field(req, obj, "classId")?,
        day_field(req, obj, "day")?,
        str_field(req, obj, "periodId")?,
    ))
}

/// `{classId, day, periodId, unitId}` under `params[key]`.
pub fn unit_ref_param(req: &Request, key: &str) -> HandlerResult<UnitRef> {
    let obj = req
        .params
        .get(key)
        .filter(|v| v.is_object())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {key}"), None))?;
    Ok(UnitRef::new(cell_field(req, obj)?, str_field(req, obj, "unitId")?))
}

pub fn object_param<'a>(req: &'a Request, key: &str) -> HandlerResult<&'a Value> {
    req.params
        .get(key)
        .filter(|v| v.is_object())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {key}"), None))
}

/// Runs one state transition, turning a rejection into an error response.
pub fn dispatch(session: &mut Session, req: &Request, action: Action) -> HandlerResult<()> {
    match session.dispatch(action, Instant::now()) {
        Ok(()) => Ok(()),
        Err(e) => Err(schedule_err(&req.id, &e, session.catalog())),
    }
}
