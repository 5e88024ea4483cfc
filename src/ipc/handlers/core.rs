use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{open_workspace, required_str, session_ref};
use crate::ipc::types::{AppState, Request};
use crate::session::Session;
use crate::timegrid::format_ymd;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "appId": state.config.app_id,
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match required_str(req, "path") {
        Ok(p) => PathBuf::from(p),
        Err(e) => return e,
    };
    match open_workspace(state, &path) {
        Ok(()) => {
            let week_start = state.session.as_ref().map(Session::week_start_ymd);
            ok(
                &req.id,
                json!({
                    "workspacePath": path.to_string_lossy(),
                    "weekStart": week_start,
                }),
            )
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:#}"), None),
    }
}

pub fn state_snapshot(session: &Session) -> serde_json::Value {
    let t = session.timetable();
    json!({
        "teachers": t.catalog.teachers,
        "classes": t.catalog.classes,
        "periods": t.catalog.periods,
        "courses": t.catalog.courses,
        "schedule": t.schedule,
        "hasLoaded": t.has_loaded,
        "selectedDate": format_ymd(session.selected_date()),
        "weekStart": session.week_start_ymd(),
        "saveStatus": session.autosave().status(),
    })
}

fn handle_state_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    match session_ref(state, req) {
        Ok(session) => ok(&req.id, state_snapshot(session)),
        Err(e) => e,
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "state.get" => Some(handle_state_get(state, req)),
        _ => None,
    }
}
