use crate::ipc::error::{err, ok, store_err};
use crate::ipc::helpers::{required_str, session_mut, session_ref, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::session::Session;
use crate::timegrid::{day_date_labels, format_ymd, parse_ymd, week_range_label};
use serde_json::{json, Value};
use std::time::Instant;

fn week_json(session: &Session) -> Value {
    let days: Vec<Value> = day_date_labels(session.week_start())
        .into_iter()
        .map(|(day, date)| json!({ "day": day, "label": day.label(), "date": date }))
        .collect();
    json!({
        "selectedDate": format_ymd(session.selected_date()),
        "weekStart": session.week_start_ymd(),
        "rangeLabel": week_range_label(session.week_start()),
        "days": days,
        "schedule": session.schedule(),
    })
}

fn handle_select(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let raw = required_str(req, "date")?;
    let date = parse_ymd(&raw)
        .ok_or_else(|| err(&req.id, "bad_params", format!("invalid date: {raw}"), None))?;
    let session = session_mut(state, req)?;
    session
        .select_date(date, Instant::now())
        .map_err(|e| store_err(&req.id, &e))?;
    Ok(ok(&req.id, week_json(session)))
}

fn handle_current(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let session = session_ref(state, req)?;
    Ok(ok(&req.id, week_json(session)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "week.select" => handle_select(state, req),
        "week.current" => handle_current(state, req),
        _ => return None,
    };
    Some(resp.unwrap_or_else(|e| e))
}
