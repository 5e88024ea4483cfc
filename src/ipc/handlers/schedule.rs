use crate::conflict::{double_bookings, find_teacher_conflict};
use crate::ipc::error::{err, ok, schedule_err};
use crate::ipc::helpers::{
    cell_field, day_field, dispatch, object_param, required_str, session_mut, session_ref,
    unit_ref_param, HandlerResult,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{new_id, ScheduleUnit};
use crate::state::Action;
use serde_json::{json, Value};

fn loose_param<'a>(obj: &'a Value, key: &str) -> &'a str {
    obj.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

/// Also lists double bookings, which only stored or legacy data can contain.
fn handle_get(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let session = session_ref(state, req)?;
    let collisions: Vec<Value> = double_bookings(session.schedule())
        .into_iter()
        .map(|(teacher_id, day, period_id, cells)| {
            json!({ "teacherId": teacher_id, "day": day, "periodId": period_id, "cells": cells })
        })
        .collect();
    Ok(ok(
        &req.id,
        json!({
            "weekStart": session.week_start_ymd(),
            "schedule": session.schedule(),
            "unitCount": session.schedule().unit_count(),
            "doubleBookings": collisions,
        }),
    ))
}

fn handle_check_conflict(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let teacher_id = required_str(req, "teacherId")?;
    let day = day_field(req, &req.params, "day")?;
    let period_id = required_str(req, "periodId")?;
    let ignore = req.params.get("ignoreUnitId").and_then(|v| v.as_str());
    let session = session_ref(state, req)?;
    let conflict = find_teacher_conflict(session.schedule(), &teacher_id, day, &period_id, ignore);
    let class_name = conflict
        .as_ref()
        .map(|c| session.catalog().class_display_name(&c.cell.class_id));
    Ok(ok(
        &req.id,
        json!({ "conflict": conflict, "className": class_name }),
    ))
}

/// `{classId, day, periodId, unit: {id?, teacherId}}`. A unit without id is
/// a new placement and gets one.
fn handle_upsert_unit(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let cell = cell_field(req, &req.params)?;
    let raw = object_param(req, "unit")?;
    let unit_id = match loose_param(raw, "id").trim() {
        "" => new_id("unit"),
        id => id.to_string(),
    };
    let unit = ScheduleUnit {
        id: unit_id.clone(),
        teacher_id: loose_param(raw, "teacherId").to_string(),
        group_name: String::new(),
    };
    let session = session_mut(state, req)?;
    dispatch(session, req, Action::UpsertUnit { cell: cell.clone(), unit })?;
    let stored = session.schedule().find_unit(&cell, &unit_id);
    Ok(ok(&req.id, json!({ "cell": cell, "unit": stored })))
}

fn handle_delete_unit(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let cell = cell_field(req, &req.params)?;
    let unit_id = required_str(req, "unitId")?;
    let session = session_mut(state, req)?;
    let existed = session.schedule().find_unit(&cell, &unit_id).is_some();
    dispatch(session, req, Action::DeleteUnit { cell, unit_id })?;
    Ok(ok(&req.id, json!({ "deleted": existed })))
}

fn handle_move_unit(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let from = unit_ref_param(req, "from")?;
    let to = cell_field(req, object_param(req, "to")?)?;
    let session = session_mut(state, req)?;
    if session.schedule().find_unit(&from.cell, &from.unit_id).is_none() {
        return Err(err(&req.id, "not_found", "unit not found in source cell", None));
    }
    let unit_id = from.unit_id.clone();
    dispatch(session, req, Action::MoveUnit { from, to: to.clone() })?;
    Ok(ok(
        &req.id,
        json!({ "cell": to, "unit": session.schedule().find_unit(&to, &unit_id) }),
    ))
}

fn handle_place_for_teacher(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let cell = cell_field(req, &req.params)?;
    let teacher_id = loose_param(&req.params, "teacherId").to_string();
    let unit_id = new_id("unit");
    let session = session_mut(state, req)?;
    dispatch(
        session,
        req,
        Action::PlaceForTeacher {
            cell: cell.clone(),
            teacher_id,
            unit_id: unit_id.clone(),
        },
    )?;
    Ok(ok(
        &req.id,
        json!({ "cell": cell, "unit": session.schedule().find_unit(&cell, &unit_id) }),
    ))
}

fn handle_swap_propose(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let src = unit_ref_param(req, "src")?;
    let tgt = unit_ref_param(req, "tgt")?;
    let session = session_mut(state, req)?;
    match session.propose_swap(&src, &tgt) {
        Ok((plan_id, plan)) => Ok(ok(&req.id, json!({ "planId": plan_id, "plan": plan }))),
        Err(e) => Err(schedule_err(&req.id, &e, session.catalog())),
    }
}

fn handle_swap_confirm(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let plan_id = required_str(req, "planId")?;
    let session = session_mut(state, req)?;
    match session.confirm_swap(&plan_id, std::time::Instant::now()) {
        Ok(Some(plan)) => Ok(ok(&req.id, json!({ "applied": true, "plan": plan }))),
        Ok(None) => Err(err(&req.id, "not_found", "swap plan not found", None)),
        Err(e) => Err(schedule_err(&req.id, &e, session.catalog())),
    }
}

fn handle_swap_cancel(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let plan_id = required_str(req, "planId")?;
    let session = session_mut(state, req)?;
    Ok(ok(&req.id, json!({ "cancelled": session.cancel_swap(&plan_id) })))
}

fn handle_clear(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let session = session_mut(state, req)?;
    let removed = session.schedule().unit_count();
    dispatch(session, req, Action::ClearSchedule)?;
    Ok(ok(&req.id, json!({ "removed": removed })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "schedule.get" => handle_get(state, req),
        "schedule.checkConflict" => handle_check_conflict(state, req),
        "schedule.upsertUnit" => handle_upsert_unit(state, req),
        "schedule.deleteUnit" => handle_delete_unit(state, req),
        "schedule.moveUnit" => handle_move_unit(state, req),
        "schedule.placeForTeacher" => handle_place_for_teacher(state, req),
        "schedule.swap.propose" => handle_swap_propose(state, req),
        "schedule.swap.confirm" => handle_swap_confirm(state, req),
        "schedule.swap.cancel" => handle_swap_cancel(state, req),
        "schedule.clear" => handle_clear(state, req),
        _ => return None,
    };
    Some(resp.unwrap_or_else(|e| e))
}
