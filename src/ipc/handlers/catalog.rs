use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{dispatch, required_str, session_mut, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::model::{new_id, normalize_classes, normalize_courses, normalize_periods, normalize_teachers};
use crate::state::{temp_class_id, Action};
use serde_json::{json, Value};

fn list_param<'a>(req: &'a Request, key: &str) -> HandlerResult<&'a Value> {
    req.params
        .get(key)
        .filter(|v| v.is_array())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {key} array"), None))
}

fn handle_teachers_set(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let teachers = normalize_teachers(Some(list_param(req, "teachers")?));
    let session = session_mut(state, req)?;
    dispatch(session, req, Action::SetTeachers(teachers))?;
    Ok(ok(&req.id, json!({ "teachers": session.catalog().teachers })))
}

fn handle_classes_set(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let classes = normalize_classes(Some(list_param(req, "classes")?));
    let session = session_mut(state, req)?;
    dispatch(session, req, Action::SetClasses(classes))?;
    Ok(ok(&req.id, json!({ "classes": session.catalog().classes })))
}

fn handle_periods_set(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let periods = normalize_periods(Some(list_param(req, "periods")?));
    let session = session_mut(state, req)?;
    dispatch(session, req, Action::SetPeriods(periods))?;
    Ok(ok(&req.id, json!({ "periods": session.catalog().periods })))
}

fn handle_courses_set(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let courses = normalize_courses(Some(list_param(req, "courses")?));
    let session = session_mut(state, req)?;
    dispatch(session, req, Action::SetCourses(courses))?;
    Ok(ok(&req.id, json!({ "courses": session.catalog().courses })))
}

fn handle_courses_upsert_by_name(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let name = required_str(req, "name")?;
    let session = session_mut(state, req)?;
    let before = session.catalog().courses.len();
    dispatch(
        session,
        req,
        Action::UpsertCourseByName {
            id: new_id("course"),
            name,
        },
    )?;
    let courses = &session.catalog().courses;
    Ok(ok(
        &req.id,
        json!({ "created": courses.len() > before, "courses": courses }),
    ))
}

fn handle_periods_add(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let session = session_mut(state, req)?;
    dispatch(session, req, Action::AddPeriod { id: new_id("period") })?;
    Ok(ok(&req.id, json!({ "period": session.catalog().periods.last() })))
}

fn period_time_params(req: &Request, key: &str) -> HandlerResult<(String, String)> {
    let period_id = required_str(req, "periodId")?;
    let time = req
        .params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {key}"), None))?;
    Ok((period_id, time.to_string()))
}

fn handle_periods_update_start(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let (period_id, start_time) = period_time_params(req, "startTime")?;
    let session = session_mut(state, req)?;
    if session.catalog().period(&period_id).is_none() {
        return Err(err(&req.id, "not_found", "period not found", None));
    }
    dispatch(
        session,
        req,
        Action::UpdatePeriodStart {
            period_id: period_id.clone(),
            start_time,
        },
    )?;
    Ok(ok(&req.id, json!({ "period": session.catalog().period(&period_id) })))
}

fn handle_periods_update_end(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let (period_id, end_time) = period_time_params(req, "endTime")?;
    let session = session_mut(state, req)?;
    if session.catalog().period(&period_id).is_none() {
        return Err(err(&req.id, "not_found", "period not found", None));
    }
    dispatch(
        session,
        req,
        Action::UpdatePeriodEnd {
            period_id: period_id.clone(),
            end_time,
        },
    )?;
    Ok(ok(&req.id, json!({ "period": session.catalog().period(&period_id) })))
}

fn handle_classes_ensure_temp(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let session = session_mut(state, req)?;
    if let Some(class_id) = temp_class_id(session.catalog()) {
        return Ok(ok(&req.id, json!({ "classId": class_id, "created": false })));
    }
    let class_id = new_id("class_temp");
    dispatch(session, req, Action::EnsureTempClass { id: class_id.clone() })?;
    Ok(ok(&req.id, json!({ "classId": class_id, "created": true })))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "teachers.set" => handle_teachers_set(state, req),
        "classes.set" => handle_classes_set(state, req),
        "periods.set" => handle_periods_set(state, req),
        "courses.set" => handle_courses_set(state, req),
        "courses.upsertByName" => handle_courses_upsert_by_name(state, req),
        "periods.add" => handle_periods_add(state, req),
        "periods.updateStart" => handle_periods_update_start(state, req),
        "periods.updateEnd" => handle_periods_update_end(state, req),
        "classes.ensureTemp" => handle_classes_ensure_temp(state, req),
        _ => return None,
    };
    Some(resp.unwrap_or_else(|e| e))
}
