use crate::ipc::error::ok;
use crate::ipc::helpers::{cell_field, day_field, required_str, session_ref, HandlerResult};
use crate::ipc::types::{AppState, Request};
use crate::model::Catalog;
use crate::timegrid::{day_of, Day};
use crate::views::{
    available_classes, day_briefing, digest, is_occupied, lessons_by_day, load_meter, teacher_lessons,
    teacher_loads, Lesson,
};
use serde_json::{json, Value};

fn lesson_json(catalog: &Catalog, l: &Lesson) -> Value {
    json!({
        "classId": l.cell.class_id,
        "className": catalog.class_display_name(&l.cell.class_id),
        "day": l.cell.day,
        "dayLabel": l.cell.day.label(),
        "periodId": l.cell.period_id,
        "periodName": catalog.period_display_name(&l.cell.period_id),
        "unit": l.unit,
    })
}

fn handle_teacher_loads(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let session = session_ref(state, req)?;
    let rows: Vec<Value> = teacher_loads(session.schedule(), session.catalog())
        .into_iter()
        .map(|load| {
            let meter = load_meter(load.count);
            json!({ "load": load, "meter": meter })
        })
        .collect();
    Ok(ok(&req.id, json!({ "teachers": rows })))
}

fn handle_teacher_lessons(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let teacher_id = required_str(req, "teacherId")?;
    let session = session_ref(state, req)?;
    let catalog = session.catalog();
    let lessons = teacher_lessons(session.schedule(), catalog, &teacher_id);
    let by_day: Vec<Value> = lessons_by_day(&lessons)
        .iter()
        .map(|(day, ls)| {
            json!({
                "day": day,
                "label": day.label(),
                "lessons": ls.iter().map(|l| lesson_json(catalog, l)).collect::<Vec<_>>(),
            })
        })
        .collect();
    Ok(ok(
        &req.id,
        json!({
            "teacherId": teacher_id,
            "name": catalog.teacher_display_name(&teacher_id),
            "meter": load_meter(lessons.len()),
            "lessons": lessons.iter().map(|l| lesson_json(catalog, l)).collect::<Vec<_>>(),
            "byDay": by_day,
        }),
    ))
}

fn handle_cell(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let cell = cell_field(req, &req.params)?;
    let session = session_ref(state, req)?;
    Ok(ok(
        &req.id,
        json!({
            "cell": cell,
            "occupied": is_occupied(session.schedule(), &cell),
            "units": session.schedule().units(&cell),
        }),
    ))
}

fn handle_available_classes(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let day = day_field(req, &req.params, "day")?;
    let period_id = required_str(req, "periodId")?;
    let session = session_ref(state, req)?;
    let classes = available_classes(session.schedule(), session.catalog(), day, &period_id);
    Ok(ok(&req.id, json!({ "classes": classes })))
}

fn handle_digest(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let session = session_ref(state, req)?;
    Ok(ok(&req.id, digest(session.schedule(), session.catalog())))
}

/// Defaults to the weekday of the selected date.
fn handle_day_briefing(state: &mut AppState, req: &Request) -> HandlerResult<Value> {
    let requested: Option<Day> = match req.params.get("day") {
        Some(Value::String(_)) => Some(day_field(req, &req.params, "day")?),
        _ => None,
    };
    let session = session_ref(state, req)?;
    let day = requested.unwrap_or_else(|| day_of(session.selected_date()));
    Ok(ok(
        &req.id,
        json!({
            "day": day,
            "text": day_briefing(session.schedule(), session.catalog(), day),
        }),
    ))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let resp = match req.method.as_str() {
        "views.teacherLoads" => handle_teacher_loads(state, req),
        "views.teacherLessons" => handle_teacher_lessons(state, req),
        "views.cell" => handle_cell(state, req),
        "views.availableClasses" => handle_available_classes(state, req),
        "views.digest" => handle_digest(state, req),
        "views.dayBriefing" => handle_day_briefing(state, req),
        _ => return None,
    };
    Some(resp.unwrap_or_else(|e| e))
}
