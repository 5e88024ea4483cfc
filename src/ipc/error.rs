use crate::model::Catalog;
use crate::mutation::ScheduleError;
use crate::store::StoreError;
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

/// Rejected placement. Conflicts name the class, day and period of the
/// existing booking so the UI can say where the teacher already is.
pub fn schedule_err(id: &str, e: &ScheduleError, catalog: &Catalog) -> serde_json::Value {
    match e {
        ScheduleError::Validation(msg) => err(id, e.code(), msg.clone(), None),
        ScheduleError::Conflict(c) => {
            let class_name = catalog.class_display_name(&c.cell.class_id);
            let period_name = catalog.period_display_name(&c.cell.period_id);
            err(
                id,
                e.code(),
                format!(
                    "teacher is already booked in {} {} {}",
                    class_name,
                    c.cell.day.label(),
                    period_name
                ),
                Some(json!({
                    "classId": c.cell.class_id,
                    "day": c.cell.day,
                    "periodId": c.cell.period_id,
                    "unitId": c.unit_id,
                    "className": class_name,
                    "periodName": period_name,
                })),
            )
        }
        ScheduleError::Duplicate { cell, teacher_id } => err(
            id,
            e.code(),
            e.to_string(),
            Some(json!({
                "classId": cell.class_id,
                "day": cell.day,
                "periodId": cell.period_id,
                "teacherId": teacher_id,
            })),
        ),
        ScheduleError::SlotOccupied(cell) => err(id, e.code(), e.to_string(), Some(json!(cell))),
    }
}

pub fn store_err(id: &str, e: &StoreError) -> serde_json::Value {
    err(id, "persistence_failed", e.to_string(), None)
}
