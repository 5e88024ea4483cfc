use crate::schedule::ScheduleMapping;
use crate::timegrid::{CellKey, Day};
use serde::Serialize;

/// Where an existing booking of the queried teacher lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub cell: CellKey,
    pub unit_id: String,
}

/// Finds any unit of `teacher_id` at (`day`, `period_id`) in any class,
/// skipping the unit whose id is `ignore_unit_id`. The first hit is enough
/// to reject a placement, so the scan stops there.
pub fn find_teacher_conflict(
    mapping: &ScheduleMapping,
    teacher_id: &str,
    day: Day,
    period_id: &str,
    ignore_unit_id: Option<&str>,
) -> Option<Conflict> {
    let teacher_id = teacher_id.trim();
    if teacher_id.is_empty() {
        return None;
    }
    for (key, units) in mapping.iter() {
        if !key.same_slot(day, period_id) {
            continue;
        }
        for u in units {
            if u.teacher_id != teacher_id {
                continue;
            }
            if ignore_unit_id.is_some_and(|ignored| ignored == u.id) {
                continue;
            }
            return Some(Conflict {
                cell: key.clone(),
                unit_id: u.id.clone(),
            });
        }
    }
    None
}

/// Every (teacher, slot) that is booked more than once. Mutations never
/// produce these; data loaded from outside may.
pub fn double_bookings(mapping: &ScheduleMapping) -> Vec<(String, Day, String, Vec<CellKey>)> {
    use std::collections::BTreeMap;

    let mut seen: BTreeMap<(String, Day, String), Vec<CellKey>> = BTreeMap::new();
    for (key, units) in mapping.iter() {
        for u in units {
            if u.teacher_id.is_empty() {
                continue;
            }
            seen.entry((u.teacher_id.clone(), key.day, key.period_id.clone()))
                .or_default()
                .push(key.clone());
        }
    }
    seen.into_iter()
        .filter(|(_, cells)| cells.len() > 1)
        .map(|((t, d, p), cells)| (t, d, p, cells))
        .collect()
}
