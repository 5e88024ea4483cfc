use crate::model::{Catalog, ClassEntity, ScheduleUnit};
use crate::schedule::ScheduleMapping;
use crate::timegrid::{CellKey, Day, DAYS};
use serde::Serialize;
use serde_json::{json, Value};

pub const LOAD_DISPLAY_CAP: usize = 15;

pub fn teacher_load_count(mapping: &ScheduleMapping, teacher_id: &str) -> usize {
    mapping
        .iter()
        .flat_map(|(_, units)| units.iter())
        .filter(|u| u.teacher_id == teacher_id)
        .count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadMeter {
    pub count: usize,
    pub cap: usize,
    pub percent: u32,
}

/// Progress against the display cap; the raw count is never clamped.
pub fn load_meter(count: usize) -> LoadMeter {
    let pct = ((count as f64 / LOAD_DISPLAY_CAP as f64) * 100.0).round();
    LoadMeter {
        count,
        cap: LOAD_DISPLAY_CAP,
        percent: pct.min(100.0) as u32,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherLoad {
    pub teacher_id: String,
    pub name: String,
    pub subject: String,
    pub color: String,
    pub count: usize,
}

/// Every known teacher with their lesson count, busiest first. Ties keep
/// the teacher list order.
pub fn teacher_loads(mapping: &ScheduleMapping, catalog: &Catalog) -> Vec<TeacherLoad> {
    let mut out: Vec<TeacherLoad> = catalog
        .teachers
        .iter()
        .map(|t| TeacherLoad {
            teacher_id: t.id.clone(),
            name: catalog.teacher_display_name(&t.id),
            subject: t.subject.clone(),
            color: catalog.course_color_for_teacher(&t.id),
            count: teacher_load_count(mapping, &t.id),
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub cell: CellKey,
    pub unit: ScheduleUnit,
}

/// All lessons of a teacher ordered by day, then by the period list order.
/// Periods no longer in the list sort last.
pub fn teacher_lessons(mapping: &ScheduleMapping, catalog: &Catalog, teacher_id: &str) -> Vec<Lesson> {
    let mut out: Vec<Lesson> = mapping
        .iter()
        .flat_map(|(key, units)| {
            units
                .iter()
                .filter(|u| u.teacher_id == teacher_id)
                .map(move |u| Lesson {
                    cell: key.clone(),
                    unit: u.clone(),
                })
        })
        .collect();
    out.sort_by_key(|l| (l.cell.day.index(), catalog.period_index(&l.cell.period_id)));
    out
}

pub fn lessons_by_day(lessons: &[Lesson]) -> Vec<(Day, Vec<Lesson>)> {
    DAYS.iter()
        .map(|d| {
            let day_lessons = lessons.iter().filter(|l| l.cell.day == *d).cloned().collect();
            (*d, day_lessons)
        })
        .collect()
}

pub fn is_occupied(mapping: &ScheduleMapping, cell: &CellKey) -> bool {
    !mapping.units(cell).is_empty()
}

/// Classes that can still take a new lesson at (day, period).
pub fn available_classes<'a>(
    mapping: &ScheduleMapping,
    catalog: &'a Catalog,
    day: Day,
    period_id: &str,
) -> Vec<&'a ClassEntity> {
    catalog
        .classes
        .iter()
        .filter(|c| !is_occupied(mapping, &CellKey::new(c.id.clone(), day, period_id)))
        .collect()
}

/// Compact summary handed to the assistant for diagnostics.
pub fn digest(mapping: &ScheduleMapping, catalog: &Catalog) -> Value {
    json!({
        "teachers": catalog.teachers,
        "classes": catalog.classes,
        "periods": catalog.periods,
        "totalUnits": mapping.unit_count(),
    })
}

/// Per-teacher plain-text rundown of one day, one line per teacher.
pub fn day_briefing(mapping: &ScheduleMapping, catalog: &Catalog, day: Day) -> String {
    let mut lines = vec![format!("今天（{}）老师安排播报：", day.label())];
    for t in &catalog.teachers {
        let mut slots = Vec::new();
        for p in &catalog.periods {
            for c in &catalog.classes {
                let key = CellKey::new(c.id.clone(), day, p.id.clone());
                for u in mapping.units(&key) {
                    if u.teacher_id == t.id {
                        slots.push(format!("{} {} {}", p.name, c.name, u.group_name));
                    }
                }
            }
        }
        let body = if slots.is_empty() {
            "无安排".to_string()
        } else {
            slots.join("；")
        };
        lines.push(format!("{}：{}", t.name, body));
    }
    lines.join("\n")
}
