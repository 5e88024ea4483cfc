//! In-memory timetable state and its transition function.
//!
//! `reduce` is deterministic: any fresh ids an action needs are generated by
//! the caller and carried inside the action.

use crate::model::{
    normalize_classes, normalize_courses, normalize_periods, normalize_teachers, pick_course_color,
    Catalog, ClassEntity, Course, Period, ScheduleUnit, Teacher, TEMP_CLASS_NAME,
};
use crate::mutation::{self, ScheduleResult, SwapPlan, UnitRef};
use crate::schedule::ScheduleMapping;
use crate::timegrid::{add_minutes, clamp_duration_minutes, diff_minutes, normalize_hhmm, CellKey};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timetable {
    pub catalog: Catalog,
    pub schedule: ScheduleMapping,
    pub has_loaded: bool,
}

/// A partial state coming from storage or the assistant. `None` fields keep
/// whatever the current state has.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialState {
    pub teachers: Option<Vec<Teacher>>,
    pub classes: Option<Vec<ClassEntity>>,
    pub periods: Option<Vec<Period>>,
    pub courses: Option<Vec<Course>>,
    pub schedule: Option<ScheduleMapping>,
}

impl PartialState {
    /// Present-but-malformed fields become empty; absent fields stay `None`.
    pub fn from_json_lenient(v: &Value) -> Self {
        let field = |k: &str| v.get(k).filter(|x| !x.is_null());
        Self {
            teachers: field("teachers").map(|x| normalize_teachers(Some(x))),
            classes: field("classes").map(|x| normalize_classes(Some(x))),
            periods: field("periods").map(|x| normalize_periods(Some(x))),
            courses: field("courses").map(|x| normalize_courses(Some(x))),
            schedule: field("schedule").map(ScheduleMapping::from_json_lenient),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    Hydrate(PartialState),
    SetTeachers(Vec<Teacher>),
    SetClasses(Vec<ClassEntity>),
    SetPeriods(Vec<Period>),
    SetCourses(Vec<Course>),
    UpsertCourseByName { id: String, name: String },
    ClearSchedule,
    AddPeriod { id: String },
    UpdatePeriodStart { period_id: String, start_time: String },
    UpdatePeriodEnd { period_id: String, end_time: String },
    EnsureTempClass { id: String },
    UpsertUnit { cell: CellKey, unit: ScheduleUnit },
    DeleteUnit { cell: CellKey, unit_id: String },
    MoveUnit { from: UnitRef, to: CellKey },
    ApplySwap(SwapPlan),
    PlaceForTeacher { cell: CellKey, teacher_id: String, unit_id: String },
}

pub fn reduce(state: &Timetable, action: Action) -> ScheduleResult<Timetable> {
    let mut next = state.clone();
    match action {
        Action::Hydrate(partial) => {
            if let Some(v) = partial.teachers {
                next.catalog.teachers = v;
            }
            if let Some(v) = partial.classes {
                next.catalog.classes = v;
            }
            if let Some(v) = partial.periods {
                next.catalog.periods = v;
            }
            if let Some(v) = partial.courses {
                next.catalog.courses = v;
            }
            if let Some(v) = partial.schedule {
                next.schedule = v;
            }
            next.has_loaded = true;
        }
        Action::SetTeachers(v) => next.catalog.teachers = v,
        Action::SetClasses(v) => next.catalog.classes = v,
        Action::SetPeriods(v) => next.catalog.periods = v,
        Action::SetCourses(v) => next.catalog.courses = v,
        Action::UpsertCourseByName { id, name } => {
            let name = name.trim().to_string();
            let lower = name.to_lowercase();
            let exists = next
                .catalog
                .courses
                .iter()
                .any(|c| c.name.trim().to_lowercase() == lower);
            if !name.is_empty() && !exists {
                let color = pick_course_color(next.catalog.courses.len()).to_string();
                next.catalog.courses.push(Course { id, name, color });
            }
        }
        Action::ClearSchedule => next.schedule = ScheduleMapping::new(),
        Action::AddPeriod { id } => {
            let p = next_period(&next.catalog.periods, id);
            next.catalog.periods.push(p);
        }
        Action::UpdatePeriodStart { period_id, start_time } => {
            for p in next.catalog.periods.iter_mut().filter(|p| p.id == period_id) {
                let span = diff_minutes(&p.start_time, &p.end_time);
                let duration = clamp_duration_minutes(if span == 0 { 45 } else { span });
                let start = normalize_hhmm(&start_time);
                if !start.is_empty() {
                    p.end_time = normalize_hhmm(&add_minutes(&start, duration));
                }
                p.start_time = start;
            }
        }
        Action::UpdatePeriodEnd { period_id, end_time } => {
            for p in next.catalog.periods.iter_mut().filter(|p| p.id == period_id) {
                p.end_time = normalize_hhmm(&end_time);
            }
        }
        Action::EnsureTempClass { id } => {
            if temp_class_id(&next.catalog).is_none() {
                next.catalog.classes.push(ClassEntity {
                    id,
                    name: TEMP_CLASS_NAME.to_string(),
                });
            }
        }
        Action::UpsertUnit { cell, unit } => {
            next.schedule = mutation::upsert_unit(&state.schedule, &state.catalog, &cell, unit)?;
        }
        Action::DeleteUnit { cell, unit_id } => {
            next.schedule = mutation::delete_unit(&state.schedule, &cell, &unit_id);
        }
        Action::MoveUnit { from, to } => {
            next.schedule = mutation::move_unit(&state.schedule, &from, &to)?;
        }
        Action::ApplySwap(plan) => {
            next.schedule = mutation::apply_swap(&state.schedule, &plan)?;
        }
        Action::PlaceForTeacher { cell, teacher_id, unit_id } => {
            next.schedule =
                mutation::place_for_teacher(&state.schedule, &state.catalog, &cell, &teacher_id, &unit_id)?;
        }
    }
    Ok(next)
}

pub fn temp_class_id(catalog: &Catalog) -> Option<String> {
    catalog
        .classes
        .iter()
        .find(|c| c.name.trim() == TEMP_CLASS_NAME)
        .map(|c| c.id.clone())
}

/// Next period after the last one: ten minutes later, 45 minutes long.
fn next_period(periods: &[Period], id: String) -> Period {
    let last_end = periods
        .last()
        .map(|p| normalize_hhmm(&p.end_time))
        .unwrap_or_default();
    let start = if last_end.is_empty() {
        "08:30".to_string()
    } else {
        add_minutes(&last_end, 10)
    };
    let end = add_minutes(&start, 45);
    Period {
        id,
        name: format!("第{}节", periods.len() + 1),
        start_time: normalize_hhmm(&start),
        end_time: normalize_hhmm(&end),
    }
}
