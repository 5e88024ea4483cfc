use crate::timegrid::normalize_hhmm;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const UNSET_SUBJECT_LABEL: &str = "未设置科目";
pub const UNNAMED_TEACHER_LABEL: &str = "未命名老师";
pub const UNNAMED_CLASS_LABEL: &str = "未命名班级";
pub const TEMP_CLASS_NAME: &str = "临时加课";
pub const DEFAULT_COURSE_COLOR: &str = "#0ea5e9";

pub const COURSE_PALETTE: [&str; 14] = [
    "#0ea5e9", "#14b8a6", "#22c55e", "#84cc16", "#f59e0b", "#f97316", "#ef4444", "#ec4899",
    "#a855f7", "#6366f1", "#8b5cf6", "#06b6d4", "#10b981", "#e11d48",
];

pub fn pick_course_color(index: usize) -> &'static str {
    COURSE_PALETTE[index % COURSE_PALETTE.len()]
}

/// Prefixed random id, e.g. `unit_1f0c…`.
pub fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: String,
    pub name: String,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassEntity {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Period {
    pub id: String,
    pub name: String,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub name: String,
    pub color: String,
}

/// One teacher's assignment inside a cell. `group_name` is derived from the
/// teacher's subject whenever the unit is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleUnit {
    pub id: String,
    pub teacher_id: String,
    pub group_name: String,
}

/// The week-independent configuration: everything except the schedule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub teachers: Vec<Teacher>,
    pub classes: Vec<ClassEntity>,
    pub periods: Vec<Period>,
    pub courses: Vec<Course>,
}

impl Catalog {
    pub fn teacher(&self, teacher_id: &str) -> Option<&Teacher> {
        self.teachers.iter().find(|t| t.id == teacher_id)
    }

    pub fn class(&self, class_id: &str) -> Option<&ClassEntity> {
        self.classes.iter().find(|c| c.id == class_id)
    }

    pub fn period(&self, period_id: &str) -> Option<&Period> {
        self.periods.iter().find(|p| p.id == period_id)
    }

    pub fn period_index(&self, period_id: &str) -> usize {
        self.periods
            .iter()
            .position(|p| p.id == period_id)
            .unwrap_or(usize::MAX)
    }

    /// Group label for a teacher: their trimmed subject, or the unset label.
    pub fn group_name_for(&self, teacher_id: &str) -> String {
        self.teacher(teacher_id)
            .map(|t| t.subject.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| UNSET_SUBJECT_LABEL.to_string())
    }

    /// Display name; an unknown id echoes back unchanged.
    pub fn teacher_display_name(&self, teacher_id: &str) -> String {
        match self.teacher(teacher_id) {
            Some(t) if !t.name.trim().is_empty() => t.name.clone(),
            Some(_) => UNNAMED_TEACHER_LABEL.to_string(),
            None => teacher_id.to_string(),
        }
    }

    pub fn class_display_name(&self, class_id: &str) -> String {
        match self.class(class_id) {
            Some(c) if !c.name.trim().is_empty() => c.name.clone(),
            Some(_) => UNNAMED_CLASS_LABEL.to_string(),
            None => class_id.to_string(),
        }
    }

    pub fn period_display_name(&self, period_id: &str) -> String {
        self.period(period_id)
            .map(|p| p.name.clone())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| period_id.to_string())
    }

    pub fn course_color_for_teacher(&self, teacher_id: &str) -> String {
        let subject = self
            .teacher(teacher_id)
            .map(|t| t.subject.trim().to_lowercase())
            .unwrap_or_default();
        self.courses
            .iter()
            .find(|c| c.name.trim().to_lowercase() == subject)
            .map(|c| c.color.clone())
            .unwrap_or_else(|| DEFAULT_COURSE_COLOR.to_string())
    }
}

// ---- Lenient normalization of untrusted JSON (persisted or imported) ----

/// Reads a field as a string; numbers are stringified, anything else is empty.
pub fn loose_str(v: &Value, key: &str) -> String {
    match v.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn id_or_new(v: &Value, prefix: &str) -> String {
    let id = loose_str(v, "id");
    if id.trim().is_empty() {
        new_id(prefix)
    } else {
        id
    }
}

fn objects(v: Option<&Value>) -> impl Iterator<Item = &Value> {
    v.and_then(|v| v.as_array())
        .into_iter()
        .flatten()
        .filter(|x| x.is_object())
}

pub fn normalize_teachers(v: Option<&Value>) -> Vec<Teacher> {
    objects(v)
        .map(|t| Teacher {
            id: id_or_new(t, "t"),
            name: loose_str(t, "name"),
            subject: loose_str(t, "subject"),
        })
        .collect()
}

pub fn normalize_classes(v: Option<&Value>) -> Vec<ClassEntity> {
    objects(v)
        .map(|c| ClassEntity {
            id: id_or_new(c, "c"),
            name: loose_str(c, "name"),
        })
        .collect()
}

pub fn normalize_periods(v: Option<&Value>) -> Vec<Period> {
    objects(v)
        .map(|p| Period {
            id: id_or_new(p, "p"),
            name: loose_str(p, "name"),
            start_time: normalize_hhmm(&loose_str(p, "startTime")),
            end_time: normalize_hhmm(&loose_str(p, "endTime")),
        })
        .collect()
}

pub fn normalize_courses(v: Option<&Value>) -> Vec<Course> {
    objects(v)
        .enumerate()
        .map(|(idx, co)| {
            let color = loose_str(co, "color");
            Course {
                id: id_or_new(co, "co"),
                name: loose_str(co, "name"),
                color: if color.trim().is_empty() {
                    pick_course_color(idx).to_string()
                } else {
                    color
                },
            }
        })
        .collect()
}

/// Builds a catalog from any JSON value. Missing or malformed lists become
/// empty lists; nothing here fails.
pub fn normalize_catalog(v: &Value) -> Catalog {
    Catalog {
        teachers: normalize_teachers(v.get("teachers")),
        classes: normalize_classes(v.get("classes")),
        periods: normalize_periods(v.get("periods")),
        courses: normalize_courses(v.get("courses")),
    }
}
