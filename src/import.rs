use crate::model::{new_id, Catalog, ScheduleUnit};
use crate::mutation::upsert_unit;
use crate::schedule::ScheduleMapping;
use crate::state::PartialState;
use crate::timegrid::CellKey;
use anyhow::{anyhow, Context};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedUnit {
    pub cell: CellKey,
    pub unit_id: String,
    pub teacher_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    pub partial: PartialState,
    pub skipped: Vec<SkippedUnit>,
}

/// Pulls a JSON document out of free-form model output: a fenced block if
/// there is one, else the outermost `{…}` (or `[…]`) slice.
pub fn extract_json_from_text(text: &str) -> anyhow::Result<Value> {
    let candidate = fenced_block(text).unwrap_or(text);
    let slice = match (candidate.find('{'), candidate.rfind('}')) {
        (Some(s), Some(e)) if e > s => &candidate[s..=e],
        _ => match (candidate.find('['), candidate.rfind(']')) {
            (Some(s), Some(e)) if e > s => &candidate[s..=e],
            _ => candidate,
        },
    };
    serde_json::from_str(slice.trim()).context("assistant output is not valid JSON")
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let after = after
        .strip_prefix("json")
        .or_else(|| after.strip_prefix("JSON"))
        .unwrap_or(after);
    let end = after.find("```")?;
    Some(&after[..end])
}

/// Normalizes an assistant payload into a partial state. Catalog fields are
/// taken leniently; schedule units are replayed through the placement rules
/// against the resulting catalog so the imported week can never hold a
/// double booking.
pub fn prepare_import(payload: &Value, current: &Catalog) -> anyhow::Result<ImportOutcome> {
    if !payload.is_object() {
        return Err(anyhow!("import payload must be a JSON object"));
    }
    let mut partial = PartialState::from_json_lenient(payload);

    let catalog = Catalog {
        teachers: partial.teachers.clone().unwrap_or_else(|| current.teachers.clone()),
        classes: partial.classes.clone().unwrap_or_else(|| current.classes.clone()),
        periods: partial.periods.clone().unwrap_or_else(|| current.periods.clone()),
        courses: partial.courses.clone().unwrap_or_else(|| current.courses.clone()),
    };

    let mut skipped = Vec::new();
    if let Some(raw) = partial.schedule.take() {
        let (clean, dropped) = replay_schedule(&raw, &catalog);
        skipped = dropped;
        partial.schedule = Some(clean);
    }
    Ok(ImportOutcome { partial, skipped })
}

/// Re-places every unit in order; anything the rules reject is dropped.
/// Missing or repeated ids are replaced with fresh ones.
pub fn replay_schedule(raw: &ScheduleMapping, catalog: &Catalog) -> (ScheduleMapping, Vec<SkippedUnit>) {
    let mut clean = ScheduleMapping::new();
    let mut skipped = Vec::new();
    let mut seen_ids = HashSet::new();
    for (cell, units) in raw.iter() {
        for u in units {
            let id = if u.id.trim().is_empty() || seen_ids.contains(&u.id) {
                new_id("unit")
            } else {
                u.id.clone()
            };
            seen_ids.insert(id.clone());
            let candidate = ScheduleUnit {
                id: id.clone(),
                teacher_id: u.teacher_id.clone(),
                group_name: String::new(),
            };
            match upsert_unit(&clean, catalog, cell, candidate) {
                Ok(next) => clean = next,
                Err(e) => skipped.push(SkippedUnit {
                    cell: cell.clone(),
                    unit_id: id,
                    teacher_id: u.teacher_id.clone(),
                    reason: e.code().to_string(),
                }),
            }
        }
    }
    (clean, skipped)
}
