use crate::store::{parse_week_doc, KvStore, Keys, StoreResult};
use crate::timegrid::Day;
use serde::Serialize;
use std::collections::BTreeSet;

const MAX_SAMPLES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveSample {
    pub class_id: String,
    pub day: Day,
    pub period_id: String,
    pub teacher_id: String,
    pub group_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekArchivePreview {
    pub week_start: String,
    pub updated_at: i64,
    pub unit_count: usize,
    pub samples: Vec<ArchiveSample>,
}

/// Browsable previews of every stored week, most recently saved first.
/// Weeks in `hidden` (pending deletion) are left out; unreadable entries
/// are skipped.
pub fn list_week_archives(
    store: &dyn KvStore,
    keys: &Keys,
    hidden: &BTreeSet<String>,
) -> StoreResult<Vec<WeekArchivePreview>> {
    let prefix = keys.week_prefix();
    let mut out = Vec::new();
    for key in store.keys_with_prefix(&prefix)? {
        let week_start = key[prefix.len()..].to_string();
        if hidden.contains(&week_start) {
            continue;
        }
        let Some(raw) = store.get(&key)? else {
            continue;
        };
        let Some((mapping, updated_at)) = parse_week_doc(&raw) else {
            tracing::warn!(key = %key, "skipping unreadable week archive");
            continue;
        };
        let samples = mapping
            .iter()
            .flat_map(|(cell, units)| {
                units.iter().map(move |u| ArchiveSample {
                    class_id: cell.class_id.clone(),
                    day: cell.day,
                    period_id: cell.period_id.clone(),
                    teacher_id: u.teacher_id.clone(),
                    group_name: u.group_name.clone(),
                })
            })
            .take(MAX_SAMPLES)
            .collect();
        out.push(WeekArchivePreview {
            week_start,
            updated_at,
            unit_count: mapping.unit_count(),
            samples,
        });
    }
    out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    Ok(out)
}
