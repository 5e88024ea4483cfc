use crate::model::{loose_str, ScheduleUnit};
use crate::timegrid::{CellKey, Day};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Cell coordinate -> ordered unit list. Empty lists are never stored, so
/// absence and an empty cell are the same thing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleMapping {
    cells: BTreeMap<CellKey, Vec<ScheduleUnit>>,
}

/// Serialized form of one non-empty cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellEntry {
    pub class_id: String,
    pub day: Day,
    pub period_id: String,
    pub units: Vec<ScheduleUnit>,
}

impl ScheduleMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn units(&self, key: &CellKey) -> &[ScheduleUnit] {
        self.cells.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns a new mapping with the cell replaced; an empty list removes it.
    pub fn with_units(&self, key: &CellKey, units: Vec<ScheduleUnit>) -> Self {
        let mut next = self.clone();
        next.set_units(key, units);
        next
    }

    pub fn set_units(&mut self, key: &CellKey, units: Vec<ScheduleUnit>) {
        if units.is_empty() {
            self.cells.remove(key);
        } else {
            self.cells.insert(key.clone(), units);
        }
    }

    pub fn find_unit(&self, key: &CellKey, unit_id: &str) -> Option<&ScheduleUnit> {
        self.units(key).iter().find(|u| u.id == unit_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CellKey, &[ScheduleUnit])> {
        self.cells.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn unit_count(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn to_entries(&self) -> Vec<CellEntry> {
        self.cells
            .iter()
            .map(|(k, units)| CellEntry {
                class_id: k.class_id.clone(),
                day: k.day,
                period_id: k.period_id.clone(),
                units: units.clone(),
            })
            .collect()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = CellEntry>) -> Self {
        let mut out = Self::new();
        for e in entries {
            let key = CellKey::new(e.class_id, e.day, e.period_id);
            let mut units = out.cells.remove(&key).unwrap_or_default();
            units.extend(e.units);
            out.set_units(&key, units);
        }
        out
    }

    /// Lenient reader for persisted or imported schedules. Accepts the list
    /// form written by this crate and the legacy object form keyed by
    /// `classId-day-periodId`. Unreadable cells and non-object units are
    /// dropped rather than failing the whole load.
    pub fn from_json_lenient(v: &Value) -> Self {
        let mut out = Self::new();
        match v {
            Value::Array(entries) => {
                for e in entries {
                    let Some(day) = e.get("day").and_then(|d| d.as_str()).and_then(Day::parse)
                    else {
                        continue;
                    };
                    let class_id = loose_str(e, "classId");
                    let period_id = loose_str(e, "periodId");
                    if class_id.is_empty() || period_id.is_empty() {
                        continue;
                    }
                    out.append_loose(CellKey::new(class_id, day, period_id), e.get("units"));
                }
            }
            Value::Object(map) => {
                for (k, units) in map {
                    if !units.is_array() {
                        continue;
                    }
                    let Some(key) = CellKey::parse_legacy(k) else {
                        continue;
                    };
                    out.append_loose(key, Some(units));
                }
            }
            _ => {}
        }
        out
    }

    fn append_loose(&mut self, key: CellKey, units: Option<&Value>) {
        let parsed: Vec<ScheduleUnit> = units
            .and_then(|u| u.as_array())
            .into_iter()
            .flatten()
            .filter(|u| u.is_object())
            .map(|u| ScheduleUnit {
                id: loose_str(u, "id"),
                teacher_id: loose_str(u, "teacherId"),
                group_name: loose_str(u, "groupName"),
            })
            .collect();
        let mut existing = self.cells.remove(&key).unwrap_or_default();
        existing.extend(parsed);
        self.set_units(&key, existing);
    }
}

impl Serialize for ScheduleMapping {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_entries().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ScheduleMapping {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<CellEntry>::deserialize(deserializer)?;
        Ok(Self::from_entries(entries))
    }
}
