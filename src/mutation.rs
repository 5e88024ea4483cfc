//! Placement rules and the mutations built on them.
//!
//! Every operation takes the current mapping by reference and returns a new
//! one, so a rejected call can never leave a half-applied change behind.

use crate::conflict::{find_teacher_conflict, Conflict};
use crate::model::{Catalog, ScheduleUnit};
use crate::schedule::ScheduleMapping;
use crate::timegrid::CellKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("{0}")]
    Validation(String),

    #[error("teacher is already booked at {} (unit {})", .0.cell, .0.unit_id)]
    Conflict(Conflict),

    #[error("teacher {teacher_id} is already in {cell}")]
    Duplicate { cell: CellKey, teacher_id: String },

    #[error("{0} already has a lesson in this slot")]
    SlotOccupied(CellKey),
}

impl ScheduleError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Stable IPC error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::Conflict(_) => "teacher_conflict",
            Self::Duplicate { .. } => "duplicate_teacher",
            Self::SlotOccupied(_) => "slot_occupied",
        }
    }
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;

/// A unit addressed by the cell it currently sits in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitRef {
    pub cell: CellKey,
    pub unit_id: String,
}

impl UnitRef {
    pub fn new(cell: CellKey, unit_id: impl Into<String>) -> Self {
        Self {
            cell,
            unit_id: unit_id.into(),
        }
    }
}

/// A validated, not yet applied swap. Holds full copies of both units so a
/// later confirm can tell whether the schedule moved underneath it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapPlan {
    pub src_cell: CellKey,
    pub src_unit: ScheduleUnit,
    pub tgt_cell: CellKey,
    pub tgt_unit: ScheduleUnit,
}

/// Teacher-side rules for putting `teacher_id` into `cell`: nobody else with
/// that teacher in the same cell, and no booking for that teacher in any
/// other class at the same day/period. `ignore_unit_id` excludes one unit
/// already sitting in `cell` (an edit in place).
pub fn check_placement(
    mapping: &ScheduleMapping,
    teacher_id: &str,
    cell: &CellKey,
    ignore_unit_id: Option<&str>,
) -> ScheduleResult<()> {
    let same_cell_dup = mapping
        .units(cell)
        .iter()
        .any(|u| u.teacher_id == teacher_id && Some(u.id.as_str()) != ignore_unit_id);
    if same_cell_dup {
        return Err(ScheduleError::Duplicate {
            cell: cell.clone(),
            teacher_id: teacher_id.to_string(),
        });
    }
    match find_teacher_conflict(mapping, teacher_id, cell.day, &cell.period_id, ignore_unit_id) {
        Some(c) => Err(ScheduleError::Conflict(c)),
        None => Ok(()),
    }
}

/// Unit ids are unique within a cell; a unit arriving from elsewhere must
/// not share its id with one already there.
fn check_id_free(mapping: &ScheduleMapping, cell: &CellKey, unit_id: &str) -> ScheduleResult<()> {
    if mapping.find_unit(cell, unit_id).is_some() {
        return Err(ScheduleError::validation(format!(
            "unit id {unit_id} is already used in {cell}"
        )));
    }
    Ok(())
}

/// Places `unit` into `cell`, or replaces the unit with the same id already
/// there (keeping its position). The group label is always recomputed from
/// the teacher's current subject.
pub fn upsert_unit(
    mapping: &ScheduleMapping,
    catalog: &Catalog,
    cell: &CellKey,
    unit: ScheduleUnit,
) -> ScheduleResult<ScheduleMapping> {
    let teacher_id = unit.teacher_id.trim().to_string();
    if teacher_id.is_empty() {
        return Err(ScheduleError::validation("missing teacher"));
    }
    let unit_id = unit.id.trim().to_string();
    if unit_id.is_empty() {
        return Err(ScheduleError::validation("missing unit id"));
    }

    // Only a unit already in this very cell may be ignored; the same id in
    // another cell is still a booking of its own.
    let existing_idx = mapping.units(cell).iter().position(|u| u.id == unit_id);
    let ignore = existing_idx.map(|_| unit_id.as_str());
    check_placement(mapping, &teacher_id, cell, ignore)?;

    let stored = ScheduleUnit {
        group_name: catalog.group_name_for(&teacher_id),
        id: unit_id,
        teacher_id,
    };
    let mut units = mapping.units(cell).to_vec();
    match existing_idx {
        Some(i) => units[i] = stored,
        None => units.push(stored),
    }
    Ok(mapping.with_units(cell, units))
}

/// Removes the unit; an absent unit is not an error.
pub fn delete_unit(mapping: &ScheduleMapping, cell: &CellKey, unit_id: &str) -> ScheduleMapping {
    let units: Vec<ScheduleUnit> = mapping
        .units(cell)
        .iter()
        .filter(|u| u.id != unit_id)
        .cloned()
        .collect();
    if units.len() == mapping.units(cell).len() {
        return mapping.clone();
    }
    mapping.with_units(cell, units)
}

/// Moves a unit to another cell unchanged (same id, teacher, group label).
pub fn move_unit(
    mapping: &ScheduleMapping,
    from: &UnitRef,
    to: &CellKey,
) -> ScheduleResult<ScheduleMapping> {
    if from.cell == *to {
        return Ok(mapping.clone());
    }
    let unit = mapping
        .find_unit(&from.cell, &from.unit_id)
        .cloned()
        .ok_or_else(|| ScheduleError::validation("unit not found in source cell"))?;

    let without = delete_unit(mapping, &from.cell, &from.unit_id);
    check_id_free(&without, to, &unit.id)?;
    check_placement(&without, &unit.teacher_id, to, None)?;

    let mut units = without.units(to).to_vec();
    units.push(unit);
    Ok(without.with_units(to, units))
}

/// Validates a swap as if both units had already left their cells, so two
/// lessons that only collide with each other can still trade places.
pub fn plan_swap(mapping: &ScheduleMapping, src: &UnitRef, tgt: &UnitRef) -> ScheduleResult<SwapPlan> {
    if src.cell == tgt.cell {
        return Err(ScheduleError::validation("identical slot"));
    }
    let src_unit = mapping
        .find_unit(&src.cell, &src.unit_id)
        .cloned()
        .ok_or_else(|| ScheduleError::validation("source unit not found"))?;
    let tgt_unit = mapping
        .find_unit(&tgt.cell, &tgt.unit_id)
        .cloned()
        .ok_or_else(|| ScheduleError::validation("target unit not found"))?;

    let cleared = delete_unit(
        &delete_unit(mapping, &src.cell, &src.unit_id),
        &tgt.cell,
        &tgt.unit_id,
    );
    check_id_free(&cleared, &tgt.cell, &src_unit.id)?;
    check_id_free(&cleared, &src.cell, &tgt_unit.id)?;
    check_placement(&cleared, &src_unit.teacher_id, &tgt.cell, None)?;
    check_placement(&cleared, &tgt_unit.teacher_id, &src.cell, None)?;

    Ok(SwapPlan {
        src_cell: src.cell.clone(),
        src_unit,
        tgt_cell: tgt.cell.clone(),
        tgt_unit,
    })
}

/// Executes a confirmed plan. The plan is re-validated against `mapping`;
/// if either unit changed or moved since it was proposed, nothing happens.
/// Each unit takes the other's list position, so swapping back restores the
/// original mapping exactly.
pub fn apply_swap(mapping: &ScheduleMapping, plan: &SwapPlan) -> ScheduleResult<ScheduleMapping> {
    let src_idx = mapping
        .units(&plan.src_cell)
        .iter()
        .position(|u| *u == plan.src_unit);
    let tgt_idx = mapping
        .units(&plan.tgt_cell)
        .iter()
        .position(|u| *u == plan.tgt_unit);
    let (Some(src_idx), Some(tgt_idx)) = (src_idx, tgt_idx) else {
        return Err(ScheduleError::validation("swap plan is stale"));
    };

    let fresh = plan_swap(
        mapping,
        &UnitRef::new(plan.src_cell.clone(), plan.src_unit.id.clone()),
        &UnitRef::new(plan.tgt_cell.clone(), plan.tgt_unit.id.clone()),
    )?;

    let mut src_units = mapping.units(&fresh.src_cell).to_vec();
    src_units[src_idx] = fresh.tgt_unit.clone();
    let mut tgt_units = mapping.units(&fresh.tgt_cell).to_vec();
    tgt_units[tgt_idx] = fresh.src_unit.clone();

    let mut next = mapping.clone();
    next.set_units(&fresh.src_cell, src_units);
    next.set_units(&fresh.tgt_cell, tgt_units);
    Ok(next)
}

/// Plan and apply in one step.
#[cfg(test)]
pub fn swap_units(mapping: &ScheduleMapping, src: &UnitRef, tgt: &UnitRef) -> ScheduleResult<ScheduleMapping> {
    let plan = plan_swap(mapping, src, tgt)?;
    apply_swap(mapping, &plan)
}

/// Adds a new lesson for a teacher into a class slot. On top of the teacher
/// rules the class cell itself must still be empty.
pub fn place_for_teacher(
    mapping: &ScheduleMapping,
    catalog: &Catalog,
    cell: &CellKey,
    teacher_id: &str,
    new_unit_id: &str,
) -> ScheduleResult<ScheduleMapping> {
    if !mapping.units(cell).is_empty() {
        return Err(ScheduleError::SlotOccupied(cell.clone()));
    }
    upsert_unit(
        mapping,
        catalog,
        cell,
        ScheduleUnit {
            id: new_unit_id.to_string(),
            teacher_id: teacher_id.to_string(),
            group_name: String::new(),
        },
    )
}
