//! One opened workspace: the live timetable for the selected week plus the
//! persistence bookkeeping around it (autosave, deferred archive deletes,
//! proposed swaps waiting for confirmation).

use crate::archive::{list_week_archives, WeekArchivePreview};
use crate::autosave::{signature, Autosave, SaveStatus};
use crate::import::{prepare_import, ImportOutcome};
use crate::model::{new_id, Catalog};
use crate::mutation::{plan_swap, ScheduleResult, SwapPlan, UnitRef};
use crate::schedule::ScheduleMapping;
use crate::state::{reduce, Action, PartialState, Timetable};
use crate::store::{
    config_doc, load_config, load_last_date, load_week, save_last_date, week_doc, Keys, KvOp, KvStore,
    StoreResult,
};
use crate::timegrid::{format_ymd, parse_ymd, week_start_monday};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

pub struct Session {
    store: Box<dyn KvStore>,
    keys: Keys,
    timetable: Timetable,
    selected_date: NaiveDate,
    week_start: NaiveDate,
    autosave: Autosave,
    pending_deletes: BTreeSet<String>,
    swap_plans: HashMap<String, SwapPlan>,
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl Session {
    /// Loads config, the last selected date (falling back to `today`) and
    /// that date's week. Unreadable documents load as empty.
    pub fn open(
        store: Box<dyn KvStore>,
        app_id: &str,
        debounce: Duration,
        today: NaiveDate,
        now: Instant,
    ) -> StoreResult<Self> {
        let keys = Keys::new(app_id);
        let catalog = load_config(store.as_ref(), &keys)?.unwrap_or_default();
        let selected_date = parse_ymd(&load_last_date(store.as_ref(), &keys)?).unwrap_or(today);
        let week_start = week_start_monday(selected_date);
        let schedule = load_week(store.as_ref(), &keys, &format_ymd(week_start))?.unwrap_or_default();

        let partial = PartialState {
            teachers: Some(catalog.teachers),
            classes: Some(catalog.classes),
            periods: Some(catalog.periods),
            courses: Some(catalog.courses),
            schedule: Some(schedule),
        };
        let timetable = reduce(&Timetable::default(), Action::Hydrate(partial)).unwrap_or_default();

        let mut session = Self {
            store,
            keys,
            timetable,
            selected_date,
            week_start,
            autosave: Autosave::new(debounce),
            pending_deletes: BTreeSet::new(),
            swap_plans: HashMap::new(),
        };
        session.observe(now);
        tracing::info!(
            week = %session.week_start_ymd(),
            units = session.timetable.schedule.unit_count(),
            teachers = session.timetable.catalog.teachers.len(),
            "session opened"
        );
        Ok(session)
    }

    pub fn timetable(&self) -> &Timetable {
        &self.timetable
    }

    pub fn catalog(&self) -> &Catalog {
        &self.timetable.catalog
    }

    pub fn schedule(&self) -> &ScheduleMapping {
        &self.timetable.schedule
    }

    pub fn selected_date(&self) -> NaiveDate {
        self.selected_date
    }

    pub fn week_start(&self) -> NaiveDate {
        self.week_start
    }

    pub fn week_start_ymd(&self) -> String {
        format_ymd(self.week_start)
    }

    pub fn pending_deletes(&self) -> &BTreeSet<String> {
        &self.pending_deletes
    }

    pub fn autosave(&self) -> &Autosave {
        &self.autosave
    }

    /// Applies one state transition. A rejected action changes nothing.
    pub fn dispatch(&mut self, action: Action, now: Instant) -> ScheduleResult<()> {
        self.timetable = reduce(&self.timetable, action)?;
        self.observe(now);
        Ok(())
    }

    fn signature_with(&self, pending_deletes: &BTreeSet<String>) -> String {
        signature(
            &self.timetable.catalog,
            &self.week_start_ymd(),
            &self.timetable.schedule,
            pending_deletes,
        )
    }

    fn observe(&mut self, now: Instant) {
        let sig = self.signature_with(&self.pending_deletes);
        self.autosave.observe(sig, now);
    }

    /// Moves to the week containing `date`. The date itself is persisted at
    /// once; a changed week drops unsaved edits of the old one and loads the
    /// new week from storage. Nothing changes if either store call fails.
    pub fn select_date(&mut self, date: NaiveDate, now: Instant) -> StoreResult<()> {
        let week_start = week_start_monday(date);
        let loaded = if week_start == self.week_start {
            None
        } else {
            Some(load_week(self.store.as_ref(), &self.keys, &format_ymd(week_start))?.unwrap_or_default())
        };
        save_last_date(self.store.as_ref(), &self.keys, &format_ymd(date))?;
        self.selected_date = date;

        let Some(schedule) = loaded else {
            return Ok(());
        };
        if schedule.is_empty() {
            tracing::debug!(week = %format_ymd(week_start), "no stored lessons for week");
        }
        if self.autosave.status() == SaveStatus::Pending {
            tracing::info!(from = %self.week_start_ymd(), "week switch discards pending autosave");
        }
        self.week_start = week_start;
        self.timetable.schedule = schedule;
        self.swap_plans.clear();
        // The loaded week is the new baseline; deletions still waiting for a
        // flush keep the session dirty.
        self.autosave.rebaseline();
        let clean = self.signature_with(&BTreeSet::new());
        self.autosave.observe(clean, now);
        self.observe(now);
        Ok(())
    }

    /// Runs the debounced flush once its deadline has passed.
    pub fn tick(&mut self, now: Instant) -> Option<StoreResult<i64>> {
        if !self.autosave.is_due(now) {
            return None;
        }
        Some(self.flush())
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.autosave.deadline()
    }

    pub fn has_unsaved(&self) -> bool {
        self.autosave.has_unsaved()
    }

    fn flush_ops(&self, saved_at: i64) -> StoreResult<Vec<KvOp>> {
        let week = self.week_start_ymd();
        let mut ops = vec![KvOp::Set(
            self.keys.config(),
            config_doc(&self.timetable.catalog, saved_at)?,
        )];
        for w in &self.pending_deletes {
            ops.push(KvOp::Remove(self.keys.week(w)));
        }
        if !self.pending_deletes.contains(&week) {
            ops.push(KvOp::Set(
                self.keys.week(&week),
                week_doc(&self.timetable.schedule, saved_at)?,
            ));
        }
        Ok(ops)
    }

    /// Writes config, the current week and any deferred archive deletions in
    /// one batch. On failure the in-memory state is kept as is and the save
    /// status turns to `error`; the caller may retry.
    pub fn flush(&mut self) -> StoreResult<i64> {
        let saved_at = now_millis();
        self.autosave.begin_flush();
        let result = self
            .flush_ops(saved_at)
            .and_then(|ops| self.store.apply(&ops));
        match result {
            Ok(()) => {
                let removed = std::mem::take(&mut self.pending_deletes);
                let sig = self.signature_with(&self.pending_deletes);
                self.autosave.finish_ok(sig, saved_at);
                tracing::info!(
                    week = %self.week_start_ymd(),
                    units = self.timetable.schedule.unit_count(),
                    removed_weeks = removed.len(),
                    "flushed"
                );
                Ok(saved_at)
            }
            Err(e) => {
                tracing::warn!(error = %e, "flush failed");
                self.autosave.finish_err(e.to_string());
                Err(e)
            }
        }
    }

    /// Hides a stored week until the next flush removes it for good.
    pub fn mark_delete(&mut self, week_start: &str, now: Instant) -> bool {
        let inserted = self.pending_deletes.insert(week_start.to_string());
        if inserted {
            self.observe(now);
        }
        inserted
    }

    pub fn unmark_delete(&mut self, week_start: &str, now: Instant) -> bool {
        let removed = self.pending_deletes.remove(week_start);
        if removed {
            self.observe(now);
        }
        removed
    }

    pub fn list_archives(&self) -> StoreResult<Vec<WeekArchivePreview>> {
        list_week_archives(self.store.as_ref(), &self.keys, &self.pending_deletes)
    }

    /// Merges an assistant payload into the live state.
    pub fn import_partial(&mut self, payload: &Value, now: Instant) -> anyhow::Result<ImportOutcome> {
        let outcome = prepare_import(payload, &self.timetable.catalog)?;
        self.dispatch(Action::Hydrate(outcome.partial.clone()), now)?;
        if !outcome.skipped.is_empty() {
            tracing::warn!(skipped = outcome.skipped.len(), "import dropped invalid units");
        }
        Ok(outcome)
    }

    /// Validates a swap and parks it under a fresh plan id until confirmed.
    pub fn propose_swap(&mut self, src: &UnitRef, tgt: &UnitRef) -> ScheduleResult<(String, SwapPlan)> {
        let plan = plan_swap(&self.timetable.schedule, src, tgt)?;
        let plan_id = new_id("swap");
        self.swap_plans.insert(plan_id.clone(), plan.clone());
        Ok((plan_id, plan))
    }

    /// `Ok(None)` when no such plan is waiting.
    pub fn confirm_swap(&mut self, plan_id: &str, now: Instant) -> ScheduleResult<Option<SwapPlan>> {
        let Some(plan) = self.swap_plans.remove(plan_id) else {
            return Ok(None);
        };
        self.dispatch(Action::ApplySwap(plan.clone()), now)?;
        Ok(Some(plan))
    }

    pub fn cancel_swap(&mut self, plan_id: &str) -> bool {
        self.swap_plans.remove(plan_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ScheduleUnit, Teacher};
    use crate::store::memory::MemoryStore;
    use crate::timegrid::{CellKey, Day};
    use std::rc::Rc;

    const DEBOUNCE: Duration = Duration::from_millis(900);

    fn date(s: &str) -> NaiveDate {
        parse_ymd(s).expect("date")
    }

    fn open(store: &Rc<MemoryStore>, now: Instant) -> Session {
        Session::open(Box::new(Rc::clone(store)), "test", DEBOUNCE, date("2026-10-21"), now).expect("open")
    }

    fn seed_teacher(s: &mut Session, now: Instant) {
        s.dispatch(
            Action::SetTeachers(vec![Teacher { id: "t1".into(), name: "Li".into(), subject: "Physics".into() }]),
            now,
        )
        .expect("teachers");
    }

    fn unit(id: &str) -> ScheduleUnit {
        ScheduleUnit { id: id.into(), teacher_id: "t1".into(), group_name: String::new() }
    }

    #[test]
    fn fresh_session_defaults_to_today_and_is_clean() {
        let store = Rc::new(MemoryStore::default());
        let s = open(&store, Instant::now());
        assert_eq!(s.week_start_ymd(), "2026-10-19");
        assert!(s.timetable().has_loaded);
        assert!(!s.has_unsaved());
        assert!(store.data.borrow().is_empty());
    }

    #[test]
    fn edits_debounce_then_flush_and_reload() {
        let store = Rc::new(MemoryStore::default());
        let t0 = Instant::now();
        let mut s = open(&store, t0);
        seed_teacher(&mut s, t0);
        let cell = CellKey::new("c1", Day::Tue, "p1");
        s.dispatch(Action::UpsertUnit { cell: cell.clone(), unit: unit("u1") }, t0 + Duration::from_millis(500))
            .expect("upsert");

        assert!(s.tick(t0 + DEBOUNCE).is_none());
        let saved = s.tick(t0 + Duration::from_millis(1400)).expect("due").expect("flush");
        assert!(saved > 0);
        assert_eq!(s.autosave().status(), SaveStatus::Ready);
        assert!(s.tick(t0 + Duration::from_secs(10)).is_none());

        let reopened = open(&store, t0);
        assert_eq!(reopened.schedule().units(&cell)[0].group_name, "Physics");
        assert_eq!(reopened.catalog().teachers.len(), 1);
    }

    #[test]
    fn failed_flush_keeps_memory_and_reports_error() {
        let store = Rc::new(MemoryStore::default());
        let t0 = Instant::now();
        let mut s = open(&store, t0);
        seed_teacher(&mut s, t0);
        store.fail_writes.set(true);
        assert!(s.flush().is_err());
        assert_eq!(s.autosave().status(), SaveStatus::Error);
        assert!(s.has_unsaved());
        assert_eq!(s.catalog().teachers.len(), 1);

        store.fail_writes.set(false);
        s.flush().expect("retry");
        assert!(!s.has_unsaved());
    }

    #[test]
    fn week_switch_loads_target_and_cancels_pending() {
        let store = Rc::new(MemoryStore::default());
        let t0 = Instant::now();
        let mut s = open(&store, t0);
        seed_teacher(&mut s, t0);
        s.flush().expect("flush");

        let cell = CellKey::new("c1", Day::Mon, "p1");
        s.dispatch(Action::UpsertUnit { cell: cell.clone(), unit: unit("u1") }, t0).expect("upsert");
        assert!(s.next_deadline().is_some());

        s.select_date(date("2026-10-28"), t0).expect("select");
        assert_eq!(s.week_start_ymd(), "2026-10-26");
        assert!(s.schedule().is_empty());
        assert!(s.next_deadline().is_none());
        assert_eq!(store.data.borrow().get("walkclass_last_date_test").map(String::as_str), Some("2026-10-28"));

        s.select_date(date("2026-10-20"), t0).expect("back");
        assert!(s.schedule().units(&cell).is_empty());
    }

    #[test]
    fn failed_week_load_keeps_date_and_week_together() {
        let store = Rc::new(MemoryStore::default());
        let t0 = Instant::now();
        let mut s = open(&store, t0);

        store.fail_reads.set(true);
        assert!(s.select_date(date("2026-10-28"), t0).is_err());
        assert_eq!(s.selected_date(), date("2026-10-21"));
        assert_eq!(s.week_start_ymd(), "2026-10-19");
        assert!(store.data.borrow().get("walkclass_last_date_test").is_none());

        store.fail_reads.set(false);
        store.fail_writes.set(true);
        assert!(s.select_date(date("2026-10-28"), t0).is_err());
        assert_eq!(s.selected_date(), date("2026-10-21"));
        assert_eq!(s.week_start_ymd(), "2026-10-19");
    }

    #[test]
    fn archive_delete_is_deferred_until_flush() {
        let store = Rc::new(MemoryStore::default());
        let t0 = Instant::now();
        let mut s = open(&store, t0);
        seed_teacher(&mut s, t0);
        s.dispatch(Action::UpsertUnit { cell: CellKey::new("c", Day::Mon, "p"), unit: unit("u") }, t0)
            .expect("upsert");
        s.flush().expect("flush");
        s.select_date(date("2026-10-12"), t0).expect("select");
        s.flush().expect("flush other week");
        assert_eq!(s.list_archives().expect("list").len(), 2);

        assert!(s.mark_delete("2026-10-19", t0));
        assert!(!s.mark_delete("2026-10-19", t0));
        assert_eq!(s.list_archives().expect("list").len(), 1);
        assert!(store.data.borrow().contains_key("walkclass_schedule_test_2026-10-19"));
        assert!(s.has_unsaved());

        s.flush().expect("flush deletes");
        assert!(!store.data.borrow().contains_key("walkclass_schedule_test_2026-10-19"));
        assert!(s.pending_deletes().is_empty());
        assert_eq!(s.list_archives().expect("list").len(), 1);
    }

    #[test]
    fn pending_deletes_survive_a_week_switch() {
        let store = Rc::new(MemoryStore::default());
        let t0 = Instant::now();
        let mut s = open(&store, t0);
        s.flush().expect("flush");
        s.mark_delete("2026-10-19", t0);
        s.select_date(date("2026-10-05"), t0).expect("select");
        assert!(s.has_unsaved());
        assert!(s.next_deadline().is_some());
    }

    #[test]
    fn current_week_marked_for_delete_is_not_rewritten() {
        let store = Rc::new(MemoryStore::default());
        let t0 = Instant::now();
        let mut s = open(&store, t0);
        s.flush().expect("flush");
        assert!(store.data.borrow().contains_key("walkclass_schedule_test_2026-10-19"));
        s.mark_delete("2026-10-19", t0);
        assert!(s.unmark_delete("2026-10-19", t0));
        assert!(!s.has_unsaved());
        s.mark_delete("2026-10-19", t0);
        s.flush().expect("flush");
        assert!(!store.data.borrow().contains_key("walkclass_schedule_test_2026-10-19"));
    }

    #[test]
    fn swap_plans_confirm_once_and_cancel() {
        let store = Rc::new(MemoryStore::default());
        let t0 = Instant::now();
        let mut s = open(&store, t0);
        s.dispatch(
            Action::SetTeachers(vec![
                Teacher { id: "t1".into(), name: "T".into(), subject: "Math".into() },
                Teacher { id: "t2".into(), name: "U".into(), subject: "Art".into() },
            ]),
            t0,
        )
        .expect("teachers");
        let a = CellKey::new("x", Day::Mon, "p1");
        let b = CellKey::new("y", Day::Tue, "p3");
        s.dispatch(Action::UpsertUnit { cell: a.clone(), unit: unit("ua") }, t0).expect("a");
        s.dispatch(
            Action::UpsertUnit {
                cell: b.clone(),
                unit: ScheduleUnit { id: "ub".into(), teacher_id: "t2".into(), group_name: String::new() },
            },
            t0,
        )
        .expect("b");

        let (plan_id, _) = s
            .propose_swap(&UnitRef::new(a.clone(), "ua"), &UnitRef::new(b.clone(), "ub"))
            .expect("propose");
        assert_eq!(s.schedule().units(&a)[0].id, "ua");
        assert!(s.confirm_swap(&plan_id, t0).expect("confirm").is_some());
        assert_eq!(s.schedule().units(&a)[0].id, "ub");
        assert_eq!(s.schedule().units(&b)[0].id, "ua");
        assert!(s.confirm_swap(&plan_id, t0).expect("again").is_none());

        let (plan_id, _) = s
            .propose_swap(&UnitRef::new(a.clone(), "ub"), &UnitRef::new(b, "ua"))
            .expect("propose back");
        assert!(s.cancel_swap(&plan_id));
        assert!(!s.cancel_swap(&plan_id));
    }
}
