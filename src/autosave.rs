use crate::model::Catalog;
use crate::schedule::ScheduleMapping;
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveStatus {
    Ready,
    Pending,
    Saving,
    Error,
}

/// Digest of everything a flush would write.
pub fn signature(
    catalog: &Catalog,
    week_start: &str,
    schedule: &ScheduleMapping,
    pending_deletes: &BTreeSet<String>,
) -> String {
    let canonical = json!({
        "config": catalog,
        "weekStart": week_start,
        "schedule": schedule,
        "pendingDeletes": pending_deletes,
    });
    hex::encode(Sha256::digest(canonical.to_string().as_bytes()))
}

/// Debounce bookkeeping for coalesced saves. Only the latest deadline is
/// ever live; each new change replaces it.
#[derive(Debug, Clone)]
pub struct Autosave {
    debounce: Duration,
    baseline: Option<String>,
    deadline: Option<Instant>,
    status: SaveStatus,
    last_saved_at: Option<i64>,
    last_error: Option<String>,
}

impl Autosave {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            baseline: None,
            deadline: None,
            status: SaveStatus::Ready,
            last_saved_at: None,
            last_error: None,
        }
    }

    /// Forget the baseline and any pending timer; the next observation
    /// becomes the new baseline without a write.
    pub fn rebaseline(&mut self) {
        self.baseline = None;
        self.deadline = None;
        self.status = SaveStatus::Ready;
    }

    /// Records the current signature after a state change.
    pub fn observe(&mut self, sig: String, now: Instant) {
        match &self.baseline {
            None => {
                self.baseline = Some(sig);
                self.deadline = None;
                self.status = SaveStatus::Ready;
            }
            Some(b) if *b == sig => {
                self.deadline = None;
                if self.status == SaveStatus::Pending {
                    self.status = SaveStatus::Ready;
                }
            }
            Some(_) => {
                self.deadline = Some(now + self.debounce);
                self.status = SaveStatus::Pending;
            }
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }

    pub fn has_unsaved(&self) -> bool {
        matches!(self.status, SaveStatus::Pending | SaveStatus::Error)
    }

    pub fn begin_flush(&mut self) {
        self.deadline = None;
        self.status = SaveStatus::Saving;
    }

    pub fn finish_ok(&mut self, sig: String, saved_at: i64) {
        self.baseline = Some(sig);
        self.status = SaveStatus::Ready;
        self.last_saved_at = Some(saved_at);
        self.last_error = None;
    }

    pub fn finish_err(&mut self, message: String) {
        self.status = SaveStatus::Error;
        self.last_error = Some(message);
    }

    pub fn status(&self) -> SaveStatus {
        self.status
    }

    pub fn last_saved_at(&self) -> Option<i64> {
        self.last_saved_at
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
