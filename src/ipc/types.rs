use std::path::PathBuf;
use std::time::Instant;

use serde::Deserialize;

use crate::session::Session;
use crate::settings::DaemonConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub config: DaemonConfig,
    pub workspace: Option<PathBuf>,
    pub session: Option<Session>,
}

impl AppState {
    pub fn new(config: DaemonConfig) -> Self {
        Self {
            config,
            workspace: None,
            session: None,
        }
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.session.as_ref().and_then(Session::next_deadline)
    }

    /// Fires a due autosave. Failures are logged and left in the save status.
    pub fn tick(&mut self, now: Instant) {
        if let Some(session) = self.session.as_mut() {
            if let Some(Err(e)) = session.tick(now) {
                tracing::error!(error = %e, "autosave failed");
            }
        }
    }

    /// Writes out anything still unsaved before the process exits.
    pub fn shutdown(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if session.has_unsaved() {
            if let Err(e) = session.flush() {
                tracing::error!(error = %e, "final flush failed");
            }
        }
    }
}
