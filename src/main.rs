mod archive;
mod autosave;
mod conflict;
mod import;
mod ipc;
mod logging;
mod model;
mod mutation;
mod schedule;
mod session;
mod settings;
mod state;
mod store;
mod timegrid;
mod views;

use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Instant;

use serde_json::json;

fn main() {
    logging::init();
    let config = settings::DaemonConfig::from_env();
    tracing::info!(
        app_id = %config.app_id,
        autosave_ms = config.autosave_debounce.as_millis() as u64,
        "walkclassd starting"
    );

    let mut state = ipc::AppState::new(config);
    if let Some(path) = state.config.workspace.clone() {
        if let Err(e) = ipc::open_workspace(&mut state, &path) {
            tracing::error!(error = %format!("{e:#}"), "could not open configured workspace");
        }
    }

    // Requests arrive on a reader thread so the loop can wake for autosave
    // deadlines between them.
    let (tx, rx) = mpsc::channel::<String>();
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(line).is_err() {
                break;
            }
        }
    });

    let mut stdout = io::stdout();
    loop {
        let next = match state.next_deadline() {
            Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        let line = match next {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => {
                state.tick(Instant::now());
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => {
                tracing::debug!(id = %req.id, method = %req.method, "request");
                ipc::handle_request(&mut state, req)
            }
            Err(e) => json!({
                "ok": false,
                "error": { "code": "bad_json", "message": e.to_string() },
            }),
        };
        let _ = writeln!(stdout, "{resp}");
        let _ = stdout.flush();

        state.tick(Instant::now());
    }

    state.shutdown();
    tracing::info!("stdin closed, exiting");
}
