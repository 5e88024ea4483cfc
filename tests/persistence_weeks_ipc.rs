mod test_support;

use serde_json::json;
use std::time::Duration;
use test_support::{request_err, request_ok, seed_basic, shutdown, spawn_sidecar, spawn_sidecar_with_env, temp_dir};

fn place(class_id: &str, day: &str, unit_id: &str) -> serde_json::Value {
    json!({ "classId": class_id, "day": day, "periodId": "P1", "unit": { "id": unit_id, "teacherId": "T" } })
}

#[test]
fn weeks_are_stored_independently_and_survive_restart() {
    let workspace = temp_dir("walkclass-weeks");
    let path = workspace.to_string_lossy().to_string();

    let (child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(&mut stdin, &mut reader, "1", "workspace.select", json!({ "path": path }));
    seed_basic(&mut stdin, &mut reader);

    let week = request_ok(&mut stdin, &mut reader, "2", "week.select", json!({ "date": "2026-10-21" }));
    assert_eq!(week["weekStart"], "2026-10-19");
    assert_eq!(week["rangeLabel"], "2026-10-19 ~ 2026-10-25");
    assert_eq!(week["days"][0]["date"], "10-19");
    request_ok(&mut stdin, &mut reader, "3", "schedule.upsertUnit", place("X", "mon", "a"));
    request_ok(&mut stdin, &mut reader, "4", "save.flush", json!({}));

    let week = request_ok(&mut stdin, &mut reader, "5", "week.select", json!({ "date": "2026-10-27" }));
    assert_eq!(week["weekStart"], "2026-10-26");
    assert_eq!(week["schedule"], json!([]));
    request_ok(&mut stdin, &mut reader, "6", "schedule.upsertUnit", place("Y", "tue", "b"));
    request_ok(&mut stdin, &mut reader, "7", "schedule.upsertUnit", place("Z", "wed", "c"));

    let e = request_err(&mut stdin, &mut reader, "8", "week.select", json!({ "date": "21/10/2026" }));
    assert_eq!(e["code"], "bad_params");

    // Closing stdin flushes the pending edits of the current week.
    shutdown(child, stdin);

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(&mut stdin, &mut reader, "1", "workspace.select", json!({ "path": path }));
    let current = request_ok(&mut stdin, &mut reader, "2", "week.current", json!({}));
    assert_eq!(current["selectedDate"], "2026-10-27");
    assert_eq!(current["weekStart"], "2026-10-26");
    assert_eq!(current["schedule"].as_array().map(Vec::len), Some(2));

    let state = request_ok(&mut stdin, &mut reader, "3", "state.get", json!({}));
    assert_eq!(state["teachers"].as_array().map(Vec::len), Some(2));
    assert_eq!(state["periods"][0]["startTime"], "08:30");

    let archives = request_ok(&mut stdin, &mut reader, "4", "archives.list", json!({}));
    let list = archives["archives"].as_array().expect("archives");
    assert_eq!(list.len(), 2);
    let older = list.iter().find(|a| a["weekStart"] == "2026-10-19").expect("older week");
    assert_eq!(older["unitCount"], 1);
    assert_eq!(older["samples"][0]["teacherId"], "T");
}

#[test]
fn archive_deletion_waits_for_the_next_flush() {
    let workspace = temp_dir("walkclass-archive-delete");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(&mut stdin, &mut reader, "1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));
    seed_basic(&mut stdin, &mut reader);
    request_ok(&mut stdin, &mut reader, "2", "week.select", json!({ "date": "2026-10-05" }));
    request_ok(&mut stdin, &mut reader, "3", "schedule.upsertUnit", place("X", "mon", "a"));
    request_ok(&mut stdin, &mut reader, "4", "save.flush", json!({}));
    request_ok(&mut stdin, &mut reader, "5", "week.select", json!({ "date": "2026-10-12" }));
    request_ok(&mut stdin, &mut reader, "6", "save.flush", json!({}));

    let marked = request_ok(&mut stdin, &mut reader, "7", "archives.markDelete", json!({ "weekStart": "2026-10-07" }));
    assert_eq!(marked["weekStart"], "2026-10-05");
    assert_eq!(marked["changed"], true);

    let listed = request_ok(&mut stdin, &mut reader, "8", "archives.list", json!({}));
    assert_eq!(listed["archives"].as_array().map(Vec::len), Some(1));
    let status = request_ok(&mut stdin, &mut reader, "9", "save.status", json!({}));
    assert_eq!(status["pendingDeletes"], json!(["2026-10-05"]));
    assert_eq!(status["hasUnsaved"], true);

    // Still on disk: going back to that week loads it.
    let week = request_ok(&mut stdin, &mut reader, "10", "week.select", json!({ "date": "2026-10-05" }));
    assert_eq!(week["schedule"].as_array().map(Vec::len), Some(1));
    request_ok(&mut stdin, &mut reader, "11", "week.select", json!({ "date": "2026-10-12" }));

    let saved = request_ok(&mut stdin, &mut reader, "12", "save.flush", json!({}));
    assert_eq!(saved["status"], "ready");
    assert_eq!(saved["pendingDeletes"], json!([]));

    let week = request_ok(&mut stdin, &mut reader, "13", "week.select", json!({ "date": "2026-10-05" }));
    assert_eq!(week["schedule"], json!([]));
    let listed = request_ok(&mut stdin, &mut reader, "14", "archives.list", json!({}));
    let weeks: Vec<&str> = listed["archives"]
        .as_array()
        .expect("archives")
        .iter()
        .filter_map(|a| a["weekStart"].as_str())
        .collect();
    assert_eq!(weeks, vec!["2026-10-12"]);

    let unmarked = request_ok(&mut stdin, &mut reader, "15", "archives.unmarkDelete", json!({ "weekStart": "2026-10-12" }));
    assert_eq!(unmarked["changed"], false);
}

#[test]
fn debounced_autosave_fires_without_an_explicit_flush() {
    let workspace = temp_dir("walkclass-autosave");
    let (_child, mut stdin, mut reader) = spawn_sidecar_with_env(&[("WALKCLASSD_AUTOSAVE_MS", "300")]);
    request_ok(&mut stdin, &mut reader, "1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));
    request_ok(&mut stdin, &mut reader, "2", "courses.upsertByName", json!({ "name": "Physics" }));

    let status = request_ok(&mut stdin, &mut reader, "3", "save.status", json!({}));
    assert_eq!(status["status"], "pending");

    let mut saved = false;
    for i in 0..40 {
        std::thread::sleep(Duration::from_millis(50));
        let status = request_ok(&mut stdin, &mut reader, &format!("poll{i}"), "save.status", json!({}));
        if status["status"] == "ready" && !status["lastSavedAt"].is_null() {
            saved = true;
            break;
        }
    }
    assert!(saved, "autosave never ran");
}
