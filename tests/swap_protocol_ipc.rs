mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, seed_basic, spawn_sidecar, temp_dir};

fn unit_ref(class_id: &str, day: &str, period_id: &str, unit_id: &str) -> serde_json::Value {
    json!({ "classId": class_id, "day": day, "periodId": period_id, "unitId": unit_id })
}

#[test]
fn swap_needs_confirmation_and_keeps_unit_identity() {
    let workspace = temp_dir("walkclass-swap");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(&mut stdin, &mut reader, "1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));
    seed_basic(&mut stdin, &mut reader);
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "schedule.upsertUnit",
        json!({ "classId": "X", "day": "mon", "periodId": "P1", "unit": { "id": "ut", "teacherId": "T" } }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "schedule.upsertUnit",
        json!({ "classId": "Y", "day": "tue", "periodId": "P3", "unit": { "id": "uu", "teacherId": "U" } }),
    );
    let original = request_ok(&mut stdin, &mut reader, "4", "schedule.get", json!({}));

    let proposed = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "schedule.swap.propose",
        json!({ "src": unit_ref("X", "mon", "P1", "ut"), "tgt": unit_ref("Y", "tue", "P3", "uu") }),
    );
    let plan_id = proposed["planId"].as_str().expect("planId").to_string();
    let unchanged = request_ok(&mut stdin, &mut reader, "6", "schedule.get", json!({}));
    assert_eq!(unchanged["schedule"], original["schedule"]);

    request_ok(&mut stdin, &mut reader, "7", "schedule.swap.confirm", json!({ "planId": plan_id }));
    let x = request_ok(&mut stdin, &mut reader, "8", "views.cell", json!({ "classId": "X", "day": "mon", "periodId": "P1" }));
    assert_eq!(x["units"][0], json!({ "id": "uu", "teacherId": "U", "groupName": "Art" }));
    let y = request_ok(&mut stdin, &mut reader, "9", "views.cell", json!({ "classId": "Y", "day": "tue", "periodId": "P3" }));
    assert_eq!(y["units"][0], json!({ "id": "ut", "teacherId": "T", "groupName": "Math" }));

    let e = request_err(&mut stdin, &mut reader, "10", "schedule.swap.confirm", json!({ "planId": plan_id }));
    assert_eq!(e["code"], "not_found");

    // Swapping back restores the original week exactly.
    let back = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "schedule.swap.propose",
        json!({ "src": unit_ref("Y", "tue", "P3", "ut"), "tgt": unit_ref("X", "mon", "P1", "uu") }),
    );
    request_ok(&mut stdin, &mut reader, "12", "schedule.swap.confirm", json!({ "planId": back["planId"] }));
    let restored = request_ok(&mut stdin, &mut reader, "13", "schedule.get", json!({}));
    assert_eq!(restored["schedule"], original["schedule"]);
}

#[test]
fn swap_rejections_and_stale_plans() {
    let workspace = temp_dir("walkclass-swap-reject");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(&mut stdin, &mut reader, "1", "workspace.select", json!({ "path": workspace.to_string_lossy() }));
    seed_basic(&mut stdin, &mut reader);
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "schedule.upsertUnit",
        json!({ "classId": "X", "day": "mon", "periodId": "P1", "unit": { "id": "a", "teacherId": "T" } }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "schedule.upsertUnit",
        json!({ "classId": "Y", "day": "mon", "periodId": "P2", "unit": { "id": "b", "teacherId": "U" } }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "schedule.upsertUnit",
        json!({ "classId": "Z", "day": "mon", "periodId": "P2", "unit": { "id": "c", "teacherId": "T" } }),
    );

    let e = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "schedule.swap.propose",
        json!({ "src": unit_ref("X", "mon", "P1", "a"), "tgt": unit_ref("X", "mon", "P1", "a") }),
    );
    assert_eq!(e["code"], "validation_failed");
    assert_eq!(e["message"], "identical slot");

    // T already teaches Z at mon/P2, so T cannot take b's slot.
    let e = request_err(
        &mut stdin,
        &mut reader,
        "6",
        "schedule.swap.propose",
        json!({ "src": unit_ref("X", "mon", "P1", "a"), "tgt": unit_ref("Y", "mon", "P2", "b") }),
    );
    assert_eq!(e["code"], "teacher_conflict");
    assert_eq!(e["details"]["classId"], "Z");

    request_ok(&mut stdin, &mut reader, "7", "schedule.deleteUnit", json!({ "classId": "Z", "day": "mon", "periodId": "P2", "unitId": "c" }));
    let plan = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "schedule.swap.propose",
        json!({ "src": unit_ref("X", "mon", "P1", "a"), "tgt": unit_ref("Y", "mon", "P2", "b") }),
    );
    request_ok(&mut stdin, &mut reader, "9", "schedule.deleteUnit", json!({ "classId": "Y", "day": "mon", "periodId": "P2", "unitId": "b" }));
    let e = request_err(&mut stdin, &mut reader, "10", "schedule.swap.confirm", json!({ "planId": plan["planId"] }));
    assert_eq!(e["code"], "validation_failed");

    let e = request_err(
        &mut stdin,
        &mut reader,
        "11",
        "schedule.swap.propose",
        json!({ "src": unit_ref("X", "mon", "P1", "a"), "tgt": unit_ref("Z", "mon", "P2", "missing") }),
    );
    assert_eq!(e["message"], "target unit not found");

    let cancelled = request_ok(&mut stdin, &mut reader, "12", "schedule.swap.cancel", json!({ "planId": "swap_nope" }));
    assert_eq!(cancelled["cancelled"], false);
}
