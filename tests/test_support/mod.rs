#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    spawn_sidecar_with_env(&[])
}

pub fn spawn_sidecar_with_env(envs: &[(&str, &str)]) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_walkclassd");
    let mut cmd = Command::new(exe);
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .env_remove("WALKCLASSD_WORKSPACE")
        .env_remove("WALKCLASSD_APP_ID")
        .env_remove("WALKCLASSD_AUTOSAVE_MS");
    for (k, v) in envs {
        cmd.env(k, v);
    }
    let mut child = cmd.spawn().expect("spawn walkclassd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

/// Closes stdin and waits for the sidecar to run its final flush and exit.
pub fn shutdown(mut child: Child, stdin: ChildStdin) {
    drop(stdin);
    let status = child.wait().expect("wait for walkclassd");
    assert!(status.success(), "walkclassd exited with {status}");
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().expect("result")
}

/// Error code of a failed response; panics if the call succeeded.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value.get("error").cloned().expect("error")
}

/// Workspace with two teachers, three classes and two periods.
pub fn seed_basic(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) {
    request_ok(
        stdin,
        reader,
        "seed-t",
        "teachers.set",
        json!({ "teachers": [
            { "id": "T", "name": "Teacher T", "subject": "Math" },
            { "id": "U", "name": "Teacher U", "subject": "Art" }
        ]}),
    );
    request_ok(
        stdin,
        reader,
        "seed-c",
        "classes.set",
        json!({ "classes": [
            { "id": "X", "name": "Class X" },
            { "id": "Y", "name": "Class Y" },
            { "id": "Z", "name": "Class Z" }
        ]}),
    );
    request_ok(
        stdin,
        reader,
        "seed-p",
        "periods.set",
        json!({ "periods": [
            { "id": "P1", "name": "第1节", "startTime": "08:30", "endTime": "09:15" },
            { "id": "P2", "name": "第2节", "startTime": "09:25", "endTime": "10:10" },
            { "id": "P3", "name": "第3节", "startTime": "10:20", "endTime": "11:05" }
        ]}),
    );
}
