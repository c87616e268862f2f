use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
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

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradeformd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradeformd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
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

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn str_at<'a>(value: &'a serde_json::Value, pointer: &str) -> &'a str {
    value
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing {pointer} in {value}"))
}

#[test]
fn forms_create_update_and_reject_bad_edits_atomically() {
    let workspace = temp_dir("gradeformd-forms");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "forms.create",
        json!({
            "shortIdentifier": "Lab1",
            "description": "First lab",
            "date": "2026-09-14",
            "items": [
                { "name": "Setup", "outOf": 2 },
                { "name": "Report", "outOf": 8 }
            ]
        }),
    );
    assert_eq!(
        created.get("messageKey").and_then(|v| v.as_str()),
        Some("grade_entry_forms.create.success")
    );
    let form_id = str_at(&created, "/formId").to_string();

    let duplicate_short = request(
        &mut stdin,
        &mut reader,
        "3",
        "forms.create",
        json!({ "shortIdentifier": "Lab1" }),
    );
    assert_eq!(
        duplicate_short.pointer("/error/code").and_then(|v| v.as_str()),
        Some("bad_params")
    );

    let got = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "forms.get",
        json!({ "formId": form_id }),
    );
    assert_eq!(str_at(&got, "/form/shortIdentifier"), "Lab1");
    assert_eq!(str_at(&got, "/form/date"), "2026-09-14");
    assert_eq!(str_at(&got, "/items/0/name"), "Setup");
    assert_eq!(str_at(&got, "/items/1/name"), "Report");
    let setup_id = str_at(&got, "/items/0/id").to_string();

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "forms.update",
        json!({
            "formId": form_id,
            "patch": {
                "description": "First lab (revised)",
                "items": [
                    { "id": setup_id, "name": "Setup", "outOf": 3 },
                    { "name": "Cleanup", "outOf": 1 }
                ]
            }
        }),
    );
    assert_eq!(
        updated.get("messageKey").and_then(|v| v.as_str()),
        Some("grade_entry_forms.edit.success")
    );

    let bad = request(
        &mut stdin,
        &mut reader,
        "6",
        "forms.update",
        json!({
            "formId": form_id,
            "patch": {
                "description": "should not stick",
                "items": [
                    { "name": "Extra", "outOf": 1 },
                    { "name": "Extra", "outOf": 2 }
                ]
            }
        }),
    );
    assert_eq!(bad.get("ok").and_then(|v| v.as_bool()), Some(false));

    let bad_date = request(
        &mut stdin,
        &mut reader,
        "7",
        "forms.update",
        json!({ "formId": form_id, "patch": { "date": "14/09/2026" } }),
    );
    assert_eq!(
        bad_date.pointer("/error/code").and_then(|v| v.as_str()),
        Some("bad_params")
    );

    let got = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "forms.get",
        json!({ "formId": form_id }),
    );
    assert_eq!(str_at(&got, "/form/description"), "First lab (revised)");
    assert_eq!(str_at(&got, "/form/date"), "2026-09-14");
    let items = got.get("items").and_then(|v| v.as_array()).expect("items");
    let names: Vec<&str> = items
        .iter()
        .filter_map(|i| i.get("name").and_then(|v| v.as_str()))
        .collect();
    assert_eq!(names, vec!["Setup", "Report", "Cleanup"]);
    assert_eq!(items[0].get("outOf").and_then(|v| v.as_f64()), Some(3.0));

    let listed = request_ok(&mut stdin, &mut reader, "9", "forms.list", json!({}));
    assert_eq!(
        listed.get("forms").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(1)
    );

    let missing = request(
        &mut stdin,
        &mut reader,
        "10",
        "forms.get",
        json!({ "formId": "nope" }),
    );
    assert_eq!(
        missing.pointer("/error/code").and_then(|v| v.as_str()),
        Some("not_found")
    );
}

#[test]
fn grade_updates_report_totals_and_student_view_waits_for_release() {
    let workspace = temp_dir("gradeformd-grades");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let student = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "userName": "jdoe", "lastName": "Doe", "firstName": "Jane" }),
    );
    let student_id = str_at(&student, "/studentId").to_string();
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "forms.create",
        json!({
            "shortIdentifier": "Quiz",
            "items": [{ "name": "Q1", "outOf": 5 }, { "name": "Q2", "outOf": 5 }]
        }),
    );
    let form_id = str_at(&created, "/formId").to_string();
    let got = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "forms.get",
        json!({ "formId": form_id }),
    );
    let q1 = str_at(&got, "/items/0/id").to_string();
    let q2 = str_at(&got, "/items/1/id").to_string();

    let update = |stdin: &mut ChildStdin,
                  reader: &mut BufReader<ChildStdout>,
                  id: &str,
                  item: &str,
                  value: serde_json::Value| {
        request_ok(
            stdin,
            reader,
            id,
            "grades.update",
            json!({
                "formId": form_id,
                "studentId": student_id,
                "itemId": item,
                "value": value
            }),
        )
    };

    let first = update(&mut stdin, &mut reader, "5", &q1, json!(4));
    assert_eq!(first.get("saved").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(first.get("total").and_then(|v| v.as_f64()), Some(4.0));

    let second = update(&mut stdin, &mut reader, "6", &q2, json!(" 2.5 "));
    assert_eq!(second.get("total").and_then(|v| v.as_f64()), Some(6.5));

    let negative = update(&mut stdin, &mut reader, "7", &q2, json!(-1));
    assert_eq!(negative.get("saved").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        negative.get("errorCode").and_then(|v| v.as_str()),
        Some("grade_save_failed")
    );
    assert_eq!(negative.get("total").and_then(|v| v.as_f64()), Some(6.5));

    let garbage = update(&mut stdin, &mut reader, "8", &q2, json!("abc"));
    assert_eq!(garbage.get("saved").and_then(|v| v.as_bool()), Some(false));

    let cleared = update(&mut stdin, &mut reader, "9", &q1, serde_json::Value::Null);
    assert_eq!(cleared.get("saved").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(cleared.get("total").and_then(|v| v.as_f64()), Some(2.5));

    let unknown_item = request(
        &mut stdin,
        &mut reader,
        "10",
        "grades.update",
        json!({ "formId": form_id, "studentId": student_id, "itemId": "nope", "value": 1 }),
    );
    assert_eq!(
        unknown_item.pointer("/error/code").and_then(|v| v.as_str()),
        Some("not_found")
    );

    let hidden_view = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "grades.studentView",
        json!({ "formId": form_id, "studentId": student_id }),
    );
    assert_eq!(hidden_view.get("released").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        hidden_view.get("grades").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );
    assert!(hidden_view.get("total").is_none());

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "grades.release",
        json!({ "formId": form_id, "students": [student_id], "release": true }),
    );
    let view = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "grades.studentView",
        json!({ "formId": form_id, "studentId": student_id }),
    );
    assert_eq!(view.get("released").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(view.get("total").and_then(|v| v.as_f64()), Some(2.5));
    assert!(view.pointer("/grades/0/grade").map(|v| v.is_null()).unwrap_or(false));
    assert_eq!(
        view.pointer("/grades/1/grade").and_then(|v| v.as_f64()),
        Some(2.5)
    );
}
