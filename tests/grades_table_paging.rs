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

const LAST_NAMES: [&str; 8] = ["adams", "Baker", "cole", "Dunn", "evans", "Fox", "gray", "Hill"];

fn seed_roster(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    count: usize,
) {
    for i in 0..count {
        let _ = request_ok(
            stdin,
            reader,
            &format!("s{i}"),
            "students.create",
            json!({
                "userName": format!("s{:02}", i),
                "lastName": LAST_NAMES[i % LAST_NAMES.len()],
                "firstName": "Student",
            }),
        );
    }
    for i in 0..2 {
        let _ = request_ok(
            stdin,
            reader,
            &format!("h{i}"),
            "students.create",
            json!({
                "userName": format!("hidden{i}"),
                "lastName": "Aaron",
                "firstName": "Hidden",
                "hidden": true
            }),
        );
    }
}

fn create_form(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) -> String {
    let created = request_ok(
        stdin,
        reader,
        "form",
        "forms.create",
        json!({
            "shortIdentifier": "MT1",
            "description": "Midterm",
            "items": [
                { "name": "Q1", "outOf": 10 },
                { "name": "Q2", "outOf": 5 }
            ]
        }),
    );
    created
        .get("formId")
        .and_then(|v| v.as_str())
        .expect("formId")
        .to_string()
}

fn letters(result: &serde_json::Value) -> Vec<String> {
    result
        .get("alphaIndex")
        .and_then(|v| v.as_array())
        .expect("alphaIndex")
        .iter()
        .map(|b| b.get("letter").and_then(|v| v.as_str()).unwrap_or("").to_string())
        .collect()
}

fn student_rows(result: &serde_json::Value) -> Vec<serde_json::Value> {
    result
        .get("students")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default()
}

#[test]
fn table_pages_filter_hidden_and_build_alpha_index() {
    let workspace = temp_dir("gradeformd-table-paging");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_roster(&mut stdin, &mut reader, 32);
    let form_id = create_form(&mut stdin, &mut reader);

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "grades.table",
        json!({ "formId": form_id, "updateAlphaIndex": true }),
    );
    assert_eq!(first.get("perPage").and_then(|v| v.as_u64()), Some(15));
    assert_eq!(first.get("totalCount").and_then(|v| v.as_u64()), Some(32));
    assert_eq!(first.get("totalPages").and_then(|v| v.as_u64()), Some(3));
    assert_eq!(student_rows(&first).len(), 15);
    assert_eq!(letters(&first), vec!["A", "D", "H"]);
    assert_eq!(first.get("alphaCategory").and_then(|v| v.as_str()), Some("A"));
    assert_eq!(first.get("alphaIndexRebuilt").and_then(|v| v.as_bool()), Some(true));

    let last = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "grades.table",
        json!({ "formId": form_id, "page": 3, "alphaCategory": "H" }),
    );
    assert_eq!(student_rows(&last).len(), 2);
    assert_eq!(last.get("alphaIndexRebuilt").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(last.get("alphaCategory").and_then(|v| v.as_str()), Some("H"));
    assert_eq!(letters(&last), vec!["A", "D", "H"]);

    let past = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "grades.table",
        json!({ "formId": form_id, "page": 9 }),
    );
    assert!(student_rows(&past).is_empty());
    assert_eq!(past.get("totalPages").and_then(|v| v.as_u64()), Some(3));

    let wider = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "grades.table",
        json!({ "formId": form_id, "perPage": "30" }),
    );
    assert_eq!(wider.get("alphaIndexRebuilt").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(letters(&wider), vec!["A", "H"]);

    let all = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "grades.table",
        json!({ "formId": form_id, "perPage": 50 }),
    );
    let rows = student_rows(&all);
    assert_eq!(rows.len(), 32);
    assert!(rows.iter().all(|r| {
        !r.get("userName")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .starts_with("hidden")
    }));
    let keys: Vec<String> = rows
        .iter()
        .map(|r| {
            r.get("lastName")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_lowercase()
        })
        .collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
    // equal last names keep user-name order
    let adams: Vec<&str> = rows
        .iter()
        .filter(|r| r.get("lastName").and_then(|v| v.as_str()) == Some("adams"))
        .map(|r| r.get("userName").and_then(|v| v.as_str()).unwrap_or(""))
        .collect();
    assert_eq!(adams, vec!["s00", "s08", "s16", "s24"]);
}

#[test]
fn table_rejects_bad_page_size_and_unknown_filter() {
    let workspace = temp_dir("gradeformd-table-params");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let form_id = create_form(&mut stdin, &mut reader);

    let bad_size = request(
        &mut stdin,
        &mut reader,
        "2",
        "grades.table",
        json!({ "formId": form_id, "perPage": 7 }),
    );
    assert_eq!(bad_size.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        bad_size.pointer("/error/code").and_then(|v| v.as_str()),
        Some("bad_params")
    );

    let bad_filter = request(
        &mut stdin,
        &mut reader,
        "3",
        "grades.table",
        json!({ "formId": form_id, "filter": "released" }),
    );
    assert_eq!(
        bad_filter.pointer("/error/code").and_then(|v| v.as_str()),
        Some("unknown_filter")
    );

    let fallback_sort = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "grades.table",
        json!({ "formId": form_id, "sortBy": "first_name" }),
    );
    assert_eq!(
        fallback_sort.get("sortBy").and_then(|v| v.as_str()),
        Some("last_name")
    );
    assert_eq!(fallback_sort.get("totalPages").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(letters(&fallback_sort), vec!["?"]);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "settings.update",
        json!({ "patch": { "defaultPerPage": 30 } }),
    );
    let defaulted = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "grades.table",
        json!({ "formId": form_id }),
    );
    assert_eq!(defaulted.get("perPage").and_then(|v| v.as_u64()), Some(30));
}
