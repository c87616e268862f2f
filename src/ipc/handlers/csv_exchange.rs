use crate::config::GradesTableConfig;
use crate::csv_grades;
use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::helpers::{required_str, str_param};
use crate::ipc::types::{AppState, Request};
use crate::store;
use serde_json::json;
use std::path::PathBuf;

fn handle_csv_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let form_id = match required_str(req, "formId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let form = match store::require_form(conn, &form_id) {
        Ok(f) => f,
        Err(e) => return domain_err(&req.id, &e),
    };
    let bytes = match csv_grades::export(conn, &form) {
        Ok(b) => b,
        Err(e) => return domain_err(&req.id, &e),
    };
    let filename = csv_grades::report_filename(&form);
    let mut result = json!({
        "filename": filename,
        "mediaType": csv_grades::MEDIA_TYPE,
        "disposition": format!("attachment; filename=\"{filename}\""),
    });

    match str_param(req, "outPath").map(str::trim).filter(|p| !p.is_empty()) {
        Some(out_path) => {
            let out = PathBuf::from(out_path);
            if let Some(parent) = out.parent() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    return err(
                        &req.id,
                        "io_failed",
                        e.to_string(),
                        Some(json!({ "path": out_path })),
                    );
                }
            }
            if let Err(e) = std::fs::write(&out, &bytes) {
                return err(
                    &req.id,
                    "io_failed",
                    e.to_string(),
                    Some(json!({ "path": out_path })),
                );
            }
            result["path"] = json!(out_path);
        }
        None => {
            result["csvText"] = json!(String::from_utf8_lossy(&bytes));
        }
    }
    ok(&req.id, result)
}

fn read_upload(req: &Request, max_bytes: usize) -> Result<Vec<u8>, serde_json::Value> {
    let bytes = if let Some(text) = str_param(req, "csvText") {
        text.as_bytes().to_vec()
    } else {
        let in_path = match str_param(req, "inPath").map(str::trim) {
            Some(p) if !p.is_empty() => p,
            _ => {
                return Err(err(
                    &req.id,
                    "bad_params",
                    "missing inPath or csvText",
                    None,
                ))
            }
        };
        std::fs::read(in_path).map_err(|e| {
            err(
                &req.id,
                "io_failed",
                e.to_string(),
                Some(json!({ "path": in_path })),
            )
        })?
    };
    if bytes.is_empty() {
        return Err(err(&req.id, "bad_params", "grades file is empty", None));
    }
    if bytes.len() > max_bytes {
        return Err(err(
            &req.id,
            "bad_params",
            "grades file is too large",
            Some(json!({ "bytes": bytes.len(), "maxBytes": max_bytes })),
        ));
    }
    Ok(bytes)
}

fn handle_csv_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let form_id = match required_str(req, "formId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let form = match store::require_form(conn, &form_id) {
        Ok(f) => f,
        Err(e) => return domain_err(&req.id, &e),
    };
    let cfg = match GradesTableConfig::load(conn) {
        Ok(c) => c,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let bytes = match read_upload(req, cfg.max_csv_bytes) {
        Ok(b) => b,
        Err(e) => return e,
    };

    match csv_grades::import(conn, &form, &bytes) {
        Ok(outcome) => {
            let error_key = (!outcome.invalid_lines.is_empty()).then_some("csv_invalid_lines");
            let notice_key = (outcome.updated > 0).then_some("grade_entry_forms.csv.upload_success");
            ok(
                &req.id,
                json!({
                    "updated": outcome.updated,
                    "invalidLineCount": outcome.invalid_lines.len(),
                    "invalidLines": outcome.invalid_lines,
                    "errorKey": error_key,
                    "noticeKey": notice_key,
                }),
            )
        }
        Err(e) => domain_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.csvExport" => Some(handle_csv_export(state, req)),
        "grades.csvImport" => Some(handle_csv_import(state, req)),
        _ => None,
    }
}
