use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::helpers::{bool_param, required_str, str_param};
use crate::ipc::types::{AppState, Request};
use crate::release::{self, ReleaseAction, Selection, StoreAuditLog};
use crate::store;
use serde_json::json;

fn read_selection(req: &Request) -> Result<Selection, serde_json::Value> {
    if bool_param(req, "fullSelect").unwrap_or(false) {
        return Ok(Selection::Full {
            filter: str_param(req, "filter").unwrap_or_default().to_string(),
        });
    }
    let student_ids = match req.params.get("students") {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::Array(arr)) => {
            let mut ids = Vec::with_capacity(arr.len());
            for v in arr {
                let Some(s) = v.as_str() else {
                    return Err(err(
                        &req.id,
                        "bad_params",
                        "students must be an array of ids",
                        None,
                    ));
                };
                ids.push(s.to_string());
            }
            ids
        }
        Some(_) => {
            return Err(err(
                &req.id,
                "bad_params",
                "students must be an array of ids",
                None,
            ))
        }
    };
    Ok(Selection::Explicit { student_ids })
}

fn handle_grades_release(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let form_id = match required_str(req, "formId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let action = match ReleaseAction::from_flags(
        bool_param(req, "release").unwrap_or(false),
        bool_param(req, "unrelease").unwrap_or(false),
    ) {
        Ok(a) => a,
        Err(e) => return domain_err(&req.id, &e),
    };
    let selection = match read_selection(req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let form = match store::require_form(conn, &form_id) {
        Ok(f) => f,
        Err(e) => return domain_err(&req.id, &e),
    };

    let audit = StoreAuditLog { conn };
    match release::set_release(conn, &audit, &form, &selection, action) {
        Ok(outcome) => {
            let message_key = if outcome.changed > 0 {
                Some("grade_entry_forms.grades.successfully_changed")
            } else {
                None
            };
            ok(
                &req.id,
                json!({
                    "changed": outcome.changed,
                    "errors": outcome.errors,
                    "messageKey": message_key,
                }),
            )
        }
        Err(e) => domain_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.release" => Some(handle_grades_release(state, req)),
        _ => None,
    }
}
