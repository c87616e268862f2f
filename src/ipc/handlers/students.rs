use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::helpers::{bool_param, required_str};
use crate::ipc::types::{AppState, Request};
use crate::store;
use serde_json::json;

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "students": [] }));
    };
    match store::list_students(conn) {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let user_name = match required_str(req, "userName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let last_name = match required_str(req, "lastName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let first_name = req
        .params
        .get("firstName")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    let hidden = bool_param(req, "hidden").unwrap_or(false);

    match store::find_student_by_user_name(conn, &user_name) {
        Ok(Some(_)) => {
            return err(
                &req.id,
                "bad_params",
                "userName already exists",
                Some(json!({ "userName": user_name })),
            )
        }
        Ok(None) => {}
        Err(e) => return domain_err(&req.id, &e),
    }

    match store::insert_student(conn, &user_name, &last_name, &first_name, hidden) {
        Ok(student_id) => {
            state.alpha_cache.clear();
            ok(&req.id, json!({ "studentId": student_id }))
        }
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing patch object", None);
    };

    let mut student = match store::find_student(conn, &student_id) {
        Ok(Some(s)) => s,
        Ok(None) => {
            return err(
                &req.id,
                "not_found",
                "student not found",
                Some(json!({ "studentId": student_id })),
            )
        }
        Err(e) => return domain_err(&req.id, &e),
    };

    for (field, target) in [
        ("userName", &mut student.user_name),
        ("lastName", &mut student.last_name),
        ("firstName", &mut student.first_name),
    ] {
        if let Some(v) = patch.get(field) {
            match v.as_str().map(str::trim) {
                Some(s) if !s.is_empty() || field == "firstName" => *target = s.to_string(),
                _ => {
                    return err(
                        &req.id,
                        "bad_params",
                        format!("{field} must be a non-empty string"),
                        None,
                    )
                }
            }
        }
    }
    if let Some(v) = patch.get("hidden") {
        let Some(hidden) = v.as_bool() else {
            return err(&req.id, "bad_params", "hidden must be a boolean", None);
        };
        student.hidden = hidden;
    }

    match store::update_student(conn, &student) {
        Ok(()) => {
            state.alpha_cache.clear();
            ok(&req.id, json!({ "ok": true }))
        }
        Err(e) => domain_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        _ => None,
    }
}
