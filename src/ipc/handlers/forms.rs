use crate::forms::{self, FormProperties};
use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use crate::store;
use serde_json::json;

fn parse_properties(
    req: &Request,
    value: Option<&serde_json::Value>,
) -> Result<FormProperties, serde_json::Value> {
    let Some(v) = value else {
        return Ok(FormProperties::default());
    };
    serde_json::from_value(v.clone())
        .map_err(|e| err(&req.id, "bad_params", e.to_string(), None))
}

fn handle_forms_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "forms": [] }));
    };
    match store::list_forms(conn) {
        Ok(forms) => ok(&req.id, json!({ "forms": forms })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_forms_get(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    match store::form_items(conn, &form_id) {
        Ok(items) => ok(&req.id, json!({ "form": form, "items": items })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_forms_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let props = match parse_properties(req, Some(&req.params)) {
        Ok(p) => p,
        Err(e) => return e,
    };
    match forms::create_form(conn, &props) {
        Ok(form_id) => ok(
            &req.id,
            json!({
                "formId": form_id,
                "messageKey": "grade_entry_forms.create.success"
            }),
        ),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_forms_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let form_id = match required_str(req, "formId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let props = match parse_properties(req, req.params.get("patch")) {
        Ok(p) => p,
        Err(e) => return e,
    };
    match forms::update_form(conn, &form_id, &props) {
        Ok(()) => ok(
            &req.id,
            json!({
                "formId": form_id,
                "messageKey": "grade_entry_forms.edit.success"
            }),
        ),
        Err(e) => domain_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "forms.list" => Some(handle_forms_list(state, req)),
        "forms.get" => Some(handle_forms_get(state, req)),
        "forms.create" => Some(handle_forms_create(state, req)),
        "forms.update" => Some(handle_forms_update(state, req)),
        _ => None,
    }
}
