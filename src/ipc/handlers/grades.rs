use crate::alpha::{self, AlphaIndexKey};
use crate::config::GradesTableConfig;
use crate::grades;
use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::helpers::{bool_param, required_str, str_param, usize_param};
use crate::ipc::types::{AppState, Request};
use crate::store;
use crate::table::{self, FilterKind, SortKind, DEFAULT_FILTER, DEFAULT_SORT, PER_PAGE_OPTIONS};
use serde_json::json;

fn handle_grades_table(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    let filter_name = str_param(req, "filter")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_FILTER);
    let filter = match FilterKind::from_name(filter_name) {
        Ok(f) => f,
        Err(e) => return domain_err(&req.id, &e),
    };
    let sort = SortKind::from_name(
        str_param(req, "sortBy")
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SORT),
    );
    let desc = bool_param(req, "desc").unwrap_or(false);
    let page_no = usize_param(req, "page").unwrap_or(1).max(1);
    let per_page = usize_param(req, "perPage").unwrap_or(cfg.default_per_page);
    if !PER_PAGE_OPTIONS.contains(&per_page) {
        return err(
            &req.id,
            "bad_params",
            "perPage must be one of the allowed page sizes",
            Some(json!({ "perPage": per_page, "perPages": PER_PAGE_OPTIONS })),
        );
    }
    let update_alpha = bool_param(req, "updateAlphaIndex").unwrap_or(false);

    let rows = match table::query(conn, filter, sort, desc, &form) {
        Ok(r) => r,
        Err(e) => return domain_err(&req.id, &e),
    };
    let page = table::paginate(&rows, per_page, page_no);

    let key = AlphaIndexKey {
        filter: filter.name().to_string(),
        sort: sort.name().to_string(),
        desc,
        per_page,
    };
    let rebuilt = state.alpha_cache.needs_rebuild(&form.id, &key, update_alpha);
    if rebuilt {
        let index = alpha::build_index(&rows, per_page, page.total_pages, sort);
        tracing::debug!(form_id = %form.id, pages = index.len(), "alpha index rebuilt");
        state.alpha_cache.store(&form.id, key, index);
    }
    let alpha_index = state.alpha_cache.get(&form.id).unwrap_or_default();
    let default_category = alpha_index.first().map(|b| b.letter.clone());
    let alpha_category = if rebuilt {
        default_category
    } else {
        str_param(req, "alphaCategory")
            .map(str::to_string)
            .or(default_category)
    };

    let items = match store::form_items(conn, &form.id) {
        Ok(v) => v,
        Err(e) => return domain_err(&req.id, &e),
    };
    let matrix = match store::grade_matrix(conn, &form.id) {
        Ok(m) => m,
        Err(e) => return domain_err(&req.id, &e),
    };
    let students: Vec<serde_json::Value> = page
        .rows
        .iter()
        .map(|r| {
            let cells: Vec<Option<f64>> = items
                .iter()
                .map(|i| matrix.get(&(r.student_id.clone(), i.id.clone())).copied())
                .collect();
            let total: f64 = cells.iter().flatten().sum();
            json!({
                "studentId": r.student_id,
                "userName": r.user_name,
                "lastName": r.last_name,
                "firstName": r.first_name,
                "released": r.released,
                "grades": cells,
                "total": total,
            })
        })
        .collect();

    ok(
        &req.id,
        json!({
            "formId": form.id,
            "shortIdentifier": form.short_identifier,
            "filters": table::filter_options(),
            "perPages": PER_PAGE_OPTIONS,
            "filter": filter.name(),
            "sortBy": sort.name(),
            "desc": desc,
            "page": page.page,
            "perPage": per_page,
            "totalCount": page.total_count,
            "totalPages": page.total_pages,
            "items": items,
            "students": students,
            "alphaIndex": alpha_index,
            "alphaCategory": alpha_category,
            "alphaIndexRebuilt": rebuilt,
        }),
    )
}

fn handle_grades_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let form_id = match required_str(req, "formId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let item_id = match required_str(req, "itemId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let raw = match req.params.get("value") {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(other) => {
            return err(
                &req.id,
                "bad_params",
                "value must be a number, string or null",
                Some(json!({ "value": other })),
            )
        }
    };

    match grades::set_grade(conn, &form_id, &student_id, &item_id, &raw) {
        Ok(update) => {
            let mut result = json!({ "saved": update.saved, "total": update.total });
            if !update.saved {
                result["errorCode"] = json!("grade_save_failed");
            }
            ok(&req.id, result)
        }
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_grades_student_view(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let form_id = match required_str(req, "formId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match grades::student_view(conn, &form_id, &student_id) {
        Ok(view) => ok(&req.id, json!(view)),
        Err(e) => domain_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.table" => Some(handle_grades_table(state, req)),
        "grades.update" => Some(handle_grades_update(state, req)),
        "grades.studentView" => Some(handle_grades_student_view(state, req)),
        _ => None,
    }
}
