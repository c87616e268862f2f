use crate::error::{GradeFormError, Result};
use crate::store;
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeUpdate {
    pub saved: bool,
    pub total: f64,
}

/// Parses a raw cell value. Blank clears the grade; otherwise a finite,
/// non-negative number is required.
pub fn parse_grade(raw: &str) -> std::result::Result<Option<f64>, GradeFormError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let v: f64 = raw
        .parse()
        .map_err(|_| GradeFormError::GradeSaveFailed(format!("not a number: {raw}")))?;
    if !v.is_finite() {
        return Err(GradeFormError::GradeSaveFailed(format!("not a number: {raw}")));
    }
    if v < 0.0 {
        return Err(GradeFormError::GradeSaveFailed(
            "grade must be greater than or equal to 0".to_string(),
        ));
    }
    Ok(Some(v))
}

/// Writes one grade cell and returns the student's recomputed total.
///
/// A value that fails validation is reported as `saved: false`; the stored
/// grade keeps its previous value.
pub fn set_grade(
    conn: &Connection,
    form_id: &str,
    student_id: &str,
    item_id: &str,
    raw: &str,
) -> Result<GradeUpdate> {
    store::require_form(conn, form_id)?;
    if store::find_student(conn, student_id)?.is_none() {
        return Err(GradeFormError::not_found("student", student_id));
    }
    if store::find_item(conn, form_id, item_id)?.is_none() {
        return Err(GradeFormError::not_found("grade entry item", item_id));
    }

    let ges = store::upsert_grade_entry_student(conn, form_id, student_id)?;
    let grade = store::upsert_grade(conn, &ges.id, item_id)?;

    let saved = match parse_grade(raw) {
        Ok(value) => {
            store::set_grade_value(conn, &grade.id, value)?;
            true
        }
        Err(e) => {
            tracing::warn!(form_id, student_id, item_id, error = %e, "grade not saved");
            false
        }
    };

    let total = store::total_mark(conn, form_id, student_id)?;
    Ok(GradeUpdate { saved, total })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentGrade {
    pub item_id: String,
    pub name: String,
    pub out_of: f64,
    pub grade: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentView {
    pub released: bool,
    pub grades: Vec<StudentGrade>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
}

/// What a student may see of a form: nothing until their marks are released.
pub fn student_view(conn: &Connection, form_id: &str, student_id: &str) -> Result<StudentView> {
    store::require_form(conn, form_id)?;
    if store::find_student(conn, student_id)?.is_none() {
        return Err(GradeFormError::not_found("student", student_id));
    }
    let released = store::released_by_student(conn, form_id)?
        .get(student_id)
        .copied()
        .unwrap_or(false);
    if !released {
        return Ok(StudentView {
            released: false,
            grades: Vec::new(),
            total: None,
        });
    }

    let matrix = store::grade_matrix(conn, form_id)?;
    let grades = store::form_items(conn, form_id)?
        .into_iter()
        .map(|item| StudentGrade {
            grade: matrix
                .get(&(student_id.to_string(), item.id.clone()))
                .copied(),
            item_id: item.id,
            name: item.name,
            out_of: item.out_of,
        })
        .collect();
    Ok(StudentView {
        released: true,
        grades,
        total: Some(store::total_mark(conn, form_id, student_id)?),
    })
}
