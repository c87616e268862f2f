//! Batch release/unrelease of marks to students.
//!
//! Not transactional: each student's flag is written independently and a
//! failure on one student does not undo the others.

use crate::error::{GradeFormError, Result};
use crate::model::GradeEntryForm;
use crate::store;
use crate::table::FilterKind;
use rusqlite::Connection;
use serde::Serialize;

/// Sink for audit lines.
pub trait AuditLog {
    fn log(&self, message: &str);
}

/// Writes audit lines to the workspace `audit_log` table and to tracing.
pub struct StoreAuditLog<'a> {
    pub conn: &'a Connection,
}

impl AuditLog for StoreAuditLog<'_> {
    fn log(&self, message: &str) {
        tracing::info!(target: "audit", "{message}");
        if let Err(e) = store::insert_audit(self.conn, message) {
            tracing::error!(error = %e, "failed to persist audit line");
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Full { filter: String },
    Explicit { student_ids: Vec<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseAction {
    Release,
    Unrelease,
}

impl ReleaseAction {
    /// Exactly one of the two flags must be set.
    pub fn from_flags(release: bool, unrelease: bool) -> Result<Self> {
        match (release, unrelease) {
            (true, false) => Ok(ReleaseAction::Release),
            (false, true) => Ok(ReleaseAction::Unrelease),
            _ => Err(GradeFormError::NoActionSpecified),
        }
    }

    pub fn released(self) -> bool {
        matches!(self, ReleaseAction::Release)
    }

    fn verb(self) -> &'static str {
        match self {
            ReleaseAction::Release => "released",
            ReleaseAction::Unrelease => "unreleased",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
}

impl ReleaseError {
    fn from_error(e: &GradeFormError, student_id: Option<&str>) -> Self {
        ReleaseError {
            code: e.code().to_string(),
            message: e.to_string(),
            student_id: student_id.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseOutcome {
    pub changed: usize,
    pub errors: Vec<ReleaseError>,
}

pub fn audit_line(form: &GradeEntryForm, action: ReleaseAction, changed: usize) -> String {
    format!(
        "Marks {} for marks spreadsheet '{}', ID: '{}' (for {} students).",
        action.verb(),
        form.short_identifier,
        form.id,
        changed
    )
}

fn resolve_targets(
    conn: &Connection,
    form: &GradeEntryForm,
    selection: &Selection,
    errors: &mut Vec<ReleaseError>,
) -> Result<Vec<String>> {
    match selection {
        Selection::Full { filter } => {
            if filter.trim().is_empty() {
                errors.push(ReleaseError::from_error(&GradeFormError::MissingFilter, None));
                return Ok(Vec::new());
            }
            let kind = FilterKind::from_name(filter.trim())?;
            Ok(kind
                .apply(conn, form)?
                .into_iter()
                .map(|s| s.id)
                .collect())
        }
        Selection::Explicit { student_ids } => {
            if student_ids.is_empty() {
                errors.push(ReleaseError::from_error(
                    &GradeFormError::NoStudentSelected,
                    None,
                ));
            }
            Ok(student_ids.clone())
        }
    }
}

/// Sets the release flag on every selected student of `form`.
///
/// `changed` counts only records whose flag actually flipped. An unknown
/// filter aborts before any write; per-student failures are collected.
pub fn set_release(
    conn: &Connection,
    audit: &dyn AuditLog,
    form: &GradeEntryForm,
    selection: &Selection,
    action: ReleaseAction,
) -> Result<ReleaseOutcome> {
    let mut outcome = ReleaseOutcome::default();
    let targets = resolve_targets(conn, form, selection, &mut outcome.errors)?;
    let released = action.released();

    for student_id in &targets {
        let result = store::find_student(conn, student_id).and_then(|found| {
            if found.is_none() {
                return Err(GradeFormError::not_found("student", student_id.as_str()));
            }
            let ges = store::upsert_grade_entry_student(conn, &form.id, student_id)?;
            if ges.released == released {
                return Ok(false);
            }
            store::set_released(conn, &ges.id, released)?;
            Ok(true)
        });
        match result {
            Ok(true) => outcome.changed += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(form_id = %form.id, student_id = %student_id, error = %e, "release update failed");
                outcome
                    .errors
                    .push(ReleaseError::from_error(&e, Some(student_id.as_str())));
            }
        }
    }

    if outcome.changed > 0 {
        audit.log(&audit_line(form, action, outcome.changed));
    }
    tracing::info!(
        form_id = %form.id,
        targets = targets.len(),
        changed = outcome.changed,
        errors = outcome.errors.len(),
        "release batch finished"
    );
    Ok(outcome)
}
