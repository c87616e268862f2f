//! CSV grade sheet import and export.
//!
//! Sheet layout:
//!
//! ```text
//! user_name,last_name,<item name>,<item name>,...
//! c5anna,Anderson,7.5,,10
//! ```
//!
//! Item columns follow item creation order on export. On import they may come
//! in any order but must each name an item of the form exactly once. The
//! `last_name` column is informational and ignored on import. A blank grade
//! cell leaves the stored grade untouched.

use crate::error::{GradeFormError, Result};
use crate::grades::parse_grade;
use crate::model::{GradeEntryForm, GradeEntryItem};
use crate::store;
use crate::table::{self, FilterKind, SortKind};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

pub const MEDIA_TYPE: &str = "application/vnd.ms-excel";
const USER_NAME_HEADER: &str = "user_name";
const LAST_NAME_HEADER: &str = "last_name";

pub fn report_filename(form: &GradeEntryForm) -> String {
    format!("{}_grades_report.csv", form.short_identifier)
}

fn format_grade(v: f64) -> String {
    format!("{v}")
}

/// Serializes every visible student's grades, ordered by last name.
pub fn export(conn: &Connection, form: &GradeEntryForm) -> Result<Vec<u8>> {
    let items = store::form_items(conn, &form.id)?;
    let rows = table::query(conn, FilterKind::None, SortKind::LastName, false, form)?;
    let matrix = store::grade_matrix(conn, &form.id)?;

    let mut wtr = csv::Writer::from_writer(Vec::new());
    let mut header = vec![USER_NAME_HEADER.to_string(), LAST_NAME_HEADER.to_string()];
    header.extend(items.iter().map(|i| i.name.clone()));
    wtr.write_record(&header)?;

    for row in &rows {
        let mut record = vec![row.user_name.clone(), row.last_name.clone()];
        for item in &items {
            let cell = matrix
                .get(&(row.student_id.clone(), item.id.clone()))
                .map(|v| format_grade(*v))
                .unwrap_or_default();
            record.push(cell);
        }
        wtr.write_record(&record)?;
    }

    wtr.into_inner()
        .map_err(|e| GradeFormError::PersistenceFailure(format!("csv: {}", e.error())))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidLine {
    pub line: u64,
    pub content: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub updated: usize,
    pub invalid_lines: Vec<InvalidLine>,
}

struct SheetRow {
    line: u64,
    content: String,
    fields: Vec<String>,
}

fn read_sheet(bytes: &[u8]) -> Result<Vec<SheetRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut raw = Vec::new();
    for result in rdr.byte_records() {
        let record = result?;
        let (start, line) = record
            .position()
            .map(|p| (p.byte() as usize, p.line()))
            .unwrap_or((0, 0));
        raw.push((start, line, record));
    }

    let mut rows = Vec::with_capacity(raw.len());
    for (i, (start, line, record)) in raw.iter().enumerate() {
        if is_blank_record(record) {
            continue;
        }
        let end = raw
            .get(i + 1)
            .map(|(next, _, _)| *next)
            .unwrap_or(bytes.len())
            .min(bytes.len());
        let content = String::from_utf8_lossy(&bytes[(*start).min(end)..end])
            .trim_end_matches(['\r', '\n'])
            .to_string();
        let fields = record
            .iter()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .collect();
        rows.push(SheetRow {
            line: *line,
            content,
            fields,
        });
    }
    Ok(rows)
}

fn is_blank_record(record: &csv::ByteRecord) -> bool {
    record.len() == 1 && record.get(0).is_some_and(|f| f.iter().all(u8::is_ascii_whitespace))
}

/// Maps each grade column (index into the row) to an item id.
fn resolve_header(header: &[String], form_items: &[GradeEntryItem]) -> Result<Vec<(usize, String)>> {
    let first = header
        .first()
        .map(|s| s.trim_start_matches('\u{feff}').trim().to_ascii_lowercase())
        .unwrap_or_default();
    if first != USER_NAME_HEADER || header.len() < 2 {
        return Err(GradeFormError::CsvHeaderInvalid(format!(
            "header must start with {USER_NAME_HEADER},{LAST_NAME_HEADER}"
        )));
    }

    let by_name: HashMap<&str, &str> = form_items
        .iter()
        .map(|i| (i.name.as_str(), i.id.as_str()))
        .collect();
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for (idx, name) in header.iter().enumerate().skip(2) {
        let name = name.trim();
        let Some(item_id) = by_name.get(name) else {
            return Err(GradeFormError::CsvHeaderInvalid(format!(
                "unknown grade entry item: {name}"
            )));
        };
        if !seen.insert(name) {
            return Err(GradeFormError::CsvHeaderInvalid(format!(
                "duplicate column: {name}"
            )));
        }
        columns.push((idx, item_id.to_string()));
    }
    Ok(columns)
}

/// Outer error: store failure. Inner error: the reason the line is invalid.
fn validate_row(
    conn: &Connection,
    row: &SheetRow,
    width: usize,
    columns: &[(usize, String)],
    header: &[String],
) -> Result<std::result::Result<(String, Vec<(String, f64)>), String>> {
    if row.fields.len() != width {
        return Ok(Err(format!(
            "expected {} fields, found {}",
            width,
            row.fields.len()
        )));
    }
    let user_name = row.fields[0].trim();
    let Some(student) = store::find_student_by_user_name(conn, user_name)? else {
        return Ok(Err(format!("unknown user_name: {user_name}")));
    };

    let mut values = Vec::new();
    for (idx, item_id) in columns {
        match parse_grade(&row.fields[*idx]) {
            Ok(Some(v)) => values.push((item_id.clone(), v)),
            Ok(None) => {}
            Err(e) => return Ok(Err(format!("column '{}': {}", header[*idx].trim(), e))),
        }
    }
    Ok(Ok((student.id, values)))
}

fn apply_rows(
    conn: &Connection,
    form: &GradeEntryForm,
    header: &[String],
    columns: &[(usize, String)],
    rows: &[SheetRow],
) -> Result<ImportOutcome> {
    let mut outcome = ImportOutcome::default();
    for row in rows {
        let (student_id, values) = match validate_row(conn, row, header.len(), columns, header)? {
            Ok(v) => v,
            Err(reason) => {
                let e = GradeFormError::CsvRowInvalid {
                    line: row.line,
                    reason: reason.clone(),
                };
                tracing::warn!(code = e.code(), error = %e, "invalid csv line");
                outcome.invalid_lines.push(InvalidLine {
                    line: row.line,
                    content: row.content.clone(),
                    reason,
                });
                continue;
            }
        };
        if values.is_empty() {
            continue;
        }
        let ges = store::upsert_grade_entry_student(conn, &form.id, &student_id)?;
        for (item_id, value) in values {
            let grade = store::upsert_grade(conn, &ges.id, &item_id)?;
            store::set_grade_value(conn, &grade.id, Some(value))?;
            outcome.updated += 1;
        }
    }
    Ok(outcome)
}

/// Imports a grade sheet into `form` inside one transaction.
///
/// Invalid lines are skipped and reported; a bad header or a store failure
/// rolls the whole import back.
pub fn import(conn: &Connection, form: &GradeEntryForm, bytes: &[u8]) -> Result<ImportOutcome> {
    let sheet = read_sheet(bytes)?;
    let Some((header_row, rows)) = sheet.split_first() else {
        return Err(GradeFormError::CsvHeaderInvalid("empty file".to_string()));
    };
    let items = store::form_items(conn, &form.id)?;
    let columns = resolve_header(&header_row.fields, &items)?;

    let tx = conn.unchecked_transaction()?;
    let outcome = match apply_rows(&tx, form, &header_row.fields, &columns, rows) {
        Ok(o) => o,
        Err(e) => {
            let _ = tx.rollback();
            tracing::error!(form_id = %form.id, error = %e, "csv import rolled back");
            return Err(e);
        }
    };
    tx.commit()?;

    tracing::info!(
        form_id = %form.id,
        updated = outcome.updated,
        invalid = outcome.invalid_lines.len(),
        "csv import committed"
    );
    Ok(outcome)
}
