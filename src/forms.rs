//! Creating and editing grade entry forms and their items.
//!
//! Each call runs in its own transaction; a validation or store failure part
//! way through leaves no partial form behind.

use crate::error::{GradeFormError, Result};
use crate::store;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use serde::Deserialize;
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormProperties {
    pub short_identifier: Option<String>,
    pub description: Option<String>,
    pub message: Option<String>,
    pub date: Option<String>,
    pub items: Option<Vec<ItemProperties>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemProperties {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub out_of: f64,
}

fn normalize_date(date: Option<&str>) -> Result<Option<String>> {
    let Some(raw) = date.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| Some(d.format("%Y-%m-%d").to_string()))
        .map_err(|_| GradeFormError::BadParams(format!("date must be YYYY-MM-DD: {raw}")))
}

fn check_short_identifier(conn: &Connection, short_identifier: &str, form_id: &str) -> Result<()> {
    if short_identifier.is_empty() {
        return Err(GradeFormError::BadParams(
            "shortIdentifier must not be empty".to_string(),
        ));
    }
    let taken: Option<String> = conn
        .query_row(
            "SELECT id FROM grade_entry_forms WHERE short_identifier = ? AND id <> ?",
            (short_identifier, form_id),
            |r| r.get(0),
        )
        .optional()?;
    if taken.is_some() {
        return Err(GradeFormError::BadParams(format!(
            "shortIdentifier already in use: {short_identifier}"
        )));
    }
    Ok(())
}

fn write_items(conn: &Connection, form_id: &str, items: &[ItemProperties]) -> Result<()> {
    let mut names = HashSet::new();
    for item in items {
        let name = item.name.trim();
        if name.is_empty() {
            return Err(GradeFormError::BadParams(
                "item name must not be empty".to_string(),
            ));
        }
        if !names.insert(name) {
            return Err(GradeFormError::BadParams(format!(
                "duplicate item name: {name}"
            )));
        }
        if !item.out_of.is_finite() || item.out_of < 0.0 {
            return Err(GradeFormError::BadParams(format!(
                "outOf must be >= 0 for item {name}"
            )));
        }
    }

    let mut next_position: i64 = conn.query_row(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM grade_entry_items WHERE form_id = ?",
        [form_id],
        |r| r.get(0),
    )?;

    for item in items {
        let name = item.name.trim();
        match &item.id {
            Some(id) => {
                if store::find_item(conn, form_id, id)?.is_none() {
                    return Err(GradeFormError::not_found("grade entry item", id));
                }
                conn.execute(
                    "UPDATE grade_entry_items SET name = ?, out_of = ? WHERE id = ? AND form_id = ?",
                    (name, item.out_of, id, form_id),
                )?;
            }
            None => {
                conn.execute(
                    "INSERT INTO grade_entry_items(id, form_id, name, out_of, position)
                     VALUES(?, ?, ?, ?, ?)",
                    (
                        Uuid::new_v4().to_string(),
                        form_id,
                        name,
                        item.out_of,
                        next_position,
                    ),
                )?;
                next_position += 1;
            }
        }
    }
    Ok(())
}

fn insert_form(conn: &Connection, props: &FormProperties) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    let short_identifier = props
        .short_identifier
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();
    check_short_identifier(conn, short_identifier, &id)?;
    let date = normalize_date(props.date.as_deref())?;

    conn.execute(
        "INSERT INTO grade_entry_forms(id, short_identifier, description, message, date, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &id,
            short_identifier,
            props.description.as_deref().unwrap_or_default(),
            props.message.as_deref().unwrap_or_default(),
            date,
            chrono::Utc::now().to_rfc3339(),
        ),
    )?;
    if let Some(items) = &props.items {
        write_items(conn, &id, items)?;
    }
    Ok(id)
}

fn patch_form(conn: &Connection, form_id: &str, props: &FormProperties) -> Result<()> {
    let mut form = store::require_form(conn, form_id)?;
    if let Some(s) = &props.short_identifier {
        let s = s.trim();
        check_short_identifier(conn, s, form_id)?;
        form.short_identifier = s.to_string();
    }
    if let Some(d) = &props.description {
        form.description = d.clone();
    }
    if let Some(m) = &props.message {
        form.message = m.clone();
    }
    if props.date.is_some() {
        form.date = normalize_date(props.date.as_deref())?;
    }

    conn.execute(
        "UPDATE grade_entry_forms
         SET short_identifier = ?, description = ?, message = ?, date = ?, updated_at = ?
         WHERE id = ?",
        (
            &form.short_identifier,
            &form.description,
            &form.message,
            &form.date,
            chrono::Utc::now().to_rfc3339(),
            form_id,
        ),
    )?;
    if let Some(items) = &props.items {
        write_items(conn, form_id, items)?;
    }
    Ok(())
}

fn in_transaction<T>(conn: &Connection, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
    let tx = conn.unchecked_transaction()?;
    match f(&tx) {
        Ok(v) => {
            tx.commit()?;
            Ok(v)
        }
        Err(e) => {
            let _ = tx.rollback();
            Err(e)
        }
    }
}

pub fn create_form(conn: &Connection, props: &FormProperties) -> Result<String> {
    let id = in_transaction(conn, |tx| insert_form(tx, props))?;
    tracing::info!(form_id = %id, "grade entry form created");
    Ok(id)
}

pub fn update_form(conn: &Connection, form_id: &str, props: &FormProperties) -> Result<()> {
    in_transaction(conn, |tx| patch_form(tx, form_id, props))?;
    tracing::info!(form_id, "grade entry form updated");
    Ok(())
}
