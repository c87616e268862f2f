//! Roster and form store access.
//!
//! `GradeEntryStudent` and `Grade` rows are only ever created through the
//! `upsert_*` functions here, which insert-if-absent on the composite key and
//! then read the row back.

use crate::error::{GradeFormError, Result};
use crate::model::{Grade, GradeEntryForm, GradeEntryItem, GradeEntryStudent, Student};
use rusqlite::{Connection, OptionalExtension, Row};
use std::collections::HashMap;
use uuid::Uuid;

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        user_name: r.get(1)?,
        last_name: r.get(2)?,
        first_name: r.get(3)?,
        hidden: r.get::<_, i64>(4)? != 0,
    })
}

fn form_from_row(r: &Row<'_>) -> rusqlite::Result<GradeEntryForm> {
    Ok(GradeEntryForm {
        id: r.get(0)?,
        short_identifier: r.get(1)?,
        description: r.get(2)?,
        message: r.get(3)?,
        date: r.get(4)?,
    })
}

fn item_from_row(r: &Row<'_>) -> rusqlite::Result<GradeEntryItem> {
    Ok(GradeEntryItem {
        id: r.get(0)?,
        name: r.get(1)?,
        out_of: r.get(2)?,
        position: r.get(3)?,
    })
}

// ---- roster ----

pub fn insert_student(
    conn: &Connection,
    user_name: &str,
    last_name: &str,
    first_name: &str,
    hidden: bool,
) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, user_name, last_name, first_name, hidden, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &id,
            user_name,
            last_name,
            first_name,
            hidden as i64,
            chrono::Utc::now().to_rfc3339(),
        ),
    )?;
    Ok(id)
}

pub fn update_student(conn: &Connection, student: &Student) -> Result<()> {
    let n = conn.execute(
        "UPDATE students
         SET user_name = ?, last_name = ?, first_name = ?, hidden = ?, updated_at = ?
         WHERE id = ?",
        (
            &student.user_name,
            &student.last_name,
            &student.first_name,
            student.hidden as i64,
            chrono::Utc::now().to_rfc3339(),
            &student.id,
        ),
    )?;
    if n == 0 {
        return Err(GradeFormError::not_found("student", &student.id));
    }
    Ok(())
}

pub fn list_students(conn: &Connection) -> Result<Vec<Student>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_name, last_name, first_name, hidden
         FROM students
         ORDER BY user_name, id",
    )?;
    let rows = stmt
        .query_map([], student_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Non-hidden students ordered by user name, then id.
pub fn list_visible_students(conn: &Connection) -> Result<Vec<Student>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_name, last_name, first_name, hidden
         FROM students
         WHERE hidden = 0
         ORDER BY user_name, id",
    )?;
    let rows = stmt
        .query_map([], student_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn find_student(conn: &Connection, student_id: &str) -> Result<Option<Student>> {
    Ok(conn
        .query_row(
            "SELECT id, user_name, last_name, first_name, hidden FROM students WHERE id = ?",
            [student_id],
            student_from_row,
        )
        .optional()?)
}

pub fn find_student_by_user_name(conn: &Connection, user_name: &str) -> Result<Option<Student>> {
    Ok(conn
        .query_row(
            "SELECT id, user_name, last_name, first_name, hidden FROM students WHERE user_name = ?",
            [user_name],
            student_from_row,
        )
        .optional()?)
}

// ---- forms ----

pub fn list_forms(conn: &Connection) -> Result<Vec<GradeEntryForm>> {
    let mut stmt = conn.prepare(
        "SELECT id, short_identifier, description, message, date
         FROM grade_entry_forms
         ORDER BY short_identifier",
    )?;
    let rows = stmt
        .query_map([], form_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn find_form(conn: &Connection, form_id: &str) -> Result<Option<GradeEntryForm>> {
    Ok(conn
        .query_row(
            "SELECT id, short_identifier, description, message, date
             FROM grade_entry_forms WHERE id = ?",
            [form_id],
            form_from_row,
        )
        .optional()?)
}

pub fn require_form(conn: &Connection, form_id: &str) -> Result<GradeEntryForm> {
    find_form(conn, form_id)?.ok_or_else(|| GradeFormError::not_found("grade entry form", form_id))
}

/// Items in creation order.
pub fn form_items(conn: &Connection, form_id: &str) -> Result<Vec<GradeEntryItem>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, out_of, position
         FROM grade_entry_items
         WHERE form_id = ?
         ORDER BY position, id",
    )?;
    let rows = stmt
        .query_map([form_id], item_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn find_item(conn: &Connection, form_id: &str, item_id: &str) -> Result<Option<GradeEntryItem>> {
    Ok(conn
        .query_row(
            "SELECT id, name, out_of, position
             FROM grade_entry_items WHERE form_id = ? AND id = ?",
            (form_id, item_id),
            item_from_row,
        )
        .optional()?)
}

// ---- per-student records ----

pub fn upsert_grade_entry_student(
    conn: &Connection,
    form_id: &str,
    student_id: &str,
) -> Result<GradeEntryStudent> {
    conn.execute(
        "INSERT INTO grade_entry_students(id, form_id, student_id, released)
         VALUES(?, ?, ?, 0)
         ON CONFLICT(form_id, student_id) DO NOTHING",
        (Uuid::new_v4().to_string(), form_id, student_id),
    )?;
    let ges = conn.query_row(
        "SELECT id, form_id, student_id, released
         FROM grade_entry_students WHERE form_id = ? AND student_id = ?",
        (form_id, student_id),
        |r| {
            Ok(GradeEntryStudent {
                id: r.get(0)?,
                form_id: r.get(1)?,
                student_id: r.get(2)?,
                released: r.get::<_, i64>(3)? != 0,
            })
        },
    )?;
    Ok(ges)
}

pub fn set_released(conn: &Connection, grade_entry_student_id: &str, released: bool) -> Result<()> {
    conn.execute(
        "UPDATE grade_entry_students SET released = ? WHERE id = ?",
        (released as i64, grade_entry_student_id),
    )?;
    Ok(())
}

/// Release flags of every student that has a record for the form.
pub fn released_by_student(conn: &Connection, form_id: &str) -> Result<HashMap<String, bool>> {
    let mut stmt =
        conn.prepare("SELECT student_id, released FROM grade_entry_students WHERE form_id = ?")?;
    let rows = stmt
        .query_map([form_id], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)? != 0))
        })?
        .collect::<rusqlite::Result<HashMap<_, _>>>()?;
    Ok(rows)
}

pub fn upsert_grade(conn: &Connection, grade_entry_student_id: &str, item_id: &str) -> Result<Grade> {
    conn.execute(
        "INSERT INTO grades(id, grade_entry_student_id, grade_entry_item_id, grade)
         VALUES(?, ?, ?, NULL)
         ON CONFLICT(grade_entry_student_id, grade_entry_item_id) DO NOTHING",
        (Uuid::new_v4().to_string(), grade_entry_student_id, item_id),
    )?;
    let grade = conn.query_row(
        "SELECT id, grade_entry_student_id, grade_entry_item_id, grade
         FROM grades WHERE grade_entry_student_id = ? AND grade_entry_item_id = ?",
        (grade_entry_student_id, item_id),
        |r| {
            Ok(Grade {
                id: r.get(0)?,
                grade_entry_student_id: r.get(1)?,
                grade_entry_item_id: r.get(2)?,
                grade: r.get(3)?,
            })
        },
    )?;
    Ok(grade)
}

pub fn set_grade_value(conn: &Connection, grade_id: &str, value: Option<f64>) -> Result<()> {
    conn.execute("UPDATE grades SET grade = ? WHERE id = ?", (value, grade_id))?;
    Ok(())
}

/// Sum of the student's entered grades in the form; missing grades add 0.
pub fn total_mark(conn: &Connection, form_id: &str, student_id: &str) -> Result<f64> {
    let total: Option<f64> = conn.query_row(
        "SELECT SUM(g.grade)
         FROM grades g
         JOIN grade_entry_students ges ON ges.id = g.grade_entry_student_id
         WHERE ges.form_id = ? AND ges.student_id = ?",
        (form_id, student_id),
        |r| r.get(0),
    )?;
    Ok(total.unwrap_or(0.0))
}

/// Every entered grade in the form keyed by `(student_id, item_id)`.
pub fn grade_matrix(conn: &Connection, form_id: &str) -> Result<HashMap<(String, String), f64>> {
    let mut stmt = conn.prepare(
        "SELECT ges.student_id, g.grade_entry_item_id, g.grade
         FROM grades g
         JOIN grade_entry_students ges ON ges.id = g.grade_entry_student_id
         WHERE ges.form_id = ? AND g.grade IS NOT NULL",
    )?;
    let rows = stmt
        .query_map([form_id], |r| {
            Ok((
                (r.get::<_, String>(0)?, r.get::<_, String>(1)?),
                r.get::<_, f64>(2)?,
            ))
        })?
        .collect::<rusqlite::Result<HashMap<_, _>>>()?;
    Ok(rows)
}

// ---- audit ----

pub fn insert_audit(conn: &Connection, message: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO audit_log(logged_at, message) VALUES(?, ?)",
        (chrono::Utc::now().to_rfc3339(), message),
    )?;
    Ok(())
}

pub fn recent_audit(conn: &Connection, limit: i64) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT message FROM audit_log ORDER BY id DESC LIMIT ?")?;
    let rows = stmt
        .query_map([limit], |r| r.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
