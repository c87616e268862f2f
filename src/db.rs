use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("gradeforms.sqlite3");
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            user_name TEXT NOT NULL UNIQUE,
            last_name TEXT NOT NULL,
            first_name TEXT NOT NULL,
            hidden INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_hidden_user ON students(hidden, user_name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_entry_forms(
            id TEXT PRIMARY KEY,
            short_identifier TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            message TEXT NOT NULL DEFAULT '',
            date TEXT,
            updated_at TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_entry_items(
            id TEXT PRIMARY KEY,
            form_id TEXT NOT NULL,
            name TEXT NOT NULL,
            out_of REAL NOT NULL DEFAULT 0,
            position INTEGER NOT NULL,
            FOREIGN KEY(form_id) REFERENCES grade_entry_forms(id),
            UNIQUE(form_id, name)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grade_entry_items_form ON grade_entry_items(form_id, position)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_entry_students(
            id TEXT PRIMARY KEY,
            form_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            released INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(form_id) REFERENCES grade_entry_forms(id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            UNIQUE(form_id, student_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grade_entry_students_form ON grade_entry_students(form_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id TEXT PRIMARY KEY,
            grade_entry_student_id TEXT NOT NULL,
            grade_entry_item_id TEXT NOT NULL,
            grade REAL,
            FOREIGN KEY(grade_entry_student_id) REFERENCES grade_entry_students(id),
            FOREIGN KEY(grade_entry_item_id) REFERENCES grade_entry_items(id),
            UNIQUE(grade_entry_student_id, grade_entry_item_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_student ON grades(grade_entry_student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS audit_log(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            logged_at TEXT NOT NULL,
            message TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

#[cfg(test)]
pub fn open_in_memory() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    init_schema(&conn).expect("init schema");
    conn
}
