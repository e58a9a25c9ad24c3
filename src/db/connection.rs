use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

/// Open (creating if needed) the database file and bring its schema up to
/// date.
pub fn open_store(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).context("failed to create data directory")?;
    }

    let conn = Connection::open(db_path).context("failed to open SQLite database")?;
    ensure_schema(&conn)?;
    info!(path = %db_path.display(), "database ready");
    Ok(conn)
}

/// Fresh database living only in memory.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    ensure_schema(&conn)?;
    Ok(conn)
}

/// Create the four tables if absent. Tables carry no foreign keys; the record
/// layer keeps children consistent by deleting them with their student.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT UNIQUE,
            last_name TEXT,
            first_name TEXT,
            classe TEXT,
            cycle TEXT,
            year TEXT,
            photo TEXT,
            notes TEXT,
            phone TEXT
        )",
        [],
    )
    .context("failed to create students table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS lessons (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER,
            date TEXT,
            topic TEXT,
            duration INTEGER,
            note TEXT,
            grade_value REAL,
            grade_comment TEXT
        )",
        [],
    )
    .context("failed to create lessons table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS payments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER,
            date TEXT,
            amount REAL,
            method TEXT,
            note TEXT
        )",
        [],
    )
    .context("failed to create payments table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER,
            date TEXT,
            sender TEXT,
            content TEXT,
            read_flag INTEGER DEFAULT 0
        )",
        [],
    )
    .context("failed to create messages table")?;

    upgrade_lessons(conn)
}

/// Databases written before grades got their own columns only have the
/// composite note. Add the columns in place; old rows keep NULLs and are
/// averaged through the note parser.
fn upgrade_lessons(conn: &Connection) -> Result<()> {
    let columns = table_columns(conn, "lessons")?;
    for (column, ddl) in [
        ("grade_value", "ALTER TABLE lessons ADD COLUMN grade_value REAL"),
        ("grade_comment", "ALTER TABLE lessons ADD COLUMN grade_comment TEXT"),
    ] {
        if !columns.iter().any(|existing| existing == column) {
            conn.execute(ddl, [])
                .with_context(|| format!("failed to add lessons.{column}"))?;
            info!(column, "upgraded lessons table");
        }
    }
    Ok(())
}

pub(crate) fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .context("failed to prepare table_info query")?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .context("failed to read table_info")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect column names")?;
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creation_is_idempotent() {
        let conn = open_in_memory().unwrap();
        ensure_schema(&conn).unwrap();
        ensure_schema(&conn).unwrap();
        let columns = table_columns(&conn, "lessons").unwrap();
        assert_eq!(
            columns,
            [
                "id",
                "student_id",
                "date",
                "topic",
                "duration",
                "note",
                "grade_value",
                "grade_comment"
            ]
        );
    }

    #[test]
    fn upgrades_legacy_lessons_table() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE lessons (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                student_id INTEGER,
                date TEXT,
                topic TEXT,
                duration INTEGER,
                note TEXT
            )",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO lessons (student_id, date, topic, duration, note)
             VALUES (1, '2024-03-01', 'Contrôle', 0, '14 | bien')",
            [],
        )
        .unwrap();

        ensure_schema(&conn).unwrap();

        let columns = table_columns(&conn, "lessons").unwrap();
        assert!(columns.iter().any(|c| c == "grade_value"));
        assert!(columns.iter().any(|c| c == "grade_comment"));
        let note: String = conn
            .query_row("SELECT note FROM lessons WHERE id = 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(note, "14 | bien");
    }
}
