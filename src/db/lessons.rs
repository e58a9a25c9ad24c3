use anyhow::{Context, Result};
use rusqlite::{params, Connection, Row};
use tracing::info;

use crate::error::StoreError;
use crate::models::{Grade, Lesson};

/// Lessons and grade entries for one student, most recent date first.
pub fn list_lessons(conn: &Connection, student_id: i64) -> Result<Vec<Lesson>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, student_id, date, topic, duration, note, grade_value, grade_comment
             FROM lessons
             WHERE student_id = ?1
             ORDER BY date DESC, id DESC",
        )
        .context("failed to prepare lesson query")?;

    let lessons = stmt
        .query_map([student_id], lesson_from_row)
        .context("failed to load lessons")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect lessons")?;

    Ok(lessons)
}

/// Record a plain lesson and return its id.
pub fn add_lesson(
    conn: &Connection,
    student_id: i64,
    date: &str,
    topic: &str,
    duration: i64,
    note: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO lessons (student_id, date, topic, duration, note) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![student_id, date, topic, duration, note],
    )
    .context("failed to insert lesson")?;

    let id = conn.last_insert_rowid();
    info!(id, student_id, date, "added lesson");
    Ok(id)
}

/// Record a graded control: a zero-minute lesson row holding the structured
/// grade and the legacy `"value | comment"` note.
pub fn add_grade(
    conn: &Connection,
    student_id: i64,
    date: &str,
    title: &str,
    grade: &Grade,
) -> Result<i64> {
    if !grade.value.is_finite() {
        return Err(StoreError::Validation("La note doit être un nombre.".into()).into());
    }

    conn.execute(
        "INSERT INTO lessons (student_id, date, topic, duration, note, grade_value, grade_comment)
         VALUES (?1, ?2, ?3, 0, ?4, ?5, ?6)",
        params![
            student_id,
            date,
            title,
            grade.legacy_note(),
            grade.value,
            grade.comment
        ],
    )
    .context("failed to insert grade")?;

    let id = conn.last_insert_rowid();
    info!(id, student_id, value = grade.value, "added grade");
    Ok(id)
}

pub fn delete_lesson(conn: &Connection, id: i64) -> Result<()> {
    let deleted = conn
        .execute("DELETE FROM lessons WHERE id = ?1", [id])
        .context("failed to delete lesson")?;

    if deleted == 0 {
        Err(StoreError::NotFound("Leçon").into())
    } else {
        info!(id, "deleted lesson");
        Ok(())
    }
}

fn lesson_from_row(row: &Row<'_>) -> rusqlite::Result<Lesson> {
    let grade_value: Option<f64> = row.get(6)?;
    let grade_comment: Option<String> = row.get(7)?;
    Ok(Lesson {
        id: row.get(0)?,
        student_id: row.get(1)?,
        date: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        topic: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        duration: row.get::<_, Option<i64>>(4)?.unwrap_or_default(),
        note: row.get(5)?,
        grade: grade_value.map(|value| Grade {
            value,
            comment: grade_comment.unwrap_or_default(),
        }),
    })
}
