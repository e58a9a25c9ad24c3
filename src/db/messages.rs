use anyhow::{Context, Result};
use chrono::Local;
use rusqlite::{params, Connection, Row};
use tracing::info;

use crate::error::StoreError;
use crate::models::Message;

/// Messages of one student, newest first.
pub fn list_messages(conn: &Connection, student_id: i64) -> Result<Vec<Message>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, student_id, date, sender, content, read_flag
             FROM messages
             WHERE student_id = ?1
             ORDER BY date DESC, id DESC",
        )
        .context("failed to prepare message query")?;

    let messages = stmt
        .query_map([student_id], message_from_row)
        .context("failed to load messages")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect messages")?;

    Ok(messages)
}

/// Send a message stamped with the current local time. New messages start
/// unread.
pub fn add_message(conn: &Connection, student_id: i64, sender: &str, content: &str) -> Result<i64> {
    let content = content.trim();
    if content.is_empty() {
        return Err(StoreError::Validation("Écrivez un message.".into()).into());
    }
    let date = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    conn.execute(
        "INSERT INTO messages (student_id, date, sender, content, read_flag)
         VALUES (?1, ?2, ?3, ?4, 0)",
        params![student_id, date, sender.trim(), content],
    )
    .context("failed to insert message")?;

    let id = conn.last_insert_rowid();
    info!(id, student_id, "sent message");
    Ok(id)
}

pub fn mark_message_read(conn: &Connection, id: i64) -> Result<()> {
    let updated = conn
        .execute("UPDATE messages SET read_flag = 1 WHERE id = ?1", [id])
        .context("failed to mark message as read")?;

    if updated == 0 {
        Err(StoreError::NotFound("Message").into())
    } else {
        info!(id, "marked message read");
        Ok(())
    }
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        student_id: row.get(1)?,
        date: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        sender: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        content: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        read: row.get::<_, Option<i64>>(5)?.unwrap_or_default() != 0,
    })
}
