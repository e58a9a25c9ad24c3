use anyhow::{Context, Result};
use rusqlite::{params, Connection, Row};
use tracing::info;

use crate::error::StoreError;
use crate::models::Payment;

const PAYMENT_COLUMNS: &str = "id, student_id, date, amount, method, note";

/// Payments of one student, most recent date first.
pub fn list_payments(conn: &Connection, student_id: i64) -> Result<Vec<Payment>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments
             WHERE student_id = ?1
             ORDER BY date DESC, id DESC"
        ))
        .context("failed to prepare payment query")?;

    let payments = stmt
        .query_map([student_id], payment_from_row)
        .context("failed to load payments")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect payments")?;

    Ok(payments)
}

/// Every payment in insertion order. Feeds the payments export.
pub fn list_all_payments(conn: &Connection) -> Result<Vec<Payment>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {PAYMENT_COLUMNS} FROM payments ORDER BY id"))
        .context("failed to prepare payment export query")?;

    let payments = stmt
        .query_map([], payment_from_row)
        .context("failed to load payments")?
        .collect::<Result<Vec<_>, _>>()
        .context("failed to collect payments")?;

    Ok(payments)
}

/// Record a payment. Amounts must be finite and non-negative.
pub fn add_payment(
    conn: &Connection,
    student_id: i64,
    date: &str,
    amount: f64,
    method: &str,
    note: &str,
) -> Result<i64> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(StoreError::Validation(
            "Le montant doit être un nombre positif ou nul.".into(),
        )
        .into());
    }

    conn.execute(
        "INSERT INTO payments (student_id, date, amount, method, note) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![student_id, date, amount, method, note],
    )
    .context("failed to insert payment")?;

    let id = conn.last_insert_rowid();
    info!(id, student_id, amount, "added payment");
    Ok(id)
}

fn payment_from_row(row: &Row<'_>) -> rusqlite::Result<Payment> {
    Ok(Payment {
        id: row.get(0)?,
        student_id: row.get(1)?,
        date: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        amount: row.get::<_, Option<f64>>(3)?.unwrap_or_default(),
        method: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        note: row.get(5)?,
    })
}
