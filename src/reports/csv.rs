use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

use crate::db::{list_all_payments, list_students};
use crate::models::decimal_text;

pub const STUDENTS_EXPORT_FILE: &str = "students_export.csv";
pub const PAYMENTS_EXPORT_FILE: &str = "payments_export.csv";

pub const STUDENT_COLUMNS: [&str; 8] = [
    "code",
    "last_name",
    "first_name",
    "classe",
    "cycle",
    "year",
    "photo",
    "phone",
];
pub const PAYMENT_COLUMNS: [&str; 5] = ["student_id", "date", "amount", "method", "note"];

/// Write every student, in id order, to `students_export.csv` inside `dir`.
pub fn export_students_csv(conn: &Connection, dir: &Path) -> Result<PathBuf> {
    let students = list_students(conn, None)?;

    let mut csv = csv_line(&STUDENT_COLUMNS);
    for s in &students {
        csv.push_str(&csv_line(&[
            s.code.as_str(),
            &s.last_name,
            &s.first_name,
            &s.classe,
            &s.cycle,
            &s.year,
            s.photo.as_deref().unwrap_or(""),
            s.phone.as_deref().unwrap_or(""),
        ]));
    }

    let path = dir.join(STUDENTS_EXPORT_FILE);
    write_text_file(&path, &csv)?;
    info!(path = %path.display(), rows = students.len(), "exported students");
    Ok(path)
}

/// Write every payment to `payments_export.csv` inside `dir`.
pub fn export_payments_csv(conn: &Connection, dir: &Path) -> Result<PathBuf> {
    let payments = list_all_payments(conn)?;

    let mut csv = csv_line(&PAYMENT_COLUMNS);
    for p in &payments {
        let student_id = p.student_id.to_string();
        let amount = decimal_text(p.amount);
        csv.push_str(&csv_line(&[
            student_id.as_str(),
            &p.date,
            &amount,
            &p.method,
            p.note.as_deref().unwrap_or(""),
        ]));
    }

    let path = dir.join(PAYMENTS_EXPORT_FILE);
    write_text_file(&path, &csv)?;
    info!(path = %path.display(), rows = payments.len(), "exported payments");
    Ok(path)
}

/// Split CSV text into records. Understands quoted fields with doubled
/// quotes and embedded newlines; `\r\n` and `\n` both end a record.
pub fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => record.push(std::mem::take(&mut field)),
            '\r' if !in_quotes && chars.peek() == Some(&'\n') => {}
            '\n' if !in_quotes => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(ch),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}

fn csv_line(fields: &[&str]) -> String {
    let mut line = fields
        .iter()
        .map(|field| csv_quote(field))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

pub(crate) fn write_text_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create export directory")?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
