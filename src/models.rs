//! Domain models that mirror the SQLite schema and get passed throughout the
//! TUI. They stay light-weight data holders; persistence lives in `db` and
//! presentation in `ui`.

use std::fmt;

use crate::error::StoreError;

/// A registered student, as stored in the `students` table.
#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    /// Primary key from the database.
    pub id: i64,
    /// User-assigned identifier, unique across students.
    pub code: String,
    pub last_name: String,
    pub first_name: String,
    /// Class label such as "3e" or "Terminale".
    pub classe: String,
    pub cycle: String,
    /// Academic year label such as "2025-2026".
    pub year: String,
    /// Path of the copy kept in the photo directory.
    pub photo: Option<String>,
    /// Free-text notes, edited from the planning tab.
    pub notes: String,
    /// Parent phone number.
    pub phone: Option<String>,
}

impl Student {
    /// One-line summary used by the student list.
    pub fn list_label(&self) -> String {
        format!(
            "{} - {} {} ({})",
            self.code, self.last_name, self.first_name, self.classe
        )
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Copy the mutable fields out, e.g. to prefill an edit form.
    pub fn fields(&self) -> StudentFields {
        StudentFields {
            code: self.code.clone(),
            last_name: self.last_name.clone(),
            first_name: self.first_name.clone(),
            classe: self.classe.clone(),
            cycle: self.cycle.clone(),
            year: self.year.clone(),
            photo: self.photo.clone(),
            notes: self.notes.clone(),
            phone: self.phone.clone(),
        }
    }
}

impl fmt::Display for Student {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.full_name(), self.code)
    }
}

/// Everything a student row holds except its id. Create and update both take
/// the full set; there is no partial update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentFields {
    pub code: String,
    pub last_name: String,
    pub first_name: String,
    pub classe: String,
    pub cycle: String,
    pub year: String,
    pub photo: Option<String>,
    pub notes: String,
    pub phone: Option<String>,
}

impl StudentFields {
    /// Trim text inputs and turn blank optional values into `None`.
    pub fn normalized(&self) -> Self {
        Self {
            code: self.code.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            first_name: self.first_name.trim().to_string(),
            classe: self.classe.trim().to_string(),
            cycle: self.cycle.trim().to_string(),
            year: self.year.trim().to_string(),
            photo: non_blank(self.photo.as_deref()),
            notes: self.notes.clone(),
            phone: non_blank(self.phone.as_deref()),
        }
    }

    /// Code and first name are mandatory.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.code.trim().is_empty() {
            return Err(StoreError::MissingField("code"));
        }
        if self.first_name.trim().is_empty() {
            return Err(StoreError::MissingField("prénom"));
        }
        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Structured grade attached to a lesson row recorded as a test or control.
#[derive(Debug, Clone, PartialEq)]
pub struct Grade {
    pub value: f64,
    pub comment: String,
}

impl Grade {
    /// Legacy `"<value> | <comment>"` text still written to the note column
    /// so bulletins and older tooling keep reading grades the same way.
    pub fn legacy_note(&self) -> String {
        format!("{} | {}", decimal_text(self.value), self.comment)
    }
}

/// Number text as stored and exported: whole values keep one decimal,
/// so `15000.0` rather than `15000`.
pub fn decimal_text(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// A lesson, or a grade entry stored in the same table.
#[derive(Debug, Clone, PartialEq)]
pub struct Lesson {
    pub id: i64,
    pub student_id: i64,
    /// `YYYY-MM-DD`; sorts chronologically as text.
    pub date: String,
    pub topic: String,
    /// Minutes; 0 for grade-only entries.
    pub duration: i64,
    pub note: Option<String>,
    /// Present for rows created through the grade form.
    pub grade: Option<Grade>,
}

impl Lesson {
    pub fn list_label(&self) -> String {
        format!(
            "{} - {} ({}min) Note:{}",
            self.date,
            self.topic,
            self.duration,
            self.note.as_deref().unwrap_or("")
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    pub id: i64,
    pub student_id: i64,
    pub date: String,
    pub amount: f64,
    /// Free text: cash, card, transfer...
    pub method: String,
    pub note: Option<String>,
}

impl Payment {
    pub fn list_label(&self) -> String {
        format!(
            "{} | {} | {} | {}",
            self.date,
            decimal_text(self.amount),
            self.method,
            self.note.as_deref().unwrap_or("")
        )
    }
}

/// Message addressed to a student's parents.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: i64,
    pub student_id: i64,
    /// `YYYY-MM-DD HH:MM:SS`, local time.
    pub date: String,
    pub sender: String,
    pub content: String,
    pub read: bool,
}

impl Message {
    /// Unread messages carry a `*NEW*` tag; content is cut to 30 characters.
    pub fn list_label(&self) -> String {
        let flag = if self.read { "" } else { "*NEW* " };
        let preview: String = self.content.chars().take(30).collect();
        format!("{flag}{} - {}: {preview}", self.date, self.sender)
    }
}

/// Outcome of averaging a student's grades.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GradeAverage {
    NoGrades,
    Mean { mean: f64, count: usize },
}

impl fmt::Display for GradeAverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GradeAverage::NoGrades => write!(f, "Aucune note disponible"),
            GradeAverage::Mean { mean, count } => write!(f, "Moyenne: {mean:.2} ({count} notes)"),
        }
    }
}
