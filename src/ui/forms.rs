use anyhow::{anyhow, Context, Result};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::models::{Grade, Student, StudentFields};

/// Input accepted by a form field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum FieldKind {
    Text,
    Integer,
    Decimal,
}

#[derive(Clone, Debug)]
pub(crate) struct FormField {
    pub(crate) label: &'static str,
    pub(crate) value: String,
    pub(crate) kind: FieldKind,
    pub(crate) required: bool,
}

impl FormField {
    fn text(label: &'static str, value: impl Into<String>) -> Self {
        Self {
            label,
            value: value.into(),
            kind: FieldKind::Text,
            required: false,
        }
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Modal form state: a list of labelled fields with one focused.
#[derive(Clone, Debug)]
pub(crate) struct Form {
    pub(crate) fields: Vec<FormField>,
    pub(crate) active: usize,
    pub(crate) error: Option<String>,
}

impl Form {
    fn new(fields: Vec<FormField>) -> Self {
        Self {
            fields,
            active: 0,
            error: None,
        }
    }

    pub(crate) fn next_field(&mut self) {
        if !self.fields.is_empty() {
            self.active = (self.active + 1) % self.fields.len();
        }
    }

    pub(crate) fn previous_field(&mut self) {
        if !self.fields.is_empty() {
            self.active = (self.active + self.fields.len() - 1) % self.fields.len();
        }
    }

    /// Append a character to the active field, rejecting characters the
    /// field kind cannot hold.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        let Some(field) = self.fields.get_mut(self.active) else {
            return false;
        };
        let accepted = match field.kind {
            FieldKind::Text => !ch.is_control(),
            FieldKind::Integer => ch.is_ascii_digit(),
            FieldKind::Decimal => ch.is_ascii_digit() || ch == '.' || ch == ',',
        };
        if accepted {
            field.value.push(ch);
        }
        accepted
    }

    pub(crate) fn backspace(&mut self) {
        if let Some(field) = self.fields.get_mut(self.active) {
            field.value.pop();
        }
    }

    /// Trimmed value of the field with this label.
    pub(crate) fn value(&self, label: &str) -> &str {
        self.fields
            .iter()
            .find(|field| field.label == label)
            .map(|field| field.value.trim())
            .unwrap_or("")
    }

    fn required_value(&self, label: &str) -> Result<&str> {
        let value = self.value(label);
        if value.is_empty() {
            Err(anyhow!("{label} requis."))
        } else {
            Ok(value)
        }
    }

    fn integer(&self, label: &str) -> Result<i64> {
        self.required_value(label)?
            .parse::<i64>()
            .with_context(|| format!("{label} doit être un nombre entier."))
    }

    /// Decimal fields accept a comma as decimal separator.
    fn decimal(&self, label: &str) -> Result<f64> {
        self.required_value(label)?
            .replace(',', ".")
            .parse::<f64>()
            .with_context(|| format!("{label} doit être un nombre."))
    }

    pub(crate) fn build_line(&self, idx: usize) -> Line<'static> {
        let Some(field) = self.fields.get(idx) else {
            return Line::from("");
        };
        let is_active = idx == self.active;

        let display = if field.value.is_empty() && field.required {
            "<requis>".to_string()
        } else {
            field.value.clone()
        };

        let style = if is_active {
            Style::default().fg(Color::Yellow)
        } else if field.value.is_empty() {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };

        Line::from(vec![
            Span::raw(format!("{}: ", field.label)),
            Span::styled(display, style),
        ])
    }

    /// Cursor column offset of the active field, label prefix included.
    pub(crate) fn cursor_offset(&self) -> usize {
        self.fields
            .get(self.active)
            .map(|field| field.label.chars().count() + 2 + field.value.chars().count())
            .unwrap_or(0)
    }
}

const CODE: &str = "Code";
const FIRST_NAME: &str = "Prénom";
const LAST_NAME: &str = "Nom";
const CLASSE: &str = "Classe";
const CYCLE: &str = "Cycle";
const YEAR: &str = "Année";
const PHONE: &str = "Téléphone parent";
const PHOTO: &str = "Photo (chemin)";

/// Registration form, blank or prefilled from the student being edited.
pub(crate) fn student_form(existing: Option<&Student>) -> Form {
    let fields = existing.map(Student::fields).unwrap_or_default();
    Form::new(vec![
        FormField::text(CODE, fields.code).required(),
        FormField::text(FIRST_NAME, fields.first_name).required(),
        FormField::text(LAST_NAME, fields.last_name),
        FormField::text(CLASSE, fields.classe),
        FormField::text(CYCLE, fields.cycle),
        FormField::text(YEAR, fields.year),
        FormField::text(PHONE, fields.phone.unwrap_or_default()),
        FormField::text(PHOTO, fields.photo.unwrap_or_default()),
    ])
}

/// Read the registration form. `notes` is carried over because the form does
/// not edit it. The photo is the raw path typed by the user.
pub(crate) fn parse_student(form: &Form, notes: &str) -> Result<StudentFields> {
    let code = form.required_value(CODE)?;
    let first_name = form.required_value(FIRST_NAME)?;
    let optional = |label: &str| {
        let value = form.value(label);
        (!value.is_empty()).then(|| value.to_string())
    };
    Ok(StudentFields {
        code: code.to_string(),
        last_name: form.value(LAST_NAME).to_string(),
        first_name: first_name.to_string(),
        classe: form.value(CLASSE).to_string(),
        cycle: form.value(CYCLE).to_string(),
        year: form.value(YEAR).to_string(),
        photo: optional(PHOTO),
        notes: notes.to_string(),
        phone: optional(PHONE),
    })
}

const DATE: &str = "Date (AAAA-MM-JJ)";
const TOPIC: &str = "Sujet";
const DURATION: &str = "Durée (min)";
const NOTE: &str = "Note/Commentaire";

#[derive(Debug)]
pub(crate) struct LessonInput {
    pub(crate) date: String,
    pub(crate) topic: String,
    pub(crate) duration: i64,
    pub(crate) note: String,
}

pub(crate) fn lesson_form(today: &str) -> Form {
    Form::new(vec![
        FormField::text(DATE, today).required(),
        FormField::text(TOPIC, ""),
        FormField::text(DURATION, "60")
            .kind(FieldKind::Integer)
            .required(),
        FormField::text(NOTE, ""),
    ])
}

pub(crate) fn parse_lesson(form: &Form) -> Result<LessonInput> {
    Ok(LessonInput {
        date: form.required_value(DATE)?.to_string(),
        topic: form.value(TOPIC).to_string(),
        duration: form.integer(DURATION)?,
        note: form.value(NOTE).to_string(),
    })
}

const TITLE: &str = "Titre";
const VALUE: &str = "Valeur (0-20)";
const COMMENT: &str = "Commentaire";

pub(crate) fn grade_form() -> Form {
    Form::new(vec![
        FormField::text(TITLE, ""),
        FormField::text(VALUE, "10")
            .kind(FieldKind::Decimal)
            .required(),
        FormField::text(COMMENT, ""),
    ])
}

pub(crate) fn parse_grade(form: &Form) -> Result<(String, Grade)> {
    let value = form.decimal(VALUE)?;
    Ok((
        form.value(TITLE).to_string(),
        Grade {
            value,
            comment: form.value(COMMENT).to_string(),
        },
    ))
}

const AMOUNT: &str = "Montant";
const METHOD: &str = "Méthode (espèces/carte)";
const PAYMENT_NOTE: &str = "Note";

#[derive(Debug)]
pub(crate) struct PaymentInput {
    pub(crate) date: String,
    pub(crate) amount: f64,
    pub(crate) method: String,
    pub(crate) note: String,
}

pub(crate) fn payment_form(today: &str) -> Form {
    Form::new(vec![
        FormField::text(DATE, today).required(),
        FormField::text(AMOUNT, "0")
            .kind(FieldKind::Decimal)
            .required(),
        FormField::text(METHOD, ""),
        FormField::text(PAYMENT_NOTE, ""),
    ])
}

pub(crate) fn parse_payment(form: &Form) -> Result<PaymentInput> {
    Ok(PaymentInput {
        date: form.required_value(DATE)?.to_string(),
        amount: form.decimal(AMOUNT)?,
        method: form.value(METHOD).to_string(),
        note: form.value(PAYMENT_NOTE).to_string(),
    })
}

const SENDER: &str = "De";
const CONTENT: &str = "Message";

pub(crate) fn message_form() -> Form {
    Form::new(vec![
        FormField::text(SENDER, "Prof"),
        FormField::text(CONTENT, "").required(),
    ])
    .focused(1)
}

pub(crate) fn parse_message(form: &Form) -> Result<(String, String)> {
    let content = form
        .required_value(CONTENT)
        .map_err(|_| anyhow!("Écrivez un message."))?;
    Ok((form.value(SENDER).to_string(), content.to_string()))
}

impl Form {
    fn focused(mut self, idx: usize) -> Self {
        if idx < self.fields.len() {
            self.active = idx;
        }
        self
    }
}

/// Multi-line editor for the planning notes of one student.
#[derive(Clone, Debug, Default)]
pub(crate) struct NotesEditor {
    pub(crate) text: String,
}

impl NotesEditor {
    pub(crate) fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }

    pub(crate) fn push_char(&mut self, ch: char) {
        if !ch.is_control() {
            self.text.push(ch);
        }
    }

    pub(crate) fn newline(&mut self) {
        self.text.push('\n');
    }

    pub(crate) fn backspace(&mut self) {
        self.text.pop();
    }

    /// Cursor position as (column, row) relative to the text origin.
    pub(crate) fn cursor(&self) -> (usize, usize) {
        let row = self.text.matches('\n').count();
        let col = self
            .text
            .rsplit('\n')
            .next()
            .map(|line| line.chars().count())
            .unwrap_or(0);
        (col, row)
    }
}

/// Row awaiting a yes/no confirmation before deletion.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum DeleteTarget {
    Student { id: i64, label: String },
    Lesson { id: i64, label: String },
}

impl DeleteTarget {
    pub(crate) fn prompt(&self) -> String {
        match self {
            DeleteTarget::Student { label, .. } => format!("Supprimer cet élève ? {label}"),
            DeleteTarget::Lesson { label, .. } => format!("Supprimer cette leçon ? {label}"),
        }
    }

    pub(crate) fn warning(&self) -> &'static str {
        match self {
            DeleteTarget::Student { .. } => {
                "Ses leçons, notes, paiements et messages seront aussi supprimés."
            }
            DeleteTarget::Lesson { .. } => "Cette action est définitive.",
        }
    }
}
