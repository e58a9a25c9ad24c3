use anyhow::Result;
use rusqlite::Connection;

use crate::db::{list_lessons, list_messages, list_payments};
use crate::models::{GradeAverage, Lesson, Message, Payment, Student};
use crate::reports::average_of;

/// Detail tabs shown to the right of the student list, in display order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Tab {
    Info,
    Lessons,
    Messages,
    Registration,
    Reports,
    Planning,
}

impl Tab {
    pub(crate) const ALL: [Tab; 6] = [
        Tab::Info,
        Tab::Lessons,
        Tab::Messages,
        Tab::Registration,
        Tab::Reports,
        Tab::Planning,
    ];

    pub(crate) fn title(self) -> &'static str {
        match self {
            Tab::Info => "Gestion des élèves",
            Tab::Lessons => "Notes / Bulletins",
            Tab::Messages => "Messagerie",
            Tab::Registration => "Inscription",
            Tab::Reports => "Rapports / Paiements",
            Tab::Planning => "Planning",
        }
    }

    pub(crate) fn index(self) -> usize {
        Tab::ALL.iter().position(|tab| *tab == self).unwrap_or(0)
    }

    /// Step through the tabs, wrapping at both ends.
    pub(crate) fn offset(self, delta: isize) -> Tab {
        let len = Tab::ALL.len() as isize;
        let idx = (self.index() as isize + delta).rem_euclid(len) as usize;
        Tab::ALL[idx]
    }

    /// Tabs holding a list the cursor can move through.
    pub(crate) fn has_rows(self) -> bool {
        matches!(self, Tab::Lessons | Tab::Messages | Tab::Reports)
    }
}

/// Which pane receives arrow keys.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Focus {
    Students,
    Detail,
}

/// Rows currently highlighted on screen. Built fresh for every action and
/// handed to the handler, so no handler reads selection from ambient state.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct SelectionContext {
    pub(crate) student_id: Option<i64>,
    pub(crate) lesson_id: Option<i64>,
    pub(crate) message_id: Option<i64>,
}

/// Keeps a cursor inside `0..len`.
fn clamp_cursor(selected: usize, offset: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let max = len as isize - 1;
    (selected as isize + offset).clamp(0, max) as usize
}

/// The searchable student list on the left.
#[derive(Default)]
pub(crate) struct StudentList {
    pub(crate) students: Vec<Student>,
    pub(crate) selected: usize,
    pub(crate) filter: Option<String>,
}

impl StudentList {
    pub(crate) fn current(&self) -> Option<&Student> {
        self.students.get(self.selected)
    }

    pub(crate) fn move_selection(&mut self, offset: isize) {
        self.selected = clamp_cursor(self.selected, offset, self.students.len());
    }

    pub(crate) fn select_first(&mut self) {
        self.selected = 0;
    }

    pub(crate) fn select_last(&mut self) {
        self.selected = self.students.len().saturating_sub(1);
    }

    /// Replace the rows, keeping the cursor on `focus_id` when it survived.
    pub(crate) fn set_students(&mut self, students: Vec<Student>, focus_id: Option<i64>) {
        self.students = students;
        if let Some(id) = focus_id {
            if let Some(idx) = self.students.iter().position(|s| s.id == id) {
                self.selected = idx;
                return;
            }
        }
        self.selected = clamp_cursor(self.selected, 0, self.students.len());
    }

    pub(crate) fn filter_query(&self) -> Option<&str> {
        self.filter.as_deref().filter(|query| !query.trim().is_empty())
    }
}

/// Everything loaded for the selected student.
pub(crate) struct DetailView {
    pub(crate) student_id: Option<i64>,
    pub(crate) lessons: Vec<Lesson>,
    pub(crate) average: GradeAverage,
    pub(crate) messages: Vec<Message>,
    pub(crate) payments: Vec<Payment>,
    pub(crate) lesson_cursor: usize,
    pub(crate) message_cursor: usize,
    pub(crate) payment_cursor: usize,
}

impl Default for DetailView {
    fn default() -> Self {
        Self {
            student_id: None,
            lessons: Vec::new(),
            average: GradeAverage::NoGrades,
            messages: Vec::new(),
            payments: Vec::new(),
            lesson_cursor: 0,
            message_cursor: 0,
            payment_cursor: 0,
        }
    }
}

impl DetailView {
    /// Reload the three lists. Cursors stay where they were when the same
    /// student is reloaded and start at the top for a new one.
    pub(crate) fn load(&mut self, conn: &Connection, student_id: i64) -> Result<()> {
        if self.student_id != Some(student_id) {
            *self = Self::default();
            self.student_id = Some(student_id);
        }
        self.lessons = list_lessons(conn, student_id)?;
        self.average = average_of(&self.lessons);
        self.messages = list_messages(conn, student_id)?;
        self.payments = list_payments(conn, student_id)?;
        self.lesson_cursor = clamp_cursor(self.lesson_cursor, 0, self.lessons.len());
        self.message_cursor = clamp_cursor(self.message_cursor, 0, self.messages.len());
        self.payment_cursor = clamp_cursor(self.payment_cursor, 0, self.payments.len());
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn current_lesson(&self) -> Option<&Lesson> {
        self.lessons.get(self.lesson_cursor)
    }

    pub(crate) fn current_message(&self) -> Option<&Message> {
        self.messages.get(self.message_cursor)
    }

    pub(crate) fn total_paid(&self) -> f64 {
        self.payments.iter().map(|p| p.amount).sum()
    }

    /// Move the cursor of the list shown by `tab`.
    pub(crate) fn move_selection(&mut self, tab: Tab, offset: isize) {
        match tab {
            Tab::Lessons => {
                self.lesson_cursor = clamp_cursor(self.lesson_cursor, offset, self.lessons.len())
            }
            Tab::Messages => {
                self.message_cursor = clamp_cursor(self.message_cursor, offset, self.messages.len())
            }
            Tab::Reports => {
                self.payment_cursor = clamp_cursor(self.payment_cursor, offset, self.payments.len())
            }
            _ => {}
        }
    }
}
