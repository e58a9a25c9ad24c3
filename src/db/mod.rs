//! Persistence module split across logical submodules, one per table.

mod connection;
mod lessons;
mod messages;
mod payments;
mod students;

pub use connection::{ensure_schema, open_in_memory, open_store};
pub use lessons::{add_grade, add_lesson, delete_lesson, list_lessons};
pub use messages::{add_message, list_messages, mark_message_read};
pub use payments::{add_payment, list_all_payments, list_payments};
pub use students::{create_student, delete_student, get_student, list_students, update_student};
