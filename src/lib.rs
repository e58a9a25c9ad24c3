//! Record keeping for a private tutoring practice: students, lessons and
//! grades, payments and parent messages in one SQLite file, with CSV and HTML
//! exports and a terminal front-end.
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod photos;
pub mod reports;
pub mod ui;

pub use config::AppConfig;
pub use db::{open_in_memory, open_store};
pub use error::StoreError;
pub use models::{Grade, GradeAverage, Lesson, Message, Payment, Student, StudentFields};

/// The interactive application entry point and state container.
pub use ui::{run_app, App};
