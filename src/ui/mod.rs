//! Ratatui front-end: a student list on the left and six detail tabs.

mod app;
mod forms;
mod helpers;
mod screens;
mod terminal;

pub use app::App;
pub use terminal::run_app;
