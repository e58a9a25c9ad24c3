//! Read-only computations and file exports built on top of the record layer.

mod average;
mod bulletin;
mod csv;

pub use average::{average_of, compute_average, parse_legacy_grade};
pub use bulletin::{bulletin_file_name, render_bulletin, write_bulletin};
pub use csv::{
    export_payments_csv, export_students_csv, parse_csv, PAYMENTS_EXPORT_FILE, PAYMENT_COLUMNS,
    STUDENTS_EXPORT_FILE, STUDENT_COLUMNS,
};
