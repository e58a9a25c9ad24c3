use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

use super::csv::write_text_file;
use crate::db::{get_student, list_lessons};
use crate::error::StoreError;
use crate::models::{Lesson, Student};

/// File name of a student's bulletin.
pub fn bulletin_file_name(student: &Student) -> String {
    format!("bulletin_{}.html", student.code)
}

/// Render the bulletin page. Stored text is inserted verbatim, markup
/// included.
pub fn render_bulletin(student: &Student, lessons: &[Lesson]) -> String {
    let mut html = String::new();
    // Writing into a String cannot fail.
    let _ = write!(
        html,
        "<html><head><meta charset='utf-8'><title>Bulletin {first} {last}</title></head><body>\
         <h1>Bulletin - COURS PRIVÉ</h1>\
         <h2>{first} {last} ({code})</h2>\
         <p>Classe: {classe} | Cycle: {cycle} | Année: {year}</p>\
         <p>Téléphone: {phone}</p>\
         <h3>Leçons / Contrôles</h3><ul>",
        first = student.first_name,
        last = student.last_name,
        code = student.code,
        classe = student.classe,
        cycle = student.cycle,
        year = student.year,
        phone = student.phone.as_deref().unwrap_or(""),
    );
    for lesson in lessons {
        let _ = write!(
            html,
            "<li>{} - {} - Durée {} - Note: {}</li>",
            lesson.date,
            lesson.topic,
            lesson.duration,
            lesson.note.as_deref().unwrap_or("")
        );
    }
    html.push_str("</ul></body></html>");
    html
}

/// Render and save the bulletin of `student_id` into `dir`. Returns the
/// written path so the caller can open it.
pub fn write_bulletin(conn: &Connection, student_id: i64, dir: &Path) -> Result<PathBuf> {
    let student = get_student(conn, student_id)?.ok_or(StoreError::NotFound("Élève"))?;
    let lessons = list_lessons(conn, student_id)?;

    let path = dir.join(bulletin_file_name(&student));
    write_text_file(&path, &render_bulletin(&student, &lessons))?;
    info!(path = %path.display(), student_id, "generated bulletin");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student() -> Student {
        Student {
            id: 1,
            code: "E01".into(),
            last_name: "Diallo".into(),
            first_name: "Awa".into(),
            classe: "3e".into(),
            cycle: "Collège".into(),
            year: "2025-2026".into(),
            photo: None,
            notes: String::new(),
            phone: None,
        }
    }

    #[test]
    fn renders_identity_and_lessons_in_order() {
        let lessons = vec![
            Lesson {
                id: 2,
                student_id: 1,
                date: "2025-11-02".into(),
                topic: "Contrôle".into(),
                duration: 0,
                note: Some("15 | bien".into()),
                grade: None,
            },
            Lesson {
                id: 1,
                student_id: 1,
                date: "2025-10-01".into(),
                topic: "Fractions".into(),
                duration: 60,
                note: None,
                grade: None,
            },
        ];
        let html = render_bulletin(&student(), &lessons);

        assert!(html.contains("<title>Bulletin Awa Diallo</title>"));
        assert!(html.contains("<h2>Awa Diallo (E01)</h2>"));
        assert!(html.contains("<p>Classe: 3e | Cycle: Collège | Année: 2025-2026</p>"));
        assert!(html.contains("<p>Téléphone: </p>"));
        let first = html
            .find("<li>2025-11-02 - Contrôle - Durée 0 - Note: 15 | bien</li>")
            .unwrap();
        let second = html
            .find("<li>2025-10-01 - Fractions - Durée 60 - Note: </li>")
            .unwrap();
        assert!(first < second);
        assert!(html.ends_with("</ul></body></html>"));
    }

    #[test]
    fn stored_markup_is_kept_verbatim() {
        let mut s = student();
        s.last_name = "<b>Diallo</b>".into();
        assert!(render_bulletin(&s, &[]).contains("<h2>Awa <b>Diallo</b> (E01)</h2>"));
    }

    #[test]
    fn file_name_comes_from_code() {
        assert_eq!(bulletin_file_name(&student()), "bulletin_E01.html");
    }
}
