use anyhow::Result;
use rusqlite::Connection;

use crate::db::list_lessons;
use crate::models::{GradeAverage, Lesson};

/// Average the student's grades. Structured grades win; older rows fall back
/// to the number in front of the note's first `|`. Rows without a usable
/// number are skipped.
pub fn compute_average(conn: &Connection, student_id: i64) -> Result<GradeAverage> {
    let lessons = list_lessons(conn, student_id)?;
    Ok(average_of(&lessons))
}

pub fn average_of(lessons: &[Lesson]) -> GradeAverage {
    let values: Vec<f64> = lessons.iter().filter_map(grade_value).collect();
    if values.is_empty() {
        return GradeAverage::NoGrades;
    }
    let count = values.len();
    GradeAverage::Mean {
        mean: values.iter().sum::<f64>() / count as f64,
        count,
    }
}

fn grade_value(lesson: &Lesson) -> Option<f64> {
    match &lesson.grade {
        Some(grade) if grade.value.is_finite() => Some(grade.value),
        _ => lesson.note.as_deref().and_then(parse_legacy_grade),
    }
}

/// Parse the `"<value> | <comment>"` note format. Plain lesson notes are
/// usually not numeric and yield `None`, as do `nan` and `inf`.
pub fn parse_legacy_grade(note: &str) -> Option<f64> {
    let head = note.split('|').next()?.trim();
    head.parse::<f64>().ok().filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Grade;

    fn lesson(note: Option<&str>, grade: Option<f64>) -> Lesson {
        Lesson {
            id: 0,
            student_id: 1,
            date: "2025-10-01".into(),
            topic: "Contrôle".into(),
            duration: 0,
            note: note.map(str::to_string),
            grade: grade.map(|value| Grade {
                value,
                comment: String::new(),
            }),
        }
    }

    #[test]
    fn parses_value_before_first_pipe() {
        assert_eq!(parse_legacy_grade("15|good"), Some(15.0));
        assert_eq!(parse_legacy_grade(" 9.5 | ok | extra"), Some(9.5));
        assert_eq!(parse_legacy_grade("12"), Some(12.0));
        assert_eq!(parse_legacy_grade("abc|bad"), None);
        assert_eq!(parse_legacy_grade(""), None);
        assert_eq!(parse_legacy_grade("nan | ?"), None);
        assert_eq!(parse_legacy_grade("inf"), None);
    }

    #[test]
    fn skips_unparseable_notes() {
        let lessons = [
            lesson(Some("15|good"), None),
            lesson(Some("abc|bad"), None),
            lesson(Some("9.5|ok"), None),
        ];
        assert_eq!(
            average_of(&lessons),
            GradeAverage::Mean {
                mean: 12.25,
                count: 2
            }
        );
    }

    #[test]
    fn no_numeric_notes_means_no_grades() {
        let lessons = [
            lesson(Some("très bien"), None),
            lesson(None, None),
            lesson(Some("abc|bad"), None),
        ];
        assert_eq!(average_of(&lessons), GradeAverage::NoGrades);
        assert_eq!(average_of(&[]), GradeAverage::NoGrades);
    }

    #[test]
    fn structured_grade_takes_precedence_over_note() {
        let lessons = [lesson(Some("3 | ancienne saisie"), Some(17.0)), lesson(None, Some(13.0))];
        assert_eq!(
            average_of(&lessons),
            GradeAverage::Mean {
                mean: 15.0,
                count: 2
            }
        );
    }
}
