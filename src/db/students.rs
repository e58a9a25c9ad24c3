use anyhow::{Context, Result};
use rusqlite::{params, Connection, Error as SqlError, ErrorCode, OptionalExtension, Row};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::{Student, StudentFields};

const STUDENT_COLUMNS: &str =
    "id, code, last_name, first_name, classe, cycle, year, photo, notes, phone";

/// Students ordered by id. A non-blank filter keeps rows whose code, last
/// name or first name contains it (case-sensitive).
pub fn list_students(conn: &Connection, filter: Option<&str>) -> Result<Vec<Student>> {
    let filter = filter.map(str::trim).filter(|query| !query.is_empty());

    let students = match filter {
        Some(query) => {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {STUDENT_COLUMNS} FROM students
                     WHERE instr(code, ?1) > 0
                        OR instr(last_name, ?1) > 0
                        OR instr(first_name, ?1) > 0
                     ORDER BY id"
                ))
                .context("failed to prepare student search")?;
            let found = stmt
                .query_map([query], student_from_row)
                .context("failed to search students")?
                .collect::<Result<Vec<_>, _>>()
                .context("failed to collect students")?;
            found
        }
        None => {
            let mut stmt = conn
                .prepare(&format!("SELECT {STUDENT_COLUMNS} FROM students ORDER BY id"))
                .context("failed to prepare student query")?;
            let all = stmt
                .query_map([], student_from_row)
                .context("failed to load students")?
                .collect::<Result<Vec<_>, _>>()
                .context("failed to collect students")?;
            all
        }
    };

    debug!(count = students.len(), ?filter, "listed students");
    Ok(students)
}

/// Fetch one student; `None` when the id is unknown.
pub fn get_student(conn: &Connection, id: i64) -> Result<Option<Student>> {
    conn.query_row(
        &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?1"),
        [id],
        student_from_row,
    )
    .optional()
    .context("failed to load student")
}

/// Register a new student and return its id. The code must be unused.
pub fn create_student(conn: &Connection, fields: &StudentFields) -> Result<i64> {
    let fields = fields.normalized();
    fields.validate()?;

    conn.execute(
        "INSERT INTO students (code, last_name, first_name, classe, cycle, year, photo, notes, phone)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            fields.code,
            fields.last_name,
            fields.first_name,
            fields.classe,
            fields.cycle,
            fields.year,
            fields.photo,
            fields.notes,
            fields.phone
        ],
    )
    .map_err(|err| map_unique_constraint(err, &fields.code))
    .context("failed to insert student")?;

    let id = conn.last_insert_rowid();
    info!(id, code = %fields.code, "created student");
    Ok(id)
}

/// Overwrite every mutable field of an existing student.
pub fn update_student(conn: &Connection, id: i64, fields: &StudentFields) -> Result<()> {
    let fields = fields.normalized();
    fields.validate()?;

    let updated = conn
        .execute(
            "UPDATE students
             SET code = ?1, last_name = ?2, first_name = ?3, classe = ?4, cycle = ?5,
                 year = ?6, photo = ?7, notes = ?8, phone = ?9
             WHERE id = ?10",
            params![
                fields.code,
                fields.last_name,
                fields.first_name,
                fields.classe,
                fields.cycle,
                fields.year,
                fields.photo,
                fields.notes,
                fields.phone,
                id
            ],
        )
        .map_err(|err| map_unique_constraint(err, &fields.code))
        .context("failed to update student")?;

    if updated == 0 {
        return Err(StoreError::NotFound("Élève").into());
    }
    info!(id, code = %fields.code, "updated student");
    Ok(())
}

/// Remove a student together with its lessons, payments and messages. The
/// four deletes share one transaction: if any fails, none is kept.
pub fn delete_student(conn: &mut Connection, id: i64) -> Result<()> {
    let tx = conn
        .transaction()
        .context("failed to start delete transaction")?;

    let deleted = tx
        .execute("DELETE FROM students WHERE id = ?1", [id])
        .context("failed to delete student")?;
    if deleted == 0 {
        return Err(StoreError::NotFound("Élève").into());
    }

    let mut children = 0;
    for table in ["lessons", "payments", "messages"] {
        children += tx
            .execute(&format!("DELETE FROM {table} WHERE student_id = ?1"), [id])
            .with_context(|| format!("failed to delete {table} of student"))?;
    }

    tx.commit().context("failed to commit student deletion")?;
    info!(id, children, "deleted student and dependent records");
    Ok(())
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        code: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        last_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        first_name: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        classe: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        cycle: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        year: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        photo: row.get(7)?,
        notes: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
        phone: row.get(9)?,
    })
}

/// The only uniqueness constraint on `students` is the code.
fn map_unique_constraint(err: SqlError, code: &str) -> anyhow::Error {
    if matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::ConstraintViolation)
    ) {
        StoreError::DuplicateCode(code.to_string()).into()
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{add_lesson, add_payment, list_lessons, list_payments, open_in_memory};
    use crate::error::find_store_error;

    fn fields(code: &str, last: &str, first: &str) -> StudentFields {
        StudentFields {
            code: code.into(),
            last_name: last.into(),
            first_name: first.into(),
            classe: "3e".into(),
            ..StudentFields::default()
        }
    }

    #[test]
    fn duplicate_code_is_rejected_without_second_row() {
        let conn = open_in_memory().unwrap();
        create_student(&conn, &fields("E01", "Diallo", "Awa")).unwrap();

        let err = create_student(&conn, &fields("E01", "Traoré", "Moussa")).unwrap_err();
        assert_eq!(
            find_store_error(&err),
            Some(&StoreError::DuplicateCode("E01".into()))
        );
        assert_eq!(list_students(&conn, None).unwrap().len(), 1);
    }

    #[test]
    fn missing_first_name_is_rejected() {
        let conn = open_in_memory().unwrap();
        let err = create_student(&conn, &fields("E01", "Diallo", "  ")).unwrap_err();
        assert_eq!(
            find_store_error(&err),
            Some(&StoreError::MissingField("prénom"))
        );
        assert!(list_students(&conn, None).unwrap().is_empty());
    }

    #[test]
    fn update_overwrites_all_fields() {
        let conn = open_in_memory().unwrap();
        let id = create_student(&conn, &fields("E01", "Diallo", "Awa")).unwrap();

        let mut changed = fields("E02", "Diallo", "Awa Marie");
        changed.cycle = "Collège".into();
        changed.phone = Some("90 11 22 33".into());
        changed.notes = "Révisions le samedi".into();
        update_student(&conn, id, &changed).unwrap();

        let student = get_student(&conn, id).unwrap().unwrap();
        assert_eq!(student.code, "E02");
        assert_eq!(student.first_name, "Awa Marie");
        assert_eq!(student.cycle, "Collège");
        assert_eq!(student.phone.as_deref(), Some("90 11 22 33"));
        assert_eq!(student.notes, "Révisions le samedi");
        assert_eq!(student.photo, None);
    }

    #[test]
    fn update_to_taken_code_fails() {
        let conn = open_in_memory().unwrap();
        create_student(&conn, &fields("E01", "Diallo", "Awa")).unwrap();
        let id = create_student(&conn, &fields("E02", "Traoré", "Moussa")).unwrap();

        let err = update_student(&conn, id, &fields("E01", "Traoré", "Moussa")).unwrap_err();
        assert!(matches!(
            find_store_error(&err),
            Some(StoreError::DuplicateCode(_))
        ));
        assert_eq!(get_student(&conn, id).unwrap().unwrap().code, "E02");
    }

    #[test]
    fn update_and_get_unknown_id() {
        let conn = open_in_memory().unwrap();
        assert_eq!(get_student(&conn, 42).unwrap(), None);
        let err = update_student(&conn, 42, &fields("E01", "Diallo", "Awa")).unwrap_err();
        assert_eq!(find_store_error(&err), Some(&StoreError::NotFound("Élève")));
    }

    #[test]
    fn search_is_substring_and_ordered_by_id() {
        let conn = open_in_memory().unwrap();
        create_student(&conn, &fields("E01", "Omar", "Ali")).unwrap();
        create_student(&conn, &fields("E02", "Diallo", "Awa")).unwrap();
        create_student(&conn, &fields("MAR3", "Sow", "Marie")).unwrap();
        create_student(&conn, &fields("E04", "Kone", "Amara")).unwrap();

        let codes: Vec<String> = list_students(&conn, Some("mar"))
            .unwrap()
            .into_iter()
            .map(|s| s.code)
            .collect();
        assert_eq!(codes, ["E01", "E04"]);

        assert_eq!(list_students(&conn, Some("  ")).unwrap().len(), 4);
        assert!(list_students(&conn, Some("zzz")).unwrap().is_empty());
    }

    #[test]
    fn failed_cascade_keeps_every_row() {
        let mut conn = open_in_memory().unwrap();
        let id = create_student(&conn, &fields("E01", "Diallo", "Awa")).unwrap();
        add_lesson(&conn, id, "2025-10-01", "Fractions", 60, "").unwrap();
        add_payment(&conn, id, "2025-10-01", 5000.0, "espèces", "").unwrap();
        conn.execute_batch("DROP TABLE messages").unwrap();

        let err = delete_student(&mut conn, id).unwrap_err();
        assert_eq!(err.to_string(), "failed to delete messages of student");

        assert!(get_student(&conn, id).unwrap().is_some());
        assert_eq!(list_lessons(&conn, id).unwrap().len(), 1);
        assert_eq!(list_payments(&conn, id).unwrap().len(), 1);
    }

    #[test]
    fn delete_unknown_student_reports_not_found() {
        let mut conn = open_in_memory().unwrap();
        let err = delete_student(&mut conn, 7).unwrap_err();
        assert_eq!(find_store_error(&err), Some(&StoreError::NotFound("Élève")));
    }
}
