use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use cours_prive::db::{
    add_grade, add_lesson, add_message, add_payment, create_student, delete_student,
    list_lessons, list_messages, list_payments, list_students, mark_message_read, open_store,
};
use cours_prive::error::find_store_error;
use cours_prive::reports::compute_average;
use cours_prive::{Grade, GradeAverage, StoreError, StudentFields};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn student(code: &str, last: &str, first: &str) -> StudentFields {
    StudentFields {
        code: code.into(),
        last_name: last.into(),
        first_name: first.into(),
        classe: "3e".into(),
        ..StudentFields::default()
    }
}

#[test]
fn records_survive_reopening_the_store() {
    let dir = temp_dir("cours-prive-reopen");
    let db_path = dir.join("data.db");

    let id = {
        let conn = open_store(&db_path).expect("open store");
        let id = create_student(&conn, &student("E01", "Diallo", "Awa")).expect("create");
        add_lesson(&conn, id, "2025-10-01", "Fractions", 60, "bien").expect("lesson");
        add_payment(&conn, id, "2025-10-02", 15000.0, "espèces", "").expect("payment");
        id
    };

    let conn = open_store(&db_path).expect("reopen store");
    let students = list_students(&conn, None).expect("list");
    assert_eq!(students.len(), 1);
    assert_eq!(students[0].id, id);
    assert_eq!(list_lessons(&conn, id).expect("lessons").len(), 1);
    assert_eq!(list_payments(&conn, id).expect("payments")[0].amount, 15000.0);
}

#[test]
fn duplicate_code_is_rejected_and_first_row_kept() {
    let dir = temp_dir("cours-prive-duplicate");
    let conn = open_store(&dir.join("data.db")).expect("open store");

    create_student(&conn, &student("E01", "Diallo", "Awa")).expect("create");
    let err = create_student(&conn, &student("E01", "Ba", "Moussa")).unwrap_err();
    assert!(matches!(
        find_store_error(&err),
        Some(StoreError::DuplicateCode(code)) if code == "E01"
    ));

    let students = list_students(&conn, None).expect("list");
    assert_eq!(students.len(), 1);
    assert_eq!(students[0].first_name, "Awa");
}

#[test]
fn deleting_a_student_removes_every_dependent_row() {
    let dir = temp_dir("cours-prive-cascade");
    let mut conn = open_store(&dir.join("data.db")).expect("open store");

    let gone = create_student(&conn, &student("E01", "Diallo", "Awa")).expect("create");
    let kept = create_student(&conn, &student("E02", "Ba", "Moussa")).expect("create");
    for id in [gone, kept] {
        add_lesson(&conn, id, "2025-10-01", "Algèbre", 60, "").expect("lesson");
        add_payment(&conn, id, "2025-10-01", 5000.0, "carte", "").expect("payment");
        add_message(&conn, id, "Prof", "Rappel").expect("message");
    }

    delete_student(&mut conn, gone).expect("delete");

    for table in ["lessons", "payments", "messages"] {
        let count: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {table} WHERE student_id = ?1"),
                [gone],
                |row| row.get(0),
            )
            .expect("count");
        assert_eq!(count, 0, "rows left in {table}");
    }
    assert_eq!(list_lessons(&conn, kept).expect("lessons").len(), 1);
    assert_eq!(list_messages(&conn, kept).expect("messages").len(), 1);
}

#[test]
fn average_mixes_structured_and_legacy_grades() {
    let dir = temp_dir("cours-prive-average");
    let conn = open_store(&dir.join("data.db")).expect("open store");
    let id = create_student(&conn, &student("E01", "Diallo", "Awa")).expect("create");

    add_grade(
        &conn,
        id,
        "2025-10-01",
        "Contrôle 1",
        &Grade {
            value: 15.0,
            comment: "bien".into(),
        },
    )
    .expect("grade");
    add_lesson(&conn, id, "2025-10-02", "Contrôle 2", 0, "9.5 | moyen").expect("lesson");
    add_lesson(&conn, id, "2025-10-03", "Révision", 60, "revoir les fractions").expect("lesson");

    match compute_average(&conn, id).expect("average") {
        GradeAverage::Mean { mean, count } => {
            assert_eq!(count, 2);
            assert!((mean - 12.25).abs() < 1e-9);
        }
        GradeAverage::NoGrades => panic!("expected a mean"),
    }
}

#[test]
fn search_matches_substrings_of_names_and_codes() {
    let dir = temp_dir("cours-prive-search");
    let conn = open_store(&dir.join("data.db")).expect("open store");
    create_student(&conn, &student("E01", "Martin", "Léa")).expect("create");
    create_student(&conn, &student("E02", "Diallo", "Omar")).expect("create");
    create_student(&conn, &student("E03", "Ba", "Moussa")).expect("create");

    let codes = |filter: &str| -> Vec<String> {
        list_students(&conn, Some(filter))
            .expect("search")
            .into_iter()
            .map(|s| s.code)
            .collect()
    };
    assert_eq!(codes("mar"), vec!["E02".to_string()]);
    assert_eq!(codes("Mar"), vec!["E01".to_string()]);
    assert_eq!(codes("E0").len(), 3);
    assert!(codes("zzz").is_empty());
}

#[test]
fn messages_start_unread_until_marked() {
    let dir = temp_dir("cours-prive-messages");
    let conn = open_store(&dir.join("data.db")).expect("open store");
    let id = create_student(&conn, &student("E01", "Diallo", "Awa")).expect("create");

    let first = add_message(&conn, id, "Prof", "Cours décalé").expect("message");
    add_message(&conn, id, "Parent", "Merci").expect("message");

    mark_message_read(&conn, first).expect("mark read");
    let messages = list_messages(&conn, id).expect("messages");
    let read: Vec<bool> = messages
        .iter()
        .map(|m| (m.id == first) == m.read)
        .collect();
    assert_eq!(read, vec![true, true]);
}
