use litemodel::prelude::*;

#[derive(Debug, Clone, PartialEq, Table)]
struct Student {
    #[litemodel(primary_key, autoincrement)]
    id: i64,
    #[litemodel(unique)]
    name: String,
    year: i32,
    gpa: Option<f64>,
}

fn student(name: &str, year: i32, gpa: Option<f64>) -> Student {
    Student {
        id: 0,
        name: name.to_string(),
        year,
        gpa,
    }
}

fn open() -> Database<SqliteConnection> {
    let db = Database::open(&SqliteConfig::memory(), Schema::new().table::<Student>()).unwrap();
    db.create_tables(true).unwrap();
    db
}

fn roster() -> Vec<Student> {
    vec![
        student("Ann", 1, Some(3.9)),
        student("Ben", 1, Some(2.4)),
        student("Cal", 2, Some(3.0)),
        student("Dee", 2, Some(2.99)),
        student("Eve", 2, Some(3.5)),
        student("Fay", 3, Some(1.8)),
        student("Gus", 3, None),
        student("Hal", 4, Some(2.0)),
        student("Ivy", 4, Some(3.7)),
    ]
}

#[test]
fn insert_find_update_round_trip() {
    let db = open();
    let mut ann = student("Ann", 2, None);
    let rowid = db.insert_record(&mut ann).unwrap();
    assert_eq!(rowid, 1);
    assert_eq!(ann.id, 1);

    let found: Student = db.find_record(ann.id).unwrap().unwrap();
    assert_eq!(found, ann);
    assert_eq!(found.gpa, None);

    ann.gpa = Some(3.14);
    assert_eq!(db.update_record(&ann).unwrap(), 1);
    let found: Student = db.find_record(ann.id).unwrap().unwrap();
    assert_eq!(found.gpa, Some(3.14));

    assert!(db.find_record::<Student>(99).unwrap().is_none());

    assert_eq!(db.delete_record(&ann).unwrap(), 1);
    assert!(db.find_record::<Student>(ann.id).unwrap().is_none());
}

#[test]
fn count_below_threshold() {
    let db = open();
    let records = roster();
    assert_eq!(db.insert_many_records(&records).unwrap(), 9);

    let expected = records
        .iter()
        .filter(|s| s.gpa.is_some_and(|g| g < 3.0))
        .count() as i64;
    let weak = db
        .select_query(count_all())
        .from::<Student>()
        .filter(Student::GPA.lt(3.0))
        .one()
        .unwrap();
    assert_eq!(weak, expected);
    assert_eq!(weak, 4);
}

#[test]
fn group_by_year() {
    let db = open();
    db.insert_many_records(&roster()).unwrap();

    let per_year = db
        .select_query((count_all(), Student::YEAR))
        .from::<Student>()
        .group_by(Student::YEAR)
        .order_by(Student::YEAR, Direction::Asc)
        .all()
        .unwrap();
    assert_eq!(
        per_year,
        vec![
            (Some(2), Some(1)),
            (Some(3), Some(2)),
            (Some(2), Some(3)),
            (Some(2), Some(4)),
        ]
    );
}

#[test]
fn rebind_reuses_statement() {
    let db = open();
    db.insert_many_records(&roster()).unwrap();

    let mut by_year = db
        .select_query(Student::NAME)
        .filter(Student::YEAR.eq(1))
        .order_by(Student::NAME, Direction::Asc)
        .prepare()
        .unwrap();
    let sql = by_year.sql().to_string();
    assert_eq!(by_year.all().unwrap(), vec!["Ann", "Ben"]);

    by_year.rebind(&Student::YEAR.eq(3)).unwrap();
    assert_eq!(by_year.sql(), sql);
    assert_eq!(by_year.all().unwrap(), vec!["Fay", "Gus"]);
}

#[test]
fn filters_compose() {
    let db = open();
    db.insert_many_records(&roster()).unwrap();

    let names = db
        .select_query(Student::NAME)
        .filter(Student::YEAR.is_in([2, 4]))
        .filter(Student::GPA.ge(3.0) | Student::NAME.like("D%"))
        .order_by(Student::NAME, Direction::Asc)
        .all()
        .unwrap();
    assert_eq!(names, vec!["Cal", "Dee", "Eve", "Ivy"]);

    let missing = db
        .select_query(all::<Student>())
        .filter(Student::GPA.is_null())
        .one()
        .unwrap();
    assert_eq!(missing.name, "Gus");

    let top = db
        .select_query(all::<Student>())
        .order_by(Student::GPA, Direction::Desc)
        .limit_offset(2, 1)
        .all()
        .unwrap();
    let names: Vec<&str> = top.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Ivy", "Eve"]);
}

#[test]
fn delete_query_and_truncate() {
    let db = open();
    db.insert_many_records(&roster()).unwrap();

    let removed = db
        .delete_query::<Student>()
        .filter(Student::YEAR.eq(4))
        .execute()
        .unwrap();
    assert_eq!(removed, 2);

    let left = db.select_query(count(Student::ID)).one().unwrap();
    assert_eq!(left, 7);

    db.truncate::<Student>().unwrap();
    assert_eq!(db.select_query(count(Student::ID)).one().unwrap(), 0);
}

#[test]
fn transaction_rolls_back_on_error() {
    let db = open();

    let err = db
        .transaction(|db| {
            db.insert_record(&mut student("Ann", 1, None))?;
            db.insert_record(&mut student("Ann", 2, None))
        })
        .unwrap_err();
    assert_eq!(err.constraint_kind(), Some(ConstraintKind::Unique));
    assert_eq!(db.select_query(count_all()).from::<Student>().one().unwrap(), 0);

    let ids = db
        .transaction(|db| {
            let a = db.insert_record(&mut student("Ann", 1, None))?;
            let b = db.insert_record(&mut student("Ben", 1, None))?;
            Ok((a, b))
        })
        .unwrap();
    assert_eq!(ids, (1, 2));
    assert_eq!(db.select_query(count_all()).from::<Student>().one().unwrap(), 2);
}

#[derive(Debug, Clone, PartialEq, Table)]
struct Tag {
    label: String,
    weight: i32,
}

#[test]
fn group_by_every_column_without_a_key() {
    let db = Database::open(&SqliteConfig::memory(), Schema::new().table::<Tag>()).unwrap();
    db.create_tables(false).unwrap();
    let tag = |label: &str, weight| Tag {
        label: label.to_string(),
        weight,
    };
    db.insert_many_records(&[tag("x", 1), tag("x", 1), tag("x", 2), tag("y", 2)])
        .unwrap();

    let groups = db
        .select_query((Tag::LABEL, Tag::WEIGHT, count_all()))
        .group_by(all::<Tag>())
        .order_by(Tag::LABEL, Direction::Asc)
        .all()
        .unwrap();
    let mut groups: Vec<(String, i32, i64)> = groups
        .into_iter()
        .map(|(l, w, c)| (l.unwrap(), w.unwrap(), c.unwrap()))
        .collect();
    groups.sort();
    assert_eq!(
        groups,
        vec![
            ("x".to_string(), 1, 2),
            ("x".to_string(), 2, 1),
            ("y".to_string(), 2, 1),
        ]
    );
}
