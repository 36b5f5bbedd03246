//! Integration tests for the table gateway.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use rusqlite::Connection;

use rowgrid_core::{
    ColumnMap, Criteria, Entity, FieldSet, Mapper, Noun, RowState, Value,
};

static PERSON_MAP: LazyLock<ColumnMap> = LazyLock::new(|| {
    ColumnMap::new()
        .column("id", "id")
        .column("first_name", "first_name")
        .column("last_name", "last_name")
        .column("age", "age")
        .column("email", "email")
        .column("state", "state")
        .expr("full_name", "first_name || ' ' || last_name")
});

#[derive(Debug, Default)]
struct Person {
    fields: FieldSet,
}

impl Entity for Person {
    const RESOURCE: &'static str = "person";
    const NOUN: Noun = Noun {
        singular: "person",
        plural: "people",
    };

    fn column_map() -> &'static ColumnMap {
        &PERSON_MAP
    }

    fn fields(&self) -> &FieldSet {
        &self.fields
    }

    fn fields_mut(&mut self) -> &mut FieldSet {
        &mut self.fields
    }

    fn empty() -> Self {
        Self::default()
    }
}

struct TestContext {
    conn: Connection,
}

impl TestContext {
    fn new() -> Self {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE person (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                first_name TEXT NOT NULL,
                last_name TEXT NOT NULL,
                age INTEGER NOT NULL,
                email TEXT,
                state TEXT NOT NULL DEFAULT 'active'
            );
            "#,
        )
        .unwrap();
        Self { conn }
    }

    fn mapper(&self) -> Mapper<'_, Person> {
        Mapper::new(&self.conn, "person")
            .with_active_predicate(vec![("state".into(), Value::from("active"))])
            .with_deleted_predicate(vec![("state".into(), Value::from("deleted"))])
    }

    fn insert(&self, id: i64, first: &str, last: &str, age: i64, state: &str) {
        self.conn
            .execute(
                "INSERT INTO person (id, first_name, last_name, age, state) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, first, last, age, state],
            )
            .unwrap();
    }
}

fn setup_people(ctx: &TestContext) {
    ctx.insert(10, "Ada", "Lovelace", 36, "active");
    ctx.insert(20, "Alan", "Turing", 41, "active");
    ctx.insert(30, "Grace", "Hopper", 85, "active");
    ctx.insert(40, "Kurt", "Goedel", 71, "deleted");
}

fn person_data(first: &str, last: &str, age: i64) -> BTreeMap<String, Value> {
    let mut data = BTreeMap::new();
    data.insert("first_name".to_string(), Value::from(first));
    data.insert("last_name".to_string(), Value::from(last));
    data.insert("age".to_string(), Value::from(age));
    data.insert("state".to_string(), Value::from("active"));
    data
}

#[test]
fn test_fetch_by_key() {
    let ctx = TestContext::new();
    setup_people(&ctx);
    let mapper = ctx.mapper();

    let person = mapper.fetch(Value::Integer(20)).unwrap().unwrap();
    assert_eq!(person.get_string("first_name"), Some("Alan".into()));

    assert!(mapper.fetch(Value::Integer(999)).unwrap().is_none());
    assert!(mapper.fetch(Value::Null).unwrap().is_none());
}

#[test]
fn test_fetch_respects_row_state() {
    let ctx = TestContext::new();
    setup_people(&ctx);
    let mut mapper = ctx.mapper();

    // Row 40 is deleted; invisible in the default state.
    assert!(mapper.fetch(Value::Integer(40)).unwrap().is_none());

    mapper.set_row_state(RowState::Deleted);
    assert!(mapper.fetch(Value::Integer(40)).unwrap().is_some());
    assert!(mapper.fetch(Value::Integer(10)).unwrap().is_none());

    mapper.set_row_state(RowState::All);
    assert!(mapper.fetch(Value::Integer(40)).unwrap().is_some());
    assert!(mapper.fetch(Value::Integer(10)).unwrap().is_some());
}

#[test]
fn test_fetch_all_counts_per_state() {
    let ctx = TestContext::new();
    setup_people(&ctx);
    let mut mapper = ctx.mapper();

    assert_eq!(mapper.fetch_all().items().unwrap().len(), 3);
    assert_eq!(mapper.count().unwrap(), 3);

    mapper.set_row_state(RowState::Deleted);
    assert_eq!(mapper.count().unwrap(), 1);

    mapper.set_row_state(RowState::All);
    assert_eq!(mapper.count().unwrap(), 4);
}

#[test]
fn test_fetch_by_keys_preserves_input_order() {
    let ctx = TestContext::new();
    setup_people(&ctx);
    let mapper = ctx.mapper();

    let paged = mapper
        .fetch_by_keys(
            &[Value::Integer(30), Value::Integer(10), Value::Integer(20)],
            None,
        )
        .unwrap()
        .unwrap();
    let ids: Vec<_> = paged
        .items()
        .unwrap()
        .iter()
        .filter_map(|p| p.get_i64("id"))
        .collect();
    assert_eq!(ids, vec![30, 10, 20]);
}

#[test]
fn test_fetch_by_keys_empty_is_none() {
    let ctx = TestContext::new();
    setup_people(&ctx);
    assert!(ctx.mapper().fetch_by_keys(&[], None).unwrap().is_none());
}

#[test]
fn test_fetch_by_keys_custom_column() {
    let ctx = TestContext::new();
    setup_people(&ctx);
    let mapper = ctx.mapper();

    let paged = mapper
        .fetch_by_keys(
            &[Value::from("Turing"), Value::from("Lovelace")],
            Some("last_name"),
        )
        .unwrap()
        .unwrap();
    let ids: Vec<_> = paged
        .items()
        .unwrap()
        .iter()
        .filter_map(|p| p.get_i64("id"))
        .collect();
    assert_eq!(ids, vec![20, 10]);

    assert!(mapper
        .fetch_by_keys(&[Value::Integer(1)], Some("no_such_column"))
        .is_err());
}

#[test]
fn test_create_assigns_generated_key() {
    let ctx = TestContext::new();
    let mapper = ctx.mapper();

    let created = mapper.create(&person_data("Ada", "Lovelace", 36)).unwrap().unwrap();
    let key = created.get_i64("id").unwrap();
    assert!(key > 0);

    let fetched = mapper.fetch(Value::Integer(key)).unwrap().unwrap();
    assert_eq!(fetched.get_string("last_name"), Some("Lovelace".into()));
}

#[test]
fn test_create_filters_unknown_and_qualified_keys() {
    let ctx = TestContext::new();
    let mapper = ctx.mapper();

    let mut data = person_data("Ada", "Lovelace", 36);
    data.insert("person.email".to_string(), Value::from("ada@example.org"));
    data.insert("role".to_string(), Value::from("admin"));

    let created = mapper.create(&data).unwrap().unwrap();
    assert_eq!(created.get_string("email"), Some("ada@example.org".into()));
    assert!(created.fields().value("role").is_none());
}

#[test]
fn test_update_with_entity_criteria() {
    let ctx = TestContext::new();
    setup_people(&ctx);
    let mapper = ctx.mapper();

    let person = mapper.fetch(Value::Integer(10)).unwrap().unwrap();
    let mut data = BTreeMap::new();
    data.insert("age".to_string(), Value::Integer(37));

    let affected = mapper.update(&data, Criteria::Entity(&person)).unwrap();
    assert_eq!(affected, 1);
    let person = mapper.fetch(Value::Integer(10)).unwrap().unwrap();
    assert_eq!(person.get_i64("age"), Some(37));
}

#[test]
fn test_update_with_raw_criteria() {
    let ctx = TestContext::new();
    setup_people(&ctx);
    let mapper = ctx.mapper();

    let mut data = BTreeMap::new();
    data.insert("email".to_string(), Value::from("x@example.org"));
    let affected = mapper
        .update(&data, Criteria::Where("\"age\" > ?", vec![Value::Integer(40)]))
        .unwrap();
    // Turing (41), Hopper (85), Goedel (71).
    assert_eq!(affected, 3);
}

#[test]
fn test_mark_deleted_and_active_round_trip() {
    let ctx = TestContext::new();
    setup_people(&ctx);
    let mapper = ctx.mapper();

    let criteria = || Criteria::Where("\"id\" = ?", vec![Value::Integer(10)]);
    assert_eq!(mapper.mark_deleted(criteria()).unwrap(), Some(1));
    assert!(mapper.fetch(Value::Integer(10)).unwrap().is_none());

    // Second call lands in the same state, without error.
    assert_eq!(mapper.mark_deleted(criteria()).unwrap(), Some(1));

    assert_eq!(mapper.mark_active(criteria()).unwrap(), Some(1));
    assert!(mapper.fetch(Value::Integer(10)).unwrap().is_some());
}

#[test]
fn test_mark_deleted_without_predicates_is_unsupported() {
    let ctx = TestContext::new();
    setup_people(&ctx);
    let mapper: Mapper<'_, Person> = Mapper::new(&ctx.conn, "person");

    let outcome = mapper
        .mark_deleted(Criteria::Where("\"id\" = ?", vec![Value::Integer(10)]))
        .unwrap();
    assert_eq!(outcome, None);
    // The row is untouched.
    let mapper = ctx.mapper();
    assert!(mapper.fetch(Value::Integer(10)).unwrap().is_some());
}

#[test]
fn test_upsert_inserts_then_updates_in_place() {
    let ctx = TestContext::new();
    let mapper = ctx.mapper();

    let mut data = person_data("Ada", "Lovelace", 36);
    data.insert("id".to_string(), Value::Integer(7));
    let key = mapper.upsert(&data).unwrap();
    assert_eq!(key, 7);

    let mut data = person_data("Ada", "King", 37);
    data.insert("id".to_string(), Value::Integer(7));
    let key = mapper.upsert(&data).unwrap();
    assert_eq!(key, 7);

    let person = mapper.fetch(Value::Integer(7)).unwrap().unwrap();
    assert_eq!(person.get_string("last_name"), Some("King".into()));
    assert_eq!(person.get_i64("age"), Some(37));
    assert_eq!(mapper.count().unwrap(), 1);
}

#[test]
fn test_upsert_override_expression_wins() {
    let ctx = TestContext::new();
    let mapper = ctx.mapper();

    let mut data = person_data("Ada", "Lovelace", 36);
    data.insert("id".to_string(), Value::Integer(7));
    mapper.upsert(&data).unwrap();

    let mut overrides = BTreeMap::new();
    overrides.insert("age".to_string(), "\"age\" + 1".to_string());
    let key = mapper.upsert_with(&data, &overrides).unwrap();
    assert_eq!(key, 7);

    let person = mapper.fetch(Value::Integer(7)).unwrap().unwrap();
    // The override ignored the inserted value and bumped the stored one.
    assert_eq!(person.get_i64("age"), Some(37));
}

#[test]
fn test_hydrated_entities_round_trip_through_writes() {
    let ctx = TestContext::new();
    setup_people(&ctx);
    let mapper = ctx.mapper();

    let mut person = mapper.fetch(Value::Integer(20)).unwrap().unwrap();
    assert!(person.changes().is_empty());

    person.set("age", 42);
    let changes = person.changes();
    assert_eq!(changes.len(), 1);

    let affected = mapper.update(&changes, Criteria::Entity(&person)).unwrap();
    assert_eq!(affected, 1);
    let person = mapper.fetch(Value::Integer(20)).unwrap().unwrap();
    assert_eq!(person.get_i64("age"), Some(42));
}
