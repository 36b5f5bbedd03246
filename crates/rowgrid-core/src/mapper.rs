//! Table gateways.
//!
//! A `Mapper` mediates all reads and writes for one table. Its column
//! whitelist and primary key come from the live schema catalog (`PRAGMA
//! table_info`), discovered once per gateway instance and cached, so the
//! gateway follows schema changes across processes without a code change.
//! Every query it builds starts from [`Mapper::base_query`], which applies
//! the row-state predicate — soft deletion is a state transition here,
//! never a physical DELETE.

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::marker::PhantomData;

use rusqlite::Connection;
use tracing::debug;

use crate::entity::Entity;
use crate::error::Error;
use crate::paged::{PagedResult, PageSize};
use crate::query::{quote_ident, OrderClause, SelectQuery};
use crate::value::Value;

/// Tri-state soft-delete visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RowState {
    /// Rows matching the active predicate.
    #[default]
    Active,
    /// Rows matching the deleted predicate.
    Deleted,
    /// No row-state filtering.
    All,
}

/// Row selection for update-style operations.
#[derive(Debug)]
pub enum Criteria<'a, E: Entity> {
    /// A raw predicate with bound parameters.
    Where(&'a str, Vec<Value>),
    /// Match this entity's primary key.
    Entity(&'a E),
}

/// Discovered schema metadata for one table.
#[derive(Debug, Clone)]
struct TableSchema {
    columns: Vec<String>,
    primary_key: Vec<String>,
}

/// A gateway bound to one table and one entity type.
#[derive(Debug)]
pub struct Mapper<'c, E: Entity> {
    conn: &'c Connection,
    table: String,
    row_state: RowState,
    active_predicate: Option<Vec<(String, Value)>>,
    deleted_predicate: Option<Vec<(String, Value)>>,
    schema: OnceCell<TableSchema>,
    _entity: PhantomData<E>,
}

impl<'c, E: Entity> Mapper<'c, E> {
    /// Create a gateway over a table, with row-state filtering disabled.
    pub fn new(conn: &'c Connection, table: impl Into<String>) -> Self {
        Self {
            conn,
            table: table.into(),
            row_state: RowState::default(),
            active_predicate: None,
            deleted_predicate: None,
            schema: OnceCell::new(),
            _entity: PhantomData,
        }
    }

    /// Declare the column values that mark a row active.
    pub fn with_active_predicate(mut self, pairs: Vec<(String, Value)>) -> Self {
        self.active_predicate = Some(pairs);
        self
    }

    /// Declare the column values that mark a row deleted.
    pub fn with_deleted_predicate(mut self, pairs: Vec<(String, Value)>) -> Self {
        self.deleted_predicate = Some(pairs);
        self
    }

    /// Set the initial row state.
    pub fn with_row_state(mut self, state: RowState) -> Self {
        self.row_state = state;
        self
    }

    /// The table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The current row state.
    pub fn row_state(&self) -> RowState {
        self.row_state
    }

    /// Switch the row state for subsequent queries.
    pub fn set_row_state(&mut self, state: RowState) {
        self.row_state = state;
    }

    /// Row-state filtering requires both predicates to be declared.
    fn state_enabled(&self) -> bool {
        self.active_predicate.is_some() && self.deleted_predicate.is_some()
    }

    fn discover(&self) -> Result<TableSchema, Error> {
        let sql = format!("PRAGMA table_info({})", quote_ident(&self.table));
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;

        let mut columns = Vec::new();
        let mut keyed: Vec<(i64, String)> = Vec::new();
        while let Some(row) = rows.next()? {
            let name: String = row.get(1)?;
            let pk_ordinal: i64 = row.get(5)?;
            if pk_ordinal > 0 {
                keyed.push((pk_ordinal, name.clone()));
            }
            columns.push(name);
        }
        if columns.is_empty() {
            return Err(Error::UnknownTable(self.table.clone()));
        }
        keyed.sort_by_key(|(ordinal, _)| *ordinal);

        let schema = TableSchema {
            columns,
            primary_key: keyed.into_iter().map(|(_, name)| name).collect(),
        };
        debug!(
            table = %self.table,
            columns = schema.columns.len(),
            primary_key = ?schema.primary_key,
            "discovered table schema"
        );
        Ok(schema)
    }

    fn schema(&self) -> Result<&TableSchema, Error> {
        if let Some(schema) = self.schema.get() {
            return Ok(schema);
        }
        let schema = self.discover()?;
        Ok(self.schema.get_or_init(|| schema))
    }

    /// The table's column whitelist.
    pub fn columns(&self) -> Result<&[String], Error> {
        Ok(&self.schema()?.columns)
    }

    /// The table's primary key as an ordered column tuple.
    pub fn primary_key(&self) -> Result<&[String], Error> {
        let schema = self.schema()?;
        if schema.primary_key.is_empty() {
            return Err(Error::NoPrimaryKey(self.table.clone()));
        }
        Ok(&schema.primary_key)
    }

    fn primary_key_column(&self) -> Result<&str, Error> {
        Ok(&self.primary_key()?[0])
    }

    /// The SELECT every other query starts from, with the current row
    /// state's predicate applied.
    pub fn base_query(&self) -> SelectQuery {
        let mut query = SelectQuery::new(&self.table);
        if self.state_enabled() {
            let predicate = match self.row_state {
                RowState::Active => self.active_predicate.as_deref(),
                RowState::Deleted => self.deleted_predicate.as_deref(),
                RowState::All => None,
            };
            if let Some(pairs) = predicate {
                for (column, value) in pairs {
                    query.where_eq(column, value.clone());
                }
            }
        }
        query
    }

    /// Fetch one entity by primary key. A null key and a missing row both
    /// yield `None`.
    pub fn fetch(&self, key: Value) -> Result<Option<E>, Error> {
        if key.is_null() {
            return Ok(None);
        }
        let pk = self.primary_key_column()?.to_string();
        let mut query = self.base_query();
        query.where_eq(&pk, key);

        let mut paged = PagedResult::new(self.conn, query);
        paged.set_page(PageSize::Limited(1), 1);
        Ok(paged.items()?.into_iter().next())
    }

    /// Fetch every visible row, unbounded on page 1.
    pub fn fetch_all(&self) -> PagedResult<'c, E> {
        PagedResult::new(self.conn, self.base_query())
    }

    /// Fetch the rows whose `column` (primary key if unspecified) is in
    /// `values`, ordered to match the input order of `values`.
    ///
    /// An empty values list yields `None`, not an error.
    pub fn fetch_by_keys(
        &self,
        values: &[Value],
        column: Option<&str>,
    ) -> Result<Option<PagedResult<'c, E>>, Error> {
        if values.is_empty() {
            return Ok(None);
        }
        let column = match column {
            Some(name) => {
                if !self.columns()?.iter().any(|c| c == name) {
                    return Err(Error::UnknownColumn {
                        table: self.table.clone(),
                        column: name.to_string(),
                    });
                }
                name.to_string()
            }
            None => self.primary_key_column()?.to_string(),
        };

        let mut query = self.base_query();
        query.where_in(&column, values);
        query.order_by(positional_order(&column, values));
        Ok(Some(PagedResult::new(self.conn, query)))
    }

    /// Row count for the current row state.
    pub fn count(&self) -> Result<u64, Error> {
        PagedResult::<E>::new(self.conn, self.base_query()).total()
    }

    /// Insert a whitelisted row and return the persisted entity with its
    /// generated key assigned. `None` when the driver reports zero rows
    /// affected.
    pub fn create(&self, data: &BTreeMap<String, Value>) -> Result<Option<E>, Error> {
        let row = self.filter_columns(data)?;
        if row.is_empty() {
            return Err(Error::InvalidPayload(format!(
                "no writable columns for table {}",
                self.table
            )));
        }

        let columns: Vec<String> = row.keys().map(|c| quote_ident(c)).collect();
        let placeholders = vec!["?"; row.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            quote_ident(&self.table),
            columns.join(", ")
        );
        let affected = self.conn.execute(
            &sql,
            rusqlite::params_from_iter(row.values()),
        )?;
        if affected == 0 {
            return Ok(None);
        }

        let key = self.conn.last_insert_rowid();
        debug!(table = %self.table, key, "inserted row");

        let mut entity = E::empty();
        let inverse = E::column_map().inverse();
        for (column, value) in &row {
            match inverse.get(column.as_str()) {
                Some(field) => entity.fields_mut().load(*field, value.clone()),
                None => entity.fields_mut().load(column.clone(), value.clone()),
            }
        }
        let pk = self.primary_key_column()?;
        match inverse.get(pk) {
            Some(field) => entity.fields_mut().load(*field, Value::Integer(key)),
            None => entity.fields_mut().load(pk.to_string(), Value::Integer(key)),
        }
        entity.fields_mut().clear_modified();
        Ok(Some(entity))
    }

    /// Update whitelisted columns on the rows selected by `criteria`,
    /// returning the affected row count.
    pub fn update(
        &self,
        data: &BTreeMap<String, Value>,
        criteria: Criteria<'_, E>,
    ) -> Result<usize, Error> {
        let row = self.filter_columns(data)?;
        if row.is_empty() {
            return Ok(0);
        }

        let (where_sql, where_params) = self.criteria_to_where(criteria)?;
        let assignments: Vec<String> = row
            .keys()
            .map(|column| format!("{} = ?", quote_ident(column)))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {where_sql}",
            quote_ident(&self.table),
            assignments.join(", ")
        );

        let params: Vec<&Value> = row.values().chain(where_params.iter()).collect();
        let affected = self.conn.execute(&sql, rusqlite::params_from_iter(params))?;
        debug!(table = %self.table, affected, "updated rows");
        Ok(affected)
    }

    /// Transition the selected rows to the deleted state.
    ///
    /// `None` when the table declares no row-state predicates; otherwise
    /// the affected row count. Repeating the call is a no-op, not an
    /// error.
    pub fn mark_deleted(&self, criteria: Criteria<'_, E>) -> Result<Option<usize>, Error> {
        if !self.state_enabled() {
            return Ok(None);
        }
        let pairs = self.deleted_predicate.clone().unwrap_or_default();
        let data: BTreeMap<String, Value> = pairs.into_iter().collect();
        Ok(Some(self.update(&data, criteria)?))
    }

    /// Transition the selected rows back to the active state.
    pub fn mark_active(&self, criteria: Criteria<'_, E>) -> Result<Option<usize>, Error> {
        if !self.state_enabled() {
            return Ok(None);
        }
        let pairs = self.active_predicate.clone().unwrap_or_default();
        let data: BTreeMap<String, Value> = pairs.into_iter().collect();
        Ok(Some(self.update(&data, criteria)?))
    }

    /// Insert-or-update. On conflict the primary key re-asserts the
    /// existing key (so the returned key is the matched row's), and every
    /// other column takes the inserted value. Returns the row key.
    pub fn upsert(&self, data: &BTreeMap<String, Value>) -> Result<i64, Error> {
        self.upsert_with(data, &BTreeMap::new())
    }

    /// [`Mapper::upsert`], with explicit replacement expressions for
    /// selected columns (e.g. `views` → `views + 1`).
    pub fn upsert_with(
        &self,
        data: &BTreeMap<String, Value>,
        overrides: &BTreeMap<String, String>,
    ) -> Result<i64, Error> {
        let row = self.filter_columns(data)?;
        if row.is_empty() {
            return Err(Error::InvalidPayload(format!(
                "no writable columns for table {}",
                self.table
            )));
        }
        let primary_key = self.primary_key()?.to_vec();

        let columns: Vec<String> = row.keys().map(|c| quote_ident(c)).collect();
        let placeholders = vec!["?"; row.len()].join(", ");
        let conflict: Vec<String> = primary_key.iter().map(|c| quote_ident(c)).collect();

        let mut assignments: Vec<String> = primary_key
            .iter()
            .map(|pk| format!("{0} = {0}", quote_ident(pk)))
            .collect();
        for column in row.keys() {
            if primary_key.iter().any(|pk| pk == column) {
                continue;
            }
            let assignment = match overrides.get(column) {
                Some(expression) => format!("{} = {expression}", quote_ident(column)),
                None => format!("{0} = excluded.{0}", quote_ident(column)),
            };
            assignments.push(assignment);
        }

        // RETURNING reports the matched row's key on the update branch,
        // where last_insert_rowid() would be stale.
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders}) ON CONFLICT({}) DO UPDATE SET {} RETURNING {}",
            quote_ident(&self.table),
            columns.join(", "),
            conflict.join(", "),
            assignments.join(", "),
            quote_ident(&primary_key[0])
        );
        let key: i64 = self.conn.query_row(
            &sql,
            rusqlite::params_from_iter(row.values()),
            |row| row.get(0),
        )?;
        Ok(key)
    }

    /// Restrict a write payload to whitelisted columns, stripping a
    /// `"table."` qualifier prefix first. Runs on every write path.
    pub fn filter_columns(
        &self,
        data: &BTreeMap<String, Value>,
    ) -> Result<BTreeMap<String, Value>, Error> {
        let whitelist = self.columns()?;
        let prefix = format!("{}.", self.table);

        let mut row = BTreeMap::new();
        for (key, value) in data {
            let name = key.strip_prefix(&prefix).unwrap_or(key);
            if whitelist.iter().any(|c| c == name) {
                row.insert(name.to_string(), value.clone());
            }
        }
        Ok(row)
    }

    fn criteria_to_where(&self, criteria: Criteria<'_, E>) -> Result<(String, Vec<Value>), Error> {
        match criteria {
            Criteria::Where(sql, params) => Ok((sql.to_string(), params)),
            Criteria::Entity(entity) => {
                let inverse = E::column_map().inverse();
                let mut parts = Vec::new();
                let mut params = Vec::new();
                for column in self.primary_key()? {
                    let value = match inverse.get(column.as_str()) {
                        Some(field) => entity.get(field),
                        None => entity
                            .fields()
                            .value(column)
                            .cloned()
                            .unwrap_or(Value::Null),
                    };
                    if value.is_null() {
                        return Err(Error::InvalidPayload(format!(
                            "entity carries no value for primary key column {column}"
                        )));
                    }
                    parts.push(format!("({} = ?)", quote_ident(column)));
                    params.push(value);
                }
                Ok((parts.join(" AND "), params))
            }
        }
    }
}

/// An ORDER BY expression ranking rows by their position in `values`.
fn positional_order(column: &str, values: &[Value]) -> OrderClause {
    let mut sql = format!("CASE {} ", quote_ident(column));
    for index in 0..values.len() {
        sql.push_str(&format!("WHEN ? THEN {index} "));
    }
    sql.push_str(&format!("ELSE {} END", values.len()));
    OrderClause::with_params(sql, values.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column_map::ColumnMap;
    use crate::entity::{FieldSet, Noun};
    use std::sync::LazyLock;

    static MAP: LazyLock<ColumnMap> = LazyLock::new(|| {
        ColumnMap::new()
            .column("id", "id")
            .column("name", "name")
            .column("state", "state")
    });

    #[derive(Debug, Default)]
    struct Widget {
        fields: FieldSet,
    }

    impl Entity for Widget {
        const RESOURCE: &'static str = "widget";
        const NOUN: Noun = Noun {
            singular: "widget",
            plural: "widgets",
        };

        fn column_map() -> &'static ColumnMap {
            &MAP
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

    fn fixture() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE widget (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                state TEXT NOT NULL DEFAULT 'active'
            );
            "#,
        )
        .unwrap();
        conn
    }

    fn soft_delete_mapper<'c>(conn: &'c Connection) -> Mapper<'c, Widget> {
        Mapper::new(conn, "widget")
            .with_active_predicate(vec![("state".into(), Value::from("active"))])
            .with_deleted_predicate(vec![("state".into(), Value::from("deleted"))])
    }

    #[test]
    fn test_unknown_table_is_fatal() {
        let conn = fixture();
        let mapper: Mapper<'_, Widget> = Mapper::new(&conn, "nope");
        assert!(matches!(mapper.columns(), Err(Error::UnknownTable(_))));
    }

    #[test]
    fn test_schema_discovery() {
        let conn = fixture();
        let mapper: Mapper<'_, Widget> = Mapper::new(&conn, "widget");
        assert_eq!(mapper.columns().unwrap(), ["id", "name", "state"]);
        assert_eq!(mapper.primary_key().unwrap(), ["id"]);
    }

    #[test]
    fn test_filter_columns_strips_qualifier_and_unknown_keys() {
        let conn = fixture();
        let mapper: Mapper<'_, Widget> = Mapper::new(&conn, "widget");

        let mut data = BTreeMap::new();
        data.insert("widget.name".to_string(), Value::from("a"));
        data.insert("state".to_string(), Value::from("active"));
        data.insert("evil'); DROP TABLE widget; --".to_string(), Value::Null);

        let row = mapper.filter_columns(&data).unwrap();
        assert_eq!(row.len(), 2);
        assert!(row.contains_key("name"));
        assert!(row.contains_key("state"));
    }

    #[test]
    fn test_base_query_states_are_exclusive() {
        let conn = fixture();
        let mut mapper = soft_delete_mapper(&conn);

        let (active_sql, active_params) = mapper.base_query().build();
        mapper.set_row_state(RowState::Deleted);
        let (deleted_sql, deleted_params) = mapper.base_query().build();
        mapper.set_row_state(RowState::All);
        let (all_sql, _) = mapper.base_query().build();

        assert_eq!(active_sql, deleted_sql);
        assert_ne!(active_params, deleted_params);
        assert!(!all_sql.contains("WHERE"));
    }

    #[test]
    fn test_base_query_without_predicates_filters_nothing() {
        let conn = fixture();
        let mapper: Mapper<'_, Widget> = Mapper::new(&conn, "widget");
        let (sql, _) = mapper.base_query().build();
        assert!(!sql.contains("WHERE"));
    }

    #[test]
    fn test_mark_deleted_unconfigured_reports_no_support() {
        let conn = fixture();
        let mapper: Mapper<'_, Widget> = Mapper::new(&conn, "widget");
        let outcome = mapper
            .mark_deleted(Criteria::Where("\"id\" = ?", vec![Value::Integer(1)]))
            .unwrap();
        assert_eq!(outcome, None);
    }

    #[test]
    fn test_positional_order_expression() {
        let clause = positional_order("id", &[Value::Integer(3), Value::Integer(1)]);
        assert_eq!(clause.sql(), "CASE \"id\" WHEN ? THEN 0 WHEN ? THEN 1 ELSE 2 END");
    }
}
