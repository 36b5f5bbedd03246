//! Parameterized SELECT construction.
//!
//! `SelectQuery` assembles SQL text with `?` placeholders only; values are
//! carried alongside and bound by the driver. Predicates live in two
//! buckets: the primary WHERE conjuncts owned by the mapper, and a
//! secondary filter bucket used by grid refinement so generated expression
//! predicates never disturb the caller's WHERE. The secondary bucket
//! renders as HAVING when the query is grouped, as a trailing WHERE
//! conjunct otherwise.

use crate::value::Value;

/// Quote an identifier for SQL text.
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// One predicate: SQL text plus its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    sql: String,
    params: Vec<Value>,
}

impl Predicate {
    /// Create a predicate from SQL text and parameters.
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// The predicate SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// One ORDER BY clause, with parameters for positional expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderClause {
    sql: String,
    params: Vec<Value>,
}

impl OrderClause {
    /// Create a plain ordering clause, e.g. `"age" DESC`.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Create an ordering clause carrying bound parameters.
    pub fn with_params(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// The clause SQL text.
    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// A buildable SELECT over one table.
#[derive(Debug, Clone)]
pub struct SelectQuery {
    table: String,
    columns: Vec<String>,
    wheres: Vec<Predicate>,
    filters: Vec<Predicate>,
    group_by: Vec<String>,
    orders: Vec<OrderClause>,
    limit: Option<u64>,
    offset: u64,
}

impl SelectQuery {
    /// Start a SELECT over a table.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            wheres: Vec::new(),
            filters: Vec::new(),
            group_by: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: 0,
        }
    }

    /// The table this query selects from.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Replace the selected column list (raw SQL select expressions).
    /// Empty means `*`.
    pub fn select(&mut self, columns: Vec<String>) {
        self.columns = columns;
    }

    /// Conjoin a predicate onto the primary WHERE.
    pub fn and_where(&mut self, sql: impl Into<String>, params: Vec<Value>) {
        self.wheres.push(Predicate::new(sql, params));
    }

    /// Conjoin a `column = ?` predicate onto the primary WHERE.
    pub fn where_eq(&mut self, column: &str, value: Value) {
        self.and_where(format!("{} = ?", quote_ident(column)), vec![value]);
    }

    /// Conjoin a `column IN (...)` predicate onto the primary WHERE.
    pub fn where_in(&mut self, column: &str, values: &[Value]) {
        let placeholders = vec!["?"; values.len()].join(", ");
        self.and_where(
            format!("{} IN ({placeholders})", quote_ident(column)),
            values.to_vec(),
        );
    }

    /// Conjoin a predicate onto the secondary filter bucket.
    pub fn and_filter(&mut self, sql: impl Into<String>, params: Vec<Value>) {
        self.filters.push(Predicate::new(sql, params));
    }

    /// Append a GROUP BY column.
    pub fn group_by(&mut self, column: impl Into<String>) {
        self.group_by.push(column.into());
    }

    /// Append an ORDER BY clause.
    pub fn order_by(&mut self, clause: OrderClause) {
        self.orders.push(clause);
    }

    /// Remove and return all ORDER BY clauses, leaving the query unsorted.
    pub fn take_orders(&mut self) -> Vec<OrderClause> {
        std::mem::take(&mut self.orders)
    }

    /// The current ORDER BY clauses.
    pub fn orders(&self) -> &[OrderClause] {
        &self.orders
    }

    /// Set or clear LIMIT/OFFSET.
    pub fn set_limit(&mut self, limit: Option<u64>, offset: u64) {
        self.limit = limit;
        self.offset = offset;
    }

    /// Build the SQL text and its parameter list.
    pub fn build(&self) -> (String, Vec<Value>) {
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        let mut sql = format!("SELECT {columns} FROM {}", quote_ident(&self.table));
        let mut params = Vec::new();

        let mut conjuncts: Vec<String> =
            self.wheres.iter().map(|p| format!("({})", p.sql)).collect();
        for p in &self.wheres {
            params.extend(p.params.iter().cloned());
        }

        // Without a GROUP BY the filter bucket folds into the WHERE; the
        // backend accepts expressions there and rejects a bare HAVING.
        let mut having: Vec<String> = Vec::new();
        let filter_parts = self.filters.iter().map(|p| format!("({})", p.sql));
        if self.group_by.is_empty() {
            conjuncts.extend(filter_parts);
        } else {
            having.extend(filter_parts);
        }
        for p in &self.filters {
            params.extend(p.params.iter().cloned());
        }

        if !conjuncts.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conjuncts.join(" AND "));
        }
        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }
        if !having.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&having.join(" AND "));
        }
        if !self.orders.is_empty() {
            sql.push_str(" ORDER BY ");
            let clauses: Vec<&str> = self.orders.iter().map(|o| o.sql.as_str()).collect();
            sql.push_str(&clauses.join(", "));
            for o in &self.orders {
                params.extend(o.params.iter().cloned());
            }
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit} OFFSET {}", self.offset));
        }

        (sql, params)
    }

    /// Build a total-count query over this SELECT, ignoring ordering and
    /// paging.
    pub fn build_count(&self) -> (String, Vec<Value>) {
        let mut inner = self.clone();
        inner.orders.clear();
        inner.limit = None;
        inner.offset = 0;
        let (sql, params) = inner.build();
        (format!("SELECT COUNT(*) FROM ({sql})"), params)
    }
}
