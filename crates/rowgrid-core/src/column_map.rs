//! Field-to-column indirection tables.
//!
//! A `ColumnMap` declares, per entity type, how each abstract field
//! identifier maps onto the table: a real column, a SQL expression, the
//! negation of another field, or a constant. Client-supplied field
//! identifiers are only ever used as lookup keys into this table — the
//! mapped target is the sole source of SQL text.

use std::collections::HashMap;
use std::sync::OnceLock;

/// The mapped target of one field identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldTarget {
    /// A real column name.
    Column(&'static str),
    /// A SQL expression (e.g. a concatenation of columns).
    Expr(&'static str),
    /// The boolean negation of another field.
    Negated(&'static str),
    /// A constant boolean.
    Literal(bool),
}

/// Ordered mapping from field identifiers to targets for one entity type.
#[derive(Debug, Default)]
pub struct ColumnMap {
    entries: Vec<(&'static str, FieldTarget)>,
    inverse: OnceLock<HashMap<&'static str, &'static str>>,
}

impl ColumnMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a field to a real column.
    pub fn column(mut self, field: &'static str, column: &'static str) -> Self {
        self.entries.push((field, FieldTarget::Column(column)));
        self
    }

    /// Map a field to a SQL expression.
    pub fn expr(mut self, field: &'static str, sql: &'static str) -> Self {
        self.entries.push((field, FieldTarget::Expr(sql)));
        self
    }

    /// Map a field to the negation of another field.
    pub fn negated(mut self, field: &'static str, property: &'static str) -> Self {
        self.entries.push((field, FieldTarget::Negated(property)));
        self
    }

    /// Map a field to a constant boolean.
    pub fn literal(mut self, field: &'static str, value: bool) -> Self {
        self.entries.push((field, FieldTarget::Literal(value)));
        self
    }

    /// Resolve a field identifier to its target, if mapped.
    pub fn resolve(&self, field: &str) -> Option<&FieldTarget> {
        self.entries
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, target)| target)
    }

    /// The SQL text for a field, only if it maps to a column or expression.
    ///
    /// `Negated` and `Literal` targets never reach query text.
    pub fn column_for(&self, field: &str) -> Option<&'static str> {
        match self.resolve(field)? {
            FieldTarget::Column(c) | FieldTarget::Expr(c) => Some(c),
            FieldTarget::Negated(_) | FieldTarget::Literal(_) => None,
        }
    }

    /// The column-to-field inverse map, built once per map from `Column`
    /// entries only.
    ///
    /// The cache lives inside the map, so each entity type (owning one
    /// static map) gets its own inverse.
    pub fn inverse(&self) -> &HashMap<&'static str, &'static str> {
        self.inverse.get_or_init(|| {
            self.entries
                .iter()
                .filter_map(|(field, target)| match target {
                    FieldTarget::Column(c) => Some((*c, *field)),
                    _ => None,
                })
                .collect()
        })
    }

    /// All mapped field identifiers, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(field, _)| *field)
    }

    /// Number of mapped fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
