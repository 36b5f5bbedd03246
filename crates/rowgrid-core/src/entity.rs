//! Entity base machinery.
//!
//! An entity mirrors one database row. Field access goes through the
//! entity type's [`ColumnMap`], so callers name abstract field identifiers
//! and never the schema. Every write through [`Entity::set`] records the
//! field as modified; hydration loads values without dirtying them.

use std::collections::{BTreeMap, BTreeSet};

use crate::column_map::{ColumnMap, FieldTarget};
use crate::value::Value;

/// Display nouns for an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Noun {
    /// Singular form, e.g. "person".
    pub singular: &'static str,
    /// Plural form, e.g. "people".
    pub plural: &'static str,
}

/// Field storage with modification tracking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    values: BTreeMap<String, Value>,
    modified: BTreeSet<String>,
}

impl FieldSet {
    /// Create an empty field set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a stored value by field identifier.
    pub fn value(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Store a value and mark the field as modified.
    pub fn put(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        self.modified.insert(field.clone());
        self.values.insert(field, value);
    }

    /// Store a value without marking it modified (hydration path).
    pub fn load(&mut self, field: impl Into<String>, value: Value) {
        self.values.insert(field.into(), value);
    }

    /// Check whether a field has been written since hydration.
    pub fn is_modified(&self, field: &str) -> bool {
        self.modified.contains(field)
    }

    /// Iterate over the modified field identifiers.
    pub fn modified_fields(&self) -> impl Iterator<Item = &str> {
        self.modified.iter().map(String::as_str)
    }

    /// Clear all modification flags.
    pub fn clear_modified(&mut self) {
        self.modified.clear();
    }
}

/// An in-memory record mirroring one database row.
///
/// Implementors supply the column map and the backing [`FieldSet`]; the
/// provided methods implement map-routed access, hydration, and change
/// extraction on top.
pub trait Entity: Sized {
    /// Explicit resource identifier for this type (never derived from the
    /// type name).
    const RESOURCE: &'static str;

    /// Display nouns for this type.
    const NOUN: Noun;

    /// The field-to-column map shared by all instances of this type.
    fn column_map() -> &'static ColumnMap;

    /// The backing field store.
    fn fields(&self) -> &FieldSet;

    /// Mutable access to the backing field store.
    fn fields_mut(&mut self) -> &mut FieldSet;

    /// Construct an empty instance with no fields set.
    fn empty() -> Self;

    /// Computed accessor hook, consulted before map-routed lookup.
    ///
    /// Implementors override this for fields whose display value is
    /// derived in code (e.g. a full name whose `Expr` mapping only serves
    /// search and sort). The default computes nothing.
    fn computed(&self, _field: &str) -> Option<Value> {
        None
    }

    /// Read a field: computed accessor first, then through the column map.
    ///
    /// `Column`/`Expr` targets read the stored value, `Negated` reads the
    /// negation of the referenced field, `Literal` yields its constant.
    /// Unmapped identifiers read as null.
    fn get(&self, field: &str) -> Value {
        if let Some(value) = self.computed(field) {
            return value;
        }
        match Self::column_map().resolve(field) {
            Some(FieldTarget::Column(_)) | Some(FieldTarget::Expr(_)) => {
                self.fields().value(field).cloned().unwrap_or(Value::Null)
            }
            Some(FieldTarget::Negated(property)) => match self.get(property).as_bool() {
                Some(b) => Value::Bool(!b),
                None => Value::Null,
            },
            Some(FieldTarget::Literal(b)) => Value::Bool(*b),
            None => Value::Null,
        }
    }

    /// Write a field through the column map, marking it modified.
    ///
    /// Writes to `Negated` fields invert and store on the referenced
    /// field. `Literal` targets and unmapped identifiers are ignored.
    fn set(&mut self, field: &str, value: impl Into<Value>) {
        match Self::column_map().resolve(field) {
            Some(FieldTarget::Column(_)) | Some(FieldTarget::Expr(_)) => {
                self.fields_mut().put(field, value.into());
            }
            Some(FieldTarget::Negated(property)) => {
                let property = *property;
                if let Some(b) = value.into().as_bool() {
                    self.set(property, Value::Bool(!b));
                }
            }
            Some(FieldTarget::Literal(_)) | None => {}
        }
    }

    /// Typed read helper.
    fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field).as_bool()
    }

    /// Typed read helper.
    fn get_i64(&self, field: &str) -> Option<i64> {
        self.get(field).as_i64()
    }

    /// Typed read helper.
    fn get_f64(&self, field: &str) -> Option<f64> {
        self.get(field).as_f64()
    }

    /// Typed read helper. Clones out of the store.
    fn get_string(&self, field: &str) -> Option<String> {
        self.get(field).as_str().map(str::to_string)
    }

    /// Typed read helper.
    fn get_timestamp(&self, field: &str) -> Option<chrono::DateTime<chrono::Utc>> {
        self.get(field).as_timestamp()
    }

    /// Build an entity from a column-keyed row.
    ///
    /// Columns present in the inverse map load under their field
    /// identifier; anything else (aliased expressions, self-join extras)
    /// loads raw under its column name. Nothing is marked modified.
    fn hydrate(row: &BTreeMap<String, Value>) -> Self {
        let mut entity = Self::empty();
        let inverse = Self::column_map().inverse();
        for (column, value) in row {
            match inverse.get(column.as_str()) {
                Some(field) => entity.fields_mut().load(*field, value.clone()),
                None => entity.fields_mut().load(column.clone(), value.clone()),
            }
        }
        entity.fields_mut().clear_modified();
        entity
    }

    /// Every mapped field as `field identifier → value`, including
    /// `Negated` and `Literal` projections.
    fn to_array(&self) -> BTreeMap<&'static str, Value> {
        Self::column_map()
            .fields()
            .map(|field| (field, self.get(field)))
            .collect()
    }

    /// The storable row as `column → value`, `Column` targets only.
    fn to_row(&self) -> BTreeMap<String, Value> {
        let inverse = Self::column_map().inverse();
        inverse
            .iter()
            .filter_map(|(column, field)| {
                self.fields()
                    .value(field)
                    .map(|v| (column.to_string(), v.clone()))
            })
            .collect()
    }

    /// The modified portion of the row as `column → value`.
    fn changes(&self) -> BTreeMap<String, Value> {
        let map = Self::column_map();
        self.fields()
            .modified_fields()
            .filter_map(|field| match map.resolve(field) {
                Some(FieldTarget::Column(column)) => self
                    .fields()
                    .value(field)
                    .map(|v| (column.to_string(), v.clone())),
                _ => None,
            })
            .collect()
    }
}
