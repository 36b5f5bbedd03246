//! Rowgrid Core - Entities, table gateways, and lazy paginated queries.
//!
//! This crate provides the persistence half of rowgrid: column-map
//! indirection between abstract field identifiers and schema, entity base
//! machinery with dirty tracking, schema-discovering table mappers with a
//! soft-delete row-state model, and re-targetable paginated results.

pub mod column_map;
pub mod entity;
pub mod error;
pub mod mapper;
pub mod paged;
pub mod query;
pub mod regexp;
pub mod value;

pub use column_map::{ColumnMap, FieldTarget};
pub use entity::{Entity, FieldSet, Noun};
pub use error::Error;
pub use mapper::{Criteria, Mapper, RowState};
pub use paged::{PagedResult, PageSize};
pub use query::{OrderClause, Predicate, SelectQuery};
pub use regexp::register_regexp;
pub use value::Value;
