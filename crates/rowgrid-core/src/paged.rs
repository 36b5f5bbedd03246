//! Lazy paginated results.
//!
//! A `PagedResult` wraps a [`SelectQuery`] plus the connection that will
//! run it. Nothing executes at construction: the total count runs (and is
//! cached) on [`PagedResult::total`], the paged SELECT runs on
//! [`PagedResult::items`]. The wrapper can be re-targeted at a different
//! query with [`PagedResult::with_query`] without losing its page
//! configuration — grid refinement depends on this.

use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::marker::PhantomData;

use rusqlite::Connection;

use crate::entity::Entity;
use crate::error::Error;
use crate::query::SelectQuery;
use crate::value::Value;

/// Page size: a concrete limit, or the whole result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    /// No paging; every row is one page.
    Unbounded,
    /// At most this many rows per page.
    Limited(u32),
}

/// A lazily-executed, re-targetable paginated query.
#[derive(Debug)]
pub struct PagedResult<'c, E: Entity> {
    conn: &'c Connection,
    query: SelectQuery,
    page_size: PageSize,
    page: u32,
    total: OnceCell<u64>,
    _entity: PhantomData<E>,
}

impl<'c, E: Entity> PagedResult<'c, E> {
    /// Wrap a query, unbounded on page 1.
    pub fn new(conn: &'c Connection, query: SelectQuery) -> Self {
        Self {
            conn,
            query,
            page_size: PageSize::Unbounded,
            page: 1,
            total: OnceCell::new(),
            _entity: PhantomData,
        }
    }

    /// The backing query.
    pub fn query(&self) -> &SelectQuery {
        &self.query
    }

    /// Configure pagination. Page numbers are 1-based.
    pub fn set_page(&mut self, size: PageSize, page: u32) {
        self.page_size = size;
        self.page = page.max(1);
    }

    /// The configured page size.
    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    /// The configured page number.
    pub fn page(&self) -> u32 {
        self.page
    }

    /// An equivalent wrapper bound to a different query.
    ///
    /// Page size and number carry over; the count cache does not. The
    /// original stays usable — refinement works on the sibling.
    pub fn with_query(&self, query: SelectQuery) -> PagedResult<'c, E> {
        PagedResult {
            conn: self.conn,
            query,
            page_size: self.page_size,
            page: self.page,
            total: OnceCell::new(),
            _entity: PhantomData,
        }
    }

    /// Total row count over the whole query, computed once and cached.
    pub fn total(&self) -> Result<u64, Error> {
        if let Some(total) = self.total.get() {
            return Ok(*total);
        }
        let (sql, params) = self.query.build_count();
        let count: i64 = self
            .conn
            .query_row(&sql, rusqlite::params_from_iter(params.iter()), |row| {
                row.get(0)
            })?;
        let count = u64::try_from(count).unwrap_or(0);
        Ok(*self.total.get_or_init(|| count))
    }

    /// Execute the current page and hydrate entities.
    pub fn items(&self) -> Result<Vec<E>, Error> {
        let mut query = self.query.clone();
        if let PageSize::Limited(size) = self.page_size {
            let size = u64::from(size);
            query.set_limit(Some(size), size * u64::from(self.page - 1));
        }

        let (sql, params) = query.build();
        let mut stmt = self.conn.prepare(&sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();

        let mut rows = stmt.query(rusqlite::params_from_iter(params.iter()))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            let mut map = BTreeMap::new();
            for (index, column) in columns.iter().enumerate() {
                map.insert(column.clone(), row.get::<_, Value>(index)?);
            }
            items.push(E::hydrate(&map));
        }
        Ok(items)
    }
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
    });

    #[derive(Debug, Default)]
    struct Item {
        fields: FieldSet,
    }

    impl Entity for Item {
        const RESOURCE: &'static str = "item";
        const NOUN: Noun = Noun {
            singular: "item",
            plural: "items",
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
            CREATE TABLE item (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
            INSERT INTO item (id, name) VALUES (1, 'a'), (2, 'b'), (3, 'c'), (4, 'd'), (5, 'e');
            "#,
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_unbounded_behaves_like_a_list() {
        let conn = fixture();
        let paged: PagedResult<'_, Item> = PagedResult::new(&conn, SelectQuery::new("item"));
        assert_eq!(paged.items().unwrap().len(), 5);
        assert_eq!(paged.total().unwrap(), 5);
    }

    #[test]
    fn test_paging_window() {
        let conn = fixture();
        let mut paged: PagedResult<'_, Item> = PagedResult::new(&conn, SelectQuery::new("item"));
        paged.set_page(PageSize::Limited(2), 2);

        let items = paged.items().unwrap();
        let ids: Vec<_> = items.iter().filter_map(|i| i.get_i64("id")).collect();
        assert_eq!(ids, vec![3, 4]);
        // Count ignores the page window.
        assert_eq!(paged.total().unwrap(), 5);
    }

    #[test]
    fn test_with_query_preserves_page_and_original() {
        let conn = fixture();
        let mut paged: PagedResult<'_, Item> = PagedResult::new(&conn, SelectQuery::new("item"));
        paged.set_page(PageSize::Limited(2), 1);

        let mut narrowed = paged.query().clone();
        narrowed.and_where("\"id\" > ?", vec![Value::Integer(3)]);
        let refined = paged.with_query(narrowed);

        assert_eq!(refined.page_size(), PageSize::Limited(2));
        assert_eq!(refined.total().unwrap(), 2);
        // The original keeps its own query and count.
        assert_eq!(paged.total().unwrap(), 5);
    }
}
