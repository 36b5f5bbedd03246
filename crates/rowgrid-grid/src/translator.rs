//! Grid request translation.
//!
//! The translator refines a [`PagedResult`] with client-requested
//! sorting, filtering, and paging, then renders the current page into a
//! wire response. Field identifiers from the request are only ever lookup
//! keys into the server's [`ColumnMap`]; unmapped or out-of-range entries
//! are skipped per-field rather than failing the request. The caller's
//! own query is never mutated — refinement happens on a clone, so the
//! original still answers the unfiltered total.

use tracing::debug;

use rowgrid_core::{ColumnMap, Entity, OrderClause, PagedResult, PageSize, Value};
use serde_json::Value as JsonValue;

use crate::error::Error;
use crate::render::render_cell;
use crate::request::{GridRequest, MatchOperator, ProtocolVariant, SearchSpec};
use crate::response::{CurrentGridResponse, GridResponse, LegacyGridResponse};

/// A refined result plus its wire response.
#[derive(Debug)]
pub struct GridOutcome<'c, E: Entity> {
    /// The refined result, for callers that present rows themselves.
    pub paged: PagedResult<'c, E>,
    /// The serializable response payload.
    pub response: GridResponse,
}

/// Translates wire-format grid requests against one column map.
#[derive(Debug)]
pub struct GridTranslator<'m> {
    map: &'m ColumnMap,
    search_fields: Option<Vec<String>>,
}

impl<'m> GridTranslator<'m> {
    /// Create a translator for an entity type's column map.
    pub fn new(map: &'m ColumnMap) -> Self {
        Self {
            map,
            search_fields: None,
        }
    }

    /// Restrict global search to a subset of field identifiers. By
    /// default every mapped field participates.
    pub fn with_search_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Apply a wire request to a result and produce the response.
    pub fn translate<'c, E: Entity>(
        &self,
        paged: &PagedResult<'c, E>,
        raw: &JsonValue,
    ) -> Result<GridOutcome<'c, E>, Error> {
        let request = GridRequest::parse(raw)?;
        let mut query = paged.query().clone();

        // Client-requested ordering takes precedence; the query's own
        // ordering re-applies as a tiebreaker.
        let saved = query.take_orders();
        for sort in &request.sort {
            let Some(spec) = request.columns.get(sort.column) else {
                continue;
            };
            if !spec.orderable {
                continue;
            }
            let Some(column) = self.map.column_for(&spec.field) else {
                continue;
            };
            query.order_by(OrderClause::new(format!("{column} {}", sort.dir.as_sql())));
        }
        for clause in saved {
            query.order_by(clause);
        }

        if !request.search.is_empty() {
            let mut arms = Vec::new();
            let mut params = Vec::new();
            for field in self.map.fields() {
                if let Some(eligible) = &self.search_fields {
                    if !eligible.iter().any(|f| f == field) {
                        continue;
                    }
                }
                let Some(column) = self.map.column_for(field) else {
                    continue;
                };
                let (sql, param) = predicate(column, &request.search);
                arms.push(sql);
                params.push(param);
            }
            if !arms.is_empty() {
                query.and_filter(format!("({})", arms.join(" OR ")), params);
            }
        }

        for spec in &request.columns {
            if !spec.searchable || spec.search.is_empty() {
                continue;
            }
            let Some(column) = self.map.column_for(&spec.field) else {
                continue;
            };
            let (sql, param) = predicate(column, &spec.search);
            query.and_filter(sql, vec![param]);
        }

        let mut refined = paged.with_query(query);
        if request.length > 0 {
            let page = request.start / request.length + 1;
            refined.set_page(
                PageSize::Limited(u32::try_from(request.length).unwrap_or(u32::MAX)),
                u32::try_from(page).unwrap_or(u32::MAX),
            );
        } else {
            refined.set_page(PageSize::Unbounded, 1);
        }

        let total = paged.total()?;
        let filtered = refined.total()?;
        let rows: Vec<Vec<JsonValue>> = refined
            .items()?
            .iter()
            .map(|entity| {
                request
                    .columns
                    .iter()
                    .map(|spec| render_cell(entity, &spec.field))
                    .collect()
            })
            .collect();
        debug!(
            variant = ?request.variant,
            total,
            filtered,
            rows = rows.len(),
            "translated grid request"
        );

        let response = match request.variant {
            ProtocolVariant::Legacy => GridResponse::Legacy(LegacyGridResponse {
                echo: request.echo.to_string(),
                total_records: total,
                total_display_records: filtered,
                rows,
            }),
            ProtocolVariant::Current => GridResponse::Current(CurrentGridResponse {
                draw: request.echo,
                records_total: total,
                records_filtered: filtered,
                data: rows,
            }),
        };
        Ok(GridOutcome {
            paged: refined,
            response,
        })
    }
}

fn predicate(column: &str, search: &SearchSpec) -> (String, Value) {
    match search.operator {
        MatchOperator::Like => (
            format!("{column} LIKE ?"),
            Value::Text(format!("%{}%", search.text)),
        ),
        MatchOperator::Regexp => (
            format!("{column} REGEXP ?"),
            Value::Text(search.text.clone()),
        ),
    }
}
