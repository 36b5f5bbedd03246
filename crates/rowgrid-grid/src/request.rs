//! Grid wire-request parsing.
//!
//! Two incompatible request shapes arrive from clients: the legacy flat
//! form with numerically suffixed keys (`iSortCol_0`, `sSearch_2`, ...)
//! and the current nested form (`columns[i].search.value`, `order[i]`,
//! ...). Both normalize into one [`GridRequest`]; everything downstream is
//! protocol-agnostic. Scalars are coerced tolerantly, since form-encoded
//! transports deliver every value as a string.

use serde_json::Value as JsonValue;

use crate::error::Error;

/// Which wire shape the request arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVariant {
    /// Flat, numerically suffixed keys; marker `sEcho`.
    Legacy,
    /// Nested objects; marker `draw`.
    Current,
}

/// Sort direction requested for one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDir {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl SortDir {
    fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("desc") {
            SortDir::Desc
        } else {
            SortDir::Asc
        }
    }

    /// The SQL keyword for this direction.
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }
}

/// Predicate operator for search text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOperator {
    /// Substring match via `LIKE '%text%'`.
    Like,
    /// Regular-expression match via `REGEXP`.
    Regexp,
}

impl MatchOperator {
    /// Resolve an operator: the explicit request value wins, else the
    /// regex flag picks the default.
    fn resolve(explicit: Option<&str>, regex_flag: bool) -> Self {
        match explicit {
            Some(op) if op.eq_ignore_ascii_case("regexp") => MatchOperator::Regexp,
            Some(op) if op.eq_ignore_ascii_case("like") => MatchOperator::Like,
            _ if regex_flag => MatchOperator::Regexp,
            _ => MatchOperator::Like,
        }
    }
}

/// A search term plus its resolved operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSpec {
    /// The raw search text; empty means no search.
    pub text: String,
    /// The predicate operator.
    pub operator: MatchOperator,
}

impl SearchSpec {
    fn empty() -> Self {
        Self {
            text: String::new(),
            operator: MatchOperator::Like,
        }
    }

    /// Whether there is anything to search for.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// One declared grid column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    /// The abstract field identifier; empty for placeholder columns.
    pub field: String,
    /// Whether per-column search applies.
    pub searchable: bool,
    /// Whether the column may be sorted.
    pub orderable: bool,
    /// This column's own search term.
    pub search: SearchSpec,
}

/// One requested sort entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    /// Index into the declared column list.
    pub column: usize,
    /// Requested direction.
    pub dir: SortDir,
}

/// A normalized grid request, independent of wire shape.
#[derive(Debug, Clone, PartialEq)]
pub struct GridRequest {
    /// The wire shape the request arrived in.
    pub variant: ProtocolVariant,
    /// The echo/draw token, coerced to an integer.
    pub echo: i64,
    /// Declared columns, in request order.
    pub columns: Vec<ColumnSpec>,
    /// Requested sorts, in precedence order.
    pub sort: Vec<SortSpec>,
    /// Global search across all eligible fields.
    pub search: SearchSpec,
    /// First row offset.
    pub start: i64,
    /// Page length; `-1` means all rows.
    pub length: i64,
}

impl GridRequest {
    /// Parse a raw wire request, dispatching on the protocol marker.
    pub fn parse(raw: &JsonValue) -> Result<Self, Error> {
        let object = raw
            .as_object()
            .ok_or_else(|| Error::MalformedRequest("request is not an object".into()))?;
        if object.contains_key("sEcho") {
            parse_legacy(object)
        } else if object.contains_key("draw") {
            parse_current(object)
        } else {
            Err(Error::UnrecognizedProtocol)
        }
    }
}

fn str_at(object: &serde_json::Map<String, JsonValue>, key: &str) -> Option<String> {
    match object.get(key)? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn i64_at(object: &serde_json::Map<String, JsonValue>, key: &str) -> Option<i64> {
    coerce_i64(object.get(key)?)
}

fn bool_at(object: &serde_json::Map<String, JsonValue>, key: &str, default: bool) -> bool {
    object.get(key).and_then(coerce_bool).unwrap_or(default)
}

fn coerce_i64(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_bool(value: &JsonValue) -> Option<bool> {
    match value {
        JsonValue::Bool(b) => Some(*b),
        JsonValue::String(s) => match s.as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        JsonValue::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}

fn parse_legacy(object: &serde_json::Map<String, JsonValue>) -> Result<GridRequest, Error> {
    let declared: Vec<String> = str_at(object, "sColumns")
        .map(|s| s.split(',').map(str::to_string).collect())
        .unwrap_or_default();
    let count = i64_at(object, "iColumns")
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(declared.len());

    let mut columns = Vec::with_capacity(count);
    for index in 0..count {
        let text = str_at(object, &format!("sSearch_{index}")).unwrap_or_default();
        let regex_flag = bool_at(object, &format!("bRegex_{index}"), false);
        columns.push(ColumnSpec {
            field: declared.get(index).cloned().unwrap_or_default(),
            searchable: bool_at(object, &format!("bSearchable_{index}"), true),
            orderable: bool_at(object, &format!("bSortable_{index}"), true),
            search: SearchSpec {
                text,
                operator: MatchOperator::resolve(None, regex_flag),
            },
        });
    }

    let sorting = i64_at(object, "iSortingCols").unwrap_or(0).max(0);
    let mut sort = Vec::new();
    for entry in 0..sorting {
        let Some(column) = i64_at(object, &format!("iSortCol_{entry}")) else {
            continue;
        };
        let Ok(column) = usize::try_from(column) else {
            continue;
        };
        let dir = str_at(object, &format!("sSortDir_{entry}"))
            .map(|d| SortDir::parse(&d))
            .unwrap_or(SortDir::Asc);
        sort.push(SortSpec { column, dir });
    }

    Ok(GridRequest {
        variant: ProtocolVariant::Legacy,
        echo: i64_at(object, "sEcho").unwrap_or(0),
        columns,
        sort,
        search: SearchSpec {
            text: str_at(object, "sSearch").unwrap_or_default(),
            operator: MatchOperator::resolve(None, bool_at(object, "bRegex", false)),
        },
        start: i64_at(object, "iDisplayStart").unwrap_or(0).max(0),
        length: i64_at(object, "iDisplayLength").unwrap_or(-1),
    })
}

fn parse_search(value: Option<&JsonValue>) -> SearchSpec {
    let Some(object) = value.and_then(JsonValue::as_object) else {
        return SearchSpec::empty();
    };
    let explicit = str_at(object, "operator");
    let regex_flag = bool_at(object, "regex", false);
    SearchSpec {
        text: str_at(object, "value").unwrap_or_default(),
        operator: MatchOperator::resolve(explicit.as_deref(), regex_flag),
    }
}

fn parse_current(object: &serde_json::Map<String, JsonValue>) -> Result<GridRequest, Error> {
    let mut columns = Vec::new();
    if let Some(raw_columns) = object.get("columns").and_then(JsonValue::as_array) {
        for raw in raw_columns {
            let Some(column) = raw.as_object() else {
                return Err(Error::MalformedRequest("column entry is not an object".into()));
            };
            columns.push(ColumnSpec {
                field: str_at(column, "name").unwrap_or_default(),
                searchable: bool_at(column, "searchable", true),
                orderable: bool_at(column, "orderable", true),
                search: parse_search(column.get("search")),
            });
        }
    }

    let mut sort = Vec::new();
    if let Some(raw_order) = object.get("order").and_then(JsonValue::as_array) {
        for raw in raw_order {
            let Some(entry) = raw.as_object() else {
                continue;
            };
            let Some(column) = i64_at(entry, "column").and_then(|c| usize::try_from(c).ok())
            else {
                continue;
            };
            let dir = str_at(entry, "dir")
                .map(|d| SortDir::parse(&d))
                .unwrap_or(SortDir::Asc);
            sort.push(SortSpec { column, dir });
        }
    }

    Ok(GridRequest {
        variant: ProtocolVariant::Current,
        echo: i64_at(object, "draw").unwrap_or(0),
        columns,
        sort,
        search: parse_search(object.get("search")),
        start: i64_at(object, "start").unwrap_or(0).max(0),
        length: i64_at(object, "length").unwrap_or(-1),
    })
}
