//! Grid wire-response payloads.
//!
//! Each protocol variant serializes with its own key names; the payload
//! content is identical.

use serde::Serialize;
use serde_json::Value as JsonValue;

/// Legacy-variant response body.
#[derive(Debug, Clone, Serialize)]
pub struct LegacyGridResponse {
    /// Echoed request token.
    #[serde(rename = "sEcho")]
    pub echo: String,
    /// Unfiltered row count.
    #[serde(rename = "iTotalRecords")]
    pub total_records: u64,
    /// Row count after filtering.
    #[serde(rename = "iTotalDisplayRecords")]
    pub total_display_records: u64,
    /// Rendered cells, one array per row.
    #[serde(rename = "aaData")]
    pub rows: Vec<Vec<JsonValue>>,
}

/// Current-variant response body.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentGridResponse {
    /// Echoed draw counter.
    pub draw: i64,
    /// Unfiltered row count.
    #[serde(rename = "recordsTotal")]
    pub records_total: u64,
    /// Row count after filtering.
    #[serde(rename = "recordsFiltered")]
    pub records_filtered: u64,
    /// Rendered cells, one array per row.
    pub data: Vec<Vec<JsonValue>>,
}

/// A grid response in the same variant its request arrived in.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum GridResponse {
    /// Legacy key names.
    Legacy(LegacyGridResponse),
    /// Current key names.
    Current(CurrentGridResponse),
}

impl GridResponse {
    /// The rendered rows, regardless of variant.
    pub fn rows(&self) -> &[Vec<JsonValue>] {
        match self {
            GridResponse::Legacy(body) => &body.rows,
            GridResponse::Current(body) => &body.data,
        }
    }

    /// The unfiltered total, regardless of variant.
    pub fn total(&self) -> u64 {
        match self {
            GridResponse::Legacy(body) => body.total_records,
            GridResponse::Current(body) => body.records_total,
        }
    }

    /// The filtered total, regardless of variant.
    pub fn filtered(&self) -> u64 {
        match self {
            GridResponse::Legacy(body) => body.total_display_records,
            GridResponse::Current(body) => body.records_filtered,
        }
    }
}
