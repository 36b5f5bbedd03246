//! Cell rendering for grid rows.

use rowgrid_core::{Entity, Value};
use serde_json::Value as JsonValue;

/// Render one cell of one row.
///
/// An empty field identifier is a placeholder column (e.g. an action
/// link) and renders as null. Resolution tries the map-routed accessor
/// first, then a raw stored field of the same name; anything unresolvable
/// renders as null.
pub fn render_cell<E: Entity>(entity: &E, field: &str) -> JsonValue {
    if field.is_empty() {
        return JsonValue::Null;
    }
    let value = match entity.get(field) {
        Value::Null => entity.fields().value(field).cloned().unwrap_or(Value::Null),
        value => value,
    };
    render_value(&value)
}

/// Convert a field value into its display form.
///
/// Timestamps render as ISO-8601; newline characters become line-break
/// markup for HTML display.
pub fn render_value(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Integer(i) => JsonValue::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::Text(s) => JsonValue::String(break_lines(s)),
        Value::Bytes(b) => JsonValue::String(String::from_utf8_lossy(b).into_owned()),
        Value::Timestamp(ts) => JsonValue::String(Value::to_iso8601(ts)),
    }
}

fn break_lines(text: &str) -> String {
    text.replace("\r\n", "<br />").replace('\n', "<br />")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rowgrid_core::{ColumnMap, FieldSet, Noun};
    use std::sync::LazyLock;

    static MAP: LazyLock<ColumnMap> = LazyLock::new(|| {
        ColumnMap::new()
            .column("note", "note")
            .column("seen_at", "seen_at")
            .literal("pinned", false)
    });

    #[derive(Debug, Default)]
    struct Row {
        fields: FieldSet,
    }

    impl Entity for Row {
        const RESOURCE: &'static str = "row";
        const NOUN: Noun = Noun {
            singular: "row",
            plural: "rows",
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

    #[test]
    fn test_placeholder_and_unresolvable_render_null() {
        let row = Row::empty();
        assert_eq!(render_cell(&row, ""), JsonValue::Null);
        assert_eq!(render_cell(&row, "missing"), JsonValue::Null);
    }

    #[test]
    fn test_newlines_become_markup() {
        let mut row = Row::empty();
        row.set("note", "one\r\ntwo\nthree");
        assert_eq!(
            render_cell(&row, "note"),
            JsonValue::String("one<br />two<br />three".into())
        );
    }

    #[test]
    fn test_timestamp_renders_iso8601() {
        let mut row = Row::empty();
        let ts = chrono::Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        row.set("seen_at", ts);
        assert_eq!(
            render_cell(&row, "seen_at"),
            JsonValue::String("2024-03-01T12:30:00Z".into())
        );
    }

    #[test]
    fn test_raw_stored_field_fallback() {
        let mut row = Row::empty();
        row.fields_mut().load("joined_alias", Value::from("x"));
        assert_eq!(render_cell(&row, "joined_alias"), JsonValue::String("x".into()));
    }

    #[test]
    fn test_literal_projection_renders() {
        let row = Row::empty();
        assert_eq!(render_cell(&row, "pinned"), JsonValue::Bool(false));
    }
}
