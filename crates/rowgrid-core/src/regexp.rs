//! `REGEXP` support for SQLite connections.
//!
//! SQLite parses `value REGEXP pattern` but ships no implementation;
//! grids using the regex match operator need one installed on the
//! connection first.

use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

/// Install a `regexp(pattern, value)` scalar function on the connection.
///
/// The last compiled pattern is kept, since grid predicates apply one
/// pattern across many rows.
pub fn register_regexp(conn: &Connection) -> rusqlite::Result<()> {
    let mut cached: Option<(String, Regex)> = None;
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        move |ctx| {
            let pattern: String = ctx.get(0)?;
            let value: Option<String> = ctx.get(1)?;
            let Some(value) = value else {
                return Ok(false);
            };

            let fresh = match &cached {
                Some((p, _)) if *p == pattern => None,
                _ => Some(
                    Regex::new(&pattern)
                        .map_err(|e| rusqlite::Error::UserFunctionError(Box::new(e)))?,
                ),
            };
            if let Some(re) = fresh {
                cached = Some((pattern, re));
            }
            let (_, re) = cached.as_ref().ok_or(rusqlite::Error::InvalidQuery)?;
            Ok(re.is_match(&value))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regexp_matches() {
        let conn = Connection::open_in_memory().unwrap();
        register_regexp(&conn).unwrap();

        let hit: bool = conn
            .query_row("SELECT 'smith' REGEXP 'sm.th'", [], |row| row.get(0))
            .unwrap();
        assert!(hit);

        let miss: bool = conn
            .query_row("SELECT 'jones' REGEXP 'sm.th'", [], |row| row.get(0))
            .unwrap();
        assert!(!miss);
    }

    #[test]
    fn test_regexp_null_value() {
        let conn = Connection::open_in_memory().unwrap();
        register_regexp(&conn).unwrap();

        let hit: bool = conn
            .query_row("SELECT NULL REGEXP 'x'", [], |row| row.get(0))
            .unwrap();
        assert!(!hit);
    }
}
