//! Guarded read-only query execution.
//!
//! The agent only ever reads from the store, so execution rejects anything
//! but a single SELECT (or WITH) statement and caps the rows returned for
//! observation.

use rusqlite::types::ValueRef;

use tabletalk_core::error::{Result, TabletalkError};

use crate::db::Database;

/// Upper bound on rows surfaced to the agent per query.
pub const MAX_OBSERVATION_ROWS: usize = 50;

/// Result of one read-only query: column names plus stringified rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// True when the result was cut off at [`MAX_OBSERVATION_ROWS`].
    pub truncated: bool,
}

impl std::fmt::Display for QueryOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.columns.join(" | "))?;
        for row in &self.rows {
            writeln!(f, "{}", row.join(" | "))?;
        }
        if self.truncated {
            writeln!(f, "... (truncated at {} rows)", MAX_OBSERVATION_ROWS)?;
        }
        write!(f, "({} rows)", self.rows.len())
    }
}

/// Execute a single read-only statement against the store.
pub fn execute_select(db: &Database, sql: &str) -> Result<QueryOutput> {
    ensure_read_only(sql)?;

    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| TabletalkError::Storage(format!("Failed to prepare query: {}", e)))?;

        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(|c| c.to_string())
            .collect();
        let column_count = columns.len();

        let mut rows = Vec::new();
        let mut truncated = false;
        let mut raw = stmt
            .query([])
            .map_err(|e| TabletalkError::Storage(format!("Query failed: {}", e)))?;
        while let Some(row) = raw
            .next()
            .map_err(|e| TabletalkError::Storage(format!("Query failed: {}", e)))?
        {
            if rows.len() >= MAX_OBSERVATION_ROWS {
                truncated = true;
                break;
            }
            let mut values = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                let value = row
                    .get_ref(idx)
                    .map_err(|e| TabletalkError::Storage(format!("Row read failed: {}", e)))?;
                values.push(format_value(value));
            }
            rows.push(values);
        }

        Ok(QueryOutput {
            columns,
            rows,
            truncated,
        })
    })
}

/// Render one SQLite value for observation text.
pub(crate) fn format_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(r) => r.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).to_string(),
        ValueRef::Blob(b) => format!("<blob {} bytes>", b.len()),
    }
}

/// Reject anything but a single SELECT/WITH statement.
fn ensure_read_only(sql: &str) -> Result<()> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(TabletalkError::Storage("Empty query".to_string()));
    }

    let first_word = trimmed
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_uppercase();
    if first_word != "SELECT" && first_word != "WITH" {
        return Err(TabletalkError::Storage(format!(
            "Only SELECT queries are allowed, got: {}",
            first_word
        )));
    }

    // A trailing semicolon is fine; anything after it is a second statement.
    if let Some(idx) = trimmed.find(';') {
        if !trimmed[idx + 1..].trim().is_empty() {
            return Err(TabletalkError::Storage(
                "Multiple statements are not allowed".to_string(),
            ));
        }
    }

    Ok(())
}
