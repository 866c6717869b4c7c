//! Store schema description for agent prompting.
//!
//! Produces a compact text rendering of every user table: the column list
//! with declared types plus a few sample rows, which is what the agent
//! needs to write grounded SQL.

use tabletalk_core::error::{Result, TabletalkError};

use crate::db::Database;
use crate::query::format_value;

/// Sample rows included per table.
const SAMPLE_ROWS: usize = 3;

/// Describe every user table in the store.
pub fn describe(db: &Database) -> Result<String> {
    db.with_conn(|conn| {
        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
            )
            .map_err(|e| TabletalkError::Storage(format!("Failed to list tables: {}", e)))?;
        let names: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| TabletalkError::Storage(format!("Failed to list tables: {}", e)))?
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| TabletalkError::Storage(format!("Failed to list tables: {}", e)))?;

        if names.is_empty() {
            return Ok("(the store contains no tables)".to_string());
        }

        let mut out = String::new();
        for name in &names {
            if !out.is_empty() {
                out.push('\n');
            }

            let mut cols_stmt = conn
                .prepare(&format!("PRAGMA table_info({})", quote_ident(name)))
                .map_err(|e| TabletalkError::Storage(format!("Failed to inspect table: {}", e)))?;
            let columns: Vec<(String, String)> = cols_stmt
                .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))
                .map_err(|e| TabletalkError::Storage(format!("Failed to inspect table: {}", e)))?
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| TabletalkError::Storage(format!("Failed to inspect table: {}", e)))?;

            let column_list: Vec<String> = columns
                .iter()
                .map(|(col, ty)| {
                    if ty.is_empty() {
                        col.clone()
                    } else {
                        format!("{} {}", col, ty)
                    }
                })
                .collect();
            out.push_str(&format!("Table {} ({})\n", name, column_list.join(", ")));

            let mut sample_stmt = conn
                .prepare(&format!(
                    "SELECT * FROM {} LIMIT {}",
                    quote_ident(name),
                    SAMPLE_ROWS
                ))
                .map_err(|e| TabletalkError::Storage(format!("Failed to sample table: {}", e)))?;
            let column_count = sample_stmt.column_count();
            let mut raw = sample_stmt
                .query([])
                .map_err(|e| TabletalkError::Storage(format!("Failed to sample table: {}", e)))?;

            out.push_str("Sample rows:\n");
            let mut any = false;
            while let Some(row) = raw
                .next()
                .map_err(|e| TabletalkError::Storage(format!("Failed to sample table: {}", e)))?
            {
                let mut values = Vec::with_capacity(column_count);
                for idx in 0..column_count {
                    let value = row.get_ref(idx).map_err(|e| {
                        TabletalkError::Storage(format!("Failed to sample table: {}", e))
                    })?;
                    values.push(format_value(value));
                }
                out.push_str("  ");
                out.push_str(&values.join(" | "));
                out.push('\n');
                any = true;
            }
            if !any {
                out.push_str("  (empty)\n");
            }
        }

        Ok(out)
    })
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
