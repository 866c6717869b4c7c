//! The ingestion gate.
//!
//! Given an uploaded file name and payload, decides whether to reuse the
//! existing store or to discard all prior state (store and session files
//! alike) and rebuild it from the new upload. Row/column files are loaded
//! fully into memory and written out as a single table named after the
//! file's base name; a pre-built SQLite file becomes the store directly.

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use tracing::{debug, info};

use tabletalk_core::error::{Result, TabletalkError};

use crate::db::Database;

/// Fixed store file name inside the data directory.
pub const STORE_FILE_NAME: &str = "store.db";

/// Row cap for a single upload, matching the load-fully-into-memory model.
const MAX_ROWS: usize = 1_000_000;

/// What an upload's extension says about how to convert it.
enum SourceKind {
    /// A pre-built SQLite store, used directly.
    Store,
    Csv,
    Excel,
}

/// Parsed tabular payload held fully in memory before conversion.
struct TableData {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

/// SQLite column affinity chosen per column by value scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    fn sql(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }
}

/// Decides between reusing and rebuilding the store for each upload.
pub struct IngestGate {
    data_dir: PathBuf,
}

impl IngestGate {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the fixed store file.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE_NAME)
    }

    /// Run the gate for one upload and return an open store handle.
    ///
    /// If a file of the same name already exists in the data directory the
    /// existing store is reused unconditionally, even when the payload
    /// differs. Otherwise all prior state is wiped, the payload persisted,
    /// and the store rebuilt from it.
    pub fn prepare(&self, file_name: &str, payload: &[u8]) -> Result<Database> {
        let name = base_name(file_name)?;
        let kind = classify_extension(&name)?;

        let upload_path = self.data_dir.join(&name);
        if upload_path.exists() {
            debug!(file = %name, "Upload already present; reusing existing store");
            return Database::new(&self.store_path());
        }

        info!(file = %name, "New upload; clearing prior state");
        self.clear_data_dir()?;
        std::fs::write(&upload_path, payload)?;

        match kind {
            SourceKind::Store => {
                std::fs::copy(&upload_path, self.store_path())?;
                info!(file = %name, "Uploaded SQLite file installed as store");
                Database::new(&self.store_path())
            }
            SourceKind::Csv => {
                let data = load_csv(&upload_path)?;
                self.build_store(table_name_of(&name), data)
            }
            SourceKind::Excel => {
                let data = load_excel(&upload_path)?;
                self.build_store(table_name_of(&name), data)
            }
        }
    }

    /// Remove the data directory (store, upload, session files) and recreate it.
    fn clear_data_dir(&self) -> Result<()> {
        if self.data_dir.exists() {
            std::fs::remove_dir_all(&self.data_dir)?;
        }
        std::fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    /// Write the parsed payload out as a single table, replacing any
    /// same-named table from a previous store generation.
    fn build_store(&self, table_name: &str, data: TableData) -> Result<Database> {
        let types = infer_column_types(&data);
        let db = Database::new(&self.store_path())?;

        db.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| TabletalkError::Storage(format!("Failed to begin txn: {}", e)))?;

            tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_ident(table_name)))
                .map_err(|e| TabletalkError::Storage(format!("Failed to drop table: {}", e)))?;

            let column_defs: Vec<String> = data
                .columns
                .iter()
                .zip(types.iter())
                .map(|(col, ty)| format!("{} {}", quote_ident(col), ty.sql()))
                .collect();
            tx.execute_batch(&format!(
                "CREATE TABLE {} ({})",
                quote_ident(table_name),
                column_defs.join(", ")
            ))
            .map_err(|e| TabletalkError::Storage(format!("Failed to create table: {}", e)))?;

            {
                let placeholders: Vec<String> =
                    (1..=data.columns.len()).map(|i| format!("?{}", i)).collect();
                let mut stmt = tx
                    .prepare(&format!(
                        "INSERT INTO {} VALUES ({})",
                        quote_ident(table_name),
                        placeholders.join(", ")
                    ))
                    .map_err(|e| TabletalkError::Storage(format!("Failed to prepare insert: {}", e)))?;
                for row in &data.rows {
                    stmt.execute(rusqlite::params_from_iter(row.iter()))
                        .map_err(|e| TabletalkError::Storage(format!("Failed to insert row: {}", e)))?;
                }
            }

            tx.commit()
                .map_err(|e| TabletalkError::Storage(format!("Failed to commit: {}", e)))?;
            Ok(())
        })?;

        info!(
            table = table_name,
            rows = data.rows.len(),
            columns = data.columns.len(),
            "Store rebuilt from upload"
        );
        Ok(db)
    }
}

/// Strip any path components from a client-supplied file name.
fn base_name(file_name: &str) -> Result<String> {
    let name = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim()
        .to_string();
    if name.is_empty() || name == "." || name == ".." {
        return Err(TabletalkError::Ingest(format!(
            "Invalid upload file name: {:?}",
            file_name
        )));
    }
    Ok(name)
}

/// Map the file extension to a conversion strategy, or fail naming it.
fn classify_extension(name: &str) -> Result<SourceKind> {
    let extension = match name.rfind('.') {
        Some(idx) if idx + 1 < name.len() => name[idx..].to_ascii_lowercase(),
        _ => String::new(),
    };
    match extension.as_str() {
        ".db" => Ok(SourceKind::Store),
        ".csv" => Ok(SourceKind::Csv),
        ".xlsx" | ".xls" => Ok(SourceKind::Excel),
        "" => Err(TabletalkError::UnsupportedFormat {
            extension: "(none)".to_string(),
        }),
        _ => Err(TabletalkError::UnsupportedFormat { extension }),
    }
}

/// Table name is the upload name up to the first dot.
fn table_name_of(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

/// Quote an identifier for embedding in SQL text.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Parse a CSV upload fully into memory. The first record is the header.
fn load_csv(path: &Path) -> Result<TableData> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| TabletalkError::Ingest(format!("Failed to read CSV: {}", e)))?;

    let headers = reader
        .headers()
        .map_err(|e| TabletalkError::Ingest(format!("Failed to read CSV header: {}", e)))?
        .clone();
    let columns = normalize_headers(headers.iter().map(|h| h.to_string()));
    if columns.is_empty() {
        return Err(TabletalkError::Ingest("CSV has no columns".to_string()));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| TabletalkError::Ingest(format!("Malformed CSV row: {}", e)))?;
        if rows.len() >= MAX_ROWS {
            return Err(TabletalkError::Ingest(format!(
                "Upload exceeds {} rows",
                MAX_ROWS
            )));
        }
        let mut row: Vec<Option<String>> = record
            .iter()
            .map(|field| {
                if field.is_empty() {
                    None
                } else {
                    Some(field.to_string())
                }
            })
            .collect();
        row.resize(columns.len(), None);
        rows.push(row);
    }

    Ok(TableData { columns, rows })
}

/// Parse the first worksheet of an Excel upload fully into memory.
fn load_excel(path: &Path) -> Result<TableData> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| TabletalkError::Ingest(format!("Failed to open workbook: {}", e)))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let first = sheet_names
        .first()
        .ok_or_else(|| TabletalkError::Ingest("Workbook contains no sheets".to_string()))?
        .clone();
    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| TabletalkError::Ingest(format!("Failed to read sheet '{}': {}", first, e)))?;

    let mut rows_iter = range.rows();
    let header_row = rows_iter
        .next()
        .ok_or_else(|| TabletalkError::Ingest(format!("Sheet '{}' is empty", first)))?;
    let columns = normalize_headers(
        header_row
            .iter()
            .map(|cell| cell_text(cell).unwrap_or_default()),
    );
    if columns.is_empty() {
        return Err(TabletalkError::Ingest(format!(
            "Sheet '{}' has no columns",
            first
        )));
    }

    let mut rows = Vec::new();
    for cells in rows_iter {
        if rows.len() >= MAX_ROWS {
            return Err(TabletalkError::Ingest(format!(
                "Upload exceeds {} rows",
                MAX_ROWS
            )));
        }
        let mut row: Vec<Option<String>> = cells.iter().map(cell_text).collect();
        row.resize(columns.len(), None);
        rows.push(row);
    }

    Ok(TableData { columns, rows })
}

/// Render one spreadsheet cell as a value string, or None for an empty cell.
fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => {
            if s.is_empty() {
                None
            } else {
                Some(s.clone())
            }
        }
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => Some(dt.as_f64().to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
        // Formula errors carry no usable value.
        Data::Error(_) => None,
    }
}

/// Trim headers, fill in blanks, and make duplicates unique.
fn normalize_headers(raw: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for (idx, header) in raw.enumerate() {
        let mut name = header.trim().to_string();
        if name.is_empty() {
            name = format!("column_{}", idx + 1);
        }
        if seen.contains(&name) {
            let mut suffix = 2;
            while seen.contains(&format!("{}_{}", name, suffix)) {
                suffix += 1;
            }
            name = format!("{}_{}", name, suffix);
        }
        seen.push(name);
    }
    seen
}

/// Pick INTEGER when every present value parses as i64, REAL when every
/// present value parses as f64, TEXT otherwise (including all-empty columns).
fn infer_column_types(data: &TableData) -> Vec<ColumnType> {
    (0..data.columns.len())
        .map(|col| {
            let mut integer_ok = true;
            let mut real_ok = true;
            let mut saw_value = false;
            for row in &data.rows {
                let Some(Some(value)) = row.get(col).map(|c| c.as_ref()) else {
                    continue;
                };
                saw_value = true;
                let trimmed = value.trim();
                if integer_ok && trimmed.parse::<i64>().is_err() {
                    integer_ok = false;
                }
                if real_ok && trimmed.parse::<f64>().is_err() {
                    real_ok = false;
                    break;
                }
            }
            if !saw_value || !real_ok {
                ColumnType::Text
            } else if integer_ok {
                ColumnType::Integer
            } else {
                ColumnType::Real
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn gate(dir: &TempDir) -> IngestGate {
        IngestGate::new(dir.path().join("data"))
    }

    fn table_count(db: &Database, table: &str) -> i64 {
        db.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
                [],
                |row| row.get(0),
            )
            .map_err(|e| TabletalkError::Storage(e.to_string()))
        })
        .unwrap()
    }

    const SALES_CSV: &[u8] = b"region,amount,note\nnorth,10,first\nsouth,20,\neast,12,ok\n";

    // ---- Conversion ----

    #[test]
    fn test_csv_upload_builds_single_table() {
        let dir = TempDir::new().unwrap();
        let db = gate(&dir).prepare("sales.csv", SALES_CSV).unwrap();
        assert_eq!(table_count(&db, "sales"), 3);
    }

    #[test]
    fn test_csv_column_types_inferred() {
        let dir = TempDir::new().unwrap();
        let db = gate(&dir).prepare("sales.csv", SALES_CSV).unwrap();
        let ddl: String = db
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT sql FROM sqlite_master WHERE name = 'sales'",
                    [],
                    |row| row.get(0),
                )
                .map_err(|e| TabletalkError::Storage(e.to_string()))
            })
            .unwrap();
        assert!(ddl.contains("\"region\" TEXT"));
        assert!(ddl.contains("\"amount\" INTEGER"));
        assert!(ddl.contains("\"note\" TEXT"));
    }

    #[test]
    fn test_numeric_aggregate_over_ingested_csv() {
        let dir = TempDir::new().unwrap();
        let db = gate(&dir).prepare("sales.csv", SALES_CSV).unwrap();
        let total: i64 = db
            .with_conn(|conn| {
                conn.query_row("SELECT SUM(amount) FROM sales", [], |row| row.get(0))
                    .map_err(|e| TabletalkError::Storage(e.to_string()))
            })
            .unwrap();
        assert_eq!(total, 42);
    }

    #[test]
    fn test_empty_cells_become_null() {
        let dir = TempDir::new().unwrap();
        let db = gate(&dir).prepare("sales.csv", SALES_CSV).unwrap();
        let nulls: i64 = db
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sales WHERE note IS NULL",
                    [],
                    |row| row.get(0),
                )
                .map_err(|e| TabletalkError::Storage(e.to_string()))
            })
            .unwrap();
        assert_eq!(nulls, 1);
    }

    #[test]
    fn test_table_named_after_first_dot() {
        let dir = TempDir::new().unwrap();
        let db = gate(&dir)
            .prepare("report.v2.csv", b"x\n1\n")
            .unwrap();
        assert_eq!(table_count(&db, "report"), 1);
    }

    #[test]
    fn test_db_upload_used_directly() {
        let dir = TempDir::new().unwrap();

        // Build a standalone SQLite file to upload.
        let src = dir.path().join("prebuilt.db");
        {
            let conn = rusqlite::Connection::open(&src).unwrap();
            conn.execute_batch("CREATE TABLE people (name TEXT); INSERT INTO people VALUES ('ada');")
                .unwrap();
        }
        let payload = std::fs::read(&src).unwrap();

        let db = gate(&dir).prepare("prebuilt.db", &payload).unwrap();
        assert_eq!(table_count(&db, "people"), 1);
    }

    // ---- Gate behavior ----

    #[test]
    fn test_same_filename_reuses_store() {
        let dir = TempDir::new().unwrap();
        let g = gate(&dir);
        let db = g.prepare("sales.csv", SALES_CSV).unwrap();
        drop(db);

        // Different payload under the same name: must NOT re-ingest.
        let db = g
            .prepare("sales.csv", b"other,cols\n1,2\n1,2\n1,2\n1,2\n")
            .unwrap();
        assert_eq!(table_count(&db, "sales"), 3);
    }

    #[test]
    fn test_new_filename_wipes_prior_state() {
        let dir = TempDir::new().unwrap();
        let g = gate(&dir);
        g.prepare("sales.csv", SALES_CSV).unwrap();

        // Plant a session file to observe the wipe.
        let session_file = g.data_dir().join("abc_memory.json");
        std::fs::write(&session_file, "[]").unwrap();

        let db = g.prepare("other.csv", b"a\n5\n").unwrap();
        assert!(!session_file.exists());
        assert!(!g.data_dir().join("sales.csv").exists());
        assert_eq!(table_count(&db, "other"), 1);

        // The old table is gone with the old store.
        let old = db.with_conn(|conn| {
            conn.query_row("SELECT COUNT(*) FROM sales", [], |row| row.get::<_, i64>(0))
                .map_err(|e| TabletalkError::Storage(e.to_string()))
        });
        assert!(old.is_err());
    }

    #[test]
    fn test_path_components_stripped() {
        let dir = TempDir::new().unwrap();
        let g = gate(&dir);
        g.prepare("../../etc/sales.csv", SALES_CSV).unwrap();
        assert!(g.data_dir().join("sales.csv").exists());
    }

    // ---- Rejections ----

    #[test]
    fn test_unsupported_extension_names_extension() {
        let dir = TempDir::new().unwrap();
        let err = gate(&dir).prepare("data.parquet", b"x").unwrap_err();
        assert!(err.to_string().contains(".parquet"), "got: {}", err);
    }

    #[test]
    fn test_missing_extension_rejected() {
        let dir = TempDir::new().unwrap();
        let err = gate(&dir).prepare("README", b"x").unwrap_err();
        assert!(matches!(
            err,
            TabletalkError::UnsupportedFormat { .. }
        ));
    }

    #[test]
    fn test_unsupported_extension_leaves_state_untouched() {
        let dir = TempDir::new().unwrap();
        let g = gate(&dir);
        g.prepare("sales.csv", SALES_CSV).unwrap();
        let _ = g.prepare("data.parquet", b"x").unwrap_err();
        // The earlier upload survives a rejected one.
        assert!(g.data_dir().join("sales.csv").exists());
    }

    #[test]
    fn test_malformed_csv_rejected() {
        let dir = TempDir::new().unwrap();
        let err = gate(&dir)
            .prepare("bad.csv", b"a,b\n1,2,3,4\n")
            .unwrap_err();
        assert!(matches!(err, TabletalkError::Ingest(_)));
    }

    #[test]
    fn test_empty_file_name_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(gate(&dir).prepare("", b"x").is_err());
    }

    // ---- Helpers ----

    #[test]
    fn test_normalize_headers_fills_and_dedupes() {
        let headers = normalize_headers(
            vec![
                "amount".to_string(),
                "".to_string(),
                "amount".to_string(),
                " amount ".to_string(),
            ]
            .into_iter(),
        );
        assert_eq!(headers, vec!["amount", "column_2", "amount_2", "amount_3"]);
    }

    #[test]
    fn test_infer_types_real_and_empty() {
        let data = TableData {
            columns: vec!["a".into(), "b".into(), "c".into()],
            rows: vec![
                vec![Some("1.5".into()), None, Some("1".into())],
                vec![Some("2".into()), None, Some("x".into())],
            ],
        };
        let types = infer_column_types(&data);
        assert_eq!(
            types,
            vec![ColumnType::Real, ColumnType::Text, ColumnType::Text]
        );
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident(r#"we"ird"#), r#""we""ird""#);
    }
}
