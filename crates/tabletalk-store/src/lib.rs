//! tabletalk store crate - SQLite persistence and upload ingestion.
//!
//! Provides a WAL-mode SQLite database wrapper, the ingestion gate that
//! decides between reusing and rebuilding the store, schema description for
//! prompting, and guarded read-only query execution.

pub mod db;
pub mod ingest;
pub mod query;
pub mod schema;

pub use db::Database;
pub use ingest::{IngestGate, STORE_FILE_NAME};
pub use query::{execute_select, QueryOutput, MAX_OBSERVATION_ROWS};
pub use schema::describe;
