//! tabletalk API crate - axum HTTP server and route handlers.
//!
//! Exposes the upload-and-query endpoint that drives the whole pipeline:
//! ingestion gate, session memory, agent invocation, chart classification,
//! and response assembly.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
