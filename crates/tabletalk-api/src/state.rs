//! Application state shared across route handlers.
//!
//! AppState holds the pipeline services and is passed to handlers via
//! axum's State extractor. All fields are `Arc` for cheap cloning across
//! handler tasks.

use std::path::PathBuf;
use std::sync::Arc;

use tabletalk_agent::{ChartClassifier, SessionStore, SqlAgent};
use tabletalk_core::config::TabletalkConfig;
use tabletalk_llm::ChatModel;
use tabletalk_store::IngestGate;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Arc<TabletalkConfig>,
    /// Decides between reusing and rebuilding the store per upload.
    pub gate: Arc<IngestGate>,
    /// Flat-file session history store.
    pub sessions: Arc<SessionStore>,
    /// The model-driven SQL agent.
    pub agent: Arc<SqlAgent>,
    /// The best-effort chart classifier.
    pub classifier: Arc<ChartClassifier>,
}

impl AppState {
    /// Build the state with one model shared by agent and classifier.
    pub fn new(config: TabletalkConfig, model: Arc<dyn ChatModel>) -> Self {
        Self::with_models(config, Arc::clone(&model), model)
    }

    /// Build the state with separate agent and classifier models (used by
    /// tests to script the two independently).
    pub fn with_models(
        config: TabletalkConfig,
        agent_model: Arc<dyn ChatModel>,
        classifier_model: Arc<dyn ChatModel>,
    ) -> Self {
        let data_dir = PathBuf::from(&config.general.data_dir);
        let gate = Arc::new(IngestGate::new(data_dir.clone()));
        let sessions = Arc::new(SessionStore::new(data_dir));
        let agent = Arc::new(SqlAgent::new(agent_model, &config.llm));
        let classifier = Arc::new(ChartClassifier::new(
            classifier_model,
            &config.llm,
            &config.chart,
        ));

        Self {
            config: Arc::new(config),
            gate,
            sessions,
            agent,
            classifier,
        }
    }
}
