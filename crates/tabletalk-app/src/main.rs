//! tabletalk binary - composition root.
//!
//! Ties the crates together into a single executable:
//! 1. Parse CLI arguments and load TOML configuration
//! 2. Initialize tracing
//! 3. Build the configured model provider from the startup credential
//! 4. Assemble the application state and serve the axum API

mod cli;

use clap::Parser;

use tabletalk_api::{start_server, AppState};
use tabletalk_core::config::TabletalkConfig;
use tabletalk_llm::{build_model, Provider};

use cli::CliArgs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config first so CLI overrides can be folded in before anything reads it.
    let config_path = args.resolve_config_path();
    let mut config = TabletalkConfig::load_or_default(&config_path);
    config.general.port = args.resolve_port(config.general.port);
    if let Some(ref data_dir) = args.data_dir {
        config.general.data_dir = data_dir.to_string_lossy().to_string();
    }
    config.general.log_level = args.resolve_log_level(&config.general.log_level);
    if let Some(ref provider) = args.provider {
        config.llm.provider = provider.clone();
    }
    if let Some(ref model) = args.model {
        config.llm.model = model.clone();
    }
    if let Some(ref base_url) = args.base_url {
        config.llm.base_url = base_url.clone();
    }

    // Tracing. RUST_LOG wins over the resolved level.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(config.general.log_level.clone())
            }),
        )
        .init();

    tracing::info!("Starting tabletalk v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_path.display(), "Configuration resolved");

    // The credential is startup configuration, never per-request state.
    let api_key = match args.resolve_api_key() {
        Some(key) => key,
        None => {
            tracing::error!(
                "No model API key supplied. Pass --api-key or set TABLETALK_API_KEY."
            );
            return Err("missing model API key".into());
        }
    };

    let provider: Provider = config.llm.provider.parse()?;
    let model = build_model(
        provider,
        api_key,
        config.llm.model.clone(),
        config.llm.base_url.clone(),
    );
    tracing::info!(
        provider = %config.llm.provider,
        model = %config.llm.model,
        "Model provider ready"
    );

    let state = AppState::new(config, model);
    start_server(state).await?;

    Ok(())
}
