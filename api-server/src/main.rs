//! Hafiz API server binary.
//!
//! Loads configuration, wires the Gemini provider into the workflow
//! engine, and serves the HTTP API.

use anyhow::{Context, Result};
use api_server::{router, AppState};
use clap::Parser;
use hafiz_engine::config::Config;
use hafiz_engine::llm::gemini::GeminiProvider;
use hafiz_engine::telemetry::init_telemetry_with_level;
use hafiz_engine::workflow::Workflow;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "hafiz-server", about = "Hafiz AI API server", version)]
struct Cli {
    /// Path to the configuration file (default: ~/.hafiz/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured bind port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load_or_default()?,
    };

    init_telemetry_with_level(&config.core.log_level);

    let api_key = config.resolve_api_key();
    if api_key.is_empty() {
        tracing::warn!(
            env = %config.llm.gemini.api_key_env,
            "API key not set; all generation will use fallback responses"
        );
    }

    let provider = GeminiProvider::new(config.llm.gemini.clone(), api_key);
    let workflow = Workflow::new(Arc::new(provider), config.workflow.clone())
        .with_llm_timeout(Duration::from_secs(config.llm.timeout_secs));

    let app = router(AppState {
        workflow: Arc::new(workflow),
    });

    let port = cli.port.unwrap_or(config.server.port);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Hafiz API server listening on http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
