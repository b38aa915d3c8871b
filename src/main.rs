use std::error::Error;

use log::{error, info, warn};

use crate::analyzer::SentimentAnalyzer;
use crate::config::Config;

mod analyzer;
mod api;
mod config;
mod error;
mod gemini;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    // 1️⃣ Load config
    let cfg = Config::from_env()?;

    // Logging
    simple_logger::SimpleLogger::new()
        .with_level(cfg.log_level)
        .init()?;

    let validation = cfg.validate();
    for warning in &validation.warnings {
        warn!("Config warning: {}", warning);
    }
    if !validation.is_valid() {
        for e in &validation.errors {
            error!("Config error: {}", e);
        }
        return Err(format!("invalid configuration: {}", validation.errors.join("; ")).into());
    }

    // 2️⃣ Analyzer owns the one reusable HTTP session to Gemini
    let analyzer = SentimentAnalyzer::new(&cfg.gemini)?;
    let app = api::create_router(analyzer, cfg.summary());

    let address = cfg.bind_address();
    info!("Standalone Sentiment Analyzer");
    info!(
        "Model: {} (timeout {}s, {} attempts)",
        cfg.gemini.model_name,
        cfg.gemini.timeout_secs,
        cfg.gemini.max_retries
    );
    info!("Web API: http://{}/api/analyze", address);
    info!("Health:  http://{}/health", address);

    let listener = tokio::net::TcpListener::bind(&address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
