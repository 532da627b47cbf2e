//! MindEase backend entry point.

use anyhow::Result;
use mindease_common::config::Config;
use mindease_common::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let startup_start = std::time::Instant::now();

    let (config, notices) = Config::load_with_env()?;
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );
    for notice in &notices {
        tracing::warn!("{notice}");
    }

    tracing::info!("MindEase backend v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        duration_ms = startup_start.elapsed().as_millis() as u64,
        "Configuration loaded"
    );

    mindease_server::start_server(&config).await
}
