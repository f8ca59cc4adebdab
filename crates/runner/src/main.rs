//! Scenario runner entry point.

use engine::RetryConfig;
use metrics_exporter_prometheus::PrometheusBuilder;
use runner::{Config, LogFormat, RunnerError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> runner::Result<()> {
    let config = Config::from_env();

    // 1. Initialize tracing
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }

    // 2. Install Prometheus metrics recorder
    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| RunnerError::Metrics(e.to_string()))?;

    // 3. Load scenario and engine configuration
    let scenario = runner::load_scenario(&config).await?;
    let engine_config = runner::load_engine_config(&config).await?;
    tracing::info!(
        scenario = %scenario.name,
        steps = scenario.steps.len(),
        sites = scenario.sites.len(),
        "replaying scenario"
    );

    // 4. Replay and report
    let summary = runner::run(&scenario, engine_config, RetryConfig::default()).await?;
    println!("{}", summary.to_json()?);
    println!("{}", metrics_handle.render());

    if !summary.rejections.is_empty() {
        tracing::warn!(rejected = summary.rejections.len(), "some steps were rejected");
    }
    Ok(())
}
