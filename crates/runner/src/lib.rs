//! Scenario runner for the fulfillment engine.
//!
//! Replays a JSON scenario of seed records and operator actions against
//! in-memory collaborators and summarizes the resulting state. The
//! `wms-runner` binary wraps this with environment configuration, logging
//! and a Prometheus snapshot.

pub mod config;
pub mod error;
pub mod scenario;

use domain::EngineConfig;

pub use config::{Config, LogFormat};
pub use error::{Result, RunnerError};
pub use scenario::{
    Rejection, RunSummary, Scenario, ScenarioRunner, SiteKind, SiteSpec, Step, run,
};

/// Loads the scenario named by the configuration, or the built-in demo.
pub async fn load_scenario(config: &Config) -> Result<Scenario> {
    match &config.scenario_path {
        Some(path) => Scenario::load(path).await,
        None => Scenario::demo(),
    }
}

/// Loads and validates the engine configuration snapshot, or the defaults.
pub async fn load_engine_config(config: &Config) -> Result<EngineConfig> {
    match &config.engine_config_path {
        Some(path) => {
            let json = tokio::fs::read_to_string(path).await?;
            Ok(EngineConfig::from_json(&json)?)
        }
        None => Ok(EngineConfig::default()),
    }
}

