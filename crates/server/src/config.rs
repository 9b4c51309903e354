//! Service configuration
//!
//! Values come from an optional TOML file, overridden by `MAGPIE_*`
//! environment variables. Nested keys use `__`, e.g.
//! `MAGPIE_GRAPH__URL=http://gremlin:8182`.

use anyhow::{Context, Result};
use magpie_lib::config::{GraphClientConfig, MetricsClientConfig, ModelsConfig, OrchestratorConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "MAGPIE_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config/magpie.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Port serving the model, health and metrics endpoints
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default)]
    pub graph: GraphClientConfig,

    #[serde(default)]
    pub metrics: MetricsClientConfig,

    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// `models.<domain>.<kind>.{models, config}`
    #[serde(default)]
    pub models: ModelsConfig,
}

fn default_api_port() -> u16 {
    8080
}

impl ServerConfig {
    /// Load from `$MAGPIE_CONFIG`, or `config/magpie.toml` if present
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::load_from(Some(&PathBuf::from(path))),
            None => Self::load_from(None),
        }
    }

    /// Load from an explicit file (which must exist), or the default path if it exists
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_PATH).required(false),
        };

        let config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("MAGPIE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Invalid configuration")
    }
}
