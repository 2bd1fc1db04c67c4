use crate::model::TrainingParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, an optional file and
    /// the environment (prefix `COLD_RISK`, separator `__`).
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder().add_source(config::File::from_str(
            include_str!("../config/default.toml"),
            config::FileFormat::Toml,
        ));

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder
            .add_source(
                config::Environment::with_prefix("COLD_RISK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Where the serialized model is read from and written to
    #[serde(default = "default_model_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Rows of synthetic data generated when no model exists
    #[serde(default = "default_samples")]
    pub samples: usize,

    #[serde(default = "default_iterations")]
    pub iterations: usize,

    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Learning rate
    #[serde(default = "default_shrinkage")]
    pub shrinkage: f32,

    /// Fixed seed for synthetic data
    pub seed: Option<u64>,

    /// Optional CSV to train on instead of synthetic data
    pub data_path: Option<PathBuf>,
}

impl TrainingConfig {
    pub fn params(&self) -> TrainingParams {
        TrainingParams {
            samples: self.samples,
            iterations: self.iterations,
            max_depth: self.max_depth,
            shrinkage: self.shrinkage,
            seed: self.seed,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let params = TrainingParams::default();
        TrainingConfig {
            samples: params.samples,
            iterations: params.iterations,
            max_depth: params.max_depth,
            shrinkage: params.shrinkage,
            seed: params.seed,
            data_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        ObservabilityConfig {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/model.msgpack")
}

fn default_samples() -> usize {
    TrainingParams::default().samples
}

fn default_iterations() -> usize {
    TrainingParams::default().iterations
}

fn default_max_depth() -> u32 {
    TrainingParams::default().max_depth
}

fn default_shrinkage() -> f32 {
    TrainingParams::default().shrinkage
}

fn default_log_level() -> String {
    "cold_risk=info,tower_http=info".to_string()
}
