//! Configuration management for the prediction service

use crate::models::registry::ModelId;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Environment variable overriding the configuration file path
pub const CONFIG_PATH_ENV: &str = "AD_SERVICE_CONFIG";

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub models: ModelsConfig,
    pub pipeline: PipelineConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Requests arrive on `<subject_prefix>.<route>`
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
    /// Queue group shared by service instances
    #[serde(default = "default_queue_group")]
    pub queue_group: String,
}

fn default_subject_prefix() -> String {
    "ad".to_string()
}

fn default_queue_group() -> String {
    "ad-prediction".to_string()
}

/// Model artifacts configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Directory containing model descriptors and artifacts
    pub models_dir: String,
    /// Descriptor file of each model, relative to `models_dir`
    #[serde(default)]
    pub descriptors: DescriptorFiles,
    /// Number of threads for ONNX inference per model (default: 1)
    #[serde(default = "default_onnx_threads")]
    pub onnx_threads: usize,
    /// Feature set by `predict_from_token_count`
    #[serde(default = "default_token_feature")]
    pub token_feature: String,
}

/// Descriptor file names per model
#[derive(Debug, Clone, Deserialize)]
pub struct DescriptorFiles {
    pub biomarker_linguistic: String,
    pub linguistic_only: String,
    pub token_count: String,
}

impl DescriptorFiles {
    pub fn file_for(&self, model_id: ModelId) -> &str {
        match model_id {
            ModelId::BiomarkerLinguistic => &self.biomarker_linguistic,
            ModelId::LinguisticOnly => &self.linguistic_only,
            ModelId::TokenCount => &self.token_count,
        }
    }
}

impl Default for DescriptorFiles {
    fn default() -> Self {
        Self {
            biomarker_linguistic: "biomarker_linguistic.json".to_string(),
            linguistic_only: "linguistic_only.json".to_string(),
            token_count: "token_count.json".to_string(),
        }
    }
}

fn default_onnx_threads() -> usize {
    1
}

fn default_token_feature() -> String {
    "tokens(participant)".to_string()
}

/// Request processing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum requests processed concurrently
    pub workers: usize,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl AppConfig {
    /// Load configuration from `AD_SERVICE_CONFIG` or `config/config.toml`
    pub fn load() -> Result<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config/config.toml".to_string());
        Self::load_from_path(path)
    }

    /// Load configuration from a specific path.
    ///
    /// `AD_SERVICE__<SECTION>__<KEY>` environment variables override file values.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(Environment::with_prefix("AD_SERVICE").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Subject pattern the service subscribes to
    pub fn request_subject(&self) -> String {
        format!("{}.*", self.nats.subject_prefix)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            nats: NatsConfig {
                url: "nats://localhost:4222".to_string(),
                subject_prefix: default_subject_prefix(),
                queue_group: default_queue_group(),
            },
            models: ModelsConfig {
                models_dir: "models".to_string(),
                descriptors: DescriptorFiles::default(),
                onnx_threads: 1,
                token_feature: default_token_feature(),
            },
            pipeline: PipelineConfig {
                workers: 4,
                timeout_ms: 2000,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
