pub mod app_config;
pub mod config;
pub mod memory;
pub mod signal;
pub mod store;
pub mod taxonomy;
pub mod weights;
pub mod window;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use memory::MemoryStore;
pub use signal::{Brief, ProcessingStatus, Sentiment, Signal, SourceRecord};
pub use store::{FailureState, SignalFilter, SignalStore, SourceOutcome, StoreError};
pub use taxonomy::{classify_by_hierarchy, Archetype, Coerced, Topic, TopicMode};
pub use weights::{load_weights, parse_weights, VelocityConfig, WeightTable};
pub use window::{Window, WindowPreset};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read weights file {path}: {source}")]
    WeightsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse weights file: {0}")]
    WeightsFileParse(#[from] serde_yaml::Error),

    #[error("weights validation failed: {0}")]
    Validation(String),
}
