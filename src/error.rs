// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// 库层统一的 Result 别名
pub type Result<T> = std::result::Result<T, BridgeError>;

/// 读取训练产物和写入跟踪存储时可能出现的错误
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML from file: {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{} does not contain a key-value mapping at the top level", .path.display())]
    NotAMapping { path: PathBuf },

    #[error("Unsupported key in {}: {key}", .path.display())]
    UnsupportedKey { path: PathBuf, key: String },

    #[error("Metrics file {} is empty", .path.display())]
    EmptyMetrics { path: PathBuf },

    #[error("{}:{line}: invalid step token '{token}'", .path.display())]
    InvalidStep {
        path: PathBuf,
        line: usize,
        token: String,
    },

    #[error("{}:{line}: value '{token}' for metric '{key}' is not a number", .path.display())]
    InvalidMetricValue {
        path: PathBuf,
        line: usize,
        key: String,
        token: String,
    },

    #[error("Invalid tracking key '{0}'")]
    InvalidKey(String),

    #[error("Unsupported tracking URI: {0}")]
    UnsupportedTrackingUri(String),

    #[error("Tracking store error: {0}")]
    Tracking(String),

    #[error("HTTP request to tracking server failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl BridgeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BridgeError::Io {
            path: path.into(),
            source,
        }
    }
}
