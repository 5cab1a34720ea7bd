//! Error taxonomy of the pipeline.
//!
//! Only [`FetchError`] is ever retried (and only the transient variants, see
//! [`FetchError::is_retryable`]). Everything else aborts the run.

use crate::models::CountryYear;
use std::path::PathBuf;
use thiserror::Error;

/// Network or remote failure while talking to the indicator API.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request failed with HTTP {status}")]
    Status { status: u16 },
    #[error("could not decode response body: {0}")]
    Decode(String),
    #[error("world bank api error: {0}")]
    Api(String),
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("page limit exceeded ({0})")]
    PageLimit(u32),
    #[error("could not read raw table: {0}")]
    RawFile(String),
    #[error("giving up after {attempts} attempts")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Transient failures worth another attempt: transport errors, 5xx, 429
    /// and truncated/undecodable bodies.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport(_) | FetchError::Decode(_) => true,
            FetchError::Status { status } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            FetchError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            FetchError::Status {
                status: status.as_u16(),
            }
        } else {
            FetchError::Transport(e.to_string())
        }
    }
}

/// Malformed or duplicated keys in a cleaned indicator table.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error(
        "duplicate key {key} in indicator {indicator} with conflicting values {first:?} and {second:?}"
    )]
    DuplicateKey {
        indicator: String,
        key: CountryYear,
        first: Option<f64>,
        second: Option<f64>,
    },
    #[error("expected records of indicator {expected}, found {found}")]
    MixedIndicators { expected: String, found: String },
}

/// Key or column collisions while joining indicator tables.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("column {0} provided by more than one table")]
    DuplicateColumn(String),
    #[error("nothing to merge")]
    Empty,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeatureError {
    #[error("feature {feature} references unknown column {column}")]
    UnknownColumn { feature: String, column: String },
    #[error("feature column {0} already exists")]
    DuplicateColumn(String),
    #[error("feature {0} needs periods >= 1")]
    ZeroPeriods(String),
    #[error("feature name {0} clashes with a key column")]
    ReservedName(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{}: {reason}", .path.display())]
    Format { path: PathBuf, reason: String },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] ::config::ConfigError),
    #[error("unsupported config format {0:?}: expected .toml, .yaml, .yml or .json")]
    UnsupportedFormat(PathBuf),
    #[error("invalid year range {start}:{end}")]
    YearRange { start: i32, end: i32 },
    #[error("no indicators configured")]
    NoIndicators,
    #[error("indicator name {0} configured twice")]
    DuplicateIndicator(String),
    #[error("indicator name {0} clashes with a key column")]
    ReservedName(String),
    #[error("invalid retry policy: {0}")]
    Retry(String),
}

/// First fatal error of a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetching {indicator} failed")]
    Fetch {
        indicator: String,
        #[source]
        source: FetchError,
    },
    #[error("cleaning {indicator} failed")]
    Validation {
        indicator: String,
        #[source]
        source: ValidationError,
    },
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error(transparent)]
    Feature(#[from] FeatureError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
