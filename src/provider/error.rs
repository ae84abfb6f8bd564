use crate::grid::error::GridError;
use crate::types::model::Model;
use chrono::NaiveDateTime;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("No {model} file found for {valid_time} (tried {tried})")]
    NotFound {
        model: Model,
        valid_time: NaiveDateTime,
        tried: String,
    },

    #[error("Index {url} lists no message matching '{pattern}'")]
    NoMatchingMessages { url: String, pattern: String },

    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read cache file '{0}'")]
    CacheRead(PathBuf, #[source] std::io::Error),

    #[error("Failed to write cache file '{0}'")]
    CacheWrite(PathBuf, #[source] std::io::Error),

    #[error("Failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),

    #[error("Malformed line {line_number} in index {url}: '{line}'")]
    IndexParse {
        url: String,
        line_number: usize,
        line: String,
    },

    #[error("Malformed GRIB2 data: {0}")]
    MalformedGrib(String),

    #[error("Failed to unpack GRIB2 values: {0}")]
    Unpack(String),

    #[error("GRIB2 data does not contain {0}")]
    MissingVariable(&'static str),

    #[error("Unsupported GRIB2 grid definition template 3.{0}")]
    UnsupportedGrid(u16),

    #[error("Unsupported GRIB2 scanning mode {0:#010b}")]
    UnsupportedScanningMode(u8),

    #[error("U and V fields are defined on different grids")]
    GridMismatch,

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error("Background task failed to complete")]
    TaskJoin(#[from] tokio::task::JoinError),
}

impl ProviderError {
    /// `true` when the requested data does not exist at any source, as opposed to
    /// a failure while retrieving or reading data that does exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ProviderError::NotFound { .. } | ProviderError::NoMatchingMessages { .. }
        )
    }
}
