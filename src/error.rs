use crate::grid::error::GridError;
use crate::provider::error::ProviderError;
use crate::types::model::Model;
use chrono::NaiveDateTime;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WindSpeedError {
    #[error("Invalid timestamp '{input}', expected YYYY-MM-DD HH:MM: {source}")]
    Parse {
        input: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Invalid coordinate ({lat}, {lon}): latitude must be within [-90, 90] and longitude within [-180, 180]")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("No {model} data available for {valid_time}: {source}")]
    DataUnavailable {
        model: Model,
        valid_time: NaiveDateTime,
        #[source]
        source: ProviderError,
    },

    #[error("Failed to fetch {model} data for {valid_time}: {source}")]
    Fetch {
        model: Model,
        valid_time: NaiveDateTime,
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error("Failed to determine the system cache directory")]
    CacheDirResolution,

    #[error("Failed to create cache directory '{0}'")]
    CacheDirCreation(PathBuf, #[source] std::io::Error),
}

impl WindSpeedError {
    /// Splits provider failures into data that does not exist and everything else.
    pub(crate) fn from_provider(
        model: Model,
        valid_time: NaiveDateTime,
        source: ProviderError,
    ) -> Self {
        if source.is_not_found() {
            WindSpeedError::DataUnavailable {
                model,
                valid_time,
                source,
            }
        } else {
            WindSpeedError::Fetch {
                model,
                valid_time,
                source,
            }
        }
    }
}
