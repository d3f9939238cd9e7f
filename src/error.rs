// src/error.rs

use arrow::error::ArrowError;
use thiserror::Error;

use crate::store::Layer;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fatal outcomes of a stage. Row-level data problems never end up here;
/// they are filtered or bucketed inside the stage and reported as diagnostics.
#[derive(Debug, Error)]
pub enum StageError {
    /// The input layer or raw file is missing, unreadable or corrupt.
    #[error("source unavailable: {what}")]
    SourceUnavailable {
        what: String,
        #[source]
        source: BoxError,
    },

    /// A column produced by an earlier stage is absent.
    #[error("layer `{layer}` has no `{column}` column; re-run the stage that derives it")]
    MissingDerivedColumn { layer: Layer, column: String },

    /// A column the raw input must carry is absent.
    #[error("layer `{layer}` has no `{column}` column")]
    MissingRequiredColumn { layer: Layer, column: String },

    /// The target layer could not be written. Nothing partial is visible.
    #[error("failed to write layer `{layer}`")]
    WriteFailed {
        layer: Layer,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Arrow(#[from] ArrowError),
}

pub type StageResult<T> = Result<T, StageError>;

impl StageError {
    pub fn source_unavailable(what: impl Into<String>, source: impl Into<BoxError>) -> Self {
        StageError::SourceUnavailable {
            what: what.into(),
            source: source.into(),
        }
    }

    pub fn write_failed(layer: Layer, source: impl Into<BoxError>) -> Self {
        StageError::WriteFailed {
            layer,
            source: source.into(),
        }
    }

    /// Schema errors mean the pipeline ran out of order or the input is the
    /// wrong shape; retrying the same stage cannot fix either.
    pub fn is_retryable(&self) -> bool {
        match self {
            StageError::SourceUnavailable { .. } | StageError::WriteFailed { .. } => true,
            StageError::MissingDerivedColumn { .. } | StageError::MissingRequiredColumn { .. } => {
                false
            }
            StageError::Arrow(_) => false,
        }
    }
}
