//! Error type shared by the model, the training loop and the extraction pass.

use burn::record::RecorderError;
use thiserror::Error;

/// Errors raised by the factor model and its training loop.
///
/// Length mismatches between confounder and covariate rows, trailing
/// confounder elements that do not fill a full block, and non-finite batch
/// values are all recovered inside the forward pass and never surface here.
#[derive(Debug, Error)]
pub enum DeconfoundError {
    /// Incompatible tensor dimensions at a forward-pass boundary.
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: &'static str,
        expected: String,
        actual: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The loss of a training batch was NaN or infinite.
    #[error("non-finite loss {value} at epoch {epoch}, batch {batch}")]
    NonFiniteLoss { epoch: usize, batch: usize, value: f64 },

    #[error("{0} loader yielded no batches")]
    EmptyLoader(&'static str),

    #[error("tensor data conversion failed: {0}")]
    TensorData(String),

    #[error("checkpoint recorder error: {0}")]
    Recorder(#[from] RecorderError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeconfoundError {
    pub(crate) fn shape(
        context: &'static str,
        expected: impl std::fmt::Display,
        actual: impl std::fmt::Display,
    ) -> Self {
        Self::ShapeMismatch {
            context,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DeconfoundError>;
