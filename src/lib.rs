//! # Deconfounder - Time-Varying Hidden Confounders (Rust)
//!
//! Recurrent factor model for longitudinal observational data, using the Burn
//! framework.
//!
//! An autoregressive LSTM encodes each unit's covariate and treatment history
//! into one latent confounder per timestep. Independent decoder heads then
//! reconstruct every treatment assignment from the confounders and the
//! current covariates. Once trained, the confounder sequence is extracted for
//! downstream causal estimation.
//!
//! ## Features
//!
//! - **Autoregressive LSTM**: confounder output fed back as input at each step
//! - **Learned seeds**: initial input and hidden/cell/confounder states
//! - **Multi-head decoding**: 57 independent heads, one per treatment
//! - **Shape reconciliation**: deterministic zero-padding and block truncation
//! - **Training loop**: Adam, global gradient-norm clipping, R², checkpoints
//!
//! ## Quick Start
//!
//! ```rust
//! use burn::backend::NdArray;
//! use burn::tensor::Tensor;
//! use deconfounder::prelude::*;
//!
//! type Backend = NdArray<f32>;
//! let device = Default::default();
//!
//! // 2 treatments, 3 covariates, 1 confounder, sequences of 4 steps
//! let config = FactorModelConfig::new(2, 3, 1, 4, 16, 8).with_drop_seed_step(true);
//! let model = FactorModel::<Backend>::new(&config, &device).unwrap();
//!
//! let previous_covariates = Tensor::<Backend, 3>::zeros([5, 4, 3], &device);
//! let previous_treatments = Tensor::<Backend, 3>::zeros([5, 4, 2], &device);
//! let covariates = Tensor::<Backend, 3>::zeros([5, 4, 3], &device);
//!
//! let output = model
//!     .forward(previous_covariates, previous_treatments, covariates)
//!     .unwrap();
//! assert_eq!(output.treatment_predictions.dims(), [25, 2]);
//! assert_eq!(output.confounders.dims(), [4, 5, 1]);
//! ```

pub mod cells;
pub mod config;
pub mod dataset;
pub mod error;
pub mod model;
pub mod rnn;
pub mod training;

pub use error::{DeconfoundError, Result};

pub mod prelude {
    pub use crate::cells::{AutoRegressiveLSTMCell, RecurrentState};
    pub use crate::config::{FactorModelConfig, TrainingConfig};
    pub use crate::dataset::{BatchLoader, TrajectoryBatch, TrajectoryDataset, TrajectoryLoader};
    pub use crate::error::DeconfoundError;
    pub use crate::model::{FactorModel, FactorOutput};
    pub use crate::rnn::AutoRegressiveLSTM;
    pub use crate::training::{compute_hidden_confounders, Trainer, TrainingReport};
}
