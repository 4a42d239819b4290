//! # Training and Extraction
//!
//! [`Trainer`] runs the epoch loop over a [`FactorModel`](crate::model::FactorModel):
//!
//! 1. **Train phase**: sanitize each batch, forward, truncate predictions and
//!    targets to their common rows, MSE loss, backward, clip the global
//!    gradient norm, Adam step.
//! 2. **Validation phase**: same data flow on the inner (non-autodiff) model.
//! 3. **Checkpoint**: every `checkpoint_interval` epochs, starting at epoch 0,
//!    overwriting the same file.
//!
//! After the last epoch the per-epoch R² history is written to the metrics
//! file. [`compute_hidden_confounders`] then turns a trained model into the
//! `[units, time, K]` confounder array.
//!
//! ## Example
//!
//! ```ignore
//! use burn::backend::{Autodiff, NdArray};
//! use burn::optim::AdamConfig;
//! use deconfounder::prelude::*;
//!
//! type Backend = Autodiff<NdArray<f32>>;
//!
//! let model = FactorModelConfig::new(2, 2, 1, 3, 32, 16);
//! let config = TrainingConfig::new(model, AdamConfig::new(), 20);
//! let trainer = Trainer::<Backend>::new(config, Default::default())?;
//!
//! let report = trainer.fit_datasets(trainer.init_model()?, &train, &valid)?;
//! let confounders = trainer.extract(&report.model, &all.batches(64))?;
//! ```

pub mod checkpoint;
pub mod clipping;
pub mod extraction;
pub mod metrics;
pub mod trainer;

pub use checkpoint::{load_checkpoint, save_checkpoint, CheckpointRecorder};
pub use clipping::{clip_gradient_norm, gradient_norm};
pub use extraction::compute_hidden_confounders;
pub use metrics::{r2_score, treatment_accuracy, BatchMetrics, EpochMetrics};
pub use trainer::{aligned_predictions, Trainer, TrainingReport};
