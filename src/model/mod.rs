//! # Factor Model
//!
//! The factor model rolls an [`AutoRegressiveLSTM`](crate::rnn::AutoRegressiveLSTM)
//! over each unit's history and decodes treatment assignments from the
//! resulting confounders.
//!
//! ## Tensor Shapes
//!
//! | Tensor | Shape | Description |
//! |--------|-------|-------------|
//! | `previous_covariates` | `[units, time, C]` | Covariates up to t-1 |
//! | `previous_treatments` | `[units, time, T]` | Treatments up to t-1 |
//! | `current_covariates` | `[units, time', C]` | Covariates at t |
//! | `treatment_predictions` | `[rows, T]` | Time-major decoder rows |
//! | `confounders` | `[time, units', K]` | Confounder sequence |
//!
//! `rows` is `max(units * (time + 1), units * time')`: the seed step makes the
//! encoder one step longer than the observed history, and the shorter side is
//! zero-padded by [`reconcile::reconcile_row_counts`].

pub mod decoder;
pub mod factor_model;
pub mod reconcile;

pub use decoder::{DecoderHeads, TreatmentDecoder};
pub use factor_model::{FactorModel, FactorOutput};
