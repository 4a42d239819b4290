//! Structural and training configuration.
//!
//! Both configs derive Burn's [`Config`], so they can be written next to a
//! checkpoint with [`Config::save`] and restored with [`Config::load`].

use crate::error::{self, DeconfoundError};
use burn::config::Config;
use burn::optim::AdamConfig;
use std::path::PathBuf;

/// Number of decoder heads allocated by every factor model, whatever its
/// treatment count.
pub const NUM_DECODER_HEADS: usize = 57;

/// Structural hyperparameters of the factor model.
#[derive(Config, Debug)]
pub struct FactorModelConfig {
    /// Treatment dimension `T`.
    pub num_treatments: usize,
    /// Covariate dimension `C`.
    pub num_covariates: usize,
    /// Confounder dimension `K`.
    pub num_confounders: usize,
    pub max_sequence_length: usize,
    pub rnn_hidden_units: usize,
    pub fc_hidden_units: usize,
    /// Probability of keeping a hidden unit in the recurrent dropout.
    #[config(default = 1.0)]
    pub rnn_keep_prob: f64,
    #[config(default = 0.01)]
    pub leaky_relu_slope: f64,
    /// Drop the seed-step confounders before reshaping the confounder
    /// sequence, which makes the output exactly `[time, unit, K]`.
    #[config(default = false)]
    pub drop_seed_step: bool,
}

impl FactorModelConfig {
    /// Width of the recurrent input: previous covariates plus treatments.
    pub fn encoder_input_size(&self) -> usize {
        self.num_covariates + self.num_treatments
    }

    /// Width of the decoder input: confounders plus current covariates.
    pub fn decoder_input_size(&self) -> usize {
        self.num_confounders + self.num_covariates
    }

    pub fn validate(&self) -> error::Result<()> {
        let dims = [
            ("num_treatments", self.num_treatments),
            ("num_covariates", self.num_covariates),
            ("num_confounders", self.num_confounders),
            ("rnn_hidden_units", self.rnn_hidden_units),
            ("fc_hidden_units", self.fc_hidden_units),
        ];
        if let Some((name, _)) = dims.iter().find(|(_, v)| *v == 0) {
            return Err(DeconfoundError::InvalidConfig(format!(
                "{name} must be positive"
            )));
        }
        if self.num_treatments > NUM_DECODER_HEADS {
            return Err(DeconfoundError::InvalidConfig(format!(
                "num_treatments ({}) exceeds the {NUM_DECODER_HEADS} allocated decoder heads",
                self.num_treatments
            )));
        }
        let keep = self.rnn_keep_prob;
        if keep.is_nan() || keep <= 0.0 || keep > 1.0 {
            return Err(DeconfoundError::InvalidConfig(format!(
                "rnn_keep_prob must lie in (0, 1], got {}",
                self.rnn_keep_prob
            )));
        }
        Ok(())
    }
}

/// Optimization settings and output locations for [`crate::training::Trainer`].
#[derive(Config)]
pub struct TrainingConfig {
    pub model: FactorModelConfig,
    pub optimizer: AdamConfig,
    pub num_epochs: usize,
    #[config(default = 1e-3)]
    pub learning_rate: f64,
    #[config(default = 64)]
    pub batch_size: usize,
    #[config(default = 1.0)]
    pub max_grad_norm: f64,
    #[config(default = 5)]
    pub checkpoint_interval: usize,
    #[config(default = "String::from(\"checkpoints\")")]
    pub checkpoint_dir: String,
    #[config(default = "String::from(\"factor_model\")")]
    pub checkpoint_name: String,
    #[config(default = "String::from(\"r2_values.txt\")")]
    pub metrics_path: String,
    /// Seed for shuffling training units between epochs; `None` keeps the
    /// loader order.
    pub shuffle_seed: Option<u64>,
}

impl TrainingConfig {
    /// Checkpoint location without the recorder's file extension.
    pub fn checkpoint_path(&self) -> PathBuf {
        PathBuf::from(&self.checkpoint_dir).join(&self.checkpoint_name)
    }

    pub fn validate(&self) -> error::Result<()> {
        self.model.validate()?;
        if self.batch_size == 0 {
            return Err(DeconfoundError::InvalidConfig(
                "batch_size must be positive".to_string(),
            ));
        }
        if self.checkpoint_interval == 0 {
            return Err(DeconfoundError::InvalidConfig(
                "checkpoint_interval must be positive".to_string(),
            ));
        }
        if self.max_grad_norm.is_nan() || self.max_grad_norm <= 0.0 {
            return Err(DeconfoundError::InvalidConfig(format!(
                "max_grad_norm must be positive, got {}",
                self.max_grad_norm
            )));
        }
        Ok(())
    }
}
