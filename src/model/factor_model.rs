//! Recurrent factor model
//!
//! Encodes the treatment and covariate history of every unit into one latent
//! confounder per timestep, then reconstructs the treatment assignment of each
//! timestep from those confounders and the current covariates.

use super::decoder::DecoderHeads;
use super::reconcile::{flatten_time_major, reconcile_row_counts, reshape_confounder_blocks};
use crate::cells::RecurrentState;
use crate::config::{FactorModelConfig, NUM_DECODER_HEADS};
use crate::dataset::TrajectoryBatch;
use crate::error::{DeconfoundError, Result};
use crate::rnn::AutoRegressiveLSTM;
use burn::module::{Module, Param};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Result of one factor model forward pass.
#[derive(Debug, Clone)]
pub struct FactorOutput<B: Backend> {
    /// `[rows, num_treatments]`, one row per time-major (time, unit) pair of
    /// the decoder input.
    pub treatment_predictions: Tensor<B, 2>,
    /// `[time, units, num_confounders]`
    pub confounders: Tensor<B, 3>,
}

impl<B: Backend> FactorOutput<B> {
    pub fn decoder_rows(&self) -> usize {
        self.treatment_predictions.dims()[0]
    }
}

/// Factor model over treatment assignments
///
/// Parameters: a learned seed input and learned initial hidden, cell and
/// confounder states shared by every unit, the autoregressive encoder, and
/// one decoder head per treatment.
///
/// # Type Parameters
/// * `B` - The backend type
#[derive(Module, Debug)]
pub struct FactorModel<B: Backend> {
    /// Seed input prepended to every rollout, `[1, C + T]`
    init_input: Param<Tensor<B, 2>>,
    /// `[1, rnn_hidden_units]`
    init_hidden: Param<Tensor<B, 2>>,
    /// `[1, rnn_hidden_units]`
    init_cell: Param<Tensor<B, 2>>,
    /// `[1, num_confounders]`
    init_confounder: Param<Tensor<B, 2>>,
    encoder: AutoRegressiveLSTM<B>,
    decoders: DecoderHeads<B>,
    num_treatments: usize,
    num_covariates: usize,
    num_confounders: usize,
    max_sequence_length: usize,
    drop_seed_step: bool,
}

impl<B: Backend> FactorModel<B> {
    /// Create a new factor model
    ///
    /// # Errors
    /// [`DeconfoundError::InvalidConfig`] if the configuration is rejected by
    /// [`FactorModelConfig::validate`].
    pub fn new(config: &FactorModelConfig, device: &B::Device) -> Result<Self> {
        config.validate()?;

        let encoder = AutoRegressiveLSTM::new(
            config.encoder_input_size(),
            config.rnn_hidden_units,
            config.num_confounders,
            config.rnn_keep_prob,
            device,
        );
        let decoders = DecoderHeads::new(
            NUM_DECODER_HEADS,
            config.decoder_input_size(),
            config.fc_hidden_units,
            config.leaky_relu_slope,
            device,
        );

        Ok(Self {
            init_input: Param::from_tensor(Tensor::zeros(
                [1, config.encoder_input_size()],
                device,
            )),
            init_hidden: Param::from_tensor(Tensor::zeros([1, config.rnn_hidden_units], device)),
            init_cell: Param::from_tensor(Tensor::zeros([1, config.rnn_hidden_units], device)),
            init_confounder: Param::from_tensor(Tensor::zeros(
                [1, config.num_confounders],
                device,
            )),
            encoder,
            decoders,
            num_treatments: config.num_treatments,
            num_covariates: config.num_covariates,
            num_confounders: config.num_confounders,
            max_sequence_length: config.max_sequence_length,
            drop_seed_step: config.drop_seed_step,
        })
    }

    pub fn num_treatments(&self) -> usize {
        self.num_treatments
    }

    pub fn num_covariates(&self) -> usize {
        self.num_covariates
    }

    pub fn num_confounders(&self) -> usize {
        self.num_confounders
    }

    pub fn max_sequence_length(&self) -> usize {
        self.max_sequence_length
    }

    pub fn decoders(&self) -> &DecoderHeads<B> {
        &self.decoders
    }

    pub fn encoder(&self) -> &AutoRegressiveLSTM<B> {
        &self.encoder
    }

    /// Learned initial state broadcast to `units` rows.
    fn initial_state(&self, units: usize) -> RecurrentState<B> {
        let hidden = self.encoder.hidden_size();
        RecurrentState {
            hidden: self.init_hidden.val().expand([units, hidden]),
            cell: self.init_cell.val().expand([units, hidden]),
            confounder: self
                .init_confounder
                .val()
                .expand([units, self.num_confounders]),
        }
    }

    /// Encoder input: seed step followed by `[covariates, treatments]` of
    /// every previous timestep, `[time + 1, units, C + T]`.
    fn encoder_input(
        &self,
        previous_covariates: Tensor<B, 3>,
        previous_treatments: Tensor<B, 3>,
    ) -> Tensor<B, 3> {
        let units = previous_covariates.dims()[0];
        let width = self.num_covariates + self.num_treatments;

        let history =
            Tensor::cat(vec![previous_covariates, previous_treatments], 2).swap_dims(0, 1);
        let seed: Tensor<B, 3> = self.init_input.val().expand([units, width]).unsqueeze();
        Tensor::cat(vec![seed, history], 0)
    }

    fn check_inputs(
        &self,
        previous_covariates: &Tensor<B, 3>,
        previous_treatments: &Tensor<B, 3>,
        current_covariates: &Tensor<B, 3>,
    ) -> Result<()> {
        let [units, time, covariates] = previous_covariates.dims();
        let [treatment_units, treatment_time, treatments] = previous_treatments.dims();
        let [current_units, _, current_features] = current_covariates.dims();

        if treatment_units != units || current_units != units {
            return Err(DeconfoundError::shape(
                "factor model unit count",
                units,
                format!(
                    "{treatment_units} (previous treatments), \
                     {current_units} (current covariates)"
                ),
            ));
        }
        if treatment_time != time {
            return Err(DeconfoundError::shape(
                "factor model previous time length",
                time,
                treatment_time,
            ));
        }
        if time == 0 {
            return Err(DeconfoundError::shape(
                "factor model previous time length",
                "at least one timestep",
                0,
            ));
        }
        if covariates != self.num_covariates {
            return Err(DeconfoundError::shape(
                "previous covariate features",
                self.num_covariates,
                covariates,
            ));
        }
        if treatments != self.num_treatments {
            return Err(DeconfoundError::shape(
                "previous treatment features",
                self.num_treatments,
                treatments,
            ));
        }
        if current_features != self.num_covariates {
            return Err(DeconfoundError::shape(
                "current covariate features",
                self.num_covariates,
                current_features,
            ));
        }
        if time > self.max_sequence_length {
            log::warn!(
                "batch time length {time} exceeds configured max_sequence_length {}",
                self.max_sequence_length
            );
        }
        Ok(())
    }

    /// Forward pass through the factor model
    ///
    /// # Arguments
    /// * `previous_covariates` - `[units, time, C]`
    /// * `previous_treatments` - `[units, time, T]`
    /// * `current_covariates` - `[units, time', C]`; `time'` may differ from
    ///   `time`, the row counts are reconciled by zero-padding
    ///
    /// # Returns
    /// Treatment predictions with `max(units * (time + 1), units * time')`
    /// rows, and the confounder sequence `[time, units', K]` (see
    /// [`reshape_confounder_blocks`] for how `units'` is derived).
    ///
    /// # Errors
    /// [`DeconfoundError::ShapeMismatch`] if unit counts disagree, the previous
    /// tensors differ in time length, or a feature width does not match the
    /// configuration.
    pub fn forward(
        &self,
        previous_covariates: Tensor<B, 3>,
        previous_treatments: Tensor<B, 3>,
        current_covariates: Tensor<B, 3>,
    ) -> Result<FactorOutput<B>> {
        self.check_inputs(&previous_covariates, &previous_treatments, &current_covariates)?;
        let [units, time, _] = previous_covariates.dims();

        let rnn_input = self.encoder_input(previous_covariates, previous_treatments);
        let (rollout, _) = self.encoder.forward(rnn_input, self.initial_state(units))?;

        let hidden_confounders = flatten_time_major(rollout.clone());
        let covariates = flatten_time_major(current_covariates.swap_dims(0, 1));

        let decoder_input =
            reconcile_row_counts(hidden_confounders.clone(), covariates).into_decoder_input();
        let treatment_predictions = self.decoders.forward(decoder_input, self.num_treatments);

        let confounders = if self.drop_seed_step {
            let observed = rollout.narrow(0, 1, time);
            reshape_confounder_blocks(flatten_time_major(observed), time, self.num_confounders)?
        } else {
            reshape_confounder_blocks(hidden_confounders, time, self.num_confounders)?
        };

        Ok(FactorOutput {
            treatment_predictions,
            confounders,
        })
    }

    /// Forward pass over a host batch, moved to `device` first.
    pub fn forward_batch(
        &self,
        batch: &TrajectoryBatch,
        device: &B::Device,
    ) -> Result<FactorOutput<B>> {
        let tensors = batch.to_tensors::<B>(device);
        self.forward(
            tensors.previous_covariates,
            tensors.previous_treatments,
            tensors.covariates,
        )
    }
}
