//! Autoregressive LSTM layer
//!
//! Unrolls an [`AutoRegressiveLSTMCell`] over the time axis of a sequence-first
//! tensor, starting from a state supplied by the caller.

use crate::cells::{AutoRegressiveLSTMCell, RecurrentState};
use crate::error::{DeconfoundError, Result};
use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Autoregressive LSTM layer
///
/// Processes `[seq_len, batch, input_size]` sequences and returns one
/// confounder per timestep. Output dropout is applied to the emitted
/// confounders only; the state carried to the next step is never dropped.
///
/// # Type Parameters
/// * `B` - The backend type
#[derive(Module, Debug)]
pub struct AutoRegressiveLSTM<B: Backend> {
    cell: AutoRegressiveLSTMCell<B>,
    output_dropout: Dropout,
}

impl<B: Backend> AutoRegressiveLSTM<B> {
    /// Create a new autoregressive LSTM layer
    ///
    /// # Arguments
    /// * `input_size` - Number of input features per timestep
    /// * `hidden_size` - Number of hidden units
    /// * `num_confounders` - Confounder width emitted per timestep
    /// * `keep_prob` - Probability of keeping an output unit while training
    /// * `device` - Device to create the module on
    pub fn new(
        input_size: usize,
        hidden_size: usize,
        num_confounders: usize,
        keep_prob: f64,
        device: &B::Device,
    ) -> Self {
        Self {
            cell: AutoRegressiveLSTMCell::new(input_size, hidden_size, num_confounders, device),
            output_dropout: DropoutConfig::new(1.0 - keep_prob).init(),
        }
    }

    pub fn input_size(&self) -> usize {
        self.cell.input_size()
    }

    pub fn hidden_size(&self) -> usize {
        self.cell.hidden_size()
    }

    pub fn num_confounders(&self) -> usize {
        self.cell.num_confounders()
    }

    pub fn cell(&self) -> &AutoRegressiveLSTMCell<B> {
        &self.cell
    }

    /// Roll the cell across every timestep of `input`.
    ///
    /// # Arguments
    /// * `input` - Tensor of shape `[seq_len, batch, input_size]`
    /// * `initial_state` - State seeding the first step, batch size `batch`
    ///
    /// # Returns
    /// Tuple of (confounders, final_state) where:
    /// - confounders: `[seq_len, batch, num_confounders]`
    /// - final_state: state after the last timestep
    pub fn forward(
        &self,
        input: Tensor<B, 3>,
        initial_state: RecurrentState<B>,
    ) -> Result<(Tensor<B, 3>, RecurrentState<B>)> {
        let [seq_len, batch_size, _] = input.dims();
        if seq_len == 0 {
            return Err(DeconfoundError::shape(
                "recurrent rollout length",
                "at least one timestep",
                0,
            ));
        }
        if initial_state.batch_size() != batch_size {
            return Err(DeconfoundError::shape(
                "recurrent rollout initial state batch",
                batch_size,
                initial_state.batch_size(),
            ));
        }

        let mut state = initial_state;
        let mut outputs: Vec<Tensor<B, 2>> = Vec::with_capacity(seq_len);

        for t in 0..seq_len {
            // input[t, batch, features] -> [batch, features]
            let step_input = input.clone().narrow(0, t, 1).squeeze(0);
            state = self.cell.forward(step_input, state)?;
            outputs.push(self.output_dropout.forward(state.confounder.clone()));
        }

        let confounders = Tensor::stack(outputs, 0); // [seq, batch, K]
        Ok((confounders, state))
    }
}
