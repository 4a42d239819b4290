use crate::error::{DeconfoundError, Result};
use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Recurrent state threaded through [`AutoRegressiveLSTMCell::forward`].
///
/// Every tensor is `[batch, features]`: `hidden` and `cell` have
/// `hidden_size` features, `confounder` has `num_confounders`.
#[derive(Debug, Clone)]
pub struct RecurrentState<B: Backend> {
    pub hidden: Tensor<B, 2>,
    pub cell: Tensor<B, 2>,
    pub confounder: Tensor<B, 2>,
}

impl<B: Backend> RecurrentState<B> {
    /// All-zero state for `batch_size` units.
    pub fn zeros(
        batch_size: usize,
        hidden_size: usize,
        num_confounders: usize,
        device: &B::Device,
    ) -> Self {
        Self {
            hidden: Tensor::zeros([batch_size, hidden_size], device),
            cell: Tensor::zeros([batch_size, hidden_size], device),
            confounder: Tensor::zeros([batch_size, num_confounders], device),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.hidden.dims()[0]
    }
}

/// LSTM cell whose previous confounder is fed back as extra input.
///
/// One step computes:
/// - x' = [x, z]
/// - i = tanh(W_ii @ x' + b_ii + W_hi @ h)
/// - g = sigmoid(W_ig @ x' + b_ig + W_hg @ h)
/// - f = sigmoid(W_if @ x' + b_if + W_hf @ h + 1)
/// - o = sigmoid(W_io @ x' + b_io + W_ho @ h)
/// - c' = f * c + i * g
/// - h' = o * tanh(c')
/// - z' = tanh(W_z @ h' + b_z)
///
/// The confounder width is independent of the hidden width.
#[derive(Module, Debug)]
pub struct AutoRegressiveLSTMCell<B: Backend> {
    input_size: usize,
    hidden_size: usize,
    num_confounders: usize,
    input_map: Linear<B>,      // [x, z] -> 4 * hidden_size (with bias)
    recurrent_map: Linear<B>,  // h -> 4 * hidden_size (no bias)
    confounder_map: Linear<B>, // h' -> num_confounders
}

impl<B: Backend> AutoRegressiveLSTMCell<B> {
    /// Create a new autoregressive LSTM cell
    ///
    /// # Arguments
    /// * `input_size` - Size of the observed input features
    /// * `hidden_size` - Size of the hidden and cell states
    /// * `num_confounders` - Size of the confounder emitted per step
    /// * `device` - Device to create the module on
    pub fn new(
        input_size: usize,
        hidden_size: usize,
        num_confounders: usize,
        device: &B::Device,
    ) -> Self {
        let input_map = LinearConfig::new(input_size + num_confounders, 4 * hidden_size)
            .with_bias(true)
            .init(device);

        let recurrent_map = LinearConfig::new(hidden_size, 4 * hidden_size)
            .with_bias(false)
            .init(device);

        let confounder_map = LinearConfig::new(hidden_size, num_confounders)
            .with_bias(true)
            .init(device);

        Self {
            input_size,
            hidden_size,
            num_confounders,
            input_map,
            recurrent_map,
            confounder_map,
        }
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn num_confounders(&self) -> usize {
        self.num_confounders
    }

    /// Advance the recurrence by one timestep.
    ///
    /// # Arguments
    /// * `input` - Input tensor of shape `[batch_size, input_size]`
    /// * `state` - Previous (hidden, cell, confounder) state
    ///
    /// # Returns
    /// The new state; its `confounder` is the step output.
    ///
    /// # Errors
    /// [`DeconfoundError::ShapeMismatch`] if the input width is not
    /// `input_size` or the batch sizes of input and state disagree.
    pub fn forward(
        &self,
        input: Tensor<B, 2>,
        state: RecurrentState<B>,
    ) -> Result<RecurrentState<B>> {
        let [batch_size, features] = input.dims();
        if features != self.input_size {
            return Err(DeconfoundError::shape(
                "recurrent cell input features",
                self.input_size,
                features,
            ));
        }
        if state.batch_size() != batch_size {
            return Err(DeconfoundError::shape(
                "recurrent cell state batch",
                batch_size,
                state.batch_size(),
            ));
        }

        let RecurrentState {
            hidden,
            cell,
            confounder,
        } = state;

        let augmented = Tensor::cat(vec![input, confounder], 1);
        let z = self.input_map.forward(augmented) + self.recurrent_map.forward(hidden);

        let chunks = z.chunk(4, 1);
        let input_activation = chunks[0].clone().tanh();
        let input_gate = activation::sigmoid(chunks[1].clone());
        let forget_gate = activation::sigmoid(chunks[2].clone() + 1.0);
        let output_gate = activation::sigmoid(chunks[3].clone());

        let new_cell = cell * forget_gate + input_activation * input_gate;
        let new_hidden = new_cell.clone().tanh() * output_gate;
        let new_confounder = self.confounder_map.forward(new_hidden.clone()).tanh();

        Ok(RecurrentState {
            hidden: new_hidden,
            cell: new_cell,
            confounder: new_confounder,
        })
    }
}
