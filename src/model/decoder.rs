use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::activation;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Feed-forward head predicting one treatment from `[confounders, covariates]`.
///
/// `Linear(input → hidden) → LeakyReLU → Linear(hidden → 1)`
#[derive(Module, Debug)]
pub struct TreatmentDecoder<B: Backend> {
    hidden: Linear<B>,
    output: Linear<B>,
    negative_slope: f64,
}

impl<B: Backend> TreatmentDecoder<B> {
    pub fn new(
        input_size: usize,
        hidden_size: usize,
        negative_slope: f64,
        device: &B::Device,
    ) -> Self {
        Self {
            hidden: LinearConfig::new(input_size, hidden_size).init(device),
            output: LinearConfig::new(hidden_size, 1).init(device),
            negative_slope,
        }
    }

    /// `[rows, input_size]` → `[rows, 1]`
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.hidden.forward(input);
        let x = activation::leaky_relu(x, self.negative_slope);
        self.output.forward(x)
    }
}

/// Fixed-size list of independently parameterized decoder heads, indexed by
/// treatment id.
#[derive(Module, Debug)]
pub struct DecoderHeads<B: Backend> {
    heads: Vec<TreatmentDecoder<B>>,
}

impl<B: Backend> DecoderHeads<B> {
    pub fn new(
        num_heads: usize,
        input_size: usize,
        hidden_size: usize,
        negative_slope: f64,
        device: &B::Device,
    ) -> Self {
        let heads = (0..num_heads)
            .map(|_| TreatmentDecoder::new(input_size, hidden_size, negative_slope, device))
            .collect();
        Self { heads }
    }

    pub fn len(&self) -> usize {
        self.heads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    pub fn head(&self, treatment: usize) -> Option<&TreatmentDecoder<B>> {
        self.heads.get(treatment)
    }

    /// Run the first `num_treatments` heads and concatenate their scalars
    /// into `[rows, num_treatments]`.
    ///
    /// Callers guarantee `0 < num_treatments <= self.len()`.
    pub fn forward(&self, input: Tensor<B, 2>, num_treatments: usize) -> Tensor<B, 2> {
        let predictions = self.heads[..num_treatments]
            .iter()
            .map(|head| head.forward(input.clone()))
            .collect();
        Tensor::cat(predictions, 1)
    }
}
