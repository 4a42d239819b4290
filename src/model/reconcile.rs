//! Shape reconciliation between the recurrent encoder and the decoders.
//!
//! The seed step prepended to every rollout makes the encoder emit one more
//! timestep than the covariate tensors carry. Rather than failing, the forward
//! pass resolves these mismatches with the deterministic policies below. Each
//! one is silent towards the caller and logs at `trace` level.

use crate::error::{DeconfoundError, Result};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Flatten a time-major `[time, unit, features]` tensor to
/// `[time * unit, features]`, keeping the time-major row order.
pub fn flatten_time_major<B: Backend>(tensor: Tensor<B, 3>) -> Tensor<B, 2> {
    let [time, units, features] = tensor.dims();
    tensor.reshape([time * units, features])
}

/// Append zero rows until `tensor` has `rows` rows.
///
/// Pre: `rows >= tensor.dims()[0]`. Post: the first rows are unchanged and
/// the result has exactly `rows` rows. Returns `tensor` as is when it already
/// has `rows` rows.
pub fn pad_rows<B: Backend>(tensor: Tensor<B, 2>, rows: usize) -> Tensor<B, 2> {
    let [current, features] = tensor.dims();
    if rows <= current {
        return tensor;
    }
    let padding = Tensor::zeros([rows - current, features], &tensor.device());
    Tensor::cat(vec![tensor, padding], 0)
}

/// Confounder and covariate rows with equal row counts, ready to be
/// concatenated into the decoder input.
#[derive(Debug, Clone)]
pub struct RowAlignment<B: Backend> {
    pub confounders: Tensor<B, 2>,
    pub covariates: Tensor<B, 2>,
}

impl<B: Backend> RowAlignment<B> {
    pub fn rows(&self) -> usize {
        self.confounders.dims()[0]
    }

    /// `[rows, K + C]`
    pub fn into_decoder_input(self) -> Tensor<B, 2> {
        Tensor::cat(vec![self.confounders, self.covariates], 1)
    }
}

/// Make the flattened confounders and covariates agree on their row count.
///
/// Pre: both tensors are flattened time-major. Post: both have
/// `max(confounder_rows, covariate_rows)` rows; the shorter one is right-padded
/// with zeros. The confounders passed in are consumed, so callers that need
/// the un-padded sequence keep their own handle.
pub fn reconcile_row_counts<B: Backend>(
    confounders: Tensor<B, 2>,
    covariates: Tensor<B, 2>,
) -> RowAlignment<B> {
    let confounder_rows = confounders.dims()[0];
    let covariate_rows = covariates.dims()[0];
    let rows = confounder_rows.max(covariate_rows);

    if confounder_rows != covariate_rows {
        log::trace!(
            "zero-padding decoder input: {confounder_rows} confounder rows, \
             {covariate_rows} covariate rows -> {rows}"
        );
    }

    RowAlignment {
        confounders: pad_rows(confounders, rows),
        covariates: pad_rows(covariates, rows),
    }
}

/// Truncate predictions and targets to their common leading rows.
///
/// Post: both results have `min(prediction_rows, target_rows)` rows.
pub fn truncate_to_common_rows<B: Backend>(
    prediction: Tensor<B, 2>,
    target: Tensor<B, 2>,
) -> (Tensor<B, 2>, Tensor<B, 2>) {
    let [prediction_rows, prediction_cols] = prediction.dims();
    let [target_rows, target_cols] = target.dims();
    let rows = prediction_rows.min(target_rows);
    (
        prediction.slice([0..rows, 0..prediction_cols]),
        target.slice([0..rows, 0..target_cols]),
    )
}

/// Number of trailing elements dropped by [`reshape_confounder_blocks`].
pub fn trailing_excess(rows: usize, time: usize, num_confounders: usize) -> usize {
    (rows * num_confounders) % (time * num_confounders)
}

/// Reshape flattened `[rows, K]` confounders into `[time, units, K]`.
///
/// `units` is the number of full `time * K` element blocks contained in the
/// tensor. When the element count is not an exact multiple of `time * K`, the
/// trailing excess elements are dropped first. This loses real confounder
/// values and mixes timesteps across units whenever `rows` is not a multiple
/// of `time`; it is kept because downstream consumers depend on the layout.
///
/// # Errors
/// [`DeconfoundError::ShapeMismatch`] if not even one block fits, or the
/// confounder width is not `num_confounders`.
pub fn reshape_confounder_blocks<B: Backend>(
    confounders: Tensor<B, 2>,
    time: usize,
    num_confounders: usize,
) -> Result<Tensor<B, 3>> {
    let [rows, width] = confounders.dims();
    if width != num_confounders {
        return Err(DeconfoundError::shape(
            "confounder width",
            num_confounders,
            width,
        ));
    }
    let block = time * num_confounders;
    let total = rows * num_confounders;
    let units = if block == 0 { 0 } else { total / block };
    if units == 0 {
        return Err(DeconfoundError::shape(
            "confounder blocks",
            format!("at least {block} elements"),
            total,
        ));
    }

    let excess = trailing_excess(rows, time, num_confounders);
    let flat = confounders.reshape([total]);
    let flat = if excess > 0 {
        log::trace!("dropping {excess} trailing confounder elements before reshape");
        flat.narrow(0, 0, total - excess)
    } else {
        flat
    };

    Ok(flat.reshape([time, units, num_confounders]))
}
