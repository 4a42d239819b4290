//! Confounder extraction over a full dataset.

use crate::dataset::{tensor_to_array, BatchLoader};
use crate::error::{DeconfoundError, Result};
use crate::model::FactorModel;
use burn::tensor::backend::Backend;
use ndarray::{concatenate, Array3, Axis};

/// Run the factor model over every batch of `loader` and stack the
/// confounders along the unit axis, giving `[units, time, K]`.
///
/// Pass a model without gradient tracking: the inner model from
/// [`burn::module::AutodiffModule::valid`] or one built on a plain backend.
/// Batches are sanitized like training batches. Each batch contributes as
/// many units as its confounder reshape yields, see
/// [`crate::model::reconcile::reshape_confounder_blocks`].
pub fn compute_hidden_confounders<B, L>(
    model: &FactorModel<B>,
    loader: &L,
    device: &B::Device,
) -> Result<Array3<f32>>
where
    B: Backend,
    L: BatchLoader + ?Sized,
{
    let mut confounders = Vec::new();
    for batch in loader.epoch_batches(0) {
        let output = model.forward_batch(&batch.sanitized(), device)?;
        confounders.push(tensor_to_array(output.confounders.swap_dims(0, 1))?);
    }
    if confounders.is_empty() {
        return Err(DeconfoundError::EmptyLoader("extraction"));
    }

    let views: Vec<_> = confounders.iter().map(|c| c.view()).collect();
    concatenate(Axis(0), &views).map_err(|e| DeconfoundError::ShapeMismatch {
        context: "confounder concatenation",
        expected: "equal time and confounder widths across batches".to_string(),
        actual: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FactorModelConfig;
    use crate::dataset::TrajectoryDataset;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn dataset(units: usize, time: usize) -> TrajectoryDataset {
        let fill = |f: usize| {
            Array3::from_shape_fn((units, time, f), |(u, t, k)| 0.05 * (u * 3 + t + k) as f32)
        };
        TrajectoryDataset::new(fill(2), fill(2), fill(2), fill(2), fill(1)).unwrap()
    }

    #[test]
    fn test_extraction_independent_of_batch_size() {
        let device = Default::default();
        let config = FactorModelConfig::new(2, 2, 3, 4, 8, 6).with_drop_seed_step(true);
        let model = FactorModel::<TestBackend>::new(&config, &device).unwrap();
        let data = dataset(10, 4);

        let whole = compute_hidden_confounders(&model, &data.batches(10), &device).unwrap();
        let split = compute_hidden_confounders(&model, &data.batches(3), &device).unwrap();

        assert_eq!(whole.shape(), &[10, 4, 3]);
        assert_eq!(split.shape(), &[10, 4, 3]);
        for (a, b) in whole.iter().zip(split.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn test_extraction_block_truncation_per_batch() {
        let device = Default::default();
        let config = FactorModelConfig::new(2, 2, 1, 3, 8, 6);
        let model = FactorModel::<TestBackend>::new(&config, &device).unwrap();
        let data = dataset(8, 3);

        // (3 + 1) * 4 = 16 confounders per batch of 4, blocks of 3 -> 5 units.
        let confounders = compute_hidden_confounders(&model, &data.batches(4), &device).unwrap();
        assert_eq!(confounders.shape(), &[10, 3, 1]);
    }

    #[test]
    fn test_empty_loader() {
        let device = Default::default();
        let config = FactorModelConfig::new(2, 2, 1, 3, 8, 6);
        let model = FactorModel::<TestBackend>::new(&config, &device).unwrap();
        let empty: Vec<crate::dataset::TrajectoryBatch> = Vec::new();
        assert!(compute_hidden_confounders(&model, &empty, &device).is_err());
    }
}
