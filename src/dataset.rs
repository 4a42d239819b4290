//! Batched trajectories and their conversion to Burn tensors.
//!
//! Every array is `[unit, time, feature]`. Batching only ever selects units;
//! the time axis of a trajectory is never reordered.

use crate::error::{DeconfoundError, Result};
use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use ndarray::{Array3, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// One batch as delivered by a data loader.
#[derive(Debug, Clone)]
pub struct TrajectoryBatch {
    pub previous_covariates: Array3<f32>,
    pub previous_treatments: Array3<f32>,
    pub covariates: Array3<f32>,
    pub treatments: Array3<f32>,
    pub outcomes: Array3<f32>,
}

/// The five batch arrays moved onto a device.
#[derive(Debug, Clone)]
pub struct BatchTensors<B: Backend> {
    pub previous_covariates: Tensor<B, 3>,
    pub previous_treatments: Tensor<B, 3>,
    pub covariates: Tensor<B, 3>,
    pub treatments: Tensor<B, 3>,
    pub outcomes: Tensor<B, 3>,
}

impl TrajectoryBatch {
    pub fn units(&self) -> usize {
        self.previous_covariates.len_of(Axis(0))
    }

    /// Copy of the batch with every NaN and infinity replaced by zero.
    pub fn sanitized(&self) -> Self {
        Self {
            previous_covariates: zero_non_finite(&self.previous_covariates),
            previous_treatments: zero_non_finite(&self.previous_treatments),
            covariates: zero_non_finite(&self.covariates),
            treatments: zero_non_finite(&self.treatments),
            outcomes: zero_non_finite(&self.outcomes),
        }
    }

    pub fn to_tensors<B: Backend>(&self, device: &B::Device) -> BatchTensors<B> {
        BatchTensors {
            previous_covariates: array_to_tensor(&self.previous_covariates, device),
            previous_treatments: array_to_tensor(&self.previous_treatments, device),
            covariates: array_to_tensor(&self.covariates, device),
            treatments: array_to_tensor(&self.treatments, device),
            outcomes: array_to_tensor(&self.outcomes, device),
        }
    }
}

/// Replace NaN and ±∞ with `0.0`.
pub fn zero_non_finite(array: &Array3<f32>) -> Array3<f32> {
    array.mapv(|v| if v.is_finite() { v } else { 0.0 })
}

pub fn array_to_tensor<B: Backend>(array: &Array3<f32>, device: &B::Device) -> Tensor<B, 3> {
    let shape = array.shape().to_vec();
    let values: Vec<f32> = array.iter().copied().collect();
    Tensor::from_data(TensorData::new(values, shape), device)
}

pub fn tensor_to_array<B: Backend>(tensor: Tensor<B, 3>) -> Result<Array3<f32>> {
    let [a, b, c] = tensor.dims();
    let values = tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| DeconfoundError::TensorData(format!("{e:?}")))?;
    Array3::from_shape_vec((a, b, c), values)
        .map_err(|e| DeconfoundError::TensorData(e.to_string()))
}

/// In-memory dataset of trajectories sharing a unit axis.
#[derive(Debug, Clone)]
pub struct TrajectoryDataset {
    batch: TrajectoryBatch,
}

impl TrajectoryDataset {
    /// Wrap the five `[unit, time, feature]` arrays.
    ///
    /// # Errors
    /// [`DeconfoundError::ShapeMismatch`] if the unit counts differ or the
    /// previous covariates and treatments disagree on their time length.
    pub fn new(
        previous_covariates: Array3<f32>,
        previous_treatments: Array3<f32>,
        covariates: Array3<f32>,
        treatments: Array3<f32>,
        outcomes: Array3<f32>,
    ) -> Result<Self> {
        let units = previous_covariates.len_of(Axis(0));
        for (name, array) in [
            ("previous treatments", &previous_treatments),
            ("covariates", &covariates),
            ("treatments", &treatments),
            ("outcomes", &outcomes),
        ] {
            if array.len_of(Axis(0)) != units {
                return Err(DeconfoundError::ShapeMismatch {
                    context: "dataset unit count",
                    expected: units.to_string(),
                    actual: format!("{} ({name})", array.len_of(Axis(0))),
                });
            }
        }
        if previous_treatments.len_of(Axis(1)) != previous_covariates.len_of(Axis(1)) {
            return Err(DeconfoundError::shape(
                "dataset previous time length",
                previous_covariates.len_of(Axis(1)),
                previous_treatments.len_of(Axis(1)),
            ));
        }

        Ok(Self {
            batch: TrajectoryBatch {
                previous_covariates,
                previous_treatments,
                covariates,
                treatments,
                outcomes,
            },
        })
    }

    pub fn len(&self) -> usize {
        self.batch.units()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The whole dataset as a single batch.
    pub fn as_batch(&self) -> &TrajectoryBatch {
        &self.batch
    }

    /// Batch of the given units, in the given order.
    pub fn select(&self, units: &[usize]) -> TrajectoryBatch {
        let b = &self.batch;
        TrajectoryBatch {
            previous_covariates: b.previous_covariates.select(Axis(0), units),
            previous_treatments: b.previous_treatments.select(Axis(0), units),
            covariates: b.covariates.select(Axis(0), units),
            treatments: b.treatments.select(Axis(0), units),
            outcomes: b.outcomes.select(Axis(0), units),
        }
    }

    /// Consecutive batches of at most `batch_size` units, in unit order.
    pub fn batches(&self, batch_size: usize) -> Vec<TrajectoryBatch> {
        let order: Vec<usize> = (0..self.len()).collect();
        self.batches_in_order(&order, batch_size)
    }

    /// Batches over a permutation of the units drawn from `seed`.
    pub fn shuffled_batches(&self, batch_size: usize, seed: u64) -> Vec<TrajectoryBatch> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        order.shuffle(&mut rng);
        self.batches_in_order(&order, batch_size)
    }

    fn batches_in_order(&self, order: &[usize], batch_size: usize) -> Vec<TrajectoryBatch> {
        order
            .chunks(batch_size.max(1))
            .map(|units| self.select(units))
            .collect()
    }
}

/// Source of the batches iterated in one epoch.
pub trait BatchLoader {
    fn epoch_batches(&self, epoch: usize) -> Vec<TrajectoryBatch>;
}

impl BatchLoader for [TrajectoryBatch] {
    fn epoch_batches(&self, _epoch: usize) -> Vec<TrajectoryBatch> {
        self.to_vec()
    }
}

impl BatchLoader for Vec<TrajectoryBatch> {
    fn epoch_batches(&self, _epoch: usize) -> Vec<TrajectoryBatch> {
        self.clone()
    }
}

/// Batches a [`TrajectoryDataset`], reshuffling units every epoch when
/// seeded.
#[derive(Debug, Clone)]
pub struct TrajectoryLoader<'a> {
    dataset: &'a TrajectoryDataset,
    batch_size: usize,
    shuffle_seed: Option<u64>,
}

impl<'a> TrajectoryLoader<'a> {
    pub fn new(dataset: &'a TrajectoryDataset, batch_size: usize) -> Self {
        Self {
            dataset,
            batch_size,
            shuffle_seed: None,
        }
    }

    pub fn with_shuffle_seed(mut self, seed: Option<u64>) -> Self {
        self.shuffle_seed = seed;
        self
    }
}

impl BatchLoader for TrajectoryLoader<'_> {
    fn epoch_batches(&self, epoch: usize) -> Vec<TrajectoryBatch> {
        match self.shuffle_seed {
            Some(seed) => self
                .dataset
                .shuffled_batches(self.batch_size, seed.wrapping_add(epoch as u64)),
            None => self.dataset.batches(self.batch_size),
        }
    }
}
