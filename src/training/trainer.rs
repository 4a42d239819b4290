//! Epoch loop: train phase, validation phase, periodic checkpoint.

use super::checkpoint::save_checkpoint;
use super::clipping::clip_gradient_norm;
use super::extraction::compute_hidden_confounders;
use super::metrics::{
    r2_score, treatment_accuracy, write_r2_history, BatchMetrics, EpochMetrics,
    MetricAccumulator,
};
use crate::config::TrainingConfig;
use crate::dataset::{BatchLoader, TrajectoryBatch, TrajectoryDataset, TrajectoryLoader};
use crate::error::{DeconfoundError, Result};
use crate::model::reconcile::{flatten_time_major, truncate_to_common_rows};
use crate::model::FactorModel;
use burn::config::Config;
use burn::module::AutodiffModule;
use burn::nn::loss::{MseLoss, Reduction};
use burn::optim::{GradientsParams, Optimizer};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{ElementConversion, Tensor};
use ndarray::Array3;
use std::path::{Path, PathBuf};

/// Treatment predictions and targets of one batch, truncated to their common
/// rows.
///
/// The batch is sanitized first. Targets are the current treatments
/// flattened time-major, matching the row order of the decoder input.
pub fn aligned_predictions<B: Backend>(
    model: &FactorModel<B>,
    batch: &TrajectoryBatch,
    device: &B::Device,
) -> Result<(Tensor<B, 2>, Tensor<B, 2>)> {
    let tensors = batch.sanitized().to_tensors::<B>(device);
    let treatments = tensors.treatments.dims()[2];
    if treatments != model.num_treatments() {
        return Err(DeconfoundError::shape(
            "current treatment features",
            model.num_treatments(),
            treatments,
        ));
    }

    let output = model.forward(
        tensors.previous_covariates,
        tensors.previous_treatments,
        tensors.covariates,
    )?;
    let target = flatten_time_major(tensors.treatments.swap_dims(0, 1));
    Ok(truncate_to_common_rows(output.treatment_predictions, target))
}

fn mse<B: Backend>(prediction: Tensor<B, 2>, target: Tensor<B, 2>) -> Tensor<B, 1> {
    MseLoss::new().forward(prediction, target, Reduction::Mean)
}

fn batch_metrics<B: Backend>(
    prediction: Tensor<B, 2>,
    target: Tensor<B, 2>,
    loss: f64,
) -> BatchMetrics {
    BatchMetrics {
        loss,
        r2: r2_score(target.clone(), prediction.clone()),
        accuracy: treatment_accuracy(target, prediction),
    }
}

/// Outcome of [`Trainer::fit`].
#[derive(Debug)]
pub struct TrainingReport<B: AutodiffBackend> {
    pub model: FactorModel<B>,
    pub history: Vec<EpochMetrics>,
    /// Epochs after which a checkpoint was written.
    pub checkpoint_epochs: Vec<usize>,
    /// File the checkpoints were written to, if any were.
    pub checkpoint_file: Option<PathBuf>,
}

/// Drives Adam over a [`FactorModel`] for a fixed number of epochs.
///
/// # Type Parameters
/// * `B` - An autodiff backend; validation and extraction run on
///   `B::InnerBackend` through [`AutodiffModule::valid`].
pub struct Trainer<B: AutodiffBackend> {
    config: TrainingConfig,
    device: B::Device,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(config: TrainingConfig, device: B::Device) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, device })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Fresh model built from the model section of the configuration.
    pub fn init_model(&self) -> Result<FactorModel<B>> {
        FactorModel::new(&self.config.model, &self.device)
    }

    /// Train on in-memory datasets, batching with the configured batch size.
    /// Training units are reshuffled every epoch when a shuffle seed is set.
    pub fn fit_datasets(
        &self,
        model: FactorModel<B>,
        train: &TrajectoryDataset,
        valid: &TrajectoryDataset,
    ) -> Result<TrainingReport<B>> {
        let train = TrajectoryLoader::new(train, self.config.batch_size)
            .with_shuffle_seed(self.config.shuffle_seed);
        let valid = TrajectoryLoader::new(valid, self.config.batch_size);
        self.fit(model, &train, &valid)
    }

    /// Run every epoch, write checkpoints every `checkpoint_interval` epochs
    /// starting at epoch 0, then write the R² history.
    ///
    /// Per-epoch train/validation loss and R² are reported through
    /// `log::info!` and only show up once the caller installs a logger, e.g.
    /// `env_logger::init()` with `RUST_LOG=info`. The same values are
    /// returned in [`TrainingReport::history`].
    ///
    /// # Errors
    /// Any batch failure aborts the run: shape mismatches, a non-finite loss,
    /// an empty loader, or checkpoint/metrics I/O errors.
    pub fn fit<T, V>(
        &self,
        mut model: FactorModel<B>,
        train: &T,
        valid: &V,
    ) -> Result<TrainingReport<B>>
    where
        T: BatchLoader + ?Sized,
        V: BatchLoader + ?Sized,
    {
        let mut optim = self.config.optimizer.init::<B, FactorModel<B>>();
        let mut history = Vec::with_capacity(self.config.num_epochs);
        let mut checkpoint_epochs = Vec::new();
        let mut checkpoint_file = None;
        let checkpoint_path = self.config.checkpoint_path();

        for epoch in 0..self.config.num_epochs {
            let (trained, train_metrics) =
                self.train_epoch(model, &mut optim, &train.epoch_batches(epoch), epoch)?;
            model = trained;

            let valid_metrics = self.valid_epoch(&model.valid(), &valid.epoch_batches(epoch))?;

            log::info!(
                "epoch {epoch} ---- train_loss: {:.5} val_loss: {:.5} train_r2: {:.2} val_r2: {:.2}",
                train_metrics.loss,
                valid_metrics.loss,
                train_metrics.r2,
                valid_metrics.r2
            );
            history.push(EpochMetrics {
                epoch,
                train: train_metrics,
                valid: valid_metrics,
            });

            if epoch % self.config.checkpoint_interval == 0 {
                if checkpoint_file.is_none() {
                    self.save_config(&checkpoint_path)?;
                }
                checkpoint_file = Some(save_checkpoint(&model, &checkpoint_path)?);
                checkpoint_epochs.push(epoch);
            }
        }

        write_r2_history(Path::new(&self.config.metrics_path), &history)?;

        Ok(TrainingReport {
            model,
            history,
            checkpoint_epochs,
            checkpoint_file,
        })
    }

    /// Confounders of every unit of `loader`, computed without gradients.
    pub fn extract<L: BatchLoader + ?Sized>(
        &self,
        model: &FactorModel<B>,
        loader: &L,
    ) -> Result<Array3<f32>> {
        compute_hidden_confounders(&model.valid(), loader, &self.device)
    }

    fn save_config(&self, checkpoint_path: &Path) -> Result<()> {
        if let Some(parent) = checkpoint_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        self.config.save(checkpoint_path.with_extension("json"))?;
        Ok(())
    }

    fn train_epoch<O>(
        &self,
        mut model: FactorModel<B>,
        optim: &mut O,
        batches: &[TrajectoryBatch],
        epoch: usize,
    ) -> Result<(FactorModel<B>, BatchMetrics)>
    where
        O: Optimizer<FactorModel<B>, B>,
    {
        let mut accumulator = MetricAccumulator::default();

        for (index, batch) in batches.iter().enumerate() {
            let (prediction, target) = aligned_predictions(&model, batch, &self.device)?;
            let loss = mse(prediction.clone(), target.clone());
            let loss_value = loss.clone().into_scalar().elem::<f64>();
            if !loss_value.is_finite() {
                return Err(DeconfoundError::NonFiniteLoss {
                    epoch,
                    batch: index,
                    value: loss_value,
                });
            }
            accumulator.push(batch_metrics(prediction.detach(), target, loss_value));

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            let (grads, _) = clip_gradient_norm(&model, grads, self.config.max_grad_norm);
            model = optim.step(self.config.learning_rate, model, grads);
        }

        let metrics = accumulator
            .mean()
            .ok_or(DeconfoundError::EmptyLoader("train"))?;
        Ok((model, metrics))
    }

    fn valid_epoch(
        &self,
        model: &FactorModel<B::InnerBackend>,
        batches: &[TrajectoryBatch],
    ) -> Result<BatchMetrics> {
        let mut accumulator = MetricAccumulator::default();

        for batch in batches {
            let (prediction, target) = aligned_predictions(model, batch, &self.device)?;
            let loss = mse(prediction.clone(), target.clone())
                .into_scalar()
                .elem::<f64>();
            accumulator.push(batch_metrics(prediction, target, loss));
        }

        accumulator
            .mean()
            .ok_or(DeconfoundError::EmptyLoader("validation"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FactorModelConfig;
    use burn::backend::{Autodiff, NdArray};
    use burn::optim::AdamConfig;

    type TestBackend = Autodiff<NdArray<f32>>;

    fn batch(units: usize, time: usize) -> TrajectoryBatch {
        let fill = |features: usize, offset: f32| {
            Array3::from_shape_fn((units, time, features), |(u, t, k)| {
                offset + 0.1 * (u + t + k) as f32
            })
        };
        TrajectoryBatch {
            previous_covariates: fill(2, 0.0),
            previous_treatments: fill(2, 0.2),
            covariates: fill(2, 0.1),
            treatments: fill(2, 0.3),
            outcomes: fill(1, 0.0),
        }
    }

    fn trainer(dir: &Path, epochs: usize) -> Trainer<TestBackend> {
        let model = FactorModelConfig::new(2, 2, 1, 3, 8, 6);
        let config = TrainingConfig::new(model, AdamConfig::new(), epochs)
            .with_batch_size(4)
            .with_checkpoint_dir(dir.join("checkpoints").display().to_string())
            .with_metrics_path(dir.join("r2_values.txt").display().to_string());
        Trainer::new(config, Default::default()).unwrap()
    }

    #[test]
    fn test_aligned_predictions_truncate_to_targets() {
        let device = Default::default();
        let config = FactorModelConfig::new(2, 2, 1, 3, 8, 6);
        let model = FactorModel::<NdArray<f32>>::new(&config, &device).unwrap();

        let (prediction, target) = aligned_predictions(&model, &batch(4, 3), &device).unwrap();
        assert_eq!(prediction.dims(), [12, 2]);
        assert_eq!(target.dims(), [12, 2]);
    }

    #[test]
    fn test_aligned_predictions_survive_nan_input() {
        let device = Default::default();
        let config = FactorModelConfig::new(2, 2, 1, 3, 8, 6);
        let model = FactorModel::<NdArray<f32>>::new(&config, &device).unwrap();

        let mut data = batch(2, 3);
        data.previous_covariates[[0, 1, 0]] = f32::NAN;
        data.treatments[[1, 2, 1]] = f32::INFINITY;
        let (prediction, target) = aligned_predictions(&model, &data, &device).unwrap();
        let loss = mse(prediction, target).into_scalar();
        assert!(loss.is_finite());
    }

    #[test]
    fn test_one_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let trainer = trainer(dir.path(), 1);
        let batches = vec![batch(4, 3)];

        let report = trainer
            .fit(trainer.init_model().unwrap(), &batches, &batches)
            .unwrap();

        assert_eq!(report.history.len(), 1);
        let metrics = report.history[0];
        assert!(metrics.train.loss.is_finite());
        assert!(metrics.train.r2 <= 1.0);
        assert!(metrics.valid.r2 <= 1.0);
        assert_eq!(report.checkpoint_epochs, vec![0]);
        assert!(report.checkpoint_file.unwrap().exists());
        assert!(dir.path().join("checkpoints").join("factor_model.json").exists());
    }

    #[test]
    fn test_overflowing_loss_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let trainer = trainer(dir.path(), 3);
        let mut huge = batch(4, 3);
        huge.treatments.fill(1e30);
        let train = vec![batch(4, 3), huge];
        let valid = vec![batch(2, 3)];

        let result = trainer.fit(trainer.init_model().unwrap(), &train, &valid);
        match result {
            Err(DeconfoundError::NonFiniteLoss { epoch, batch, value }) => {
                assert_eq!(epoch, 0);
                assert_eq!(batch, 1);
                assert!(!value.is_finite());
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("training should abort on a non-finite loss"),
        }
        assert!(!dir.path().join("r2_values.txt").exists());
    }

    #[test]
    fn test_empty_train_loader_fails() {
        let dir = tempfile::tempdir().unwrap();
        let trainer = trainer(dir.path(), 1);
        let empty: Vec<TrajectoryBatch> = Vec::new();
        let valid = vec![batch(2, 3)];

        let result = trainer.fit(trainer.init_model().unwrap(), &empty, &valid);
        assert!(matches!(result, Err(DeconfoundError::EmptyLoader("train"))));
    }
}
