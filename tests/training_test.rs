#[cfg(test)]
mod tests {
    use burn::backend::{Autodiff, NdArray};
    use burn::module::AutodiffModule;
    use burn::optim::{AdamConfig, GradientsParams};
    use deconfounder::config::{FactorModelConfig, TrainingConfig};
    use deconfounder::dataset::{TrajectoryBatch, TrajectoryDataset};
    use deconfounder::training::{
        aligned_predictions, clip_gradient_norm, gradient_norm, Trainer,
    };
    use ndarray::Array3;
    use std::path::Path;

    type Backend = Autodiff<NdArray<f32>>;

    fn fill(units: usize, time: usize, features: usize, offset: f32) -> Array3<f32> {
        Array3::from_shape_fn((units, time, features), |(u, t, k)| {
            offset + 0.1 * ((u * 7 + t * 3 + k) % 10) as f32
        })
    }

    fn scenario_batch(units: usize) -> TrajectoryBatch {
        TrajectoryBatch {
            previous_covariates: fill(units, 3, 2, 0.0),
            previous_treatments: fill(units, 3, 2, 0.05),
            covariates: fill(units, 3, 2, 0.1),
            treatments: fill(units, 3, 2, 0.0).mapv(|v| if v >= 0.5 { 1.0 } else { 0.0 }),
            outcomes: fill(units, 3, 1, 0.2),
        }
    }

    fn scenario_dataset(units: usize) -> TrajectoryDataset {
        let b = scenario_batch(units);
        TrajectoryDataset::new(
            b.previous_covariates,
            b.previous_treatments,
            b.covariates,
            b.treatments,
            b.outcomes,
        )
        .unwrap()
    }

    fn training_config(dir: &Path, epochs: usize, model: FactorModelConfig) -> TrainingConfig {
        TrainingConfig::new(model, AdamConfig::new(), epochs)
            .with_batch_size(4)
            .with_learning_rate(0.01)
            .with_checkpoint_dir(dir.join("checkpoints").display().to_string())
            .with_checkpoint_name("TSD".to_string())
            .with_metrics_path(dir.join("r2_values.txt").display().to_string())
    }

    fn scenario_model() -> FactorModelConfig {
        FactorModelConfig::new(2, 2, 1, 3, 8, 6)
    }

    #[test]
    fn test_end_to_end_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let config = training_config(dir.path(), 1, scenario_model());
        let trainer = Trainer::<Backend>::new(config, Default::default()).unwrap();
        let batches = vec![scenario_batch(4)];

        let report = trainer
            .fit(trainer.init_model().unwrap(), &batches, &batches)
            .unwrap();
        let epoch = report.history[0];
        assert!(epoch.train.loss.is_finite());
        assert!(epoch.train.r2 <= 1.0);

        // 4 units * (3 + 1) steps = 16 elements, blocks of 3 -> 5 units.
        let confounders = trainer.extract(&report.model, &batches).unwrap();
        assert_eq!(confounders.shape(), &[5, 3, 1]);
        assert!(confounders.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_end_to_end_without_seed_step() {
        let dir = tempfile::tempdir().unwrap();
        let model = scenario_model().with_drop_seed_step(true);
        let trainer =
            Trainer::<Backend>::new(training_config(dir.path(), 1, model), Default::default())
                .unwrap();
        let batches = vec![scenario_batch(4)];

        let report = trainer
            .fit(trainer.init_model().unwrap(), &batches, &batches)
            .unwrap();
        let confounders = trainer.extract(&report.model, &batches).unwrap();
        assert_eq!(confounders.shape(), &[4, 3, 1]);
    }

    #[test]
    fn test_checkpoint_cadence() {
        for (epochs, expected) in [(5, vec![0]), (6, vec![0, 5]), (11, vec![0, 5, 10])] {
            let dir = tempfile::tempdir().unwrap();
            let config = training_config(dir.path(), epochs, scenario_model());
            let trainer = Trainer::<Backend>::new(config, Default::default()).unwrap();
            let batches = vec![scenario_batch(4)];

            let report = trainer
                .fit(trainer.init_model().unwrap(), &batches, &batches)
                .unwrap();

            assert_eq!(report.checkpoint_epochs, expected);
            let checkpoint = report.checkpoint_file.unwrap();
            assert_eq!(checkpoint, dir.path().join("checkpoints").join("TSD.mpk"));
            let files = std::fs::read_dir(dir.path().join("checkpoints"))
                .unwrap()
                .count();
            // One checkpoint file, overwritten, plus the config.
            assert_eq!(files, 2);
        }
    }

    #[test]
    fn test_metrics_file_has_one_line_per_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let config = training_config(dir.path(), 3, scenario_model());
        let trainer = Trainer::<Backend>::new(config, Default::default()).unwrap();
        let batches = vec![scenario_batch(4), scenario_batch(3)];

        trainer
            .fit(trainer.init_model().unwrap(), &batches, &batches)
            .unwrap();

        let contents = std::fs::read_to_string(dir.path().join("r2_values.txt")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        for (epoch, line) in lines.iter().enumerate() {
            assert!(line.starts_with(&format!("epoch {epoch} ---- train_r2: ")));
            assert!(line.contains(" val_r2: "));
            let value = line.rsplit(' ').next().unwrap();
            assert_eq!(value.split('.').nth(1).unwrap().len(), 2);
        }
    }

    #[test]
    fn test_fit_datasets_with_shuffling() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            training_config(dir.path(), 2, scenario_model()).with_shuffle_seed(Some(42));
        let trainer = Trainer::<Backend>::new(config, Default::default()).unwrap();
        let train = scenario_dataset(10);
        let valid = scenario_dataset(5);

        let report = trainer
            .fit_datasets(trainer.init_model().unwrap(), &train, &valid)
            .unwrap();
        assert_eq!(report.history.len(), 2);
        assert!(report.history.iter().all(|m| m.valid.loss.is_finite()));
    }

    #[test]
    fn test_training_reduces_loss() {
        let dir = tempfile::tempdir().unwrap();
        let config = training_config(dir.path(), 30, scenario_model());
        let trainer = Trainer::<Backend>::new(config, Default::default()).unwrap();
        let batches = vec![scenario_batch(4)];

        let report = trainer
            .fit(trainer.init_model().unwrap(), &batches, &batches)
            .unwrap();
        let first = report.history.first().unwrap().train.loss;
        let last = report.history.last().unwrap().train.loss;
        assert!(last < first, "loss went from {first} to {last}");
    }

    #[test]
    fn test_output_dropout_only_while_training() {
        let device = Default::default();
        let config = scenario_model().with_rnn_keep_prob(0.5);
        let model = deconfounder::model::FactorModel::<Backend>::new(&config, &device).unwrap();
        let batch = scenario_batch(4);

        let inference = model.valid();
        let a = inference.forward_batch(&batch, &device).unwrap();
        let b = inference.forward_batch(&batch, &device).unwrap();
        let valid_diff = (a.confounders - b.confounders).abs().sum().into_scalar();
        assert_eq!(valid_diff, 0.0);

        let a = model.forward_batch(&batch, &device).unwrap();
        let b = model.forward_batch(&batch, &device).unwrap();
        let train_diff = (a.confounders - b.confounders).abs().sum().into_scalar();
        assert!(train_diff > 0.0, "dropout left training forwards identical");
    }

    #[test]
    fn test_post_clip_gradient_norm() {
        let device = Default::default();
        let model = deconfounder::model::FactorModel::<Backend>::new(&scenario_model(), &device)
            .unwrap();

        let (prediction, target) =
            aligned_predictions(&model, &scenario_batch(4), &device).unwrap();
        let loss = (prediction - target).powf_scalar(2.0).sum() * 500.0;
        let grads = GradientsParams::from_grads(loss.backward(), &model);

        let (clipped, before) = clip_gradient_norm(&model, grads, 1.0);
        assert!(before > 1.0);
        assert!(gradient_norm(&model, &clipped) <= 1.0 + 1e-4);
    }
}
