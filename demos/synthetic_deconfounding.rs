//! Synthetic Deconfounding Demo
//!
//! Simulates longitudinal data where a hidden AR(1) confounder drives both the
//! covariates and the treatment assignment, fits the factor model, and
//! extracts the learned confounders.
//!
//! Run with `cargo run --example synthetic_deconfounding`. The per-epoch
//! loss and R² lines are emitted through `log`, so the demo installs
//! `env_logger` at `info` level; override with `RUST_LOG`.

use burn::backend::{Autodiff, NdArray};
use burn::optim::AdamConfig;
use deconfounder::prelude::*;
use ndarray::Array3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

type Backend = Autodiff<NdArray<f32>>;

const UNITS: usize = 64;
const TIME: usize = 10;
const COVARIATES: usize = 3;
const TREATMENTS: usize = 2;

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn simulate(seed: u64) -> TrajectoryDataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut noise = move |scale: f32| scale * (rng.gen::<f32>() - 0.5);

    let mut covariates = Array3::<f32>::zeros((UNITS, TIME, COVARIATES));
    let mut treatments = Array3::<f32>::zeros((UNITS, TIME, TREATMENTS));
    let mut outcomes = Array3::<f32>::zeros((UNITS, TIME, 1));

    for u in 0..UNITS {
        let mut confounder = 0.0f32;
        for t in 0..TIME {
            let previous_dose = if t > 0 {
                (0..TREATMENTS).map(|k| treatments[[u, t - 1, k]]).sum::<f32>() / TREATMENTS as f32
            } else {
                0.0
            };
            confounder = 0.7 * confounder + 0.3 * previous_dose + noise(0.4);

            for c in 0..COVARIATES {
                let previous = if t > 0 { covariates[[u, t - 1, c]] } else { 0.0 };
                covariates[[u, t, c]] = 0.5 * previous + 0.5 * confounder + noise(0.2);
            }
            let covariate_mean =
                (0..COVARIATES).map(|c| covariates[[u, t, c]]).sum::<f32>() / COVARIATES as f32;

            for k in 0..TREATMENTS {
                let p = sigmoid(2.0 * confounder + covariate_mean + 0.5 * k as f32);
                treatments[[u, t, k]] = if noise(1.0) + 0.5 < p { 1.0 } else { 0.0 };
            }
            let dose = (0..TREATMENTS).map(|k| treatments[[u, t, k]]).sum::<f32>();
            outcomes[[u, t, 0]] = dose + confounder + noise(0.1);
        }
    }

    // Previous arrays at t hold the values of t - 1, zero at t = 0.
    let shift = |array: &Array3<f32>| {
        let mut shifted = Array3::<f32>::zeros(array.raw_dim());
        for t in 1..TIME {
            shifted
                .index_axis_mut(ndarray::Axis(1), t)
                .assign(&array.index_axis(ndarray::Axis(1), t - 1));
        }
        shifted
    };

    TrajectoryDataset::new(
        shift(&covariates),
        shift(&treatments),
        covariates,
        treatments,
        outcomes,
    )
    .expect("simulated arrays share the unit axis")
}

fn main() -> deconfounder::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== Deconfounder Synthetic Example ===\n");

    let train = simulate(7);
    let valid = simulate(8);

    let model_config = FactorModelConfig::new(TREATMENTS, COVARIATES, 1, TIME, 32, 16)
        .with_drop_seed_step(true);
    let config = TrainingConfig::new(model_config, AdamConfig::new(), 20)
        .with_learning_rate(0.01)
        .with_batch_size(16)
        .with_shuffle_seed(Some(1234));

    let trainer = Trainer::<Backend>::new(config, Default::default())?;
    let report = trainer.fit_datasets(trainer.init_model()?, &train, &valid)?;

    println!("Training summary:");
    for metrics in &report.history {
        println!("  {}", metrics.r2_line());
    }
    println!("  Checkpoints written at epochs {:?}", report.checkpoint_epochs);
    println!();

    let confounders = trainer.extract(&report.model, &train.batches(16))?;
    println!("Extracted confounders: {:?}", confounders.shape());
    let first_unit: Vec<f32> = confounders.index_axis(ndarray::Axis(0), 0).iter().copied().collect();
    println!("  First unit: {:?}", first_unit);

    println!("\n=== Example completed! ===");
    Ok(())
}
