//! Diagnostic fit metrics and the per-epoch R² history file.

use crate::error::Result;
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Sums of squares at or below this are treated as zero.
const ZERO_VARIANCE: f64 = 1e-12;

fn flatten<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Tensor<B, 1> {
    let n = tensor.shape().num_elements();
    tensor.reshape([n])
}

fn scalar<B: Backend>(tensor: Tensor<B, 1>) -> f64 {
    tensor.into_scalar().elem::<f64>()
}

/// Coefficient of determination `1 - SS_res / SS_tot` over all elements.
///
/// A target without variance has no meaningful R²: the score is `1.0` when
/// the prediction matches it exactly and `0.0` otherwise.
pub fn r2_score<B: Backend, const D: usize>(
    target: Tensor<B, D>,
    prediction: Tensor<B, D>,
) -> f64 {
    let target = flatten(target);
    let prediction = flatten(prediction);

    let mean = scalar(target.clone().mean());
    let ss_res = scalar((target.clone() - prediction).powf_scalar(2.0).sum());
    let ss_tot = scalar(target.sub_scalar(mean).powf_scalar(2.0).sum());

    if ss_tot <= ZERO_VARIANCE {
        return if ss_res <= ZERO_VARIANCE { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Percentage of elements whose prediction falls on the same side of `0.5`
/// as the target.
pub fn treatment_accuracy<B: Backend, const D: usize>(
    target: Tensor<B, D>,
    prediction: Tensor<B, D>,
) -> f64 {
    let target = flatten(target);
    let total = target.dims()[0];
    if total == 0 {
        return 0.0;
    }
    let target = target.greater_equal_elem(0.5);
    let prediction = flatten(prediction).greater_equal_elem(0.5);
    let correct = target.equal(prediction).int().sum().into_scalar().elem::<f64>();
    correct / total as f64 * 100.0
}

/// Running sums of batch metrics over one phase of an epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricAccumulator {
    loss: f64,
    r2: f64,
    accuracy: f64,
    batches: usize,
}

impl MetricAccumulator {
    pub fn push(&mut self, metrics: BatchMetrics) {
        self.loss += metrics.loss;
        self.r2 += metrics.r2;
        self.accuracy += metrics.accuracy;
        self.batches += 1;
    }

    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Batch-averaged metrics, `None` if nothing was pushed.
    pub fn mean(&self) -> Option<BatchMetrics> {
        if self.batches == 0 {
            return None;
        }
        let n = self.batches as f64;
        Some(BatchMetrics {
            loss: self.loss / n,
            r2: self.r2 / n,
            accuracy: self.accuracy / n,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchMetrics {
    pub loss: f64,
    pub r2: f64,
    pub accuracy: f64,
}

/// Averages of one epoch's train and validation phases.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train: BatchMetrics,
    pub valid: BatchMetrics,
}

impl EpochMetrics {
    /// `epoch <n> ---- train_r2: <v> val_r2: <v>`
    pub fn r2_line(&self) -> String {
        format!(
            "epoch {} ---- train_r2: {:.2} val_r2: {:.2}",
            self.epoch, self.train.r2, self.valid.r2
        )
    }
}

/// Write one [`EpochMetrics::r2_line`] per epoch to `path`, replacing any
/// previous file.
pub fn write_r2_history(path: &Path, history: &[EpochMetrics]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    for metrics in history {
        writeln!(writer, "{}", metrics.r2_line())?;
    }
    writer.flush()?;
    Ok(())
}
