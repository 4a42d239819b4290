//! Checkpoint persistence for [`FactorModel`] parameters.

use crate::error::Result;
use crate::model::FactorModel;
use burn::module::Module;
use burn::record::{FileRecorder, FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::backend::Backend;
use std::fs;
use std::path::{Path, PathBuf};

/// Recorder used for every checkpoint written by this crate.
pub type CheckpointRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// File actually written for a checkpoint stored at `path`.
pub fn checkpoint_file<B: Backend>(path: &Path) -> PathBuf {
    path.with_extension(<CheckpointRecorder as FileRecorder<B>>::file_extension())
}

/// Persist the full parameter state of `model` to `path` plus the recorder
/// extension, creating missing directories. An existing file is overwritten.
pub fn save_checkpoint<B: Backend>(model: &FactorModel<B>, path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    model
        .clone()
        .save_file(path.to_path_buf(), &CheckpointRecorder::new())?;
    let file = checkpoint_file::<B>(path);
    log::debug!("wrote checkpoint {}", file.display());
    Ok(file)
}

/// Load parameters saved by [`save_checkpoint`] into `model`.
pub fn load_checkpoint<B: Backend>(
    model: FactorModel<B>,
    path: &Path,
    device: &B::Device,
) -> Result<FactorModel<B>> {
    let model = model.load_file(path.to_path_buf(), &CheckpointRecorder::new(), device)?;
    Ok(model)
}
