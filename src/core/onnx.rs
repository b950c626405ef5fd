use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;

use crate::error::{AppError, Result};

/// Build an ONNX Runtime session for `model_path`.
pub(crate) fn create_session(model_path: &Path) -> Result<Session> {
    if !model_path.exists() {
        return Err(AppError::Config(format!(
            "Model file not found: {}",
            model_path.display()
        )));
    }

    let threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);

    let session = Session::builder()
        .map_err(AppError::model)?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(AppError::model)?
        .with_intra_threads(threads)
        .map_err(AppError::model)?
        .commit_from_file(model_path)
        .map_err(AppError::model)?;

    log::debug!("Created ONNX session for {}", model_path.display());
    Ok(session)
}
