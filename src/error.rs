//! Error types for probe baking

use crate::backend::BackendError;
use thiserror::Error;

/// Errors raised while configuring or baking a reflection probe
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Invalid sizes or mismatched source/target textures. Fatal to the bake.
    #[error("Invalid probe configuration: {0}")]
    Configuration(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// Raised by scene draw callbacks during capture
    #[error("Scene draw failed: {0}")]
    Scene(String),
}

pub type ProbeResult<T> = Result<T, ProbeError>;
