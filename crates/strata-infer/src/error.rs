use strata_core::CoreError;
use thiserror::Error;

use crate::driver::DriverState;

#[derive(Error, Debug)]
pub enum InferenceError {
    /// Collected data violates an invariant the inference order relies on
    #[error("Structural defect at {declaration}: {reason}")]
    StructuralDefect {
        declaration: String,
        reason: String,
    },

    #[error("Invalid driver transition from {from} to {to}")]
    InvalidTransition { from: DriverState, to: DriverState },

    #[error("Failed to export inference report: {0}")]
    Export(String),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl InferenceError {
    pub fn structural(declaration: impl Into<String>, reason: impl Into<String>) -> Self {
        let declaration = declaration.into();
        let reason = reason.into();
        tracing::warn!("Structural defect at {}: {}", declaration, reason);
        InferenceError::StructuralDefect {
            declaration,
            reason,
        }
    }
}
