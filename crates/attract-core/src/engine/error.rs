use thiserror::Error;

use super::config::ConfigError;
use crate::core::forcefield::scoring::ScoringError;
use crate::core::models::ModelError;
use crate::core::superpose::SuperposeError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Energy scoring failed: {source}")]
    Scoring {
        #[from]
        source: ScoringError,
    },

    #[error("Invalid body: {source}")]
    Model {
        #[from]
        source: ModelError,
    },

    #[error("Superposition failed: {source}")]
    Superpose {
        #[from]
        source: SuperposeError,
    },

    #[error("Invalid configuration: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    /// The line search found no acceptable step. `variables` holds the last accepted
    /// point, which is still a valid (if unconverged) result.
    #[error("Minimizer failed after {iterations} iterations: {reason}")]
    MinimizerFailure {
        iterations: usize,
        variables: Vec<f64>,
        reason: String,
    },

    #[error("Degenerate helix: {0}")]
    DegenerateHelix(String),

    #[error("Internal logic error: {0}")]
    Internal(String),
}
