//! Error types for breadboard-solver.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no convergence after {iterations} sub-iterations")]
    NonConvergence { iterations: usize },

    #[error("simulation halted: {0}")]
    Halted(String),

    #[error(transparent)]
    Circuit(#[from] breadboard_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
