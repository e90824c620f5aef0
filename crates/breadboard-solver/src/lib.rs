//! The solving side of Breadboard.
//!
//! This crate provides:
//! - in-place dense LU factorization with partial pivoting ([`lu`]),
//! - the [`Simulation`] owner object and its per-timestep Newton
//!   iteration loop,
//! - frame pacing for interactive callers.

pub mod engine;
pub mod error;
pub mod lu;

pub use engine::{SimConfig, Simulation};
pub use error::{Error, Result};
pub use lu::{lu_factor, lu_solve};
