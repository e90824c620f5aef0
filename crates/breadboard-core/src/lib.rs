//! Core circuit representation for Breadboard.
//!
//! This crate provides the fundamental pieces of the solving engine:
//! - the [`Element`] contract every device implements,
//! - the network [`analyzer`](crate::analyzer) that merges wired terminals
//!   into nodes and numbers the unknowns,
//! - the [`LinearSystem`] devices stamp their contributions into,
//! - the [`ScopeWave`] rolling waveform sampler,
//! - the whitespace-token [`persist`](crate::persist) protocol used to
//!   save and restore element configuration.
//!
//! The iteration engine that drives a circuit forward in time lives in
//! `breadboard-solver`; concrete device models live in `breadboard-devices`.

pub mod analyzer;
pub mod element;
pub mod error;
pub mod persist;
pub mod scope;
pub mod system;
pub mod units;

pub use analyzer::{Analysis, CircuitNode, Post, SourceRecord, Wire, WireInfo, analyze};
pub use element::{Element, ElementIndex, Link, StepInfo, Terminals};
pub use error::{Error, Result};
pub use persist::{Persist, TokenReader, TokenWriter};
pub use scope::ScopeWave;
pub use system::LinearSystem;
