//! # Breadboard
//!
//! An interactive-speed analog/digital circuit simulator.
//!
//! Breadboard models a circuit as a set of devices joined at connection
//! posts, turns the wired network into a numbered system of unknowns,
//! and steps it forward in time with a Newton iteration around a dense
//! LU solve:
//!
//! - network analysis and the element contract live in `breadboard-core`,
//! - the LU routine and the [`Simulation`] timestep engine live in
//!   `breadboard-solver`,
//! - the device models (passives, sources, diode, gates, composites)
//!   live in `breadboard-devices`.
//!
//! ## Quick start
//!
//! ```rust
//! use breadboard::prelude::*;
//!
//! // A 10 V divider: two equal resistors between the supply and ground.
//! let mut sim = Simulation::default();
//! sim.add_element(Box::new(Ground::new()), &[0]);
//! sim.add_element(Box::new(VoltageSource::dc(10.0)), &[0, 1]);
//! let r1 = sim.add_element(Box::new(Resistor::new(1000.0)), &[1, 2]);
//! sim.add_element(Box::new(Resistor::new(1000.0)), &[2, 0]);
//!
//! sim.step().unwrap();
//! let midpoint = sim.element(r1).voltage(1);
//! assert!((midpoint - 5.0).abs() < 1e-9);
//! ```

// Re-export member crates
pub use breadboard_core as core;
pub use breadboard_devices as devices;
pub use breadboard_solver as solver;

// Convenient re-exports from breadboard-core
pub use breadboard_core::{
    Analysis, CircuitNode, Element, ElementIndex, Error as CoreError, LinearSystem, Link, Persist,
    Post, ScopeWave, SourceRecord, StepInfo, TokenReader, TokenWriter, Wire, analyze,
};

// Convenient re-exports from breadboard-solver
pub use breadboard_solver::{
    Error as SolverError, SimConfig, Simulation, lu_factor, lu_solve,
};

// Convenient re-exports from breadboard-devices
pub use breadboard_devices::{
    Capacitor, Composite, CompositeModel, CompositePart, CurrentSource, Diode, Ground, HashNoise,
    Inductor, Inverter, NoiseSource, Resistor, StopTrigger, SweepSource, VoltageSource, Waveform,
};

/// Re-export of nalgebra's dynamic matrix and vector types used by the
/// linear system.
pub use nalgebra::{DMatrix, DVector};

/// Commonly used types and traits.
///
/// ```rust
/// use breadboard::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{Element, ElementIndex, LinearSystem, Post, ScopeWave, StepInfo};

    pub use crate::{SimConfig, Simulation};

    pub use crate::{
        Capacitor, Composite, CompositeModel, CurrentSource, Diode, Ground, Inductor, Inverter,
        Resistor, StopTrigger, SweepSource, VoltageSource, Waveform,
    };

    pub use crate::{DMatrix, DVector};
}
