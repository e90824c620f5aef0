//! The contract every device in a circuit must satisfy.

use crate::system::LinearSystem;

/// Index of an element in the simulation's element arena.
pub type ElementIndex = usize;

/// One element terminal attached to a node.
///
/// Nodes refer back to elements through these index pairs rather than
/// holding references, so the element arena stays free of ownership cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    /// Arena index of the element.
    pub element: ElementIndex,
    /// Terminal (or internal node slot) on that element.
    pub terminal: usize,
}

/// Timing information for the step being computed.
#[derive(Debug, Clone, Copy)]
pub struct StepInfo {
    /// Simulation time at the start of the step (s).
    pub time: f64,
    /// Step size (s).
    pub dt: f64,
}

/// A device with terminals, internal state, and a stamp contract.
///
/// The engine drives every element through the same sequence each step:
/// `start_iteration` once, then `do_iteration` every Newton sub-iteration,
/// then `finish_iteration` once the step is accepted. Between solves the
/// engine pushes node voltages in with [`Element::set_voltage`] and pulls
/// source currents out with [`Element::current`] / feeds them back with
/// [`Element::set_current`].
///
/// Anything an element re-stamps during iteration must be declared at
/// build time with [`LinearSystem::mark_nonlinear`] or
/// [`LinearSystem::mark_varying_right_side`], and must not also be stamped
/// with a value in [`Element::stamp`]; constant folding relies on the
/// build-time matrix containing only the time-invariant contributions.
pub trait Element: std::fmt::Debug {
    /// Number of external terminals.
    fn term_count(&self) -> usize;

    /// Number of matrix rows this element needs for source currents.
    fn voltage_source_count(&self) -> usize {
        0
    }

    /// Number of extra nodes allocated for this element beyond its terminals.
    fn internal_node_count(&self) -> usize {
        0
    }

    /// True if the element re-stamps voltage-dependent matrix terms each
    /// sub-iteration.
    fn nonlinear(&self) -> bool {
        false
    }

    /// Assign the global node for a terminal or internal node slot.
    fn set_node(&mut self, index: usize, node: usize);

    /// Global node assigned to a terminal or internal node slot.
    fn node(&self, index: usize) -> usize;

    /// Assign the global row index for one of this element's voltage sources.
    fn set_voltage_source(&mut self, _source: usize, _row: usize) {}

    /// Write the fixed, time-invariant contributions once per rebuild.
    fn stamp(&mut self, sys: &mut LinearSystem);

    /// Per-step precomputation using values accepted at the end of the
    /// previous step.
    fn start_iteration(&mut self, _step: &StepInfo) {}

    /// Called every Newton sub-iteration. Nonlinear elements re-stamp here
    /// from the current voltage guess and clear the system's converged flag
    /// when their operating point moved past tolerance.
    fn do_iteration(&mut self, _sys: &mut LinearSystem) {}

    /// Bookkeeping that must only happen once a step is accepted.
    fn finish_iteration(&mut self, _step: &StepInfo) {}

    /// Solved voltage pushed in for a terminal or internal node slot.
    fn set_voltage(&mut self, index: usize, volts: f64);

    /// Last voltage pushed in for a terminal or internal node slot.
    fn voltage(&self, index: usize) -> f64;

    /// Current flowing from the node into the element at `terminal`.
    fn current(&self, terminal: usize) -> f64;

    /// Solved current pushed back for one of this element's voltage sources.
    fn set_current(&mut self, _source: usize, _amps: f64) {}

    /// Whether the element itself provides a current path between two of
    /// its terminals. Ideal current sources answer false.
    fn has_connection(&self, _t1: usize, _t2: usize) -> bool {
        true
    }

    /// Whether the element provides an internal path to ground from
    /// `terminal` (grounds, rails, driven gate outputs).
    fn has_ground_connection(&self, _terminal: usize) -> bool {
        false
    }

    /// Told by the analyzer when no external return path exists. Elements
    /// that would otherwise force current into a dead net must switch to a
    /// safe stamp (a large resistor) so the matrix stays solvable.
    fn set_broken(&mut self, _broken: bool) {}
}

/// Per-terminal voltage and node storage embedded by most devices.
#[derive(Debug, Clone, Default)]
pub struct Terminals {
    /// Last voltage pushed in per terminal/internal slot.
    pub volts: Vec<f64>,
    /// Global node per terminal/internal slot.
    pub nodes: Vec<usize>,
}

impl Terminals {
    /// Storage for `count` terminals (plus internal slots, if any).
    pub fn new(count: usize) -> Self {
        Self {
            volts: vec![0.0; count],
            nodes: vec![0; count],
        }
    }

    /// Voltage across the first two terminals.
    pub fn volt_diff(&self) -> f64 {
        self.volts[0] - self.volts[1]
    }
}
