//! Passive device models: resistor, capacitor, inductor.
//!
//! The reactive elements use trapezoidal companion models: a fixed
//! conductance stamped at build time plus a Norton current recomputed at
//! the start of each step from the previously accepted solution.

use breadboard_core::{
    Element, LinearSystem, Persist, Result, StepInfo, Terminals, TokenReader, TokenWriter,
};

/// A linear resistor.
#[derive(Debug, Clone)]
pub struct Resistor {
    terminals: Terminals,
    resistance: f64,
    current: f64,
}

impl Resistor {
    pub fn new(ohms: f64) -> Self {
        Self {
            terminals: Terminals::new(2),
            resistance: ohms,
            current: 0.0,
        }
    }

    pub fn resistance(&self) -> f64 {
        self.resistance
    }
}

impl Element for Resistor {
    fn term_count(&self) -> usize {
        2
    }

    fn set_node(&mut self, index: usize, node: usize) {
        self.terminals.nodes[index] = node;
    }

    fn node(&self, index: usize) -> usize {
        self.terminals.nodes[index]
    }

    fn stamp(&mut self, sys: &mut LinearSystem) {
        sys.stamp_resistor(self.node(0), self.node(1), self.resistance);
    }

    fn set_voltage(&mut self, index: usize, volts: f64) {
        self.terminals.volts[index] = volts;
        self.current = self.terminals.volt_diff() / self.resistance;
    }

    fn voltage(&self, index: usize) -> f64 {
        self.terminals.volts[index]
    }

    fn current(&self, terminal: usize) -> f64 {
        if terminal == 0 { self.current } else { -self.current }
    }
}

impl Persist for Resistor {
    fn kind(&self) -> &'static str {
        "resistor"
    }

    fn write_params(&self, w: &mut TokenWriter) {
        w.push_num(self.resistance);
    }

    fn read_params(r: &mut TokenReader<'_>) -> Result<Self> {
        Ok(Self::new(r.num()?))
    }
}

/// Reverse bias a polarized capacitor will tolerate before the engine is
/// asked to halt.
const POLARITY_LIMIT: f64 = 0.5;

/// A capacitor, optionally polarized and optionally pre-charged.
#[derive(Debug, Clone)]
pub struct Capacitor {
    terminals: Terminals,
    capacitance: f64,
    polarized: bool,
    voltdiff: f64,
    comp_resistance: f64,
    source_current: f64,
    current: f64,
}

impl Capacitor {
    pub fn new(farads: f64) -> Self {
        Self {
            terminals: Terminals::new(2),
            capacitance: farads,
            polarized: false,
            voltdiff: 0.0,
            comp_resistance: 0.0,
            source_current: 0.0,
            current: 0.0,
        }
    }

    /// A polarized capacitor; reverse bias past a small limit halts the
    /// simulation rather than silently electrolyzing.
    pub fn polarized(farads: f64) -> Self {
        Self {
            polarized: true,
            ..Self::new(farads)
        }
    }

    /// Start with an initial voltage across the plates.
    pub fn with_charge(farads: f64, volts: f64) -> Self {
        Self {
            voltdiff: volts,
            ..Self::new(farads)
        }
    }

    pub fn capacitance(&self) -> f64 {
        self.capacitance
    }
}

impl Element for Capacitor {
    fn term_count(&self) -> usize {
        2
    }

    fn set_node(&mut self, index: usize, node: usize) {
        self.terminals.nodes[index] = node;
    }

    fn node(&self, index: usize) -> usize {
        self.terminals.nodes[index]
    }

    fn stamp(&mut self, sys: &mut LinearSystem) {
        // Trapezoidal companion: series-equivalent resistance dt/2C with
        // a step-dependent Norton current alongside.
        self.comp_resistance = sys.timestep() / (2.0 * self.capacitance);
        sys.stamp_resistor(self.node(0), self.node(1), self.comp_resistance);
        sys.mark_varying_right_side(self.node(0));
        sys.mark_varying_right_side(self.node(1));
    }

    fn start_iteration(&mut self, _step: &StepInfo) {
        self.source_current = -self.voltdiff / self.comp_resistance - self.current;
    }

    fn do_iteration(&mut self, sys: &mut LinearSystem) {
        if self.polarized && self.voltdiff < -POLARITY_LIMIT {
            sys.request_halt(format!(
                "polarized capacitor reverse-biased at {:.3} V",
                self.voltdiff
            ));
            return;
        }
        sys.stamp_current_source(self.node(0), self.node(1), self.source_current);
    }

    fn set_voltage(&mut self, index: usize, volts: f64) {
        self.terminals.volts[index] = volts;
        self.voltdiff = self.terminals.volt_diff();
        self.current = self.voltdiff / self.comp_resistance + self.source_current;
    }

    fn voltage(&self, index: usize) -> f64 {
        self.terminals.volts[index]
    }

    fn current(&self, terminal: usize) -> f64 {
        if terminal == 0 { self.current } else { -self.current }
    }
}

impl Persist for Capacitor {
    fn kind(&self) -> &'static str {
        "capacitor"
    }

    fn write_params(&self, w: &mut TokenWriter) {
        w.push_num(self.capacitance);
        w.push_int(self.polarized as i64);
        w.push_num(self.voltdiff);
    }

    fn read_params(r: &mut TokenReader<'_>) -> Result<Self> {
        let farads = r.num()?;
        let polarized = r.int()? != 0;
        let voltdiff = r.num()?;
        Ok(Self {
            polarized,
            voltdiff,
            ..Self::new(farads)
        })
    }
}

/// An inductor, modeled with the same trapezoidal companion scheme as the
/// capacitor; no extra matrix row is needed.
#[derive(Debug, Clone)]
pub struct Inductor {
    terminals: Terminals,
    inductance: f64,
    voltdiff: f64,
    comp_resistance: f64,
    source_current: f64,
    current: f64,
}

impl Inductor {
    pub fn new(henries: f64) -> Self {
        Self {
            terminals: Terminals::new(2),
            inductance: henries,
            voltdiff: 0.0,
            comp_resistance: 0.0,
            source_current: 0.0,
            current: 0.0,
        }
    }

    pub fn inductance(&self) -> f64 {
        self.inductance
    }
}

impl Element for Inductor {
    fn term_count(&self) -> usize {
        2
    }

    fn set_node(&mut self, index: usize, node: usize) {
        self.terminals.nodes[index] = node;
    }

    fn node(&self, index: usize) -> usize {
        self.terminals.nodes[index]
    }

    fn stamp(&mut self, sys: &mut LinearSystem) {
        self.comp_resistance = 2.0 * self.inductance / sys.timestep();
        sys.stamp_resistor(self.node(0), self.node(1), self.comp_resistance);
        sys.mark_varying_right_side(self.node(0));
        sys.mark_varying_right_side(self.node(1));
    }

    fn start_iteration(&mut self, _step: &StepInfo) {
        self.source_current = self.voltdiff / self.comp_resistance + self.current;
    }

    fn do_iteration(&mut self, sys: &mut LinearSystem) {
        sys.stamp_current_source(self.node(0), self.node(1), self.source_current);
    }

    fn set_voltage(&mut self, index: usize, volts: f64) {
        self.terminals.volts[index] = volts;
        self.voltdiff = self.terminals.volt_diff();
        self.current = self.voltdiff / self.comp_resistance + self.source_current;
    }

    fn voltage(&self, index: usize) -> f64 {
        self.terminals.volts[index]
    }

    fn current(&self, terminal: usize) -> f64 {
        if terminal == 0 { self.current } else { -self.current }
    }
}

impl Persist for Inductor {
    fn kind(&self) -> &'static str {
        "inductor"
    }

    fn write_params(&self, w: &mut TokenWriter) {
        w.push_num(self.inductance);
    }

    fn read_params(r: &mut TokenReader<'_>) -> Result<Self> {
        Ok(Self::new(r.num()?))
    }
}
