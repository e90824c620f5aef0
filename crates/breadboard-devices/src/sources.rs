//! Ground and the independent source models.

use std::f64::consts::TAU;

use breadboard_core::{
    Element, LinearSystem, Persist, Result, StepInfo, Terminals, TokenReader, TokenWriter,
};

use crate::waveforms::Waveform;

/// The reference node. Pins its post to zero volts through a source row so
/// the current into ground stays observable.
#[derive(Debug, Clone)]
pub struct Ground {
    terminals: Terminals,
    source: usize,
    current: f64,
}

impl Ground {
    pub fn new() -> Self {
        Self {
            terminals: Terminals::new(1),
            source: 0,
            current: 0.0,
        }
    }
}

impl Default for Ground {
    fn default() -> Self {
        Self::new()
    }
}

impl Element for Ground {
    fn term_count(&self) -> usize {
        1
    }

    fn voltage_source_count(&self) -> usize {
        1
    }

    fn set_node(&mut self, index: usize, node: usize) {
        self.terminals.nodes[index] = node;
    }

    fn node(&self, index: usize) -> usize {
        self.terminals.nodes[index]
    }

    fn set_voltage_source(&mut self, _source: usize, row: usize) {
        self.source = row;
    }

    fn stamp(&mut self, sys: &mut LinearSystem) {
        sys.stamp_voltage_source(self.node(0), 0, self.source, 0.0);
    }

    fn set_voltage(&mut self, index: usize, volts: f64) {
        self.terminals.volts[index] = volts;
    }

    fn voltage(&self, index: usize) -> f64 {
        self.terminals.volts[index]
    }

    fn current(&self, _terminal: usize) -> f64 {
        self.current
    }

    fn set_current(&mut self, _source: usize, amps: f64) {
        self.current = amps;
    }

    fn has_ground_connection(&self, _terminal: usize) -> bool {
        true
    }
}

impl Persist for Ground {
    fn kind(&self) -> &'static str {
        "ground"
    }

    fn write_params(&self, _w: &mut TokenWriter) {}

    fn read_params(_r: &mut TokenReader<'_>) -> Result<Self> {
        Ok(Self::new())
    }
}

/// An independent voltage source. Terminal 0 is negative, terminal 1
/// positive.
#[derive(Debug, Clone)]
pub struct VoltageSource {
    terminals: Terminals,
    waveform: Waveform,
    source: usize,
    value_now: f64,
    current: f64,
}

impl VoltageSource {
    pub fn new(waveform: Waveform) -> Self {
        Self {
            terminals: Terminals::new(2),
            waveform,
            source: 0,
            value_now: 0.0,
            current: 0.0,
        }
    }

    /// A fixed DC source.
    pub fn dc(volts: f64) -> Self {
        Self::new(Waveform::Dc(volts))
    }

    pub fn waveform(&self) -> &Waveform {
        &self.waveform
    }
}

impl Element for VoltageSource {
    fn term_count(&self) -> usize {
        2
    }

    fn voltage_source_count(&self) -> usize {
        1
    }

    fn set_node(&mut self, index: usize, node: usize) {
        self.terminals.nodes[index] = node;
    }

    fn node(&self, index: usize) -> usize {
        self.terminals.nodes[index]
    }

    fn set_voltage_source(&mut self, _source: usize, row: usize) {
        self.source = row;
    }

    fn stamp(&mut self, sys: &mut LinearSystem) {
        if let Waveform::Dc(volts) = self.waveform {
            sys.stamp_voltage_source(self.node(1), self.node(0), self.source, volts);
        } else {
            sys.stamp_voltage_source_varying(self.node(1), self.node(0), self.source);
        }
    }

    fn start_iteration(&mut self, step: &StepInfo) {
        self.value_now = self.waveform.value_at(step.time);
    }

    fn do_iteration(&mut self, sys: &mut LinearSystem) {
        if !self.waveform.is_dc() {
            sys.update_voltage_source(self.source, self.value_now);
        }
    }

    fn set_voltage(&mut self, index: usize, volts: f64) {
        self.terminals.volts[index] = volts;
    }

    fn voltage(&self, index: usize) -> f64 {
        self.terminals.volts[index]
    }

    fn current(&self, terminal: usize) -> f64 {
        if terminal == 1 { self.current } else { -self.current }
    }

    fn set_current(&mut self, _source: usize, amps: f64) {
        self.current = amps;
    }
}

impl Persist for VoltageSource {
    fn kind(&self) -> &'static str {
        "voltage"
    }

    fn write_params(&self, w: &mut TokenWriter) {
        self.waveform.write_params(w);
    }

    fn read_params(r: &mut TokenReader<'_>) -> Result<Self> {
        Ok(Self::new(Waveform::read_params(r)?))
    }
}

/// Resistance substituted for a current source with no return path.
const SAFE_RESISTANCE: f64 = 1e8;

/// An independent current source. Drives `amps` from terminal 0 to
/// terminal 1; if the analyzer found no external return path it stamps a
/// large resistor instead so the matrix stays regular.
#[derive(Debug, Clone)]
pub struct CurrentSource {
    terminals: Terminals,
    amps: f64,
    broken: bool,
    current: f64,
}

impl CurrentSource {
    pub fn new(amps: f64) -> Self {
        Self {
            terminals: Terminals::new(2),
            amps,
            broken: false,
            current: amps,
        }
    }

    pub fn amps(&self) -> f64 {
        self.amps
    }
}

impl Element for CurrentSource {
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
        if self.broken {
            sys.stamp_resistor(self.node(0), self.node(1), SAFE_RESISTANCE);
        } else {
            sys.stamp_current_source(self.node(0), self.node(1), self.amps);
        }
    }

    fn set_voltage(&mut self, index: usize, volts: f64) {
        self.terminals.volts[index] = volts;
        if self.broken {
            self.current = self.terminals.volt_diff() / SAFE_RESISTANCE;
        }
    }

    fn voltage(&self, index: usize) -> f64 {
        self.terminals.volts[index]
    }

    fn current(&self, terminal: usize) -> f64 {
        if terminal == 0 { self.current } else { -self.current }
    }

    fn has_connection(&self, _t1: usize, _t2: usize) -> bool {
        false
    }

    fn set_broken(&mut self, broken: bool) {
        self.broken = broken;
        self.current = if broken { 0.0 } else { self.amps };
    }
}

impl Persist for CurrentSource {
    fn kind(&self) -> &'static str {
        "current"
    }

    fn write_params(&self, w: &mut TokenWriter) {
        w.push_num(self.amps);
    }

    fn read_params(r: &mut TokenReader<'_>) -> Result<Self> {
        Ok(Self::new(r.num()?))
    }
}

/// A logarithmic frequency-sweep rail: drives its single terminal against
/// ground with a sine whose frequency climbs from `f_start` to `f_end`
/// over `sweep_time`, then wraps.
///
/// The per-step frequency multiplier depends on the step size, so it is
/// re-derived whenever the engine reports a different `dt`.
#[derive(Debug, Clone)]
pub struct SweepSource {
    terminals: Terminals,
    amplitude: f64,
    f_start: f64,
    f_end: f64,
    sweep_time: f64,
    source: usize,
    frequency: f64,
    freq_multiplier: f64,
    cached_dt: f64,
    phase: f64,
    value_now: f64,
    current: f64,
}

impl SweepSource {
    pub fn new(amplitude: f64, f_start: f64, f_end: f64, sweep_time: f64) -> Self {
        Self {
            terminals: Terminals::new(1),
            amplitude,
            f_start,
            f_end,
            sweep_time,
            source: 0,
            frequency: f_start,
            freq_multiplier: 1.0,
            cached_dt: 0.0,
            phase: 0.0,
            value_now: 0.0,
            current: 0.0,
        }
    }

    /// Present sweep frequency (Hz).
    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Per-step frequency multiplier derived from the last seen step size.
    pub fn freq_multiplier(&self) -> f64 {
        self.freq_multiplier
    }
}

impl Element for SweepSource {
    fn term_count(&self) -> usize {
        1
    }

    fn voltage_source_count(&self) -> usize {
        1
    }

    fn set_node(&mut self, index: usize, node: usize) {
        self.terminals.nodes[index] = node;
    }

    fn node(&self, index: usize) -> usize {
        self.terminals.nodes[index]
    }

    fn set_voltage_source(&mut self, _source: usize, row: usize) {
        self.source = row;
    }

    fn stamp(&mut self, sys: &mut LinearSystem) {
        sys.stamp_voltage_source_varying(self.node(0), 0, self.source);
    }

    fn start_iteration(&mut self, step: &StepInfo) {
        if step.dt != self.cached_dt {
            self.cached_dt = step.dt;
            self.freq_multiplier = (self.f_end / self.f_start).powf(step.dt / self.sweep_time);
        }
        self.phase = (self.phase + TAU * self.frequency * step.dt) % TAU;
        self.frequency *= self.freq_multiplier;
        if self.frequency > self.f_end {
            self.frequency = self.f_start;
        }
        self.value_now = self.amplitude * self.phase.sin();
    }

    fn do_iteration(&mut self, sys: &mut LinearSystem) {
        sys.update_voltage_source(self.source, self.value_now);
    }

    fn set_voltage(&mut self, index: usize, volts: f64) {
        self.terminals.volts[index] = volts;
    }

    fn voltage(&self, index: usize) -> f64 {
        self.terminals.volts[index]
    }

    fn current(&self, _terminal: usize) -> f64 {
        self.current
    }

    fn set_current(&mut self, _source: usize, amps: f64) {
        self.current = amps;
    }

    fn has_ground_connection(&self, _terminal: usize) -> bool {
        true
    }
}

impl Persist for SweepSource {
    fn kind(&self) -> &'static str {
        "sweep"
    }

    fn write_params(&self, w: &mut TokenWriter) {
        w.push_num(self.amplitude);
        w.push_num(self.f_start);
        w.push_num(self.f_end);
        w.push_num(self.sweep_time);
    }

    fn read_params(r: &mut TokenReader<'_>) -> Result<Self> {
        Ok(Self::new(r.num()?, r.num()?, r.num()?, r.num()?))
    }
}
