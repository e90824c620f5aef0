//! Junction diode with an exponential conduction law.
//!
//! Each sub-iteration linearizes the curve at the present voltage guess
//! and stamps the equivalent conductance and current. Steps far up the
//! exponential are compressed logarithmically so `exp()` cannot overflow
//! while the iteration closes in.

use breadboard_core::{
    Element, LinearSystem, Persist, Result, Terminals, TokenReader, TokenWriter,
};

/// Thermal voltage at room temperature (V).
const VT: f64 = 0.025865;

/// Minimum conductance kept on the junction for numerical stability.
const GMIN: f64 = 1e-12;

/// Operating-point movement below which the device reports convergence (V).
const CONVERGE_TOLERANCE: f64 = 0.01;

/// A diode; terminal 0 is the anode, terminal 1 the cathode.
#[derive(Debug, Clone)]
pub struct Diode {
    terminals: Terminals,
    sat_current: f64,
    vcrit: f64,
    last_voltdiff: f64,
    current: f64,
}

impl Diode {
    pub fn new() -> Self {
        Self::with_saturation_current(1e-14)
    }

    pub fn with_saturation_current(sat_current: f64) -> Self {
        Self {
            terminals: Terminals::new(2),
            sat_current,
            vcrit: VT * (VT / (std::f64::consts::SQRT_2 * sat_current)).ln(),
            last_voltdiff: 0.0,
            current: 0.0,
        }
    }

    pub fn saturation_current(&self) -> f64 {
        self.sat_current
    }

    /// Damp a junction-voltage step that would overflow the exponential.
    fn limit_step(&self, vnew: f64, vold: f64) -> f64 {
        if vnew > self.vcrit && (vnew - vold).abs() > 2.0 * VT {
            if vold > 0.0 {
                let arg = 1.0 + (vnew - vold) / VT;
                if arg > 0.0 {
                    return vold + VT * arg.ln();
                }
                return self.vcrit;
            }
            return VT * (vnew / VT).ln();
        }
        vnew
    }
}

impl Default for Diode {
    fn default() -> Self {
        Self::new()
    }
}

impl Element for Diode {
    fn term_count(&self) -> usize {
        2
    }

    fn nonlinear(&self) -> bool {
        true
    }

    fn set_node(&mut self, index: usize, node: usize) {
        self.terminals.nodes[index] = node;
    }

    fn node(&self, index: usize) -> usize {
        self.terminals.nodes[index]
    }

    fn stamp(&mut self, sys: &mut LinearSystem) {
        // All numeric contributions land per-iteration.
        sys.mark_nonlinear(self.node(0));
        sys.mark_nonlinear(self.node(1));
    }

    fn do_iteration(&mut self, sys: &mut LinearSystem) {
        let guess = self.terminals.volt_diff();
        if (guess - self.last_voltdiff).abs() > CONVERGE_TOLERANCE {
            sys.not_converged();
        }
        let vd = self.limit_step(guess, self.last_voltdiff);
        self.last_voltdiff = vd;

        let ex = (vd / VT).exp();
        let geq = (self.sat_current * ex / VT).max(GMIN);
        let ieq = self.sat_current * (ex - 1.0) - geq * vd;
        sys.stamp_conductance(self.node(0), self.node(1), geq);
        sys.stamp_current_source(self.node(0), self.node(1), ieq);
    }

    fn set_voltage(&mut self, index: usize, volts: f64) {
        self.terminals.volts[index] = volts;
        let vd = self.terminals.volt_diff();
        self.current = self.sat_current * ((vd / VT).exp() - 1.0);
    }

    fn voltage(&self, index: usize) -> f64 {
        self.terminals.volts[index]
    }

    fn current(&self, terminal: usize) -> f64 {
        if terminal == 0 { self.current } else { -self.current }
    }
}

impl Persist for Diode {
    fn kind(&self) -> &'static str {
        "diode"
    }

    fn write_params(&self, w: &mut TokenWriter) {
        w.push_num(self.sat_current);
    }

    fn read_params(r: &mut TokenReader<'_>) -> Result<Self> {
        Ok(Self::with_saturation_current(r.num()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_conduction() {
        let mut d = Diode::new();
        d.set_voltage(0, 0.7);
        d.set_voltage(1, 0.0);
        assert!(d.current(0) > 1e-4, "{}", d.current(0));

        d.set_voltage(0, 0.0);
        assert_eq!(d.current(0), 0.0);
    }

    #[test]
    fn test_reverse_blocks() {
        let mut d = Diode::new();
        d.set_voltage(0, -5.0);
        d.set_voltage(1, 0.0);
        assert!(d.current(0).abs() < 1e-13);
    }

    #[test]
    fn test_limit_step_compresses_large_jumps() {
        let d = Diode::new();
        let limited = d.limit_step(5.0, 0.6);
        assert!(limited < 1.0, "{limited}");
        // Small steps pass through untouched.
        assert_eq!(d.limit_step(0.61, 0.6), 0.61);
    }

    #[test]
    fn test_unsettled_guess_clears_convergence() {
        let mut sys = LinearSystem::new(2, 0, 1e-6);
        let mut d = Diode::new();
        d.set_node(0, 1);
        d.set_node(1, 2);
        d.stamp(&mut sys);
        sys.simplify();

        sys.restore_matrix();
        sys.restore_right_side();
        sys.converged = true;
        d.set_voltage(0, 0.8);
        d.do_iteration(&mut sys);
        assert!(!sys.converged);

        // Second pass from the settled point keeps the flag.
        sys.converged = true;
        d.set_voltage(0, d.last_voltdiff);
        d.do_iteration(&mut sys);
        assert!(sys.converged);
    }
}
