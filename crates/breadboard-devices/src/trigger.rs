//! Threshold trigger that halts the run so a condition can be inspected.

use breadboard_core::{
    Element, LinearSystem, Persist, Result, Terminals, TokenReader, TokenWriter,
};

/// A single-terminal probe that asks the engine to stop once its node
/// voltage crosses a threshold. Draws no current and stamps nothing.
#[derive(Debug, Clone)]
pub struct StopTrigger {
    terminals: Terminals,
    threshold: f64,
    rising: bool,
}

impl StopTrigger {
    /// Halt when the watched voltage rises above `threshold`.
    pub fn rising(threshold: f64) -> Self {
        Self {
            terminals: Terminals::new(1),
            threshold,
            rising: true,
        }
    }

    /// Halt when the watched voltage falls below `threshold`.
    pub fn falling(threshold: f64) -> Self {
        Self {
            rising: false,
            ..Self::rising(threshold)
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn tripped(&self) -> bool {
        let v = self.terminals.volts[0];
        if self.rising {
            v > self.threshold
        } else {
            v < self.threshold
        }
    }
}

impl Element for StopTrigger {
    fn term_count(&self) -> usize {
        1
    }

    fn set_node(&mut self, index: usize, node: usize) {
        self.terminals.nodes[index] = node;
    }

    fn node(&self, index: usize) -> usize {
        self.terminals.nodes[index]
    }

    fn stamp(&mut self, _sys: &mut LinearSystem) {}

    fn do_iteration(&mut self, sys: &mut LinearSystem) {
        if self.tripped() {
            let edge = if self.rising { "rose above" } else { "fell below" };
            sys.request_halt(format!(
                "trigger: {:.3} V {} {:.3} V",
                self.terminals.volts[0], edge, self.threshold
            ));
        }
    }

    fn set_voltage(&mut self, index: usize, volts: f64) {
        self.terminals.volts[index] = volts;
    }

    fn voltage(&self, index: usize) -> f64 {
        self.terminals.volts[index]
    }

    fn current(&self, _terminal: usize) -> f64 {
        0.0
    }
}

impl Persist for StopTrigger {
    fn kind(&self) -> &'static str {
        "trigger"
    }

    fn write_params(&self, w: &mut TokenWriter) {
        w.push_num(self.threshold);
        w.push_int(self.rising as i64);
    }

    fn read_params(r: &mut TokenReader<'_>) -> Result<Self> {
        let threshold = r.num()?;
        let rising = r.int()? != 0;
        Ok(if rising {
            Self::rising(threshold)
        } else {
            Self::falling(threshold)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_below_threshold() {
        let mut sys = LinearSystem::new(1, 0, 1e-6);
        let mut t = StopTrigger::rising(3.0);
        t.set_node(0, 1);
        t.set_voltage(0, 2.0);
        t.do_iteration(&mut sys);
        assert_eq!(sys.take_halt(), None);
    }

    #[test]
    fn test_rising_halts_above_threshold() {
        let mut sys = LinearSystem::new(1, 0, 1e-6);
        let mut t = StopTrigger::rising(3.0);
        t.set_node(0, 1);
        t.set_voltage(0, 3.5);
        t.do_iteration(&mut sys);
        let reason = sys.take_halt().expect("should halt");
        assert!(reason.contains("trigger"), "{reason}");
    }

    #[test]
    fn test_falling_halts_below_threshold() {
        let mut sys = LinearSystem::new(1, 0, 1e-6);
        let mut t = StopTrigger::falling(-1.0);
        t.set_voltage(0, -2.0);
        t.do_iteration(&mut sys);
        assert!(sys.take_halt().is_some());
    }

    #[test]
    fn test_token_round_trip() {
        let mut w = TokenWriter::new();
        StopTrigger::falling(2.5).write_params(&mut w);
        let rec = w.finish();
        let t = StopTrigger::read_params(&mut TokenReader::new(&rec)).unwrap();
        assert_eq!(t.threshold(), 2.5);
        assert!(!t.rising);
    }
}
