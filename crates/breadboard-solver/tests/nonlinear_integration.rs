//! Integration tests for nonlinear iteration, halts and composites.

use breadboard_devices::{
    Composite, CompositeModel, Diode, Ground, Inverter, NoiseSource, Resistor, StopTrigger,
    VoltageSource,
};
use breadboard_solver::{Error, Simulation};

/// A diode in series with a resistor settles near the familiar junction
/// drop, with the Newton iteration closing the loop.
#[test]
fn test_diode_resistor_operating_point() {
    let mut sim = Simulation::default();
    sim.add_element(Box::new(Ground::new()), &[0]);
    sim.add_element(Box::new(VoltageSource::dc(5.0)), &[0, 1]);
    let d = sim.add_element(Box::new(Diode::new()), &[1, 2]);
    let r = sim.add_element(Box::new(Resistor::new(1000.0)), &[2, 0]);

    sim.step().unwrap();

    let drop = sim.element(d).voltage(0) - sim.element(d).voltage(1);
    assert!((0.55..0.80).contains(&drop), "junction drop {drop} V");
    // Series elements carry the same current, up to the convergence
    // tolerance of the final linearization.
    let i_d = sim.element(d).current(0);
    let i_r = sim.element(r).current(0);
    assert!((i_d - i_r).abs() < 1e-3, "{i_d} A vs {i_r} A");
    assert!(i_d > 3e-3);
}

/// Noise that never lets the damper freeze an oscillating gate.
#[derive(Debug)]
struct NeverDamp;

impl NoiseSource for NeverDamp {
    fn next(&mut self) -> f64 {
        1.0
    }
}

/// An inverter fed its own output can never settle; the sub-iteration
/// cap must turn that into a reported failure, not a silent answer.
#[test]
fn test_iteration_cap_reports_failure() {
    let mut sim = Simulation::default();
    sim.add_element(Box::new(Ground::new()), &[0]);
    let inv = Inverter::with_noise(5.0, Box::new(NeverDamp));
    sim.add_element(Box::new(inv), &[1, 1]);

    let err = sim.step().unwrap_err();
    assert!(matches!(err, Error::NonConvergence { iterations: 200 }));
    assert!(sim.stopped());
    assert!(sim.stop_reason().unwrap().contains("convergence"));
}

/// With the stock noise source the damper eventually freezes the same
/// ring and the step completes.
#[test]
fn test_oscillating_gate_settles_with_damping() {
    let mut sim = Simulation::default();
    sim.add_element(Box::new(Ground::new()), &[0]);
    sim.add_element(Box::new(Inverter::new(5.0)), &[1, 1]);

    sim.step().unwrap();
    assert!(!sim.stopped());
}

/// A trigger element halts the run with its reason once the watched node
/// crosses threshold.
#[test]
fn test_stop_trigger_halts_with_reason() {
    let mut sim = Simulation::default();
    sim.add_element(Box::new(Ground::new()), &[0]);
    sim.add_element(Box::new(VoltageSource::dc(5.0)), &[0, 1]);
    sim.add_element(Box::new(Resistor::new(1000.0)), &[1, 0]);
    sim.add_element(Box::new(StopTrigger::rising(3.0)), &[1]);

    let err = sim.step().unwrap_err();
    assert!(matches!(err, Error::Halted(_)), "{err}");
    assert!(sim.stopped());
    assert!(sim.stop_reason().unwrap().contains("trigger"));
}

/// A composite divider must match the flattened circuit it wraps, for
/// both terminal quantities and the exposed internal node.
#[test]
fn test_composite_matches_flattened_divider() {
    let model = CompositeModel::new(&[0, 2])
        .with_part("resistor", &[0, 1], "1k")
        .with_part("resistor", &[1, 2], "2k");

    let mut nested = Simulation::default();
    nested.add_element(Box::new(Ground::new()), &[0]);
    nested.add_element(Box::new(VoltageSource::dc(9.0)), &[0, 1]);
    let comp = nested.add_element(Box::new(Composite::new(model).unwrap()), &[1, 0]);
    nested.step().unwrap();

    let mut flat = Simulation::default();
    flat.add_element(Box::new(Ground::new()), &[0]);
    flat.add_element(Box::new(VoltageSource::dc(9.0)), &[0, 1]);
    let r1 = flat.add_element(Box::new(Resistor::new(1000.0)), &[1, 2]);
    let r2 = flat.add_element(Box::new(Resistor::new(2000.0)), &[2, 0]);
    flat.step().unwrap();

    let c = nested.element(comp);
    assert!((c.voltage(0) - flat.element(r1).voltage(0)).abs() < 1e-12);
    // Slot 2 is the composite's internal midpoint.
    assert!((c.voltage(2) - flat.element(r1).voltage(1)).abs() < 1e-12);
    assert!((c.current(0) - flat.element(r1).current(0)).abs() < 1e-12);
    assert!((c.current(1) - flat.element(r2).current(1)).abs() < 1e-12);
}

/// A composite containing its own source and ground drives the parent
/// circuit through forwarded voltage-source rows.
#[test]
fn test_composite_child_source_row_solves() {
    let model = CompositeModel::new(&[0])
        .with_part("voltage", &[1, 0], "dc 5")
        .with_part("ground", &[1], "");

    let mut sim = Simulation::default();
    let comp = sim.add_element(Box::new(Composite::new(model).unwrap()), &[1]);
    let r = sim.add_element(Box::new(Resistor::new(1000.0)), &[1, 2]);
    sim.add_element(Box::new(Ground::new()), &[2]);

    sim.step().unwrap();

    assert!((sim.element(comp).voltage(0) - 5.0).abs() < 1e-9);
    assert!((sim.element(r).current(0) - 0.005).abs() < 1e-9);
    // KCL at the shared node: the composite sources what the resistor sinks.
    assert!((sim.element(comp).current(0) + sim.element(r).current(0)).abs() < 1e-9);
}
