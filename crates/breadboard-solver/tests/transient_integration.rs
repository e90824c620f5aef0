//! Integration tests for time-domain behavior: companion models, frame
//! pacing and scope capture.

use breadboard_core::ScopeWave;
use breadboard_devices::{Capacitor, Ground, Inductor, Resistor, VoltageSource, Waveform};
use breadboard_solver::{SimConfig, Simulation};

fn config(timestep: f64) -> SimConfig {
    SimConfig {
        timestep,
        ..SimConfig::default()
    }
}

/// A charged capacitor discharging through a resistor follows
/// `V(t) = V0 * exp(-t / RC)` within discretization error.
#[test]
fn test_rc_discharge_follows_exponential() {
    let mut sim = Simulation::new(config(1e-6));
    sim.add_element(Box::new(Ground::new()), &[0]);
    let cap = sim.add_element(Box::new(Capacitor::with_charge(1e-6, 5.0)), &[1, 0]);
    sim.add_element(Box::new(Resistor::new(1000.0)), &[1, 0]);

    // RC = 1 ms; run exactly one time constant.
    for _ in 0..1000 {
        sim.step().unwrap();
    }

    let expected = 5.0 * (-1.0f64).exp();
    let v = sim.element(cap).voltage(0);
    assert!((v - expected).abs() < 1e-3, "V = {v}, expected {expected}");
}

/// An inductor charging through a resistor approaches V/R with the L/R
/// time constant.
#[test]
fn test_rl_rise_follows_exponential() {
    let mut sim = Simulation::new(config(1e-6));
    sim.add_element(Box::new(Ground::new()), &[0]);
    sim.add_element(Box::new(VoltageSource::dc(10.0)), &[0, 1]);
    sim.add_element(Box::new(Resistor::new(1000.0)), &[1, 2]);
    let ind = sim.add_element(Box::new(Inductor::new(0.1)), &[2, 0]);

    // L/R = 100 us; run exactly one time constant.
    for _ in 0..100 {
        sim.step().unwrap();
    }

    let expected = 0.010 * (1.0 - (-1.0f64).exp());
    let i = sim.element(ind).current(0);
    assert!((i - expected).abs() < 1e-4, "I = {i}, expected {expected}");
}

/// A time-varying source lands the solved node on the waveform value.
#[test]
fn test_sine_source_tracks_waveform() {
    let mut sim = Simulation::new(config(1e-5));
    sim.add_element(Box::new(Ground::new()), &[0]);
    sim.add_element(
        Box::new(VoltageSource::new(Waveform::sine(2.0, 50.0))),
        &[0, 1],
    );
    let r = sim.add_element(Box::new(Resistor::new(1000.0)), &[1, 0]);

    // The 501st step computes from t = 5 ms, the quarter-period peak.
    for _ in 0..501 {
        sim.step().unwrap();
    }

    assert!((sim.element(r).voltage(0) - 2.0).abs() < 1e-9);
}

/// Scope buckets extend while filling and roll over every `speed` steps.
#[test]
fn test_scope_buckets_roll_with_steps() {
    let mut sim = Simulation::default();
    sim.add_element(Box::new(Ground::new()), &[0]);
    sim.add_element(Box::new(VoltageSource::dc(10.0)), &[0, 1]);
    let r1 = sim.add_element(Box::new(Resistor::new(1000.0)), &[1, 2]);
    sim.add_element(Box::new(Resistor::new(1000.0)), &[2, 0]);
    sim.add_scope(ScopeWave::new(r1, 1, 8, 10));

    for _ in 0..35 {
        sim.step().unwrap();
    }

    let samples = sim.scopes()[0].samples();
    assert_eq!(samples.len(), 3);
    for (min, max) in samples {
        assert!((min - 5.0).abs() < 1e-9);
        assert!((max - 5.0).abs() < 1e-9);
    }
}

/// `run` converts elapsed wall time into whole steps at the configured
/// rate, bounded by the per-frame cap.
#[test]
fn test_run_paces_by_wall_time() {
    let mut sim = Simulation::default();
    sim.add_element(Box::new(Ground::new()), &[0]);
    sim.add_element(Box::new(VoltageSource::dc(5.0)), &[0, 1]);
    sim.add_element(Box::new(Resistor::new(1000.0)), &[1, 0]);

    // 10 ms at 5000 steps/s.
    let n = sim.run(0.010).unwrap();
    assert_eq!(n, 50);
    assert!((sim.time() - 50.0 * sim.timestep()).abs() < 1e-12);

    // A huge frame is clamped to the per-frame cap.
    let n = sim.run(10.0).unwrap();
    assert_eq!(n, 250);
}

/// Fractional step credit carries over between frames.
#[test]
fn test_run_carries_fractional_credit() {
    let mut sim = Simulation::default();
    sim.add_element(Box::new(Ground::new()), &[0]);
    sim.add_element(Box::new(VoltageSource::dc(5.0)), &[0, 1]);
    sim.add_element(Box::new(Resistor::new(1000.0)), &[1, 0]);

    // 0.75 steps of credit: nothing runs yet.
    assert_eq!(sim.run(0.00015).unwrap(), 0);
    // Another 0.75 tips it over.
    assert_eq!(sim.run(0.00015).unwrap(), 1);
}

/// Changing the step size rebuilds companion stamps and advances time by
/// the new increment.
#[test]
fn test_timestep_change_rebuilds() {
    let mut sim = Simulation::new(config(1e-6));
    sim.add_element(Box::new(Ground::new()), &[0]);
    sim.add_element(Box::new(Capacitor::with_charge(1e-6, 5.0)), &[1, 0]);
    sim.add_element(Box::new(Resistor::new(1000.0)), &[1, 0]);

    sim.step().unwrap();
    let t = sim.time();

    sim.set_timestep(2e-6);
    sim.step().unwrap();
    assert!((sim.time() - (t + 2e-6)).abs() < 1e-15);
    assert_eq!(sim.timestep(), 2e-6);
}
