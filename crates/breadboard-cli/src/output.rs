//! Result rendering for the CLI.

use serde::Serialize;

use breadboard_core::ScopeWave;
use breadboard_solver::Simulation;

/// Voltage of a node, read back through its first attached terminal.
fn node_voltage(sim: &Simulation, node: usize) -> f64 {
    sim.analysis().nodes[node]
        .links
        .first()
        .map(|l| sim.element(l.element).voltage(l.terminal))
        .unwrap_or(0.0)
}

pub fn print_report(sim: &Simulation) {
    if sim.stopped() {
        println!(
            "Simulation stopped: {}",
            sim.stop_reason().unwrap_or("stopped")
        );
        println!();
    }

    println!("Final state at t = {:.6e} s", sim.time());
    println!();
    println!("Node Voltages:");
    for n in 1..=sim.analysis().num_nodes() {
        println!("  V({}) = {:.6} V", n, node_voltage(sim, n));
    }

    if sim.wire_count() > 0 {
        println!();
        println!("Wire Currents:");
        for w in 0..sim.wire_count() {
            println!("  I(wire{}) = {:.6e} A", w, sim.wire_current(w));
        }
    }

    for (i, scope) in sim.scopes().iter().enumerate() {
        println!();
        println!(
            "Scope {} (element {}, terminal {}, {} steps/bucket):",
            i,
            scope.element(),
            scope.terminal(),
            scope.speed()
        );
        for (min, max) in scope.samples() {
            println!("  {min:.6} .. {max:.6}");
        }
    }
}

#[derive(Serialize)]
struct Report {
    time: f64,
    stopped: bool,
    stop_reason: Option<String>,
    node_voltages: Vec<f64>,
    wire_currents: Vec<f64>,
    scopes: Vec<ScopeReport>,
}

#[derive(Serialize)]
struct ScopeReport {
    element: usize,
    terminal: usize,
    speed: usize,
    color: u32,
    samples: Vec<(f64, f64)>,
}

impl From<&ScopeWave> for ScopeReport {
    fn from(scope: &ScopeWave) -> Self {
        Self {
            element: scope.element(),
            terminal: scope.terminal(),
            speed: scope.speed(),
            color: scope.color(),
            samples: scope.samples(),
        }
    }
}

pub fn print_json(sim: &Simulation) -> anyhow::Result<()> {
    let report = Report {
        time: sim.time(),
        stopped: sim.stopped(),
        stop_reason: sim.stop_reason().map(str::to_owned),
        node_voltages: (1..=sim.analysis().num_nodes())
            .map(|n| node_voltage(sim, n))
            .collect(),
        wire_currents: (0..sim.wire_count()).map(|w| sim.wire_current(w)).collect(),
        scopes: sim.scopes().iter().map(ScopeReport::from).collect(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
