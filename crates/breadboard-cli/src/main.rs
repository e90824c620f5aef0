//! Breadboard command-line interface.
//!
//! Loads a circuit file, paces the simulation to a simulated-time goal
//! and prints the final node voltages, wire currents and scope captures.

mod circuit;
mod output;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use breadboard_solver::{Error as SolverError, SimConfig};

#[derive(Parser)]
#[command(name = "breadboard")]
#[command(about = "An interactive-speed circuit simulator", long_about = None)]
#[command(version)]
struct Cli {
    /// Input circuit file
    #[arg(value_name = "FILE")]
    input: Option<PathBuf>,

    /// Simulated time to run, in seconds
    #[arg(short, long, default_value_t = 1e-3)]
    time: f64,

    /// Discrete step size, in seconds
    #[arg(long, default_value_t = 5e-6)]
    timestep: f64,

    /// Steps credited per second of wall time for frame pacing
    #[arg(long, default_value_t = 5000.0)]
    rate: f64,

    /// Emit the final state as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(ref input) = cli.input else {
        println!("Breadboard - interactive-speed circuit simulator");
        println!();
        println!("Usage: breadboard <circuit.bb> [options]");
        println!();
        println!("Options:");
        println!("  -t, --time <SECONDS>      Simulated time to run (default 1e-3)");
        println!("      --timestep <SECONDS>  Discrete step size (default 5e-6)");
        println!("      --rate <STEPS>        Steps per wall-clock second (default 5000)");
        println!("      --json                Emit the final state as JSON");
        println!("  -v, --verbose             Verbose output");
        println!("  -h, --help                Show help");
        println!("  -V, --version             Show version");
        return Ok(());
    };

    let content = fs::read_to_string(input)
        .with_context(|| format!("failed to read circuit: {}", input.display()))?;

    let config = SimConfig {
        timestep: cli.timestep,
        steps_per_second: cli.rate,
        ..SimConfig::default()
    };
    let mut sim = circuit::load(&content, config)
        .with_context(|| format!("failed to load circuit: {}", input.display()))?;
    sim.rebuild()?;

    if cli.verbose {
        println!(
            "Circuit: {} elements, {} nodes, {} source rows, {} wires",
            sim.element_count(),
            sim.analysis().num_nodes(),
            sim.analysis().sources.len(),
            sim.wire_count()
        );
        println!();
    }

    // Drive the engine the way an editor would: one synthetic frame of
    // wall time after another until the simulated goal is reached. A
    // halt or failed step leaves the stop reason on the simulation.
    let frame = 1.0 / 60.0;
    while sim.time() < cli.time && !sim.stopped() {
        match sim.run(frame) {
            Ok(_) => {}
            Err(SolverError::Halted(_) | SolverError::NonConvergence { .. }) => break,
            Err(e) => return Err(e.into()),
        }
    }

    if cli.json {
        output::print_json(&sim)?;
    } else {
        output::print_report(&sim);
    }
    Ok(())
}
