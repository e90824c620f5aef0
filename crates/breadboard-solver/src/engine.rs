//! The simulation owner object and its per-timestep iteration loop.
//!
//! [`Simulation`] holds the element arena, the wiring, the analysis
//! tables, the linear system and the scope channels, and drives one
//! discrete timestep at a time: reset the system to its linear baseline,
//! let every element stamp, solve, feed the solution back, and repeat
//! until the nonlinear elements agree or the sub-iteration cap is hit.
//! Everything runs on the calling thread; solved values must only be read
//! between completed steps.

use log::{debug, trace};

use breadboard_core::{
    Analysis, Element, ElementIndex, LinearSystem, Post, ScopeWave, StepInfo, Wire, analyze,
};

use crate::error::{Error, Result};
use crate::lu::{lu_factor, lu_solve};

/// Iteration and pacing limits.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Discrete step size (s).
    pub timestep: f64,
    /// Newton sub-iteration cap per step.
    pub max_iterations: usize,
    /// Target steps per wall-clock second for [`Simulation::run`].
    pub steps_per_second: f64,
    /// Most steps a single [`Simulation::run`] call may execute.
    pub max_steps_per_frame: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            timestep: 5e-6,
            max_iterations: 200,
            steps_per_second: 5000.0,
            max_steps_per_frame: 250,
        }
    }
}

/// A circuit and everything needed to step it forward in time.
#[derive(Debug)]
pub struct Simulation {
    elements: Vec<Box<dyn Element>>,
    posts: Vec<Vec<Post>>,
    wires: Vec<Wire>,
    scopes: Vec<ScopeWave>,
    config: SimConfig,
    analysis: Analysis,
    system: LinearSystem,
    pivots: Vec<usize>,
    wire_currents: Vec<f64>,
    time: f64,
    step_debt: f64,
    needs_analysis: bool,
    nonlinear: bool,
    stopped: bool,
    stop_reason: Option<String>,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Self {
        Self {
            elements: Vec::new(),
            posts: Vec::new(),
            wires: Vec::new(),
            scopes: Vec::new(),
            system: LinearSystem::new(0, 0, config.timestep),
            config,
            analysis: Analysis::default(),
            pivots: Vec::new(),
            wire_currents: Vec::new(),
            time: 0.0,
            step_debt: 0.0,
            needs_analysis: true,
            nonlinear: false,
            stopped: false,
            stop_reason: None,
        }
    }

    /// Place an element, giving one post per terminal.
    pub fn add_element(&mut self, element: Box<dyn Element>, posts: &[Post]) -> ElementIndex {
        self.elements.push(element);
        self.posts.push(posts.to_vec());
        self.needs_analysis = true;
        self.elements.len() - 1
    }

    /// Join two posts with a zero-impedance wire.
    pub fn add_wire(&mut self, a: Post, b: Post) {
        self.wires.push(Wire { a, b });
        self.needs_analysis = true;
    }

    /// Attach a scope channel.
    pub fn add_scope(&mut self, scope: ScopeWave) {
        self.scopes.push(scope);
    }

    pub fn element(&self, index: ElementIndex) -> &dyn Element {
        self.elements[index].as_ref()
    }

    pub fn element_mut(&mut self, index: ElementIndex) -> &mut dyn Element {
        self.elements[index].as_mut()
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Read-only scope query surface for the renderer.
    pub fn scopes(&self) -> &[ScopeWave] {
        &self.scopes
    }

    /// Analysis tables from the last rebuild.
    pub fn analysis(&self) -> &Analysis {
        &self.analysis
    }

    /// Display current of a wire: the signed sum of element currents at
    /// its first endpoint, positive toward the second endpoint.
    pub fn wire_current(&self, wire: usize) -> f64 {
        self.wire_currents[wire]
    }

    pub fn wire_count(&self) -> usize {
        self.wires.len()
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn timestep(&self) -> f64 {
        self.config.timestep
    }

    /// Change the step size. Companion stamps depend on it, so the next
    /// step rebuilds, and rate-dependent elements re-derive their
    /// increments from the new [`StepInfo`].
    pub fn set_timestep(&mut self, dt: f64) {
        if dt != self.config.timestep {
            self.config.timestep = dt;
            self.needs_analysis = true;
        }
    }

    pub fn stopped(&self) -> bool {
        self.stopped
    }

    pub fn stop_reason(&self) -> Option<&str> {
        self.stop_reason.as_deref()
    }

    /// Pause (or halt with a cause). Takes effect at the next check point.
    pub fn stop(&mut self, reason: impl Into<String>) {
        self.stopped = true;
        self.stop_reason = Some(reason.into());
    }

    pub fn resume(&mut self) {
        self.stopped = false;
        self.stop_reason = None;
    }

    /// Re-run network analysis and restamp the linear baseline. Called
    /// automatically by [`Simulation::step`] after any topology change.
    pub fn rebuild(&mut self) -> Result<()> {
        let analysis = analyze(&mut self.elements, &self.posts, &self.wires)?;
        let mut system = LinearSystem::new(
            analysis.num_nodes(),
            analysis.sources.len(),
            self.config.timestep,
        );

        self.nonlinear = self.elements.iter().any(|e| e.nonlinear());
        for element in &mut self.elements {
            element.stamp(&mut system);
        }
        system.simplify();

        // A purely linear matrix never changes, so factor it once here.
        if !self.nonlinear {
            lu_factor(system.matrix_mut(), &mut self.pivots);
        }

        debug!(
            "rebuilt: {} elements, {} nodes, {} sources, {} unknowns after folding",
            self.elements.len(),
            analysis.num_nodes(),
            analysis.sources.len(),
            system.size()
        );

        self.wire_currents = vec![0.0; self.wires.len()];
        self.analysis = analysis;
        self.system = system;
        self.needs_analysis = false;
        Ok(())
    }

    /// Advance the circuit by one discrete timestep.
    ///
    /// On failure the stop flag is set and the error carries the reason;
    /// time does not advance and element state from the aborted step is
    /// not trustworthy until the circuit is rebuilt or resumed.
    pub fn step(&mut self) -> Result<()> {
        if self.needs_analysis {
            self.rebuild()?;
        }
        if self.stopped {
            return Err(Error::Halted(
                self.stop_reason.clone().unwrap_or_else(|| "stopped".into()),
            ));
        }

        let info = StepInfo {
            time: self.time,
            dt: self.config.timestep,
        };
        for element in &mut self.elements {
            element.start_iteration(&info);
        }

        let mut iter = 0;
        loop {
            if iter >= self.config.max_iterations {
                self.stop(format!("no convergence after {iter} sub-iterations"));
                return Err(Error::NonConvergence { iterations: iter });
            }

            self.system.restore_right_side();
            if self.nonlinear {
                self.system.restore_matrix();
            }
            self.system.converged = true;
            for element in &mut self.elements {
                element.do_iteration(&mut self.system);
            }

            // The one cancellation point per sub-iteration: element halt
            // requests and the external stop flag.
            if let Some(reason) = self.system.take_halt() {
                self.stop(reason.clone());
                return Err(Error::Halted(reason));
            }
            if self.stopped {
                return Err(Error::Halted(
                    self.stop_reason.clone().unwrap_or_else(|| "stopped".into()),
                ));
            }

            if self.system.converged && iter > 0 {
                break;
            }

            if self.nonlinear {
                lu_factor(self.system.matrix_mut(), &mut self.pivots);
            }
            let (matrix, rhs) = self.system.solve_parts();
            lu_solve(matrix, &self.pivots, rhs);
            self.apply_solution();
            iter += 1;
        }
        trace!("t = {} converged in {} sub-iterations", self.time, iter);

        for element in &mut self.elements {
            element.finish_iteration(&info);
        }
        self.update_wire_currents();
        self.sample_scopes();
        self.time += self.config.timestep;
        Ok(())
    }

    /// Run as many whole steps as `elapsed_seconds` of wall time allows at
    /// the configured rate, bounded by the per-frame cap. Returns the
    /// number of steps executed; fractional step credit carries over to
    /// the next frame.
    pub fn run(&mut self, elapsed_seconds: f64) -> Result<usize> {
        let credit = elapsed_seconds * self.config.steps_per_second + self.step_debt;
        let goal = (credit as usize).min(self.config.max_steps_per_frame);
        self.step_debt = (credit - goal as f64).max(0.0).min(1.0);

        let mut done = 0;
        while done < goal {
            if self.stopped {
                break;
            }
            self.step()?;
            done += 1;
        }
        Ok(done)
    }

    /// Push solved node voltages into every linked element and solved
    /// source currents back to their owners. Non-finite values are fed
    /// back as zero.
    fn apply_solution(&mut self) {
        for node in 1..self.analysis.nodes.len() {
            let mut volts = self.system.solved_node(node);
            if !volts.is_finite() {
                volts = 0.0;
            }
            for link in &self.analysis.nodes[node].links {
                self.elements[link.element].set_voltage(link.terminal, volts);
            }
        }
        for (row, record) in self.analysis.sources.iter().enumerate() {
            let mut amps = self.system.solved_source(row);
            if !amps.is_finite() {
                amps = 0.0;
            }
            self.elements[record.element].set_current(record.source, amps);
        }
    }

    fn update_wire_currents(&mut self) {
        for (w, info) in self.analysis.wires.iter().enumerate() {
            let mut total = 0.0;
            for link in &info.links {
                total += self.elements[link.element].current(link.terminal);
            }
            // Current entering the wire at its first endpoint flows toward
            // the second.
            self.wire_currents[w] = -total;
        }
    }

    fn sample_scopes(&mut self) {
        for scope in &mut self.scopes {
            let value = self
                .elements
                .get(scope.element())
                .map(|e| e.voltage(scope.terminal()))
                .unwrap_or(0.0);
            scope.record(value);
        }
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(SimConfig::default())
    }
}
