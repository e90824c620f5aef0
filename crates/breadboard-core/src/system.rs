//! Linear system storage, stamping and constant folding.
//!
//! Elements stamp their contributions in terms of circuit node numbers.
//! Node 0 is ground and is silently skipped; nodes `1..=num_nodes` are
//! voltage unknowns and the pseudo-nodes `num_nodes+1..` address the
//! current unknowns of voltage sources, so one set of stamp entry points
//! serves both kinds of row.
//!
//! Building a system is a two-phase affair. During the build phase stamps
//! land directly in the full-size matrix. [`LinearSystem::simplify`] then
//! pins trivially-constant unknowns (nodes tied to a fixed voltage through
//! a static source row), folds them into the right side of every row that
//! references them and compacts what survives into the reduced working
//! matrices, keeping a baseline copy of each. During iteration the same
//! stamp entry points route through the recorded mapping: a stamp against
//! a constant column becomes a right-side correction of `-x * value`
//! instead of a matrix write.

use log::debug;
use nalgebra::{DMatrix, DVector};

/// Bookkeeping for one unknown of the full (pre-reduction) system.
#[derive(Debug, Clone, Default)]
pub struct UnknownInfo {
    /// Pinned to a known value and excluded from the matrix.
    pub is_const: bool,
    /// The pinned value when `is_const`.
    pub value: f64,
    /// Row this unknown's equation maps to in the reduced matrix.
    pub row: usize,
    /// Column this unknown maps to in the reduced matrix.
    pub col: usize,
    /// Matrix entries in this row are re-stamped during iteration.
    pub lhs_changes: bool,
    /// Right side of this row is re-stamped during iteration.
    pub rhs_changes: bool,
    /// Equation was consumed by constant folding.
    pub dropped: bool,
}

/// The assembled system `matrix * x = right_side`.
#[derive(Debug, Clone)]
pub struct LinearSystem {
    num_nodes: usize,
    num_sources: usize,
    matrix: DMatrix<f64>,
    right_side: DVector<f64>,
    orig_matrix: DMatrix<f64>,
    orig_right_side: DVector<f64>,
    info: Vec<UnknownInfo>,
    mapped: bool,
    reduced: usize,
    timestep: f64,
    /// Set true at the start of each sub-iteration; cleared by elements
    /// whose operating point moved past tolerance.
    pub converged: bool,
    halt: Option<String>,
}

impl LinearSystem {
    /// A full-size system for `num_nodes` non-ground nodes and
    /// `num_sources` voltage-source rows, built for step size `timestep`.
    pub fn new(num_nodes: usize, num_sources: usize, timestep: f64) -> Self {
        let size = num_nodes + num_sources;
        Self {
            num_nodes,
            num_sources,
            matrix: DMatrix::zeros(size, size),
            right_side: DVector::zeros(size),
            orig_matrix: DMatrix::zeros(size, size),
            orig_right_side: DVector::zeros(size),
            info: vec![UnknownInfo::default(); size],
            mapped: false,
            reduced: size,
            timestep,
            converged: true,
            halt: None,
        }
    }

    /// Unknown count before constant folding.
    pub fn full_size(&self) -> usize {
        self.num_nodes + self.num_sources
    }

    /// Unknown count of the working matrix (reduced once simplified).
    pub fn size(&self) -> usize {
        self.reduced
    }

    /// Non-ground node count.
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Voltage-source row count.
    pub fn num_sources(&self) -> usize {
        self.num_sources
    }

    /// Step size the companion stamps in this system were derived for.
    pub fn timestep(&self) -> f64 {
        self.timestep
    }

    /// Pseudo node number addressing a voltage-source row in the stamp calls.
    pub fn source_node(&self, source: usize) -> usize {
        self.num_nodes + source + 1
    }

    /// Ask the engine to halt the simulation at the next check point.
    pub fn request_halt(&mut self, reason: impl Into<String>) {
        if self.halt.is_none() {
            self.halt = Some(reason.into());
        }
    }

    /// Take a pending halt request, if any.
    pub fn take_halt(&mut self) -> Option<String> {
        self.halt.take()
    }

    /// Clear the converged flag for this sub-iteration.
    pub fn not_converged(&mut self) {
        self.converged = false;
    }

    /// Add `x` to the coefficient of unknown `col_node` in `row_node`'s
    /// equation. Either may be 0 (ground) or a source pseudo-node.
    pub fn stamp_matrix(&mut self, row_node: usize, col_node: usize, x: f64) {
        if row_node == 0 || col_node == 0 || x == 0.0 {
            return;
        }
        let (r, c) = (row_node - 1, col_node - 1);
        if !self.mapped {
            self.matrix[(r, c)] += x;
            return;
        }
        if self.info[r].dropped {
            return;
        }
        if self.info[c].is_const {
            // Known value: fold into the right side instead.
            let row = self.info[r].row;
            self.right_side[row] -= x * self.info[c].value;
        } else {
            self.matrix[(self.info[r].row, self.info[c].col)] += x;
        }
    }

    /// Add `x` to the right side of `row_node`'s equation.
    pub fn stamp_right_side(&mut self, row_node: usize, x: f64) {
        if row_node == 0 {
            return;
        }
        let r = row_node - 1;
        if self.mapped {
            if !self.info[r].dropped {
                let row = self.info[r].row;
                self.right_side[row] += x;
            }
        } else {
            self.right_side[r] += x;
        }
    }

    /// Declare that `row_node`'s right side is re-stamped during iteration.
    /// Must be called during the build phase.
    pub fn mark_varying_right_side(&mut self, row_node: usize) {
        if row_node != 0 && !self.mapped {
            self.info[row_node - 1].rhs_changes = true;
        }
    }

    /// Declare that `row_node`'s matrix entries are re-stamped during
    /// iteration. Must be called during the build phase.
    pub fn mark_nonlinear(&mut self, row_node: usize) {
        if row_node != 0 && !self.mapped {
            self.info[row_node - 1].lhs_changes = true;
        }
    }

    /// Stamp a conductance `g` between two nodes.
    pub fn stamp_conductance(&mut self, n1: usize, n2: usize, g: f64) {
        self.stamp_matrix(n1, n1, g);
        self.stamp_matrix(n2, n2, g);
        self.stamp_matrix(n1, n2, -g);
        self.stamp_matrix(n2, n1, -g);
    }

    /// Stamp a resistance in ohms between two nodes.
    pub fn stamp_resistor(&mut self, n1: usize, n2: usize, ohms: f64) {
        self.stamp_conductance(n1, n2, 1.0 / ohms);
    }

    /// Stamp a current of `amps` flowing out of `n1` and into `n2`.
    pub fn stamp_current_source(&mut self, n1: usize, n2: usize, amps: f64) {
        self.stamp_right_side(n1, -amps);
        self.stamp_right_side(n2, amps);
    }

    /// Stamp a fixed voltage source of `volts` between `n_pos` and `n_neg`,
    /// using the row assigned to `source` for its current unknown.
    pub fn stamp_voltage_source(&mut self, n_pos: usize, n_neg: usize, source: usize, volts: f64) {
        let vn = self.source_node(source);
        self.stamp_matrix(vn, n_pos, 1.0);
        self.stamp_matrix(vn, n_neg, -1.0);
        self.stamp_right_side(vn, volts);
        self.stamp_matrix(n_pos, vn, 1.0);
        self.stamp_matrix(n_neg, vn, -1.0);
    }

    /// Stamp a voltage source whose value is supplied each sub-iteration
    /// through [`LinearSystem::update_voltage_source`].
    pub fn stamp_voltage_source_varying(&mut self, n_pos: usize, n_neg: usize, source: usize) {
        let vn = self.source_node(source);
        self.stamp_matrix(vn, n_pos, 1.0);
        self.stamp_matrix(vn, n_neg, -1.0);
        self.mark_varying_right_side(vn);
        self.stamp_matrix(n_pos, vn, 1.0);
        self.stamp_matrix(n_neg, vn, -1.0);
    }

    /// Set the present value of a varying voltage source.
    pub fn update_voltage_source(&mut self, source: usize, volts: f64) {
        let vn = self.source_node(source);
        self.stamp_right_side(vn, volts);
    }

    /// Fold trivially-constant unknowns out of the system and compact the
    /// rest into the reduced working matrices.
    ///
    /// A row whose left and right sides never change and which references a
    /// single surviving unknown pins that unknown to `rhs / coeff`. The
    /// pinned column is eliminated from every other row and the defining
    /// row is dropped; the scan repeats until no more rows qualify, so a
    /// pinned node can cascade. A circuit may fold away entirely.
    pub fn simplify(&mut self) {
        let size = self.full_size();
        loop {
            let mut changed = false;
            'rows: for r in 0..size {
                let ri = &self.info[r];
                if ri.dropped || ri.lhs_changes || ri.rhs_changes {
                    continue;
                }
                let mut pivot = None;
                for c in 0..size {
                    if self.info[c].is_const || self.matrix[(r, c)] == 0.0 {
                        continue;
                    }
                    if pivot.is_some() {
                        continue 'rows;
                    }
                    pivot = Some(c);
                }
                let Some(c) = pivot else { continue };
                let value = self.right_side[r] / self.matrix[(r, c)];
                self.info[c].is_const = true;
                self.info[c].value = value;
                self.info[r].dropped = true;
                // Eliminate the pinned column everywhere.
                for r2 in 0..size {
                    let x = self.matrix[(r2, c)];
                    if x != 0.0 {
                        self.right_side[r2] -= x * value;
                        self.matrix[(r2, c)] = 0.0;
                    }
                }
                changed = true;
            }
            if !changed {
                break;
            }
        }

        let mut rows = 0;
        for r in 0..size {
            if !self.info[r].dropped {
                self.info[r].row = rows;
                rows += 1;
            }
        }
        let mut cols = 0;
        for c in 0..size {
            if !self.info[c].is_const {
                self.info[c].col = cols;
                cols += 1;
            }
        }
        debug_assert_eq!(rows, cols);

        let mut reduced_matrix = DMatrix::zeros(rows, rows);
        let mut reduced_rhs = DVector::zeros(rows);
        for r in 0..size {
            if self.info[r].dropped {
                continue;
            }
            let nr = self.info[r].row;
            reduced_rhs[nr] = self.right_side[r];
            for c in 0..size {
                if self.info[c].is_const {
                    continue;
                }
                let x = self.matrix[(r, c)];
                if x != 0.0 {
                    reduced_matrix[(nr, self.info[c].col)] = x;
                }
            }
        }

        debug!("simplified system: {} -> {} unknowns", size, rows);
        self.orig_matrix = reduced_matrix.clone();
        self.orig_right_side = reduced_rhs.clone();
        self.matrix = reduced_matrix;
        self.right_side = reduced_rhs;
        self.reduced = rows;
        self.mapped = true;
    }

    /// Reset the right side to the cached linear baseline.
    pub fn restore_right_side(&mut self) {
        self.right_side.copy_from(&self.orig_right_side);
    }

    /// Reset the matrix to the cached linear baseline.
    pub fn restore_matrix(&mut self) {
        self.matrix.copy_from(&self.orig_matrix);
    }

    /// The working coefficient matrix.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Mutable access for in-place factorization.
    pub fn matrix_mut(&mut self) -> &mut DMatrix<f64> {
        &mut self.matrix
    }

    /// The working right side (the solution vector after an in-place solve).
    pub fn right_side(&self) -> &DVector<f64> {
        &self.right_side
    }

    /// Matrix and right side borrowed together for an in-place solve.
    pub fn solve_parts(&mut self) -> (&DMatrix<f64>, &mut DVector<f64>) {
        (&self.matrix, &mut self.right_side)
    }

    /// Whether an unknown was pinned during simplification.
    pub fn is_const(&self, node: usize) -> bool {
        node != 0 && self.info[node - 1].is_const
    }

    /// Solved voltage of a node, valid after an in-place solve (or, for
    /// pinned nodes, any time after simplification).
    pub fn solved_node(&self, node: usize) -> f64 {
        if node == 0 {
            return 0.0;
        }
        let info = &self.info[node - 1];
        if info.is_const {
            info.value
        } else if self.mapped {
            self.right_side[info.col]
        } else {
            self.right_side[node - 1]
        }
    }

    /// Solved current of a voltage-source row.
    pub fn solved_source(&self, source: usize) -> f64 {
        self.solved_node(self.source_node(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_conductance() {
        let mut sys = LinearSystem::new(2, 0, 1e-6);

        // 1 ohm between nodes 1 and 2
        sys.stamp_conductance(1, 2, 1.0);

        assert_eq!(sys.matrix()[(0, 0)], 1.0);
        assert_eq!(sys.matrix()[(1, 1)], 1.0);
        assert_eq!(sys.matrix()[(0, 1)], -1.0);
        assert_eq!(sys.matrix()[(1, 0)], -1.0);
    }

    #[test]
    fn test_stamp_conductance_to_ground() {
        let mut sys = LinearSystem::new(2, 0, 1e-6);

        sys.stamp_conductance(1, 0, 1.0);

        assert_eq!(sys.matrix()[(0, 0)], 1.0);
        assert_eq!(sys.matrix()[(1, 1)], 0.0);
    }

    #[test]
    fn test_stamp_current_source() {
        let mut sys = LinearSystem::new(2, 0, 1e-6);

        // 1 A from ground into node 1
        sys.stamp_current_source(0, 1, 1.0);

        assert_eq!(sys.right_side()[0], 1.0);
        assert_eq!(sys.right_side()[1], 0.0);
    }

    #[test]
    fn test_stamp_voltage_source() {
        let mut sys = LinearSystem::new(2, 1, 1e-6);

        // 5 V from ground to node 1, source row 0
        sys.stamp_voltage_source(1, 0, 0, 5.0);

        assert_eq!(sys.matrix()[(0, 2)], 1.0);
        assert_eq!(sys.matrix()[(2, 0)], 1.0);
        assert_eq!(sys.right_side()[2], 5.0);
    }

    /// A grounded fixed source pins its node; the divider reduces to the
    /// midpoint voltage and the source current.
    #[test]
    fn test_simplify_pins_driven_node() {
        let g = 1e-3;
        let mut sys = LinearSystem::new(2, 1, 1e-6);
        sys.stamp_voltage_source(1, 0, 0, 10.0);
        sys.stamp_conductance(1, 2, g);
        sys.stamp_conductance(2, 0, g);

        sys.simplify();

        assert!(sys.is_const(1));
        assert_eq!(sys.solved_node(1), 10.0);
        assert_eq!(sys.size(), 2);
    }

    /// A lone grounded source folds away completely; the degenerate empty
    /// system still reports the pinned values.
    #[test]
    fn test_simplify_to_empty_system() {
        let mut sys = LinearSystem::new(1, 1, 1e-6);
        sys.stamp_voltage_source(1, 0, 0, 5.0);

        sys.simplify();

        assert_eq!(sys.size(), 0);
        assert_eq!(sys.solved_node(1), 5.0);
        assert_eq!(sys.solved_source(0), 0.0);
    }

    /// Rows whose right side varies must survive folding untouched.
    #[test]
    fn test_varying_source_is_not_folded() {
        let mut sys = LinearSystem::new(1, 1, 1e-6);
        sys.stamp_voltage_source_varying(1, 0, 0);
        sys.stamp_conductance(1, 0, 1e-3);

        sys.simplify();

        assert!(!sys.is_const(1));
        assert_eq!(sys.size(), 2);
    }

    /// After simplification a stamp against a pinned column lands on the
    /// right side as `-x * value`.
    #[test]
    fn test_mapped_stamp_folds_constants() {
        let g = 1e-3;
        let mut sys = LinearSystem::new(2, 1, 1e-6);
        sys.stamp_voltage_source(1, 0, 0, 10.0);
        sys.stamp_conductance(2, 0, g);
        sys.mark_nonlinear(2);
        sys.simplify();

        // Node 1 pinned at 10 V; a runtime conductance stamp between
        // nodes 1 and 2 must push 10 * g onto node 2's right side.
        sys.restore_right_side();
        sys.restore_matrix();
        let before = sys.solved_node(2);
        sys.stamp_conductance(1, 2, g);
        assert_ne!(sys.right_side()[0], before);
        let row2 = sys.right_side()[0];
        assert!((row2 - 10.0 * g).abs() < 1e-15);
    }

    #[test]
    fn test_halt_request_keeps_first_reason() {
        let mut sys = LinearSystem::new(1, 0, 1e-6);
        sys.request_halt("first");
        sys.request_halt("second");
        assert_eq!(sys.take_halt().as_deref(), Some("first"));
        assert_eq!(sys.take_halt(), None);
    }
}
