//! In-place dense LU factorization with partial pivoting.
//!
//! Crout-style elimination: at each column the largest-magnitude candidate
//! is chosen as the pivot to bound numerical error. An exactly-zero pivot
//! is replaced by a tiny epsilon instead of failing, which trades
//! exactness for robustness against topologically-singular but physically
//! valid circuits (floating subnets, probe-only attachments).

use log::warn;
use nalgebra::{DMatrix, DVector};

/// Substituted for an exactly-zero pivot.
const ZERO_PIVOT_EPSILON: f64 = 1e-18;

/// Factor `a` in place into unit-lower and upper triangles, recording the
/// row permutation in `pivots`. Never fails; see the module notes on zero
/// pivots.
pub fn lu_factor(a: &mut DMatrix<f64>, pivots: &mut Vec<usize>) {
    let n = a.nrows();
    pivots.clear();
    pivots.resize(n, 0);

    for j in 0..n {
        for i in 0..j {
            let mut q = a[(i, j)];
            for k in 0..i {
                q -= a[(i, k)] * a[(k, j)];
            }
            a[(i, j)] = q;
        }

        let mut largest = 0.0;
        let mut largest_row = j;
        for i in j..n {
            let mut q = a[(i, j)];
            for k in 0..j {
                q -= a[(i, k)] * a[(k, j)];
            }
            a[(i, j)] = q;
            if q.abs() >= largest {
                largest = q.abs();
                largest_row = i;
            }
        }

        if largest_row != j {
            a.swap_rows(largest_row, j);
        }
        pivots[j] = largest_row;

        if a[(j, j)] == 0.0 {
            warn!("zero pivot at column {j}; substituting {ZERO_PIVOT_EPSILON:e}");
            a[(j, j)] = ZERO_PIVOT_EPSILON;
        }

        if j + 1 < n {
            let mult = 1.0 / a[(j, j)];
            for i in j + 1..n {
                a[(i, j)] *= mult;
            }
        }
    }
}

/// Solve `a * x = b` in place given factors and permutation from
/// [`lu_factor`]. On return `b` holds the solution.
pub fn lu_solve(a: &DMatrix<f64>, pivots: &[usize], b: &mut DVector<f64>) {
    let n = a.nrows();

    // Apply the recorded row swaps in order.
    for i in 0..n {
        let row = pivots[i];
        if row != i {
            let tmp = b[row];
            b[row] = b[i];
            b[i] = tmp;
        }
    }

    // Forward substitution through the unit lower triangle.
    for i in 1..n {
        let mut total = b[i];
        for k in 0..i {
            total -= a[(i, k)] * b[k];
        }
        b[i] = total;
    }

    // Back substitution through the upper triangle.
    for i in (0..n).rev() {
        let mut total = b[i];
        for k in i + 1..n {
            total -= a[(i, k)] * b[k];
        }
        b[i] = total / a[(i, i)];
    }
}
