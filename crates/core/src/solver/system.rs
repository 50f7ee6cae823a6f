//! Sparse pressure system shared by every backend
//!
//! Rows are stored in CSR form with the diagonal kept apart. Fixed-pressure rows and free
//! rows without any conductance are identity rows: no off-diagonal entries, diagonal 1,
//! right-hand side equal to the imposed value.

use tracing::debug;

/// Row role during assembly
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowKind {
    /// Dirichlet row with the given pressure (Pa)
    Fixed(f64),
    /// Mass-conservation row
    Free,
}

/// `A·x = b` with `A` split into diagonal and off-diagonal CSR parts
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSystem {
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<f64>,
    diagonal: Vec<f64>,
    rhs: Vec<f64>,
    initial_guess: Vec<f64>,
    pressure_scale: f64,
}

impl LinearSystem {
    /// Assemble the discrete Laplacian over `conduits` `(a, b, g)`.
    ///
    /// Free row `i` gets `Σg` on the diagonal and `−g` per neighbour. Non-finite or
    /// non-positive conductances are ignored. Free rows left without conductance are
    /// pinned to their initial guess.
    pub fn assemble(
        rows: &[RowKind],
        conduits: &[(usize, usize, f64)],
        initial_guess: Vec<f64>,
        pressure_scale: f64,
    ) -> Self {
        let n = rows.len();
        let mut entries: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        let mut diagonal = vec![0.0; n];

        for &(a, b, g) in conduits {
            if !(g.is_finite() && g > 0.0) || a == b {
                continue;
            }
            for (row, col) in [(a, b), (b, a)] {
                if rows[row] == RowKind::Free {
                    diagonal[row] += g;
                    entries[row].push((col, -g));
                }
            }
        }

        let mut rhs = vec![0.0; n];
        let mut pinned = 0usize;
        for i in 0..n {
            match rows[i] {
                RowKind::Fixed(p) => {
                    diagonal[i] = 1.0;
                    rhs[i] = p;
                }
                RowKind::Free if diagonal[i] <= 0.0 => {
                    diagonal[i] = 1.0;
                    rhs[i] = initial_guess[i];
                    entries[i].clear();
                    pinned += 1;
                }
                RowKind::Free => {}
            }
        }
        if pinned > 0 {
            debug!("{} free pores carry no conductance and keep their initial pressure", pinned);
        }

        let mut row_ptr = Vec::with_capacity(n + 1);
        let mut col_idx = Vec::new();
        let mut values = Vec::new();
        row_ptr.push(0);
        for row in entries {
            for (col, value) in row {
                col_idx.push(col);
                values.push(value);
            }
            row_ptr.push(col_idx.len());
        }

        Self {
            row_ptr,
            col_idx,
            values,
            diagonal,
            rhs,
            initial_guess,
            pressure_scale: pressure_scale.abs().max(1.0),
        }
    }

    /// Number of unknowns.
    pub fn len(&self) -> usize {
        self.diagonal.len()
    }

    /// Whether the system has no unknowns.
    pub fn is_empty(&self) -> bool {
        self.diagonal.is_empty()
    }

    /// Stored off-diagonal entries.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// CSR row offsets (`len() + 1` entries).
    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    /// CSR column indices.
    pub fn col_idx(&self) -> &[usize] {
        &self.col_idx
    }

    /// Off-diagonal coefficients.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Diagonal coefficients.
    pub fn diagonal(&self) -> &[f64] {
        &self.diagonal
    }

    /// Right-hand side.
    pub fn rhs(&self) -> &[f64] {
        &self.rhs
    }

    /// Starting iterate.
    pub fn initial_guess(&self) -> &[f64] {
        &self.initial_guess
    }

    /// Pressure magnitude used to make the convergence metric relative (≥ 1 Pa).
    pub fn pressure_scale(&self) -> f64 {
        self.pressure_scale
    }

    /// Whether row `i` has no off-diagonal entries.
    pub fn is_identity_row(&self, i: usize) -> bool {
        self.row_ptr[i] == self.row_ptr[i + 1]
    }

    /// Max-norm of `b − A·x`, each row divided by its diagonal and the pressure scale.
    pub fn relative_residual(&self, x: &[f64]) -> f64 {
        let mut worst: f64 = 0.0;
        for i in 0..self.len() {
            let mut r = self.rhs[i] - self.diagonal[i] * x[i];
            for k in self.row_ptr[i]..self.row_ptr[i + 1] {
                r -= self.values[k] * x[self.col_idx[k]];
            }
            worst = worst.max((r / self.diagonal[i]).abs());
        }
        worst / self.pressure_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_assembly_layout() {
        // chain 0-1-2 with fixed ends, 3 isolated
        let rows = [RowKind::Fixed(10.0), RowKind::Free, RowKind::Fixed(0.0), RowKind::Free];
        let conduits = [(0, 1, 2.0), (1, 2, 3.0)];
        let system = LinearSystem::assemble(&rows, &conduits, vec![10.0, 5.0, 0.0, 7.0], 10.0);

        assert_eq!(system.len(), 4);
        assert_eq!(system.nnz(), 2);
        assert!(system.is_identity_row(0));
        assert!(!system.is_identity_row(1));
        assert!(system.is_identity_row(3));
        assert_eq!(system.diagonal(), &[1.0, 5.0, 1.0, 1.0]);
        assert_eq!(system.rhs(), &[10.0, 0.0, 0.0, 7.0]);

        // exact solution: 5 p1 = 2·10 + 3·0
        let exact = [10.0, 4.0, 0.0, 7.0];
        assert_relative_eq!(system.relative_residual(&exact), 0.0);
        assert!(system.relative_residual(&[10.0, 0.0, 0.0, 7.0]) > 0.0);
    }

    #[test]
    fn test_invalid_conductances_skipped() {
        let rows = [RowKind::Free, RowKind::Free];
        let conduits = [(0, 1, f64::NAN), (0, 1, -1.0), (0, 0, 1.0)];
        let system = LinearSystem::assemble(&rows, &conduits, vec![1.0, 2.0], 0.0);
        assert_eq!(system.nnz(), 0);
        assert_eq!(system.rhs(), &[1.0, 2.0]);
        assert_eq!(system.pressure_scale(), 1.0);
    }
}
