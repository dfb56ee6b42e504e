//! Direct solve of the block-tridiagonal step system.
//!
//! Block Thomas elimination: sweep down factoring the Schur-complemented
//! diagonal blocks with dense LU, sweep back substituting. Cost is linear
//! in the node count, cubic only in the block width, which is what makes
//! fine meshes affordable.

use cf_p2d::BlockTridiag;
use nalgebra::{DMatrix, DVector, Dyn, LU};

use crate::error::{SolverError, SolverResult};

/// Factored form of a [`BlockTridiag`], valid until the matrix changes.
pub struct BlockTridiagLu {
    lus: Vec<LU<f64, Dyn, Dyn>>,
    /// `W_i = A~_i^{-1} sup_i` from the downward sweep.
    w: Vec<DMatrix<f64>>,
    /// Sub-diagonal blocks, kept for the forward substitution.
    sub: Vec<DMatrix<f64>>,
    starts: Vec<usize>,
    sizes: Vec<usize>,
}

impl BlockTridiagLu {
    pub fn factor(jac: &BlockTridiag) -> SolverResult<Self> {
        let n = jac.n_blocks();
        let mut lus = Vec::with_capacity(n);
        let mut w = Vec::with_capacity(n.saturating_sub(1));

        for i in 0..n {
            let a_tilde = if i == 0 {
                jac.diag(0).clone()
            } else {
                jac.diag(i) - jac.sub(i - 1) * &w[i - 1]
            };
            let lu = a_tilde.lu();
            if i + 1 < n {
                let wi = lu
                    .solve(jac.sup(i))
                    .ok_or(SolverError::LinearSolve { node: i })?;
                w.push(wi);
            } else if !lu.is_invertible() {
                return Err(SolverError::LinearSolve { node: i });
            }
            lus.push(lu);
        }

        let sizes: Vec<usize> = jac.sizes().to_vec();
        let mut starts = Vec::with_capacity(n);
        let mut acc = 0;
        for &s in &sizes {
            starts.push(acc);
            acc += s;
        }
        let sub = (0..n.saturating_sub(1)).map(|i| jac.sub(i).clone()).collect();

        Ok(Self {
            lus,
            w,
            sub,
            starts,
            sizes,
        })
    }

    /// Overwrites `b` with the solution of `A x = b`.
    pub fn solve_in_place(&self, b: &mut DVector<f64>) -> SolverResult<()> {
        let n = self.lus.len();
        debug_assert_eq!(
            b.len(),
            self.starts.last().unwrap_or(&0) + self.sizes.last().unwrap_or(&0)
        );

        for i in 0..n {
            let mut rhs = b.rows(self.starts[i], self.sizes[i]).clone_owned();
            if i > 0 {
                let z_prev = b.rows(self.starts[i - 1], self.sizes[i - 1]).clone_owned();
                rhs -= &self.sub[i - 1] * z_prev;
            }
            let z = self.lus[i]
                .solve(&rhs)
                .ok_or(SolverError::LinearSolve { node: i })?;
            b.rows_mut(self.starts[i], self.sizes[i]).copy_from(&z);
        }

        for i in (0..n.saturating_sub(1)).rev() {
            let x_next = b.rows(self.starts[i + 1], self.sizes[i + 1]).clone_owned();
            let correction = &self.w[i] * x_next;
            let mut seg = b.rows_mut(self.starts[i], self.sizes[i]);
            seg -= correction;
        }
        Ok(())
    }

    pub fn solve(&self, b: &DVector<f64>) -> SolverResult<DVector<f64>> {
        let mut x = b.clone();
        self.solve_in_place(&mut x)?;
        Ok(x)
    }
}
