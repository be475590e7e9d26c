//! Finite-difference Jacobian estimation.
//!
//! The dense routines perturb one parameter at a time and difference full
//! residual vectors. The sparse routines first guess the structural non-zero
//! pattern by probing each parameter with a large step, then difference only
//! the recorded entries. All routines report whether an evaluation came back
//! poisoned so the caller can classify the stop.

use matchmove_core::Real;
use nalgebra::{DMatrix, DVector};

use crate::backend::{is_poisoned, ResidualFn};
use crate::ccs::{CcsMatrix, CcsPatternBuilder};
use crate::error::SolveError;

/// Relative perturbation used when differencing for derivative values.
const STEP_SCALE: Real = 1e-4;
/// Relative perturbation used when probing for the structural pattern.
const PATTERN_STEP_SCALE: Real = 1e2;

fn step(scale: Real, p_j: Real, delta: Real) -> Real {
    let d = (scale * p_j).abs();
    if d < delta {
        delta
    } else {
        d
    }
}

/// Forward-difference approximation of the Jacobian at `p`.
///
/// `hx` must hold the residuals already evaluated at `p`; `work` is an n-row
/// scratch vector. Returns `true` if an evaluation was poisoned, in which
/// case `jac` is left partially filled and must not be used.
pub fn forward_difference(
    f: &mut dyn ResidualFn,
    p: &mut DVector<Real>,
    hx: &DVector<Real>,
    work: &mut DVector<Real>,
    delta: Real,
    jac: &mut DMatrix<Real>,
) -> Result<bool, SolveError> {
    f.set_jacobian_pass(true);
    let result = (|| {
        for j in 0..p.len() {
            let d = step(STEP_SCALE, p[j], delta);
            let saved = p[j];
            p[j] = saved + d;
            f.evaluate(p, work)?;
            p[j] = saved;
            if is_poisoned(work) {
                return Ok(true);
            }
            let inv = 1.0 / d;
            for i in 0..work.len() {
                jac[(i, j)] = (work[i] - hx[i]) * inv;
            }
        }
        Ok(false)
    })();
    f.set_jacobian_pass(false);
    result
}

/// Central-difference approximation of the Jacobian at `p`.
///
/// Twice the evaluations of the forward variant, better accuracy. `delta`
/// must already be positive. Returns `true` on a poisoned evaluation.
pub fn central_difference(
    f: &mut dyn ResidualFn,
    p: &mut DVector<Real>,
    work_minus: &mut DVector<Real>,
    work_plus: &mut DVector<Real>,
    delta: Real,
    jac: &mut DMatrix<Real>,
) -> Result<bool, SolveError> {
    f.set_jacobian_pass(true);
    let result = (|| {
        for j in 0..p.len() {
            let d = step(STEP_SCALE, p[j], delta);
            let saved = p[j];
            p[j] = saved - d;
            f.evaluate(p, work_minus)?;
            p[j] = saved + d;
            f.evaluate(p, work_plus)?;
            p[j] = saved;
            if is_poisoned(work_minus) || is_poisoned(work_plus) {
                return Ok(true);
            }
            let inv = 0.5 / d;
            for i in 0..work_plus.len() {
                jac[(i, j)] = (work_plus[i] - work_minus[i]) * inv;
            }
        }
        Ok(false)
    })();
    f.set_jacobian_pass(false);
    result
}

/// Outcome of the structural pattern probe.
pub enum PatternGuess {
    Pattern(CcsMatrix),
    /// An evaluation returned the cancellation sentinel.
    Poisoned,
}

/// Guess the Jacobian's structural non-zero pattern.
///
/// Adds a large step to each parameter in turn and records every residual
/// component that moved at all. This is a heuristic, not a guarantee: a
/// sensitivity that cancels at the probe point is missed, so use with
/// caution. `hx` receives the baseline residuals at `p` as a side effect.
///
/// Returns the pattern with its non-zero count, or the poisoned marker.
pub fn pattern_guess(
    f: &mut dyn ResidualFn,
    p: &mut DVector<Real>,
    hx: &mut DVector<Real>,
    work: &mut DVector<Real>,
    delta: Real,
    nnz_hint: usize,
) -> Result<PatternGuess, SolveError> {
    f.evaluate(p, hx)?;
    if is_poisoned(hx) {
        return Ok(PatternGuess::Poisoned);
    }

    let mut builder = CcsPatternBuilder::new(hx.len(), p.len(), nnz_hint);
    f.set_jacobian_pass(true);
    let result: Result<Option<()>, SolveError> = (|| {
        for j in 0..p.len() {
            builder.begin_column();
            let d = step(PATTERN_STEP_SCALE, p[j], delta);
            let saved = p[j];
            p[j] = saved + d;
            f.evaluate(p, work)?;
            p[j] = saved;
            if is_poisoned(work) {
                return Ok(None);
            }
            for i in 0..work.len() {
                if (work[i] - hx[i]).abs() > 0.0 {
                    builder.push_row(i);
                }
            }
        }
        Ok(Some(()))
    })();
    f.set_jacobian_pass(false);
    match result? {
        Some(()) => {
            let pattern = builder.finish();
            log::debug!(
                "jacobian pattern guess: {} of {} entries non-zero",
                pattern.nnz(),
                pattern.nrows() * pattern.ncols()
            );
            Ok(PatternGuess::Pattern(pattern))
        }
        None => Ok(PatternGuess::Poisoned),
    }
}

/// Fill the values of a fixed-pattern sparse Jacobian by forward differences.
///
/// Entries outside the recorded pattern stay zero even if the scene has
/// become sensitive there; the pattern is guessed once per solve.
pub fn fill_sparse_forward(
    f: &mut dyn ResidualFn,
    p: &mut DVector<Real>,
    hx: &DVector<Real>,
    work: &mut DVector<Real>,
    delta: Real,
    jac: &mut CcsMatrix,
) -> Result<bool, SolveError> {
    f.set_jacobian_pass(true);
    let result = (|| {
        for j in 0..p.len() {
            let d = step(STEP_SCALE, p[j], delta);
            let saved = p[j];
            p[j] = saved + d;
            f.evaluate(p, work)?;
            p[j] = saved;
            if is_poisoned(work) {
                return Ok(true);
            }
            let inv = 1.0 / d;
            let (rows, values) = jac.column_mut(j);
            for (slot, &i) in values.iter_mut().zip(rows) {
                *slot = (work[i] - hx[i]) * inv;
            }
        }
        Ok(false)
    })();
    f.set_jacobian_pass(false);
    result
}

/// Central-difference variant of [`fill_sparse_forward`].
pub fn fill_sparse_central(
    f: &mut dyn ResidualFn,
    p: &mut DVector<Real>,
    work_minus: &mut DVector<Real>,
    work_plus: &mut DVector<Real>,
    delta: Real,
    jac: &mut CcsMatrix,
) -> Result<bool, SolveError> {
    f.set_jacobian_pass(true);
    let result = (|| {
        for j in 0..p.len() {
            let d = step(STEP_SCALE, p[j], delta);
            let saved = p[j];
            p[j] = saved - d;
            f.evaluate(p, work_minus)?;
            p[j] = saved + d;
            f.evaluate(p, work_plus)?;
            p[j] = saved;
            if is_poisoned(work_minus) || is_poisoned(work_plus) {
                return Ok(true);
            }
            let inv = 0.5 / d;
            let (rows, values) = jac.column_mut(j);
            for (slot, &i) in values.iter_mut().zip(rows) {
                *slot = (work_plus[i] - work_minus[i]) * inv;
            }
        }
        Ok(false)
    })();
    f.set_jacobian_pass(false);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    /// r0 = p0^2, r1 = 3*p1, r2 = p0 + p1
    struct Quadratic;

    impl ResidualFn for Quadratic {
        fn num_params(&self) -> usize {
            2
        }

        fn num_residuals(&self) -> usize {
            3
        }

        fn evaluate(
            &mut self,
            p: &DVector<Real>,
            out: &mut DVector<Real>,
        ) -> Result<(), SolveError> {
            out[0] = p[0] * p[0];
            out[1] = 3.0 * p[1];
            out[2] = p[0] + p[1];
            Ok(())
        }
    }

    #[test]
    fn forward_difference_approximates_derivatives() {
        let mut f = Quadratic;
        let mut p = DVector::from_vec(vec![2.0, -1.0]);
        let mut hx = DVector::zeros(3);
        f.evaluate(&p, &mut hx).unwrap();
        let mut work = DVector::zeros(3);
        let mut jac = DMatrix::zeros(3, 2);

        let poisoned =
            forward_difference(&mut f, &mut p, &hx, &mut work, 1e-6, &mut jac).unwrap();
        assert!(!poisoned);
        assert!((jac[(0, 0)] - 4.0).abs() < 1e-3);
        assert!((jac[(1, 1)] - 3.0).abs() < 1e-6);
        assert!((jac[(2, 0)] - 1.0).abs() < 1e-6);
        assert!(jac[(0, 1)].abs() < 1e-9);
    }

    #[test]
    fn central_difference_is_exact_for_quadratics() {
        let mut f = Quadratic;
        let mut p = DVector::from_vec(vec![2.0, -1.0]);
        let mut minus = DVector::zeros(3);
        let mut plus = DVector::zeros(3);
        let mut jac = DMatrix::zeros(3, 2);

        let poisoned =
            central_difference(&mut f, &mut p, &mut minus, &mut plus, 1e-6, &mut jac).unwrap();
        assert!(!poisoned);
        // Central differences are exact for polynomials of degree two.
        assert!((jac[(0, 0)] - 4.0).abs() < 1e-7);
    }

    #[test]
    fn pattern_guess_finds_the_structure() {
        let mut f = Quadratic;
        let mut p = DVector::from_vec(vec![2.0, -1.0]);
        let mut hx = DVector::zeros(3);
        let mut work = DVector::zeros(3);

        let guess = pattern_guess(&mut f, &mut p, &mut hx, &mut work, 1e-6, 4).unwrap();
        let pattern = match guess {
            PatternGuess::Pattern(p) => p,
            PatternGuess::Poisoned => panic!("unexpected poison"),
        };
        assert_eq!(pattern.nnz(), 4);
        assert_eq!(pattern.column_rows(0), &[0, 2]);
        assert_eq!(pattern.column_rows(1), &[1, 2]);
    }

    #[test]
    fn sparse_fill_matches_dense_columns() {
        let mut f = Quadratic;
        let mut p = DVector::from_vec(vec![2.0, -1.0]);
        let mut hx = DVector::zeros(3);
        let mut work = DVector::zeros(3);

        let PatternGuess::Pattern(mut jac) =
            pattern_guess(&mut f, &mut p, &mut hx, &mut work, 1e-6, 4).unwrap()
        else {
            panic!("unexpected poison");
        };
        let poisoned =
            fill_sparse_forward(&mut f, &mut p, &hx, &mut work, 1e-6, &mut jac).unwrap();
        assert!(!poisoned);
        assert!((jac.column_values(0)[0] - 4.0).abs() < 1e-3);
        assert!((jac.column_values(1)[0] - 3.0).abs() < 1e-6);
    }
}
