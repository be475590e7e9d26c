//! Sparse-Jacobian Levenberg-Marquardt.
//!
//! Stores the Jacobian column-compressed: the structural non-zero pattern is
//! probed once at the start of the run, then only the recorded entries are
//! re-estimated each iteration. The normal matrix stays dense — with far more
//! observations than unknowns it is small, and the sparsity pays off in the
//! Jacobian products.

use matchmove_core::Real;
use nalgebra::{DMatrix, DVector};

use crate::backend::dense::canceled_before_start;
use crate::backend::{is_poisoned, Minimization, ResidualFn, SolverBackend};
use crate::error::SolveError;
use crate::jacobian::{self, PatternGuess};
use crate::options::SolverOptions;
use crate::report::StopReason;

const ONE_THIRD: Real = 1.0 / 3.0;

/// Damped least squares over a compressed-column Jacobian with a guessed
/// non-zero pattern.
#[derive(Debug, Default, Clone, Copy)]
pub struct SparseLm;

impl SolverBackend for SparseLm {
    fn minimize(
        &self,
        f: &mut dyn ResidualFn,
        initial: DVector<Real>,
        opts: &SolverOptions,
    ) -> Result<Minimization, SolveError> {
        let m = initial.len();
        let n = f.num_residuals();
        debug_assert!(m <= n && m > 0);

        let mut p = initial;
        let mut p_trial = DVector::<Real>::zeros(m);
        let mut hx = DVector::<Real>::zeros(n);
        let mut hx_trial = DVector::<Real>::zeros(n);
        let mut work = DVector::<Real>::zeros(n);
        let mut jtj = DMatrix::<Real>::zeros(m, m);
        let mut damped = DMatrix::<Real>::zeros(m, m);
        let mut jte = DVector::<Real>::zeros(m);

        // The probe evaluates the baseline residuals into `hx` as a side
        // effect. The pattern stays fixed for the rest of the run.
        let guess = jacobian::pattern_guess(
            f,
            &mut p,
            &mut hx,
            &mut work,
            opts.delta.abs(),
            n.max(m),
        )?;
        let mut jac = match guess {
            PatternGuess::Pattern(pattern) => pattern,
            PatternGuess::Poisoned => return Ok(canceled_before_start(p)),
        };
        log::debug!("sparse jacobian: {} non-zeros for {n}x{m}", jac.nnz());

        let mut err = hx.norm_squared();
        let initial_error = err;

        let mut mu = 0.0;
        let mut nu: i32 = 2;
        let mut stop = None;
        let mut iterations = 0;
        let mut linear_solves = 0;
        let mut gradient_norm = 0.0;
        let mut step_norm = 0.0;

        while iterations < opts.max_iterations && stop.is_none() {
            iterations += 1;

            let poisoned = if opts.delta < 0.0 {
                jacobian::fill_sparse_central(f, &mut p, &mut work, &mut hx_trial, -opts.delta, &mut jac)?
            } else {
                jacobian::fill_sparse_forward(f, &mut p, &hx, &mut work, opts.delta, &mut jac)?
            };
            if poisoned {
                stop = Some(StopReason::Canceled);
                break;
            }

            jac.tr_mul_self_into(&mut jtj);
            jac.tr_mul_vec_into(&hx, &mut jte);
            jte.neg_mut();
            gradient_norm = jte.amax();
            if iterations == 1 {
                mu = opts.tau * jtj.diagonal().max();
            }
            if gradient_norm <= opts.eps1 {
                stop = Some(StopReason::SmallGradient);
                break;
            }

            loop {
                damped.copy_from(&jtj);
                for i in 0..m {
                    damped[(i, i)] += mu;
                }
                linear_solves += 1;
                let Some(chol) = damped.clone().cholesky() else {
                    stop = Some(StopReason::SingularMatrix);
                    break;
                };
                let dp = chol.solve(&jte);
                step_norm = dp.norm();
                let p_norm = p.norm();
                if step_norm <= opts.eps2 * p_norm {
                    stop = Some(StopReason::SmallStep);
                    break;
                }
                if step_norm >= (p_norm + opts.eps2) / Real::EPSILON {
                    stop = Some(StopReason::SingularMatrix);
                    break;
                }

                p_trial.copy_from(&p);
                p_trial += &dp;
                f.evaluate(&p_trial, &mut hx_trial)?;
                if is_poisoned(&hx_trial) {
                    stop = Some(StopReason::Canceled);
                    break;
                }
                let err_trial = hx_trial.norm_squared();

                let actual = err - err_trial;
                let mut predicted = 0.0;
                for i in 0..m {
                    predicted += dp[i] * (mu * dp[i] + jte[i]);
                }

                if actual > 0.0 && predicted > 0.0 {
                    let ratio = 2.0 * actual / predicted - 1.0;
                    mu *= ONE_THIRD.max(1.0 - ratio * ratio * ratio);
                    nu = 2;
                    std::mem::swap(&mut p, &mut p_trial);
                    std::mem::swap(&mut hx, &mut hx_trial);
                    err = err_trial;
                    if opts.verbose {
                        log::info!("iteration {iterations}: error={err:.6e} mu={mu:.3e}");
                    } else {
                        log::debug!("iteration {iterations}: error={err:.6e} mu={mu:.3e}");
                    }
                    if err <= opts.eps3 {
                        stop = Some(StopReason::SmallError);
                    }
                    break;
                }

                mu *= nu as Real;
                match nu.checked_mul(2) {
                    Some(doubled) => nu = doubled,
                    None => {
                        stop = Some(StopReason::FailedDamping);
                        break;
                    }
                }
            }
        }

        Ok(Minimization {
            params: p,
            stop_reason: stop.unwrap_or(StopReason::MaxIterations),
            initial_error,
            final_error: err,
            gradient_norm,
            step_norm,
            iterations,
            linear_solves,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two independent unknowns, three residuals each; the Jacobian is block
    /// diagonal and the pattern probe should find exactly that.
    struct TwoBlocks;

    impl ResidualFn for TwoBlocks {
        fn num_params(&self) -> usize {
            2
        }

        fn num_residuals(&self) -> usize {
            6
        }

        fn evaluate(
            &mut self,
            p: &DVector<Real>,
            out: &mut DVector<Real>,
        ) -> Result<(), SolveError> {
            for i in 0..3 {
                out[i] = p[0] - (i as Real + 1.0);
                out[3 + i] = p[1] - 2.0 * (i as Real + 1.0);
            }
            Ok(())
        }
    }

    #[test]
    fn converges_on_separable_problem() {
        let mut f = TwoBlocks;
        let opts = SolverOptions::default();
        let result = SparseLm
            .minimize(&mut f, DVector::from_vec(vec![0.0, 0.0]), &opts)
            .unwrap();
        assert!((result.params[0] - 2.0).abs() < 1e-6, "got {}", result.params[0]);
        assert!((result.params[1] - 4.0).abs() < 1e-6, "got {}", result.params[1]);
    }
}
