//! Dense finite-difference Levenberg-Marquardt.

use matchmove_core::Real;
use nalgebra::{DMatrix, DVector};

use crate::backend::{is_poisoned, Minimization, ResidualFn, SolverBackend};
use crate::error::SolveError;
use crate::jacobian;
use crate::options::SolverOptions;
use crate::report::StopReason;

const ONE_THIRD: Real = 1.0 / 3.0;

/// Damped least squares over a dense Jacobian.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenseLm;

impl SolverBackend for DenseLm {
    fn minimize(
        &self,
        f: &mut dyn ResidualFn,
        initial: DVector<Real>,
        opts: &SolverOptions,
    ) -> Result<Minimization, SolveError> {
        let m = initial.len();
        let n = f.num_residuals();
        debug_assert!(m <= n && m > 0);

        // All working storage for the run lives here; the loop below only
        // updates in place.
        let mut p = initial;
        let mut p_trial = DVector::<Real>::zeros(m);
        let mut hx = DVector::<Real>::zeros(n);
        let mut hx_trial = DVector::<Real>::zeros(n);
        let mut work = DVector::<Real>::zeros(n);
        let mut jac = DMatrix::<Real>::zeros(n, m);
        let mut jtj = DMatrix::<Real>::zeros(m, m);
        let mut damped = DMatrix::<Real>::zeros(m, m);
        let mut jte = DVector::<Real>::zeros(m);

        f.evaluate(&p, &mut hx)?;
        if is_poisoned(&hx) {
            return Ok(canceled_before_start(p));
        }
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
                jacobian::central_difference(f, &mut p, &mut work, &mut hx_trial, -opts.delta, &mut jac)?
            } else {
                jacobian::forward_difference(f, &mut p, &hx, &mut work, opts.delta, &mut jac)?
            };
            if poisoned {
                stop = Some(StopReason::Canceled);
                break;
            }

            jac.tr_mul_to(&jac, &mut jtj);
            jac.tr_mul_to(&hx, &mut jte);
            jte.neg_mut();
            gradient_norm = jte.amax();
            if iterations == 1 {
                mu = opts.tau * jtj.diagonal().max();
            }
            if gradient_norm <= opts.eps1 {
                stop = Some(StopReason::SmallGradient);
                break;
            }

            // Retry with stronger damping until a step is accepted or a stop
            // fires.
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

/// Outcome for a cancellation observed before the first iteration.
pub(crate) fn canceled_before_start(params: DVector<Real>) -> Minimization {
    Minimization {
        params,
        stop_reason: StopReason::Canceled,
        initial_error: Real::NAN,
        final_error: Real::NAN,
        gradient_norm: 0.0,
        step_norm: 0.0,
        iterations: 0,
        linear_solves: 0,
    }
}
