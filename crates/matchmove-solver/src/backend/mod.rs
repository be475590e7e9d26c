//! Optimization backends.
//!
//! Both backends drive the same damped least-squares loop; they differ in how
//! the Jacobian is estimated and stored. The residual callback stays
//! backend-agnostic.

mod dense;
#[cfg(feature = "sparse")]
mod sparse;

pub use dense::DenseLm;
#[cfg(feature = "sparse")]
pub use sparse::SparseLm;

use matchmove_core::Real;
use nalgebra::DVector;

use crate::error::SolveError;
use crate::options::{BackendKind, SolverOptions};
use crate::report::StopReason;

/// Residual callback handed to a backend.
///
/// `evaluate` may fill the output with a not-a-number sentinel to signal a
/// requested stop; backends treat that as a classified cancellation, never as
/// a numeric failure.
pub trait ResidualFn {
    fn num_params(&self) -> usize;
    fn num_residuals(&self) -> usize;
    fn evaluate(&mut self, p: &DVector<Real>, out: &mut DVector<Real>) -> Result<(), SolveError>;
    /// Flag subsequent evaluations as Jacobian perturbations.
    fn set_jacobian_pass(&mut self, _enabled: bool) {}
}

/// Result of one backend run.
#[derive(Debug, Clone)]
pub struct Minimization {
    pub params: DVector<Real>,
    pub stop_reason: StopReason,
    /// Squared residual norm at the initial parameters.
    pub initial_error: Real,
    /// Squared residual norm at the returned parameters.
    pub final_error: Real,
    /// Gradient infinity-norm at the last iteration.
    pub gradient_norm: Real,
    /// Norm of the last parameter step.
    pub step_norm: Real,
    pub iterations: usize,
    pub linear_solves: usize,
}

/// Strategy interface shared by the dense and sparse variants.
pub trait SolverBackend {
    fn minimize(
        &self,
        f: &mut dyn ResidualFn,
        initial: DVector<Real>,
        opts: &SolverOptions,
    ) -> Result<Minimization, SolveError>;
}

/// Map the requested backend onto an available one, downgrading with a
/// warning instead of failing when the sparse variant was compiled out.
pub fn resolve_backend(kind: BackendKind) -> BackendKind {
    match kind {
        BackendKind::Dense => BackendKind::Dense,
        BackendKind::Sparse => {
            #[cfg(feature = "sparse")]
            {
                BackendKind::Sparse
            }
            #[cfg(not(feature = "sparse"))]
            {
                log::warn!("sparse backend is not available in this build, using 'dense' instead");
                BackendKind::Dense
            }
        }
    }
}

/// Instantiate the backend for an (already resolved) selection.
pub fn backend_for(kind: BackendKind) -> Box<dyn SolverBackend> {
    match resolve_backend(kind) {
        BackendKind::Dense => Box::new(DenseLm),
        #[cfg(feature = "sparse")]
        BackendKind::Sparse => Box::new(SparseLm),
        #[cfg(not(feature = "sparse"))]
        BackendKind::Sparse => unreachable!("resolve_backend downgrades sparse"),
    }
}

/// Whether a residual vector carries the cancellation sentinel (or any other
/// non-finite value the loop cannot continue through).
pub(crate) fn is_poisoned(v: &DVector<Real>) -> bool {
    v.iter().any(|x| !x.is_finite())
}
