use matchmove_core::SceneError;
use thiserror::Error;

/// Hard failures of a solve.
///
/// Classified stops (singular matrix, damping exhausted, cancellation) are
/// not errors; they are reported through
/// [`StopReason`](crate::report::StopReason).
#[derive(Debug, Error)]
pub enum SolveError {
    /// More unknowns than error measurements; rejected before any scene
    /// mutation.
    #[error("problem is underdetermined: {params} unknowns but only {residuals} error measurements")]
    Underdetermined { params: usize, residuals: usize },
    /// Nothing to fit; rejected before any scene mutation.
    #[error("nothing to solve: {params} unknowns, {residuals} error measurements")]
    EmptyProblem { params: usize, residuals: usize },
    /// A scene or projection query failed mid-solve.
    #[error(transparent)]
    Scene(#[from] SceneError),
}
