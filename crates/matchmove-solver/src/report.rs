//! Termination classification and solve statistics.

use matchmove_core::Real;
use serde::{Deserialize, Serialize};

/// Why the optimization loop stopped. Exactly one reason applies per solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The loop never classified a stop; indicates a logic error upstream.
    Unknown,
    /// Gradient infinity-norm fell below `eps1`.
    SmallGradient,
    /// Parameter step fell below `eps2` relative to the parameter norm.
    SmallStep,
    /// Iteration cap reached before any numeric predicate fired.
    MaxIterations,
    /// Damped normal matrix could not be factored.
    SingularMatrix,
    /// Damping grew without producing an acceptable step.
    FailedDamping,
    /// Squared residual norm fell below `eps3`.
    SmallError,
    /// Cancellation was requested through the progress sink.
    Canceled,
}

impl StopReason {
    /// Stable numeric code, 0-7.
    pub fn code(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::SmallGradient => 1,
            Self::SmallStep => 2,
            Self::MaxIterations => 3,
            Self::SingularMatrix => 4,
            Self::FailedDamping => 5,
            Self::SmallError => 6,
            Self::Canceled => 7,
        }
    }

    /// Human-readable description shown to the user after a solve.
    pub fn description(self) -> &'static str {
        match self {
            Self::Unknown => "No reason, should not get here!",
            Self::SmallGradient => "Stopped by small gradient",
            Self::SmallStep => "Stopped by small parameter step",
            Self::MaxIterations => "Stopped by reaching maximum iterations",
            Self::SingularMatrix => {
                "Singular matrix. Restart from current parameters with an increased tau factor"
            }
            Self::FailedDamping => {
                "Too many failed attempts to increase damping. Restart with an increased tau factor"
            }
            Self::SmallError => "Stopped by small error",
            Self::Canceled => "User canceled",
        }
    }

    /// Whether restarting from the current parameters with different tuning
    /// can be expected to make further progress.
    pub fn is_recoverable(self) -> bool {
        matches!(self, Self::SingularMatrix | Self::FailedDamping)
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Statistics of one completed solve.
///
/// Error magnitudes are squared L2 norms of the residual vector; the mean
/// error averages the per-component diagnostic magnitudes of the last
/// evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveReport {
    pub stop_reason: StopReason,
    pub initial_error: Real,
    pub final_error: Real,
    pub mean_error: Real,
    /// Gradient infinity-norm at the last iteration.
    pub gradient_norm: Real,
    /// Norm of the last parameter step.
    pub step_norm: Real,
    pub iterations: usize,
    pub function_evaluations: usize,
    pub jacobian_evaluations: usize,
    pub linear_solves: usize,
}

/// Outcome surfaced to the caller.
///
/// `final_error` is populated even when the stop reason signals
/// non-convergence, so callers can always display the fitted error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveOutcome {
    pub success: bool,
    pub final_error: Real,
    pub report: SolveReport,
}
