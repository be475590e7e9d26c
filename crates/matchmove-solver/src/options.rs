//! Solver configuration.

use matchmove_core::Real;
use serde::{Deserialize, Serialize};

/// Backend selection for the optimization loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Dense finite-difference Levenberg-Marquardt.
    Dense,
    /// Compressed-column Jacobian variant for problems with many independent
    /// unknowns.
    Sparse,
}

impl BackendKind {
    /// Parse a backend name, substituting the dense backend for anything
    /// unrecognized.
    pub fn parse_lossy(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "dense" => Self::Dense,
            "sparse" => Self::Sparse,
            other => {
                log::warn!("unknown solver backend '{other}', using 'dense' instead");
                Self::Dense
            }
        }
    }
}

/// Tuning knobs of the optimization loop.
///
/// The four `eps*`/`tau` fields follow damped-least-squares conventions:
/// `tau` scales the initial damping, `eps1` stops on a small gradient
/// infinity-norm, `eps2` on a small parameter step relative to the parameter
/// norm, and `eps3` on a small squared residual norm.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SolverOptions {
    /// Iteration cap for the outer loop.
    pub max_iterations: usize,
    /// Scale factor for the initial damping factor.
    pub tau: Real,
    /// Stopping threshold for the gradient infinity-norm.
    pub eps1: Real,
    /// Stopping threshold for the relative step norm.
    pub eps2: Real,
    /// Stopping threshold for the squared residual norm.
    pub eps3: Real,
    /// Finite-difference step; a negative value selects central differences
    /// (more accurate, twice the evaluations).
    pub delta: Real,
    pub backend: BackendKind,
    /// Log per-iteration detail at info level.
    pub verbose: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tau: 1e-3,
            eps1: 1e-12,
            eps2: 1e-12,
            eps3: 1e-12,
            delta: 1e-6,
            backend: BackendKind::Dense,
            verbose: false,
        }
    }
}
