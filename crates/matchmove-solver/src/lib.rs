//! Bundle-adjustment solver engine for `matchmove-rs`.
//!
//! Fits scene attribute values by minimizing the reprojection deviation
//! between tracked 2D points and their matched 3D points across a set of
//! frames, using damped nonlinear least squares. The scene itself is reached
//! only through the `matchmove-core` traits: every candidate parameter vector
//! is pushed into the scene, and the resulting deviations are pulled back out
//! through the projection pipeline.
//!
//! Entry point: [`session::solve`] with a [`session::SolveRequest`].

/// Optimization backends (dense and sparse Levenberg-Marquardt).
pub mod backend;
/// Compressed-column sparse matrix.
pub mod ccs;
/// Hard failure types.
pub mod error;
/// Residual vector indexing.
pub mod error_map;
/// Finite-difference Jacobian estimation.
pub mod jacobian;
/// Wall-clock instrumentation hooks.
pub mod instrument;
/// Solver configuration.
pub mod options;
/// Parameter vector indexing.
pub mod param_map;
/// Termination classification and statistics.
pub mod report;
/// Residual evaluation against the live scene.
pub mod residual;
/// Top-level solve entry point.
pub mod session;

pub use error::SolveError;
pub use instrument::{Instrument, NoInstrument, PhaseTimers, SolvePhase};
pub use options::{BackendKind, SolverOptions};
pub use report::{SolveOutcome, SolveReport, StopReason};
pub use session::{solve, solve_with_instrument, SolveRequest};
