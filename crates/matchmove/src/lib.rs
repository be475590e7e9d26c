//! High-level entry crate for the `matchmove-rs` toolbox.
//!
//! Re-exports the scene model and the solver engine behind one dependency:
//!
//! ```no_run
//! use matchmove::prelude::*;
//!
//! # fn main() -> Result<(), matchmove::solver::SolveError> {
//! let mut scene = InMemoryScene::new();
//! // ... build cameras, bundles, markers ...
//! let request = SolveRequest::default();
//! let mut journal = UndoJournal::new();
//! let outcome = solve(&mut scene, &mut NullProgress, &mut journal, &request)?;
//! println!("final error: {:.6e}", outcome.final_error);
//! # Ok(())
//! # }
//! ```
//!
//! The `matchmove` crate is the public compatibility boundary; the lower
//! level crates may evolve more quickly.

/// Scene model, evaluation traits and math primitives.
pub mod core {
    pub use matchmove_core::*;
}

/// The bundle-adjustment solver engine.
pub mod solver {
    pub use matchmove_solver::*;
}

/// Convenient re-exports for common use cases.
pub mod prelude {
    pub use matchmove_core::scene::{CameraModel, InMemoryScene, MarkerSample};
    pub use matchmove_core::{
        AttrId, AttrRef, BundleId, CameraId, Frame, MarkerId, MarkerRef, NullProgress,
        ProgressSink, Pt2, Pt3, Real, SceneEvaluator, SharedInterrupt, UndoJournal,
        WorldProjector,
    };
    pub use matchmove_solver::{
        solve, solve_with_instrument, BackendKind, SolveOutcome, SolveReport, SolveRequest,
        SolverOptions, StopReason,
    };
}
