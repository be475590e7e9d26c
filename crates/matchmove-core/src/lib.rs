//! Scene model and evaluation interfaces for `matchmove-rs`.
//!
//! This crate contains:
//! - linear algebra type aliases ([`Real`], [`Pt3`], [`Mat4`], ...),
//! - scene identifiers and solve descriptors ([`AttrRef`], [`MarkerRef`]),
//! - the traits the solver uses to talk to a live scene
//!   ([`SceneEvaluator`], [`WorldProjector`], [`ProgressSink`]),
//! - the undo journal recording attribute writes during a solve,
//! - an in-memory reference scene ([`scene::InMemoryScene`]) and synthetic
//!   fixtures used by tests and the command-line front end.

/// Library error types.
pub mod error;
/// Linear algebra type aliases and projection helpers.
pub mod math;
/// Shared-state progress sinks.
pub mod progress;
/// In-memory reference scene.
pub mod scene;
/// Synthetic scene fixtures.
pub mod synthetic;
/// Solver-facing scene interfaces.
pub mod traits;
/// Identifiers and descriptors.
pub mod types;
/// Undo journal.
pub mod undo;

pub use error::SceneError;
pub use math::{project_point, Mat4, Pt2, Pt3, Real, Vec2, Vec3};
pub use progress::SharedInterrupt;
pub use traits::{NullProgress, ProgressSink, SceneEvaluator, WorldProjector};
pub use types::{AttrId, AttrRef, BundleId, CameraId, Frame, MarkerId, MarkerRef};
pub use undo::{UndoEntry, UndoJournal};
