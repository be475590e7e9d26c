//! Interfaces between the solver and its external collaborators.
//!
//! The solver never owns scene state: it reads and writes attribute values,
//! asks for marker/bundle positions and world-projection transforms, and
//! reports progress through these traits. Implementations must be
//! deterministic for a fixed scene state; the solver is the only writer for
//! the duration of a solve (single-writer precondition, not enforced here).

use crate::error::SceneError;
use crate::math::{Mat4, Pt3, Real};
use crate::types::{AttrId, BundleId, CameraId, Frame, MarkerId};
use crate::undo::UndoJournal;

/// Attribute and observation access to the live scene.
pub trait SceneEvaluator {
    /// The scene's notion of "now"; static attribute reads and writes resolve
    /// to this frame.
    fn current_frame(&self) -> Frame;

    /// Read an attribute value at a frame.
    fn attr_value(&self, attr: AttrId, frame: Frame) -> Result<Real, SceneError>;

    /// Stage an attribute write, recording it in the journal. Staged writes
    /// become visible only after [`SceneEvaluator::commit`].
    fn set_attr_value(
        &mut self,
        attr: AttrId,
        frame: Frame,
        value: Real,
        journal: &mut UndoJournal,
    ) -> Result<(), SceneError>;

    /// Apply all staged writes as one batch so dependent state is recomputed
    /// from a consistent set of inputs.
    fn commit(&mut self, journal: &mut UndoJournal) -> Result<(), SceneError>;

    /// Drop any cached world-projection transform for the camera.
    fn invalidate_projection_cache(&mut self, camera: CameraId);

    /// World-space position of a tracked point at a frame.
    fn marker_position(&self, marker: MarkerId, frame: Frame) -> Result<Pt3, SceneError>;

    /// World-space position of a scene point at a frame.
    fn bundle_position(&self, bundle: BundleId, frame: Frame) -> Result<Pt3, SceneError>;

    /// Whether a marker contributes observations at a frame (enabled and
    /// carrying non-zero weight).
    fn is_marker_valid(&self, marker: MarkerId, frame: Frame) -> Result<bool, SceneError>;
}

/// World-to-screen transform supplier.
pub trait WorldProjector {
    /// The camera's world-projection transform at a frame. Implementations
    /// may cache per (camera, frame); the solver invalidates the cache after
    /// every committed parameter batch.
    fn world_projection(&mut self, camera: CameraId, frame: Frame) -> Result<Mat4, SceneError>;
}

/// Progress reporting and cooperative cancellation.
///
/// `is_cancel_requested` is polled at the start of every residual evaluation;
/// a `true` answer makes the solver poison the residual vector and stop.
pub trait ProgressSink {
    fn begin(&mut self, _max: usize) {}
    fn end(&mut self) {}
    fn set_progress(&mut self, _value: usize) {}
    fn is_cancel_requested(&self) -> bool {
        false
    }
}

/// Progress sink that reports nothing and never cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {}
