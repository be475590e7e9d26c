//! Mapping between the flat residual vector and (marker, frame) pairs.

use matchmove_core::{Frame, MarkerRef, SceneError, SceneEvaluator};

/// Residual components contributed by one valid (marker, frame) pair:
/// horizontal deviation, vertical deviation, and Euclidean distance.
pub const COMPONENTS_PER_OBSERVATION: usize = 3;

/// One residual block: indexes into the request's marker list and frame list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorEntry {
    pub marker: usize,
    pub frame: usize,
}

/// Dense index map over valid observations, built once per solve.
///
/// Order is marker-major, frame-minor; the residual evaluator relies on the
/// same ordering when writing component triples.
#[derive(Debug, Clone, Default)]
pub struct ErrorMap {
    entries: Vec<ErrorEntry>,
}

impl ErrorMap {
    /// Walk all (marker, frame) pairs and keep the ones the scene reports
    /// valid. Validity-query failures propagate.
    pub fn build<S: SceneEvaluator>(
        scene: &S,
        markers: &[MarkerRef],
        frames: &[Frame],
    ) -> Result<Self, SceneError> {
        let mut entries = Vec::new();
        for (marker_idx, marker) in markers.iter().enumerate() {
            for (frame_idx, &frame) in frames.iter().enumerate() {
                if scene.is_marker_valid(marker.marker, frame)? {
                    entries.push(ErrorEntry {
                        marker: marker_idx,
                        frame: frame_idx,
                    });
                }
            }
        }
        Ok(Self { entries })
    }

    /// Number of observation blocks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Length `n` of the residual vector.
    pub fn residual_len(&self) -> usize {
        self.entries.len() * COMPONENTS_PER_OBSERVATION
    }

    pub fn entry(&self, block: usize) -> ErrorEntry {
        self.entries[block]
    }

    pub fn entries(&self) -> &[ErrorEntry] {
        &self.entries
    }
}
