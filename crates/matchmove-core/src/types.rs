//! Identifiers and descriptors shared between the scene and the solver.

use serde::{Deserialize, Serialize};

/// A discrete time-sample on the animation timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Frame(pub i32);

impl Frame {
    /// Frame number as a signed integer.
    pub fn number(self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a scalar scene attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttrId(pub usize);

/// Handle to a camera node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CameraId(pub usize);

/// Handle to a 3D scene point a marker is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BundleId(pub usize);

/// Handle to a 2D tracked point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkerId(pub usize);

/// One solvable attribute.
///
/// An animated attribute contributes one unknown per solve frame; a static
/// one contributes exactly one unknown shared across all frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrRef {
    pub attr: AttrId,
    pub animated: bool,
}

impl AttrRef {
    pub fn animated(attr: AttrId) -> Self {
        Self {
            attr,
            animated: true,
        }
    }

    pub fn fixed(attr: AttrId) -> Self {
        Self {
            attr,
            animated: false,
        }
    }
}

/// One observation source: a tracked point, the camera it was tracked on,
/// and the scene point it is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerRef {
    pub marker: MarkerId,
    pub camera: CameraId,
    pub bundle: BundleId,
}
