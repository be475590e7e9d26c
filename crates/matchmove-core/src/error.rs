use crate::types::{AttrId, BundleId, CameraId, Frame, MarkerId};
use thiserror::Error;

/// Errors raised by scene evaluation and projection queries.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("unknown attribute {0:?}")]
    UnknownAttr(AttrId),
    #[error("unknown camera {0:?}")]
    UnknownCamera(CameraId),
    #[error("unknown bundle {0:?}")]
    UnknownBundle(BundleId),
    #[error("unknown marker {0:?}")]
    UnknownMarker(MarkerId),
    #[error("marker {marker:?} has no sample at frame {frame}")]
    MissingMarkerSample { marker: MarkerId, frame: Frame },
    #[error("camera {camera:?} projection is degenerate at frame {frame}")]
    DegenerateProjection { camera: CameraId, frame: Frame },
}
