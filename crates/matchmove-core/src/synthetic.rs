//! Synthetic scene fixtures for tests and examples.

use crate::scene::{BundleAttrs, CameraModel, InMemoryScene, MarkerSample};
use crate::math::{Pt3, Vec3};
use crate::types::{BundleId, CameraId, Frame, MarkerId};

/// Handles of the single-point fixture rig.
#[derive(Debug, Clone, Copy)]
pub struct SinglePointRig {
    pub camera: CameraId,
    pub bundle: BundleId,
    pub marker: MarkerId,
    pub bundle_attrs: BundleAttrs,
}

/// Build a scene with one static camera at the origin, one bundle at `truth`,
/// and one marker whose samples sit exactly at the bundle's true position on
/// every given frame — the reprojection error is zero when the bundle sits at
/// `truth`.
pub fn single_point_rig(
    scene: &mut InMemoryScene,
    truth: Pt3,
    animated_bundle: bool,
    frames: &[Frame],
) -> SinglePointRig {
    let camera = scene.add_camera(
        "cam",
        Pt3::new(0.0, 0.0, 0.0),
        Vec3::zeros(),
        CameraModel::default(),
    );
    let bundle = scene.add_bundle("pt", truth, animated_bundle);
    let marker = scene.add_marker(camera, bundle, marker_track(truth, frames));
    let bundle_attrs = scene.bundle_attrs(bundle).expect("bundle just added");
    SinglePointRig {
        camera,
        bundle,
        marker,
        bundle_attrs,
    }
}

/// Marker samples pinned at a fixed world position over the given frames.
pub fn marker_track(position: Pt3, frames: &[Frame]) -> Vec<(Frame, MarkerSample)> {
    frames
        .iter()
        .map(|&f| (f, MarkerSample::new(position)))
        .collect()
}
