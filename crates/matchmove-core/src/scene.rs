//! In-memory reference scene.
//!
//! Implements [`SceneEvaluator`] and [`WorldProjector`] over plain containers:
//! attribute storage (static values and per-frame curves), camera nodes with a
//! pinhole projection model driven by transform attributes, bundles whose
//! positions derive from attribute triplets, and markers carrying per-frame
//! observation samples.
//!
//! Two behaviors matter to the solver and are modeled deliberately:
//! writes are staged and become visible only on [`SceneEvaluator::commit`]
//! (one batch per parameter push), and world-projection transforms are cached
//! per (camera, frame) until explicitly invalidated.

use std::collections::{BTreeMap, HashMap};

use nalgebra::{Rotation3, Translation3};

use crate::error::SceneError;
use crate::math::{Mat4, Pt3, Real, Vec3};
use crate::traits::{SceneEvaluator, WorldProjector};
use crate::types::{AttrId, BundleId, CameraId, Frame, MarkerId};
use crate::undo::{UndoEntry, UndoJournal};

/// Pinhole projection parameters, film-back style.
#[derive(Debug, Clone, Copy)]
pub struct CameraModel {
    pub focal_length_mm: Real,
    pub film_back_width_mm: Real,
    pub film_back_height_mm: Real,
}

impl Default for CameraModel {
    fn default() -> Self {
        Self {
            focal_length_mm: 35.0,
            film_back_width_mm: 36.0,
            film_back_height_mm: 24.0,
        }
    }
}

/// Transform attribute handles of a camera node.
#[derive(Debug, Clone, Copy)]
pub struct CameraAttrs {
    pub tx: AttrId,
    pub ty: AttrId,
    pub tz: AttrId,
    pub rx: AttrId,
    pub ry: AttrId,
    pub rz: AttrId,
}

/// Translate attribute handles of a bundle node.
#[derive(Debug, Clone, Copy)]
pub struct BundleAttrs {
    pub tx: AttrId,
    pub ty: AttrId,
    pub tz: AttrId,
}

/// One observation sample of a marker at a frame.
#[derive(Debug, Clone, Copy)]
pub struct MarkerSample {
    /// World-space position of the tracked point.
    pub position: Pt3,
    pub weight: Real,
    pub enabled: bool,
}

impl MarkerSample {
    pub fn new(position: Pt3) -> Self {
        Self {
            position,
            weight: 1.0,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone)]
enum AttrStorage {
    Static(Real),
    /// Keyed values with a default for frames without a key.
    Curve { default: Real, keys: BTreeMap<Frame, Real> },
}

#[derive(Debug, Clone)]
struct AttrSlot {
    name: String,
    storage: AttrStorage,
}

#[derive(Debug, Clone)]
struct CameraNode {
    attrs: CameraAttrs,
    model: CameraModel,
}

#[derive(Debug, Clone)]
struct BundleNode {
    attrs: BundleAttrs,
}

#[derive(Debug, Clone)]
struct MarkerNode {
    camera: CameraId,
    bundle: BundleId,
    samples: BTreeMap<Frame, MarkerSample>,
}

/// Scene state held in ordinary containers.
#[derive(Debug)]
pub struct InMemoryScene {
    attrs: Vec<AttrSlot>,
    cameras: Vec<CameraNode>,
    bundles: Vec<BundleNode>,
    markers: Vec<MarkerNode>,
    pending: Vec<(AttrId, Option<Frame>, Real)>,
    projection_cache: HashMap<(CameraId, Frame), Mat4>,
    current: Frame,
    set_value_calls: usize,
}

impl Default for InMemoryScene {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryScene {
    pub fn new() -> Self {
        Self {
            attrs: Vec::new(),
            cameras: Vec::new(),
            bundles: Vec::new(),
            markers: Vec::new(),
            pending: Vec::new(),
            projection_cache: HashMap::new(),
            current: Frame(1),
            set_value_calls: 0,
        }
    }

    pub fn set_current_frame(&mut self, frame: Frame) {
        self.current = frame;
    }

    /// Register a static scalar attribute.
    pub fn add_static_attr(&mut self, name: &str, value: Real) -> AttrId {
        self.push_attr(name, AttrStorage::Static(value))
    }

    /// Register an animated scalar attribute; frames without a key read as
    /// `default`.
    pub fn add_animated_attr(&mut self, name: &str, default: Real) -> AttrId {
        self.push_attr(
            name,
            AttrStorage::Curve {
                default,
                keys: BTreeMap::new(),
            },
        )
    }

    fn push_attr(&mut self, name: &str, storage: AttrStorage) -> AttrId {
        let id = AttrId(self.attrs.len());
        self.attrs.push(AttrSlot {
            name: name.to_string(),
            storage,
        });
        id
    }

    /// Add a camera with static transform attributes.
    pub fn add_camera(
        &mut self,
        name: &str,
        position: Pt3,
        rotation_rad: Vec3,
        model: CameraModel,
    ) -> CameraId {
        let attrs = CameraAttrs {
            tx: self.add_static_attr(&format!("{name}.tx"), position.x),
            ty: self.add_static_attr(&format!("{name}.ty"), position.y),
            tz: self.add_static_attr(&format!("{name}.tz"), position.z),
            rx: self.add_static_attr(&format!("{name}.rx"), rotation_rad.x),
            ry: self.add_static_attr(&format!("{name}.ry"), rotation_rad.y),
            rz: self.add_static_attr(&format!("{name}.rz"), rotation_rad.z),
        };
        let id = CameraId(self.cameras.len());
        self.cameras.push(CameraNode { attrs, model });
        id
    }

    /// Add a bundle with translate attributes; `animated` selects curve
    /// storage for all three.
    pub fn add_bundle(&mut self, name: &str, position: Pt3, animated: bool) -> BundleId {
        let mut translate = |suffix: &str, value: Real| {
            if animated {
                self.add_animated_attr(&format!("{name}.{suffix}"), value)
            } else {
                self.add_static_attr(&format!("{name}.{suffix}"), value)
            }
        };
        let attrs = BundleAttrs {
            tx: translate("tx", position.x),
            ty: translate("ty", position.y),
            tz: translate("tz", position.z),
        };
        let id = BundleId(self.bundles.len());
        self.bundles.push(BundleNode { attrs });
        id
    }

    /// Add a marker observing `bundle` through `camera`.
    pub fn add_marker(
        &mut self,
        camera: CameraId,
        bundle: BundleId,
        samples: impl IntoIterator<Item = (Frame, MarkerSample)>,
    ) -> MarkerId {
        let id = MarkerId(self.markers.len());
        self.markers.push(MarkerNode {
            camera,
            bundle,
            samples: samples.into_iter().collect(),
        });
        id
    }

    pub fn camera_attrs(&self, camera: CameraId) -> Option<CameraAttrs> {
        self.cameras.get(camera.0).map(|c| c.attrs)
    }

    pub fn bundle_attrs(&self, bundle: BundleId) -> Option<BundleAttrs> {
        self.bundles.get(bundle.0).map(|b| b.attrs)
    }

    pub fn attr_name(&self, attr: AttrId) -> Option<&str> {
        self.attrs.get(attr.0).map(|a| a.name.as_str())
    }

    /// Number of staged-write calls seen so far. Used by tests to verify the
    /// solver did not touch the scene on early-exit paths.
    pub fn set_value_call_count(&self) -> usize {
        self.set_value_calls
    }

    /// Write an attribute directly, bypassing staging and the journal.
    /// Fixture and file-loading helper, not part of the solve path.
    pub fn overwrite_attr(&mut self, attr: AttrId, frame: Option<Frame>, value: Real) {
        if let Some(slot) = self.attrs.get_mut(attr.0) {
            match &mut slot.storage {
                AttrStorage::Static(v) => *v = value,
                AttrStorage::Curve { default, keys } => match frame {
                    Some(f) => {
                        keys.insert(f, value);
                    }
                    None => *default = value,
                },
            }
        }
        self.projection_cache.clear();
    }

    fn attr_slot(&self, attr: AttrId) -> Result<&AttrSlot, SceneError> {
        self.attrs.get(attr.0).ok_or(SceneError::UnknownAttr(attr))
    }

    fn read_attr(&self, attr: AttrId, frame: Frame) -> Result<Real, SceneError> {
        Ok(match &self.attr_slot(attr)?.storage {
            AttrStorage::Static(v) => *v,
            AttrStorage::Curve { default, keys } => keys.get(&frame).copied().unwrap_or(*default),
        })
    }

    fn is_animated(&self, attr: AttrId) -> Result<bool, SceneError> {
        Ok(matches!(
            self.attr_slot(attr)?.storage,
            AttrStorage::Curve { .. }
        ))
    }

    fn bundle_world(&self, bundle: BundleId, frame: Frame) -> Result<Pt3, SceneError> {
        let node = self
            .bundles
            .get(bundle.0)
            .ok_or(SceneError::UnknownBundle(bundle))?;
        Ok(Pt3::new(
            self.read_attr(node.attrs.tx, frame)?,
            self.read_attr(node.attrs.ty, frame)?,
            self.read_attr(node.attrs.tz, frame)?,
        ))
    }

    fn compute_world_projection(
        &self,
        camera: CameraId,
        frame: Frame,
    ) -> Result<Mat4, SceneError> {
        let node = self
            .cameras
            .get(camera.0)
            .ok_or(SceneError::UnknownCamera(camera))?;
        let m = node.model;
        if m.focal_length_mm <= 0.0 || m.film_back_width_mm <= 0.0 || m.film_back_height_mm <= 0.0
        {
            return Err(SceneError::DegenerateProjection { camera, frame });
        }

        let a = node.attrs;
        let translation = Translation3::new(
            self.read_attr(a.tx, frame)?,
            self.read_attr(a.ty, frame)?,
            self.read_attr(a.tz, frame)?,
        );
        let rotation = Rotation3::from_euler_angles(
            self.read_attr(a.rx, frame)?,
            self.read_attr(a.ry, frame)?,
            self.read_attr(a.rz, frame)?,
        );
        let world = translation.to_homogeneous() * rotation.to_homogeneous();
        let view = world
            .try_inverse()
            .ok_or(SceneError::DegenerateProjection { camera, frame })?;

        // Camera looks down -Z; x and y land in normalized film coordinates
        // after the homogeneous divide by w = -z.
        let mut projection = Mat4::zeros();
        projection[(0, 0)] = 2.0 * m.focal_length_mm / m.film_back_width_mm;
        projection[(1, 1)] = 2.0 * m.focal_length_mm / m.film_back_height_mm;
        projection[(2, 2)] = 1.0;
        projection[(3, 2)] = -1.0;

        Ok(projection * view)
    }
}

impl SceneEvaluator for InMemoryScene {
    fn current_frame(&self) -> Frame {
        self.current
    }

    fn attr_value(&self, attr: AttrId, frame: Frame) -> Result<Real, SceneError> {
        self.read_attr(attr, frame)
    }

    fn set_attr_value(
        &mut self,
        attr: AttrId,
        frame: Frame,
        value: Real,
        journal: &mut UndoJournal,
    ) -> Result<(), SceneError> {
        let previous = self.read_attr(attr, frame)?;
        let keyed = if self.is_animated(attr)? {
            Some(frame)
        } else {
            None
        };
        journal.record(UndoEntry {
            attr,
            frame: keyed,
            previous,
            value,
        });
        self.pending.push((attr, keyed, value));
        self.set_value_calls += 1;
        Ok(())
    }

    fn commit(&mut self, journal: &mut UndoJournal) -> Result<(), SceneError> {
        let staged = std::mem::take(&mut self.pending);
        for (attr, frame, value) in staged {
            let slot = self
                .attrs
                .get_mut(attr.0)
                .ok_or(SceneError::UnknownAttr(attr))?;
            match &mut slot.storage {
                AttrStorage::Static(v) => *v = value,
                AttrStorage::Curve { keys, .. } => {
                    // Staged writes to curves always carry a frame.
                    if let Some(f) = frame {
                        keys.insert(f, value);
                    }
                }
            }
        }
        journal.mark_commit();
        Ok(())
    }

    fn invalidate_projection_cache(&mut self, camera: CameraId) {
        self.projection_cache.retain(|(cam, _), _| *cam != camera);
    }

    fn marker_position(&self, marker: MarkerId, frame: Frame) -> Result<Pt3, SceneError> {
        let node = self
            .markers
            .get(marker.0)
            .ok_or(SceneError::UnknownMarker(marker))?;
        node.samples
            .get(&frame)
            .map(|s| s.position)
            .ok_or(SceneError::MissingMarkerSample { marker, frame })
    }

    fn bundle_position(&self, bundle: BundleId, frame: Frame) -> Result<Pt3, SceneError> {
        self.bundle_world(bundle, frame)
    }

    fn is_marker_valid(&self, marker: MarkerId, frame: Frame) -> Result<bool, SceneError> {
        let node = self
            .markers
            .get(marker.0)
            .ok_or(SceneError::UnknownMarker(marker))?;
        Ok(node
            .samples
            .get(&frame)
            .map(|s| s.enabled && s.weight > 0.0)
            .unwrap_or(false))
    }
}

impl WorldProjector for InMemoryScene {
    fn world_projection(&mut self, camera: CameraId, frame: Frame) -> Result<Mat4, SceneError> {
        if let Some(cached) = self.projection_cache.get(&(camera, frame)) {
            return Ok(*cached);
        }
        let matrix = self.compute_world_projection(camera, frame)?;
        self.projection_cache.insert((camera, frame), matrix);
        Ok(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::project_point;
    use approx::assert_relative_eq;

    fn test_scene() -> (InMemoryScene, CameraId, BundleId) {
        let mut scene = InMemoryScene::new();
        let camera = scene.add_camera(
            "cam",
            Pt3::new(0.0, 0.0, 0.0),
            Vec3::zeros(),
            CameraModel::default(),
        );
        let bundle = scene.add_bundle("pt", Pt3::new(1.0, 0.5, -10.0), false);
        (scene, camera, bundle)
    }

    #[test]
    fn projection_centers_points_on_axis() {
        let (mut scene, camera, _) = test_scene();
        let m = scene.world_projection(camera, Frame(1)).unwrap();
        let p = project_point(&m, &Pt3::new(0.0, 0.0, -10.0));
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn staged_writes_apply_on_commit_only() {
        let (mut scene, _, bundle) = test_scene();
        let attrs = scene.bundle_attrs(bundle).unwrap();
        let mut journal = UndoJournal::new();

        scene
            .set_attr_value(attrs.tx, Frame(1), 2.5, &mut journal)
            .unwrap();
        assert_relative_eq!(scene.attr_value(attrs.tx, Frame(1)).unwrap(), 1.0);

        scene.commit(&mut journal).unwrap();
        assert_relative_eq!(scene.attr_value(attrs.tx, Frame(1)).unwrap(), 2.5);
        assert_eq!(journal.len(), 1);
        assert_eq!(journal.commit_count(), 1);
        assert_relative_eq!(journal.entries()[0].previous, 1.0);
    }

    #[test]
    fn projection_cache_serves_stale_values_until_invalidated() {
        let (mut scene, camera, _) = test_scene();
        let attrs = scene.camera_attrs(camera).unwrap();
        let before = scene.world_projection(camera, Frame(1)).unwrap();

        let mut journal = UndoJournal::new();
        scene
            .set_attr_value(attrs.tx, Frame(1), 3.0, &mut journal)
            .unwrap();
        scene.commit(&mut journal).unwrap();

        let stale = scene.world_projection(camera, Frame(1)).unwrap();
        assert_eq!(before, stale);

        scene.invalidate_projection_cache(camera);
        let fresh = scene.world_projection(camera, Frame(1)).unwrap();
        assert_ne!(before, fresh);
    }

    #[test]
    fn marker_validity_follows_weight_and_enable() {
        let (mut scene, camera, bundle) = test_scene();
        let marker = scene.add_marker(
            camera,
            bundle,
            vec![
                (Frame(1), MarkerSample::new(Pt3::new(0.0, 0.0, -10.0))),
                (
                    Frame(2),
                    MarkerSample {
                        position: Pt3::new(0.0, 0.0, -10.0),
                        weight: 0.0,
                        enabled: true,
                    },
                ),
            ],
        );
        assert!(scene.is_marker_valid(marker, Frame(1)).unwrap());
        assert!(!scene.is_marker_valid(marker, Frame(2)).unwrap());
        assert!(!scene.is_marker_valid(marker, Frame(3)).unwrap());
    }

    #[test]
    fn animated_attr_reads_default_off_key() {
        let mut scene = InMemoryScene::new();
        let attr = scene.add_animated_attr("b.tx", 4.0);
        let mut journal = UndoJournal::new();
        scene
            .set_attr_value(attr, Frame(3), 9.0, &mut journal)
            .unwrap();
        scene.commit(&mut journal).unwrap();
        assert_relative_eq!(scene.attr_value(attr, Frame(3)).unwrap(), 9.0);
        assert_relative_eq!(scene.attr_value(attr, Frame(4)).unwrap(), 4.0);
    }
}
