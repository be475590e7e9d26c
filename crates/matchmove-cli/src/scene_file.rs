//! JSON scene description accepted on the command line.

use anyhow::{bail, ensure, Result};
use serde::{Deserialize, Serialize};

use matchmove_core::scene::{CameraModel, InMemoryScene, MarkerSample};
use matchmove_core::{AttrRef, BundleId, CameraId, Frame, MarkerRef, Pt3, Vec3};
use matchmove_solver::{SolveRequest, SolverOptions};

/// A complete solve setup: scene content plus solver options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneFile {
    pub cameras: Vec<CameraDesc>,
    pub bundles: Vec<BundleDesc>,
    pub markers: Vec<MarkerDesc>,
    /// Frames to solve, in order.
    pub frames: Vec<i32>,
    #[serde(default)]
    pub solver: SolverOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraDesc {
    pub name: String,
    pub position: [f64; 3],
    /// Euler rotation in radians.
    #[serde(default)]
    pub rotation: [f64; 3],
    #[serde(default)]
    pub model: CameraModelDesc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraModelDesc {
    pub focal_length_mm: f64,
    pub film_back_width_mm: f64,
    pub film_back_height_mm: f64,
}

impl Default for CameraModelDesc {
    fn default() -> Self {
        let m = CameraModel::default();
        Self {
            focal_length_mm: m.focal_length_mm,
            film_back_width_mm: m.film_back_width_mm,
            film_back_height_mm: m.film_back_height_mm,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleDesc {
    pub name: String,
    pub position: [f64; 3],
    #[serde(default)]
    pub animated: bool,
    /// Translate axes to solve for: any of "tx", "ty", "tz".
    #[serde(default)]
    pub solve: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerDesc {
    /// Index into `cameras`.
    pub camera: usize,
    /// Index into `bundles`.
    pub bundle: usize,
    pub samples: Vec<SampleDesc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleDesc {
    pub frame: i32,
    pub position: [f64; 3],
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_weight() -> f64 {
    1.0
}

fn default_enabled() -> bool {
    true
}

fn pt3(v: [f64; 3]) -> Pt3 {
    Pt3::new(v[0], v[1], v[2])
}

impl SceneFile {
    /// Build the in-memory scene and the solve request it describes.
    pub fn build(&self) -> Result<(InMemoryScene, SolveRequest)> {
        ensure!(!self.frames.is_empty(), "scene file lists no frames");
        ensure!(!self.cameras.is_empty(), "scene file lists no cameras");

        let mut scene = InMemoryScene::new();

        let cameras: Vec<CameraId> = self
            .cameras
            .iter()
            .map(|c| {
                scene.add_camera(
                    &c.name,
                    pt3(c.position),
                    Vec3::new(c.rotation[0], c.rotation[1], c.rotation[2]),
                    CameraModel {
                        focal_length_mm: c.model.focal_length_mm,
                        film_back_width_mm: c.model.film_back_width_mm,
                        film_back_height_mm: c.model.film_back_height_mm,
                    },
                )
            })
            .collect();

        let mut attributes = Vec::new();
        let mut bundles: Vec<BundleId> = Vec::with_capacity(self.bundles.len());
        for desc in &self.bundles {
            let bundle = scene.add_bundle(&desc.name, pt3(desc.position), desc.animated);
            let attrs = scene.bundle_attrs(bundle).expect("bundle just added");
            for axis in &desc.solve {
                let attr = match axis.as_str() {
                    "tx" => attrs.tx,
                    "ty" => attrs.ty,
                    "tz" => attrs.tz,
                    other => bail!("bundle '{}': unknown solve axis '{other}'", desc.name),
                };
                attributes.push(AttrRef {
                    attr,
                    animated: desc.animated,
                });
            }
            bundles.push(bundle);
        }

        let mut markers = Vec::with_capacity(self.markers.len());
        for (idx, desc) in self.markers.iter().enumerate() {
            let camera = *cameras
                .get(desc.camera)
                .ok_or_else(|| anyhow::anyhow!("marker {idx}: camera index out of range"))?;
            let bundle = *bundles
                .get(desc.bundle)
                .ok_or_else(|| anyhow::anyhow!("marker {idx}: bundle index out of range"))?;
            let samples = desc.samples.iter().map(|s| {
                (
                    Frame(s.frame),
                    MarkerSample {
                        position: pt3(s.position),
                        weight: s.weight,
                        enabled: s.enabled,
                    },
                )
            });
            let marker = scene.add_marker(camera, bundle, samples);
            markers.push(MarkerRef {
                marker,
                camera,
                bundle,
            });
        }

        let request = SolveRequest {
            cameras,
            markers,
            attributes,
            frames: self.frames.iter().copied().map(Frame).collect(),
            options: self.solver,
            ..Default::default()
        };
        Ok((scene, request))
    }
}
