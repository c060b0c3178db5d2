//! Per-frame placement of the active renderable and camera framing.

use std::f32::consts::FRAC_PI_2;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::{
    render::{Renderable, Transform},
    source::MediaKind,
    surface::Dimensions,
};

/// Head-on pose used while a flat surface is shown.
pub const SURFACE_CAMERA_POSITION: Vec3 = Vec3::new(0.0, 0.0, 5.0);
/// Oblique wide pose used for models and the empty scene.
pub const WIDE_CAMERA_POSITION: Vec3 = Vec3::new(500.0, 250.0, 500.0);

/// Host drawing area in CSS pixels plus the device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    pub dpr: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32, dpr: f32) -> Self {
        Self { width, height, dpr }
    }

    /// Both sides finite and positive.
    pub fn has_area(&self) -> bool {
        let usable = |side: f32| side.is_finite() && side > 0.0;
        usable(self.width) && usable(self.height)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(1280.0, 720.0, 1.0)
    }
}

/// Model staging and orbit tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Uniform scale applied to loaded models.
    pub model_scale: f32,
    /// Vertical model offset as a fraction of viewport height.
    pub model_offset_ratio: f32,
    /// Azimuth auto-rotation in radians per second.
    pub orbit_speed: f32,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            model_scale: 200.0,
            model_offset_ratio: -1.0 / 3.0,
            orbit_speed: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    /// Euler angles in radians.
    pub rotation: Vec3,
    pub zoom: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 500.0),
            rotation: Vec3::ZERO,
            zoom: 1.0,
        }
    }
}

/// Orbit around the origin with the polar angle pinned to the horizontal
/// plane. Azimuth is free and advances on its own. Zoom and pan are off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitRig {
    pub azimuth: f32,
    pub radius: f32,
    pub speed: f32,
}

impl OrbitRig {
    pub const POLAR: f32 = FRAC_PI_2;

    /// Adopts the azimuth and distance of `position`; height is discarded.
    pub fn from_position(position: Vec3, speed: f32) -> Self {
        Self {
            azimuth: position.x.atan2(position.z),
            radius: position.length(),
            speed,
        }
    }

    pub fn advance(&mut self, delta_seconds: f32) {
        self.azimuth = (self.azimuth + self.speed * delta_seconds) % std::f32::consts::TAU;
    }

    pub fn position(&self) -> Vec3 {
        let (sin_polar, cos_polar) = Self::POLAR.sin_cos();
        Vec3::new(
            self.radius * sin_polar * self.azimuth.sin(),
            self.radius * cos_polar,
            self.radius * sin_polar * self.azimuth.cos(),
        )
    }
}

/// Letterboxed (`fit`) or stretched size of a surface inside the viewport.
/// Unknown dimensions fall back to the viewport's own. A viewport with no
/// usable area (minimised host) collapses the surface to zero size.
pub fn surface_scale(dimensions: Option<Dimensions>, viewport: Viewport, fit: bool) -> Vec3 {
    if !viewport.has_area() {
        return Vec3::new(0.0, 0.0, 1.0);
    }
    if !fit {
        return Vec3::new(viewport.width, viewport.height, 1.0);
    }
    let (width, height) = match dimensions {
        Some(dims) if !dims.is_empty() => (dims.width as f32, dims.height as f32),
        _ => (viewport.width, viewport.height),
    };
    let factor = (viewport.width / width).min(viewport.height / height);
    Vec3::new(width * factor, height * factor, 1.0)
}

/// What the composer decided for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComposedFrame {
    pub kind: MediaKind,
    pub transform: Option<Transform>,
    pub camera: Camera,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ScaleKey {
    dimensions: Option<Dimensions>,
    viewport: (f32, f32),
    fit: bool,
}

#[derive(Debug, Clone)]
pub struct FrameComposer {
    staging: StagingConfig,
    camera: Camera,
    orbit: OrbitRig,
    surface_active: Option<bool>,
    scale_cache: Option<(ScaleKey, Vec3)>,
}

impl FrameComposer {
    pub fn new(staging: StagingConfig) -> Self {
        Self {
            staging,
            camera: Camera::default(),
            orbit: OrbitRig::from_position(WIDE_CAMERA_POSITION, staging.orbit_speed),
            surface_active: None,
            scale_cache: None,
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Places the active renderable for this frame and advances animation.
    pub fn compose(
        &mut self,
        active: Option<&mut Renderable>,
        viewport: Viewport,
        fit: bool,
        delta_seconds: f32,
    ) -> ComposedFrame {
        let has_surface = active.as_ref().is_some_and(|r| r.is_surface());
        self.reframe_on_edge(has_surface);

        let Some(active) = active else {
            return ComposedFrame {
                kind: MediaKind::None,
                transform: None,
                camera: self.camera,
            };
        };

        let transform = match &mut *active {
            Renderable::Scene(scene) => {
                scene.transform = Transform {
                    translation: Vec3::new(
                        0.0,
                        viewport.height * self.staging.model_offset_ratio,
                        0.0,
                    ),
                    scale: Vec3::splat(self.staging.model_scale),
                };
                scene.driver.update(delta_seconds);
                self.orbit.advance(delta_seconds);
                self.camera.position = self.orbit.position();
                scene.transform
            }
            Renderable::Surface(surface) => {
                surface.transform = Transform {
                    translation: Vec3::ZERO,
                    scale: self.cached_scale(surface.dimensions(), viewport, fit),
                };
                surface.transform
            }
        };

        ComposedFrame {
            kind: active.kind(),
            transform: Some(transform),
            camera: self.camera,
        }
    }

    fn reframe_on_edge(&mut self, has_surface: bool) {
        if self.surface_active == Some(has_surface) {
            return;
        }
        self.surface_active = Some(has_surface);
        if has_surface {
            self.camera = Camera {
                position: SURFACE_CAMERA_POSITION,
                rotation: Vec3::ZERO,
                zoom: 1.0,
            };
        } else {
            self.camera.position = WIDE_CAMERA_POSITION;
            self.orbit = OrbitRig::from_position(WIDE_CAMERA_POSITION, self.staging.orbit_speed);
        }
        tracing::debug!(has_surface, position = ?self.camera.position, "camera reframed");
    }

    fn cached_scale(&mut self, dimensions: Option<Dimensions>, viewport: Viewport, fit: bool) -> Vec3 {
        let key = ScaleKey {
            dimensions,
            viewport: (viewport.width, viewport.height),
            fit,
        };
        match self.scale_cache {
            Some((cached, scale)) if cached == key => scale,
            _ => {
                let scale = surface_scale(dimensions, viewport, fit);
                self.scale_cache = Some((key, scale));
                scale
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{SceneGraphHandle, SceneNode},
        surface::{DocumentFrame, SurfaceContent, SurfaceHandle},
        timeline::{AnimationClip, AnimationDriver},
    };

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() < 1e-3
    }

    fn document(dims: Option<Dimensions>) -> Renderable {
        let mut surface = SurfaceHandle {
            reference: "page.html".into(),
            content: SurfaceContent::Document(DocumentFrame::new()),
            transform: Transform::default(),
        };
        if let Some(dims) = dims {
            surface.report_dimensions(dims);
        }
        Renderable::Surface(surface)
    }

    fn model() -> Renderable {
        let mut driver = AnimationDriver::new(vec![AnimationClip::new("spin", 10.0)]);
        driver.play_all();
        Renderable::Scene(SceneGraphHandle {
            reference: "globe.glb".into(),
            root: SceneNode::group("Scene"),
            driver,
            transform: Transform::default(),
        })
    }

    #[test]
    fn fit_letterboxes_wide_content_in_four_by_three() {
        let viewport = Viewport::new(800.0, 600.0, 1.0);
        let scale = surface_scale(Some(Dimensions::new(1920, 1080)), viewport, true);

        assert!((scale.x - 800.0).abs() < 1e-3);
        assert!(scale.y < 600.0);
        assert!((scale.x / scale.y - 16.0 / 9.0).abs() < 1e-4);
    }

    #[test]
    fn stretch_matches_viewport_exactly() {
        let viewport = Viewport::new(800.0, 600.0, 2.0);
        let scale = surface_scale(Some(Dimensions::new(1920, 1080)), viewport, false);
        assert_eq!(scale, Vec3::new(800.0, 600.0, 1.0));
    }

    #[test]
    fn unknown_dimensions_fill_the_viewport() {
        let viewport = Viewport::new(640.0, 480.0, 1.0);
        assert!(approx(surface_scale(None, viewport, true), Vec3::new(640.0, 480.0, 1.0)));
    }

    #[test]
    fn empty_viewport_collapses_instead_of_dividing_by_zero() {
        let minimised = Viewport::new(0.0, 0.0, 1.0);
        let zero = Vec3::new(0.0, 0.0, 1.0);
        assert_eq!(surface_scale(None, minimised, true), zero);
        assert_eq!(surface_scale(Some(Dimensions::new(800, 400)), minimised, true), zero);
        assert_eq!(surface_scale(None, Viewport::new(640.0, f32::NAN, 1.0), false), zero);

        let mut composer = FrameComposer::new(StagingConfig::default());
        let mut surface = document(None);
        let frame = composer.compose(Some(&mut surface), minimised, true, 0.016);
        assert!(frame.transform.unwrap().scale.is_finite());
    }

    #[test]
    fn wide_image_in_square_viewport_is_width_capped() {
        let mut composer = FrameComposer::new(StagingConfig::default());
        let mut surface = document(Some(Dimensions::new(800, 400)));
        let frame = composer.compose(Some(&mut surface), Viewport::new(400.0, 400.0, 1.0), true, 0.016);

        assert_eq!(frame.kind, MediaKind::Document);
        assert!(approx(frame.transform.unwrap().scale, Vec3::new(400.0, 200.0, 1.0)));
    }

    #[test]
    fn rescales_when_dimensions_arrive_late() {
        let mut composer = FrameComposer::new(StagingConfig::default());
        let viewport = Viewport::new(400.0, 400.0, 1.0);
        let mut surface = document(None);

        let before = composer.compose(Some(&mut surface), viewport, true, 0.0);
        assert!(approx(before.transform.unwrap().scale, Vec3::new(400.0, 400.0, 1.0)));

        if let Renderable::Surface(handle) = &mut surface {
            handle.report_dimensions(Dimensions::new(400, 800));
        }
        let after = composer.compose(Some(&mut surface), viewport, true, 0.0);
        assert!(approx(after.transform.unwrap().scale, Vec3::new(200.0, 400.0, 1.0)));
    }

    #[test]
    fn models_are_anchored_below_centre_and_animated() {
        let mut composer = FrameComposer::new(StagingConfig::default());
        let mut scene = model();
        let frame = composer.compose(Some(&mut scene), Viewport::new(900.0, 600.0, 1.0), true, 0.5);

        let transform = frame.transform.unwrap();
        assert!((transform.translation.y + 200.0).abs() < 1e-3);
        assert_eq!(transform.scale, Vec3::splat(200.0));
        let Renderable::Scene(handle) = &scene else { unreachable!() };
        assert!((handle.driver.actions()[0].time() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn orbit_keeps_camera_on_horizontal_plane() {
        let mut composer = FrameComposer::new(StagingConfig::default());
        let mut scene = model();
        let viewport = Viewport::default();

        let first = composer.compose(Some(&mut scene), viewport, true, 0.1);
        let second = composer.compose(Some(&mut scene), viewport, true, 0.1);

        assert!(first.camera.position.y.abs() < 1e-3);
        assert!(second.camera.position.y.abs() < 1e-3);
        assert_ne!(first.camera.position, second.camera.position);
        assert!((second.camera.position.length() - WIDE_CAMERA_POSITION.length()).abs() < 1e-2);
    }

    #[test]
    fn camera_resets_only_on_surface_edges() {
        let mut composer = FrameComposer::new(StagingConfig::default());
        let viewport = Viewport::default();
        let mut surface = document(None);

        let frame = composer.compose(Some(&mut surface), viewport, true, 0.0);
        assert_eq!(frame.camera.position, SURFACE_CAMERA_POSITION);
        assert_eq!(frame.camera.zoom, 1.0);

        // Caller nudges the camera; no reset while the surface stays.
        composer.camera.zoom = 2.0;
        let frame = composer.compose(Some(&mut surface), viewport, true, 0.0);
        assert_eq!(frame.camera.zoom, 2.0);

        let frame = composer.compose(None, viewport, true, 0.0);
        assert_eq!(frame.kind, MediaKind::None);
        assert_eq!(frame.camera.position, WIDE_CAMERA_POSITION);
    }
}
