mod graph;

use glam::Vec3;

use crate::{
    model::SceneGraphHandle,
    source::MediaKind,
    surface::{Dimensions, SurfaceHandle},
};

pub use graph::{FrameReport, RenderGraph};

/// Placement applied to the active renderable by the frame composer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

/// The displayable object: a 3-D scene graph or a flat surface.
#[derive(Debug, Clone)]
pub enum Renderable {
    Scene(SceneGraphHandle),
    Surface(SurfaceHandle),
}

impl Renderable {
    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Scene(_) => MediaKind::Model,
            Self::Surface(surface) => surface.kind(),
        }
    }

    pub fn is_surface(&self) -> bool {
        matches!(self, Self::Surface(_))
    }

    /// Natural size of a surface; scene graphs have none.
    pub fn dimensions(&self) -> Option<Dimensions> {
        match self {
            Self::Scene(_) => None,
            Self::Surface(surface) => surface.dimensions(),
        }
    }

    /// Releases playback, animation and pixel resources.
    pub fn retire(&mut self) {
        match self {
            Self::Scene(scene) => scene.retire(),
            Self::Surface(surface) => surface.retire(),
        }
    }
}
