//! Scene-graph handles and the model loader.

pub mod glb;

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::{
    assets::AssetSource,
    render::Transform,
    source::AssetReference,
    timeline::{AnimationClip, AnimationDriver},
    Result,
};

pub use glb::GlbParser;

/// Metadata key that marks a mesh as a depth-only occluder.
pub const OCCLUDE_TAG: &str = "occlude";

/// Material assigned to a mesh after loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Material {
    /// Opaque unlit black. Only masks depth; contributes no detail.
    OcclusionMask,
    /// Encodes surface normals as colour; the visual input of the effect.
    NormalEncoding,
}

/// One node of a loaded hierarchy.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub is_mesh: bool,
    /// Custom per-node properties (glTF `extras`).
    pub metadata: Map<String, Value>,
    /// `None` on non-mesh nodes and before material assignment.
    pub material: Option<Material>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_mesh: false,
            metadata: Map::new(),
            material: None,
            children: Vec::new(),
        }
    }

    pub fn mesh(name: impl Into<String>) -> Self {
        Self {
            is_mesh: true,
            ..Self::group(name)
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }

    /// True when any metadata key equals `tag`, ignoring ASCII case.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.metadata.keys().any(|key| key.eq_ignore_ascii_case(tag))
    }

    /// Depth-first, parent before children.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a SceneNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut SceneNode)) {
        visit(self);
        for child in &mut self.children {
            child.walk_mut(visit);
        }
    }

    pub fn find(&self, name: &str) -> Option<&SceneNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(name))
    }
}

/// Output of a [`ModelParser`]: a hierarchy plus the clips bundled with it.
#[derive(Debug, Clone)]
pub struct ParsedModel {
    pub root: SceneNode,
    pub clips: Vec<AnimationClip>,
}

/// Turns model container bytes into a hierarchy. File formats are the
/// parser's business; the loader only consumes the result.
pub trait ModelParser: Send + Sync {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedModel>;
}

/// A loaded, displayable model.
#[derive(Debug, Clone)]
pub struct SceneGraphHandle {
    pub reference: AssetReference,
    pub root: SceneNode,
    pub driver: AnimationDriver,
    pub transform: Transform,
}

impl SceneGraphHandle {
    /// Stops the animation driver. The handle is inert afterwards.
    pub fn retire(&mut self) {
        self.driver.stop();
    }
}

/// Mesh counts produced by [`assign_materials`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaterialSummary {
    pub occluders: usize,
    pub visible: usize,
}

/// Gives every mesh its material: meshes tagged `occlude` (any case) become
/// occlusion masks, all others get the normal-encoding material.
pub fn assign_materials(root: &mut SceneNode) -> MaterialSummary {
    let mut summary = MaterialSummary::default();
    root.walk_mut(&mut |node| {
        if !node.is_mesh {
            return;
        }
        if node.has_tag(OCCLUDE_TAG) {
            node.material = Some(Material::OcclusionMask);
            summary.occluders += 1;
        } else {
            node.material = Some(Material::NormalEncoding);
            summary.visible += 1;
        }
    });
    summary
}

/// Fetches, parses and prepares models for display.
#[derive(Clone)]
pub struct ModelLoader {
    source: Arc<dyn AssetSource>,
    parser: Arc<dyn ModelParser>,
}

impl ModelLoader {
    pub fn new(source: Arc<dyn AssetSource>, parser: Arc<dyn ModelParser>) -> Self {
        Self { source, parser }
    }

    /// Blocking load; the pipeline runs it on a load executor. Any failure is
    /// reported as [`AsciiscopeError::Load`] and nothing partial is returned.
    pub fn load(&self, reference: &AssetReference) -> Result<SceneGraphHandle> {
        let bytes = self.source.fetch(reference)?;
        let ParsedModel { mut root, clips } = self
            .parser
            .parse(&bytes)
            .map_err(|err| err.into_load(reference.display_label()))?;

        let summary = assign_materials(&mut root);
        let mut driver = AnimationDriver::new(clips);
        driver.play_all();

        tracing::debug!(
            %reference,
            occluders = summary.occluders,
            visible = summary.visible,
            clips = driver.actions().len(),
            "model prepared"
        );

        Ok(SceneGraphHandle {
            reference: reference.clone(),
            root,
            driver,
            transform: Transform::default(),
        })
    }
}

impl std::fmt::Debug for ModelLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelLoader").finish()
    }
}
