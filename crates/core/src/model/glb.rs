//! glTF model parsing on top of the `gltf` crate.
//!
//! Only the structure the pipeline needs is extracted: the node hierarchy of
//! the default scene (names, mesh presence, `extras` metadata) and the list of
//! animation clips with their durations. Geometry buffers are left alone.

use std::collections::HashSet;

use gltf::{Document, Gltf, Node};
use serde_json::{Map, Value};

use super::{ModelParser, ParsedModel, SceneNode};
use crate::{timeline::AnimationClip, AsciiscopeError, Result};

/// Deepest node nesting accepted from a file.
pub const MAX_HIERARCHY_DEPTH: usize = 256;

/// [`ModelParser`] for `.glb` containers (and bare `.gltf` JSON).
#[derive(Debug, Default, Clone, Copy)]
pub struct GlbParser;

impl ModelParser for GlbParser {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedModel> {
        let gltf = Gltf::from_slice(bytes)?;

        let (name, roots) = match gltf.default_scene().or_else(|| gltf.scenes().next()) {
            Some(scene) => (
                scene.name().unwrap_or("Scene").to_string(),
                scene.nodes().collect(),
            ),
            None => ("Scene".to_string(), orphan_nodes(&gltf)),
        };

        Ok(ParsedModel {
            root: build_hierarchy(name, roots)?,
            clips: clips(&gltf),
        })
    }
}

fn orphan_nodes(document: &Document) -> Vec<Node<'_>> {
    let referenced: HashSet<usize> = document
        .nodes()
        .flat_map(|node| node.children().map(|child| child.index()))
        .collect();
    document
        .nodes()
        .filter(|node| !referenced.contains(&node.index()))
        .collect()
}

enum Step<'a> {
    Enter(Node<'a>),
    Exit,
}

/// Depth-first walk on an explicit stack. `open` holds the chain of nodes
/// whose children are still being built, so its length is the depth.
fn build_hierarchy(name: String, roots: Vec<Node<'_>>) -> Result<SceneNode> {
    let mut seen = HashSet::new();
    let mut open = vec![SceneNode::group(name)];
    let mut steps: Vec<Step<'_>> = roots.into_iter().rev().map(Step::Enter).collect();

    while let Some(step) = steps.pop() {
        match step {
            Step::Enter(node) => {
                if !seen.insert(node.index()) {
                    return Err(AsciiscopeError::InvalidInput(
                        "node hierarchy contains a cycle or a shared node",
                    ));
                }
                if open.len() > MAX_HIERARCHY_DEPTH {
                    return Err(AsciiscopeError::InvalidInput("node hierarchy is too deep"));
                }
                open.push(scene_node(&node));
                steps.push(Step::Exit);
                let children: Vec<_> = node.children().collect();
                steps.extend(children.into_iter().rev().map(Step::Enter));
            }
            Step::Exit => {
                if let Some(done) = open.pop() {
                    if let Some(parent) = open.last_mut() {
                        parent.children.push(done);
                    }
                }
            }
        }
    }

    open.pop()
        .ok_or(AsciiscopeError::InvalidInput("node hierarchy is empty"))
}

fn scene_node(node: &Node<'_>) -> SceneNode {
    // Node extras take precedence over mesh extras on key clashes.
    let mut metadata = node
        .mesh()
        .map(|mesh| extras_map(mesh.extras()))
        .unwrap_or_default();
    metadata.extend(extras_map(node.extras()));

    SceneNode {
        name: node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("node_{}", node.index())),
        is_mesh: node.mesh().is_some(),
        metadata,
        material: None,
        children: Vec::new(),
    }
}

/// Object-shaped extras become metadata; anything else is ignored.
fn extras_map(extras: &gltf::json::Extras) -> Map<String, Value> {
    extras
        .as_ref()
        .and_then(|raw| serde_json::from_str(raw.get()).ok())
        .unwrap_or_default()
}

fn clips(document: &Document) -> Vec<AnimationClip> {
    document
        .animations()
        .map(|animation| {
            let duration = animation
                .samplers()
                .filter_map(|sampler| sampler.input().max())
                .filter_map(|max| max.get(0).and_then(Value::as_f64))
                .fold(0.0_f64, f64::max);
            let name = animation
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("animation_{}", animation.index()));
            AnimationClip::new(name, duration as f32)
        })
        .collect()
}
