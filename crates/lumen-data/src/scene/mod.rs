// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The scene: a node hierarchy plus scene-wide lighting.

mod error;
mod graph;
mod lighting;
mod node;

pub use error::SceneError;
pub use graph::{DepthFirst, SceneGraph};
pub use lighting::{IblMaps, IblStages, ImageBasedLighting, LightGlobals};
pub use node::{NodeId, SceneNode, Transform};

use std::fmt;

/// A per-frame callback that animates the graph. Receives the elapsed seconds.
pub type Animation = Box<dyn FnMut(&mut SceneGraph, f32) + Send>;

/// The nodes carrying each component kind, in traversal order.
///
/// Gathered once per frame from the enabled, attached part of the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentLists {
    /// Camera nodes, highest priority first. Equal priorities keep traversal order.
    pub cameras: Vec<NodeId>,
    /// Light nodes.
    pub lights: Vec<NodeId>,
    /// Mesh nodes.
    pub meshes: Vec<NodeId>,
}

/// Owns the scene graph together with its global illumination state.
pub struct Scene {
    /// The node hierarchy.
    pub graph: SceneGraph,
    /// Image-based lighting, if an environment is set.
    pub ibl: Option<ImageBasedLighting>,
    /// Ambient and IBL scalars.
    pub light_globals: LightGlobals,
    animations: Vec<Animation>,
}

impl fmt::Debug for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scene")
            .field("graph", &self.graph)
            .field("ibl", &self.ibl)
            .field("light_globals", &self.light_globals)
            .field("animations", &self.animations.len())
            .finish()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Creates an empty scene.
    pub fn new() -> Self {
        Self {
            graph: SceneGraph::new(),
            ibl: None,
            light_globals: LightGlobals::default(),
            animations: Vec::new(),
        }
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        self.graph.root()
    }

    /// Registers a callback run on every [`Scene::update`].
    pub fn add_animation(&mut self, animation: impl FnMut(&mut SceneGraph, f32) + Send + 'static) {
        self.animations.push(Box::new(animation));
    }

    /// Advances every animation by `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        for animation in &mut self.animations {
            animation(&mut self.graph, dt);
        }
    }

    /// Collects the enabled component-carrying nodes.
    pub fn gather(&self) -> ComponentLists {
        let mut lists = ComponentLists::default();
        for (id, node) in self.graph.iter_enabled() {
            let components = node.components();
            if components.camera.is_some() {
                lists.cameras.push(id);
            }
            if components.light.is_some() {
                lists.lights.push(id);
            }
            if components.mesh.is_some() {
                lists.meshes.push(id);
            }
        }
        lists.cameras.sort_by_key(|id| {
            std::cmp::Reverse(self.graph.camera(*id).map_or(0, |c| c.priority))
        });
        lists
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{CameraComponent, LightComponent, MeshComponent};
    use lumen_core::math::Vec3;

    #[test]
    fn gather_orders_cameras_by_priority() {
        let mut scene = Scene::new();
        let root = scene.root();
        let low = scene.graph.spawn(root, "low").unwrap();
        let high = scene.graph.spawn(root, "high").unwrap();
        let tie = scene.graph.spawn(root, "tie").unwrap();
        scene.graph.add_component(low, CameraComponent::default().with_priority(1)).unwrap();
        scene.graph.add_component(high, CameraComponent::default().with_priority(5)).unwrap();
        scene.graph.add_component(tie, CameraComponent::default().with_priority(1)).unwrap();

        assert_eq!(scene.gather().cameras, vec![high, low, tie]);
    }

    #[test]
    fn gather_skips_disabled_and_detached_nodes() {
        let mut scene = Scene::new();
        let root = scene.root();
        let on = scene.graph.spawn(root, "on").unwrap();
        let off = scene.graph.spawn(root, "off").unwrap();
        let detached = scene.graph.create_node("detached");
        for id in [on, off, detached] {
            scene.graph.add_component(id, MeshComponent::default()).unwrap();
            scene.graph.add_component(id, LightComponent::default()).unwrap();
        }
        scene.graph.set_enabled(off, false).unwrap();

        let lists = scene.gather();
        assert_eq!(lists.meshes, vec![on]);
        assert_eq!(lists.lights, vec![on]);
        assert!(lists.cameras.is_empty());
    }

    #[test]
    fn update_runs_animations() {
        let mut scene = Scene::new();
        let spinner = scene.graph.spawn(scene.root(), "spinner").unwrap();
        scene.add_animation(move |graph, dt| {
            let mut t = graph.transform(spinner).unwrap();
            t.rotation = t.rotation + Vec3::new(0.0, dt, 0.0);
            graph.set_transform(spinner, t).unwrap();
        });
        scene.update(0.5);
        scene.update(0.25);
        assert_eq!(scene.graph.transform(spinner).unwrap().rotation.y, 0.75);
    }
}
