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

//! The arena-backed transform hierarchy.
//!
//! Nodes live in a flat arena and refer to each other by [`NodeId`]. A parent
//! owns the ordered list of its children, a child keeps a plain back-index to
//! its parent. Despawning a node frees its whole subtree and bumps the
//! generation of every freed slot.
//!
//! World matrices are computed lazily: mutating a local transform marks the
//! node and its descendants dirty, and the next read of a world matrix walks up
//! to the nearest clean ancestor and recomputes downwards.

use super::node::{NodeId, SceneNode, Transform};
use super::SceneError;
use crate::components::{
    CameraComponent, Component, ComponentKind, LightComponent, MeshComponent,
};
use lumen_core::math::euler::euler_from_basis;
use lumen_core::math::{decompose_trs, Mat4, Vec3};

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<SceneNode>,
}

/// The scene hierarchy.
#[derive(Debug)]
pub struct SceneGraph {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    /// Creates a graph holding only the root node.
    pub fn new() -> Self {
        let mut graph = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
        };
        graph.root = graph.create_node("Root");
        graph
    }

    /// The root node. Its parent space is the world.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The number of live nodes, detached ones included.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Returns `true` if only the root exists.
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Creates a detached node. It is not rendered until attached under the root.
    pub fn create_node(&mut self, name: impl Into<String>) -> NodeId {
        let node = SceneNode::new(name);
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    /// Creates a node as the last child of `parent`.
    pub fn spawn(&mut self, parent: NodeId, name: impl Into<String>) -> Result<NodeId, SceneError> {
        self.get(parent)?;
        let id = self.create_node(name);
        self.add_child(parent, id)?;
        Ok(id)
    }

    /// Returns `true` if `id` refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_ok()
    }

    /// Borrows a node.
    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.get(id).ok()
    }

    fn get(&self, id: NodeId) -> Result<&SceneNode, SceneError> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(SceneError::NodeNotFound(id))
    }

    fn get_mut(&mut self, id: NodeId) -> Result<&mut SceneNode, SceneError> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(SceneError::NodeNotFound(id))
    }

    // --- Hierarchy ---

    /// Attaches `child` as the last child of `parent`, detaching it from its
    /// previous parent first.
    ///
    /// Fails with [`SceneError::CycleDetected`] if `child` is `parent` or one
    /// of its ancestors.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.get(parent)?;
        self.get(child)?;
        if child == self.root {
            return Err(SceneError::RootImmutable);
        }
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(SceneError::CycleDetected { parent, child });
            }
            cursor = self.get(id)?.parent;
        }

        self.detach(child)?;
        self.get_mut(parent)?.children.push(child);
        self.get_mut(child)?.parent = Some(parent);
        self.invalidate_world(child);
        Ok(())
    }

    /// Detaches `child` from `parent`. The child subtree stays alive, detached.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        if self.get(child)?.parent != Some(parent) {
            self.get(parent)?;
            return Err(SceneError::NotAChild { parent, child });
        }
        self.detach(child)
    }

    fn detach(&mut self, child: NodeId) -> Result<(), SceneError> {
        if let Some(parent) = self.get_mut(child)?.parent.take() {
            self.get_mut(parent)?.children.retain(|&c| c != child);
            self.invalidate_world(child);
        }
        Ok(())
    }

    /// Frees `id` and its whole subtree, dropping their components.
    ///
    /// Returns the number of nodes freed.
    pub fn despawn(&mut self, id: NodeId) -> Result<usize, SceneError> {
        if id == self.root {
            return Err(SceneError::RootImmutable);
        }
        self.detach(id)?;
        let mut stack = vec![id];
        let mut freed = 0;
        while let Some(current) = stack.pop() {
            let slot = &mut self.slots[current.index as usize];
            if let Some(node) = slot.node.take() {
                stack.extend(node.children);
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(current.index);
                freed += 1;
            }
        }
        log::trace!("Despawned {freed} node(s) starting at {id:?}");
        Ok(freed)
    }

    /// The parent of `id`.
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>, SceneError> {
        Ok(self.get(id)?.parent)
    }

    /// The children of `id`, in order.
    pub fn children(&self, id: NodeId) -> Result<&[NodeId], SceneError> {
        Ok(&self.get(id)?.children)
    }

    /// Returns `true` if `id` is reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == self.root {
                return true;
            }
            cursor = match self.get(current) {
                Ok(node) => node.parent,
                Err(_) => return false,
            };
        }
        false
    }

    // --- Enabled state ---

    /// Sets the node's own enabled flag. Disabling hides the whole subtree.
    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) -> Result<(), SceneError> {
        self.get_mut(id)?.enabled = enabled;
        Ok(())
    }

    /// Returns `true` if the node and all of its ancestors are enabled.
    pub fn is_enabled(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            match self.get(current) {
                Ok(node) if node.enabled => cursor = node.parent,
                _ => return false,
            }
        }
        true
    }

    // --- Transforms ---

    /// The local transform of `id`.
    pub fn transform(&self, id: NodeId) -> Result<Transform, SceneError> {
        Ok(self.get(id)?.transform)
    }

    /// Replaces the local transform of `id`.
    pub fn set_transform(&mut self, id: NodeId, transform: Transform) -> Result<(), SceneError> {
        self.get_mut(id)?.transform = transform;
        self.mark_local_dirty(id);
        Ok(())
    }

    /// Sets the local position of `id`.
    pub fn set_position(&mut self, id: NodeId, position: Vec3) -> Result<(), SceneError> {
        self.get_mut(id)?.transform.position = position;
        self.mark_local_dirty(id);
        Ok(())
    }

    /// Sets the local Euler rotation of `id`, in radians.
    pub fn set_rotation(&mut self, id: NodeId, rotation: Vec3) -> Result<(), SceneError> {
        self.get_mut(id)?.transform.rotation = rotation;
        self.mark_local_dirty(id);
        Ok(())
    }

    /// Sets the local scale of `id`.
    pub fn set_scale(&mut self, id: NodeId, scale: Vec3) -> Result<(), SceneError> {
        self.get_mut(id)?.transform.scale = scale;
        self.mark_local_dirty(id);
        Ok(())
    }

    /// Sets the local-to-parent matrix directly.
    ///
    /// The matrix is cached as given and decomposed into the transform fields.
    /// If two or more axes are collapsed no rotation can be recovered and the
    /// previous rotation is kept.
    pub fn set_local_matrix(&mut self, id: NodeId, m: Mat4) -> Result<(), SceneError> {
        let parts = decompose_trs(&m);
        let node = self.get_mut(id)?;
        node.transform.position = parts.translation;
        node.transform.scale = parts.scale;
        match parts.rotation {
            Some(rotation) => node.transform.rotation = rotation,
            None => log::debug!(
                "Node '{}' received a matrix with collapsed axes; keeping its rotation",
                node.name
            ),
        }
        node.local.set(Some(m));
        self.invalidate_world(id);
        Ok(())
    }

    /// Sets the parent-to-local matrix, the inverse of the local matrix.
    ///
    /// Singular matrices are ignored and logged.
    pub fn set_parent_to_local_matrix(&mut self, id: NodeId, m: Mat4) -> Result<(), SceneError> {
        match m.inverse() {
            Some(local) => self.set_local_matrix(id, local),
            None => {
                self.get(id)?;
                log::warn!("Ignoring singular parent-to-local matrix for {id:?}");
                Ok(())
            }
        }
    }

    /// The local-to-parent matrix of `id`.
    pub fn local_matrix(&self, id: NodeId) -> Result<Mat4, SceneError> {
        Ok(self.get(id)?.local_matrix())
    }

    /// The local-to-world matrix of `id`: the parent's world matrix times the
    /// local matrix. A node without a parent uses the identity.
    pub fn world_matrix(&self, id: NodeId) -> Result<Mat4, SceneError> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        let mut world = Mat4::IDENTITY;
        while let Some(current) = cursor {
            let node = self.get(current)?;
            if let Some(cached) = node.cached_world() {
                world = cached;
                break;
            }
            chain.push(node);
            cursor = node.parent;
        }
        for node in chain.into_iter().rev() {
            world = world * node.local_matrix();
            node.world.set(Some(world));
        }
        Ok(world)
    }

    /// The world-to-local matrix of `id`, or `None` if it is singular.
    pub fn world_to_local_matrix(&self, id: NodeId) -> Result<Option<Mat4>, SceneError> {
        Ok(self.world_matrix(id)?.inverse())
    }

    /// The local-to-world rotation of `id`, with scale and translation removed.
    pub fn world_rotation_matrix(&self, id: NodeId) -> Result<Mat4, SceneError> {
        let world = self.world_matrix(id)?;
        let axis = |i: usize| world.cols[i].truncate().try_normalize().unwrap_or(Vec3::ZERO);
        Ok(Mat4::from_basis(axis(0), axis(1), axis(2)))
    }

    /// The world-space position of `id`.
    pub fn world_position(&self, id: NodeId) -> Result<Vec3, SceneError> {
        Ok(self.world_matrix(id)?.translation())
    }

    /// Rotates `id` so its `-Z` axis faces `target`.
    ///
    /// `target` is expressed in the node's parent space, like its position.
    /// Without `up`, world `Y` is used, falling back to `Z` when the node would
    /// look straight up or down. An explicit `up` parallel to the view
    /// direction is rejected.
    pub fn look_at(&mut self, id: NodeId, target: Vec3, up: Option<Vec3>) -> Result<(), SceneError> {
        let position = self.get(id)?.transform.position;
        let forward = (target - position)
            .try_normalize()
            .ok_or(SceneError::LookAtTargetCoincident)?;
        let z = -forward;
        let x = match up {
            Some(up) => up
                .try_normalize()
                .and_then(|up| up.cross(z).try_normalize())
                .ok_or(SceneError::LookAtUpParallel)?,
            None => Vec3::Y
                .cross(z)
                .try_normalize()
                .or_else(|| Vec3::Z.cross(z).try_normalize())
                .ok_or(SceneError::LookAtUpParallel)?,
        };
        let y = z.cross(x);
        self.set_rotation(id, euler_from_basis(x, y, z))
    }

    fn mark_local_dirty(&self, id: NodeId) {
        if let Ok(node) = self.get(id) {
            node.local.set(None);
        }
        self.invalidate_world(id);
    }

    /// Marks the world matrix of `id` and of its descendants dirty.
    fn invalidate_world(&self, id: NodeId) {
        let mut stack = vec![id];
        let mut first = true;
        while let Some(current) = stack.pop() {
            let Ok(node) = self.get(current) else {
                continue;
            };
            // A dirty node has no clean descendants.
            if node.world.take().is_none() && !first {
                continue;
            }
            first = false;
            stack.extend_from_slice(&node.children);
        }
    }

    // --- Components ---

    /// Attaches `component`, returning the one of the same kind it replaced.
    pub fn add_component(
        &mut self,
        id: NodeId,
        component: impl Into<Component>,
    ) -> Result<Option<Component>, SceneError> {
        Ok(self.get_mut(id)?.components.insert(component.into()))
    }

    /// Detaches the component of the given kind.
    pub fn remove_component(
        &mut self,
        id: NodeId,
        kind: ComponentKind,
    ) -> Result<Option<Component>, SceneError> {
        Ok(self.get_mut(id)?.components.remove(kind))
    }

    /// Detaches every component of `id`.
    pub fn remove_all_components(&mut self, id: NodeId) -> Result<(), SceneError> {
        self.get_mut(id)?.components.clear();
        Ok(())
    }

    /// Returns `true` if `id` carries a component of the given kind.
    pub fn has_component(&self, id: NodeId, kind: ComponentKind) -> bool {
        self.get(id)
            .map(|node| node.components.contains(kind))
            .unwrap_or(false)
    }

    /// The camera attached to `id`, if any.
    pub fn camera(&self, id: NodeId) -> Option<&CameraComponent> {
        self.get(id).ok()?.components.camera.as_ref()
    }

    /// The camera attached to `id`, mutably.
    pub fn camera_mut(&mut self, id: NodeId) -> Option<&mut CameraComponent> {
        self.get_mut(id).ok()?.components.camera.as_mut()
    }

    /// The light attached to `id`, if any.
    pub fn light(&self, id: NodeId) -> Option<&LightComponent> {
        self.get(id).ok()?.components.light.as_ref()
    }

    /// The light attached to `id`, mutably.
    pub fn light_mut(&mut self, id: NodeId) -> Option<&mut LightComponent> {
        self.get_mut(id).ok()?.components.light.as_mut()
    }

    /// The mesh attached to `id`, if any.
    pub fn mesh(&self, id: NodeId) -> Option<&MeshComponent> {
        self.get(id).ok()?.components.mesh.as_ref()
    }

    /// The mesh attached to `id`, mutably.
    pub fn mesh_mut(&mut self, id: NodeId) -> Option<&mut MeshComponent> {
        self.get_mut(id).ok()?.components.mesh.as_mut()
    }

    // --- Traversal ---

    /// Visits the enabled part of the hierarchy depth-first, parents before
    /// children, children in order. Disabled subtrees are skipped.
    pub fn iter_enabled(&self) -> DepthFirst<'_> {
        DepthFirst {
            graph: self,
            stack: vec![self.root],
            skip_disabled: true,
        }
    }

    /// Visits `id` and all of its descendants depth-first, disabled ones included.
    pub fn iter_subtree(&self, id: NodeId) -> DepthFirst<'_> {
        DepthFirst {
            graph: self,
            stack: vec![id],
            skip_disabled: false,
        }
    }
}

/// A depth-first, pre-order walk over a [`SceneGraph`].
pub struct DepthFirst<'a> {
    graph: &'a SceneGraph,
    stack: Vec<NodeId>,
    skip_disabled: bool,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = (NodeId, &'a SceneNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            let Ok(node) = self.graph.get(id) else {
                continue;
            };
            if self.skip_disabled && !node.enabled {
                continue;
            }
            self.stack.extend(node.children.iter().rev());
            return Some((id, node));
        }
        None
    }
}
