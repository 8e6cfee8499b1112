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

//! Scene nodes and their local transforms.

use crate::components::ComponentSlots;
use lumen_core::math::{matrix_from_euler, Mat4, Vec3};
use std::cell::Cell;

/// A handle to a node in a [`SceneGraph`](super::SceneGraph).
///
/// It combines an arena index with a generation count. When a node is
/// despawned its index can be recycled, but the generation is incremented, so
/// stale handles to the old node are rejected instead of reaching the new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    /// The slot in the node arena.
    pub index: u32,
    /// Incremented each time the slot is recycled.
    pub generation: u32,
}

/// The position, rotation and scale of a node relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// The translation.
    pub position: Vec3,
    /// Euler angles in radians, applied X then Y then Z.
    pub rotation: Vec3,
    /// The per-axis scale.
    pub scale: Vec3,
}

impl Transform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    /// Creates a transform with only a translation.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// Calculates the local-to-parent matrix.
    ///
    /// The final matrix is calculated in the standard `Scale -> Rotate -> Translate` order.
    pub fn to_mat4(&self) -> Mat4 {
        // T * R * S
        Mat4::from_translation(self.position)
            * matrix_from_euler(self.rotation)
            * Mat4::from_scale(self.scale)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A node of the scene hierarchy.
///
/// Matrices are cached and recomputed on read. `None` in a cache marks it
/// dirty. A node whose world matrix is dirty never has a descendant with a
/// clean one.
#[derive(Debug)]
pub struct SceneNode {
    pub(crate) name: String,
    pub(crate) transform: Transform,
    pub(crate) local: Cell<Option<Mat4>>,
    pub(crate) world: Cell<Option<Mat4>>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) enabled: bool,
    pub(crate) components: ComponentSlots,
}

impl SceneNode {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::IDENTITY,
            local: Cell::new(None),
            world: Cell::new(None),
            parent: None,
            children: Vec::new(),
            enabled: true,
            components: ComponentSlots::default(),
        }
    }

    /// The node's debug name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The local transform.
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// The parent, or `None` for the root and for detached nodes.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// The children, in insertion order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The node's own enabled flag, ignoring its ancestors.
    pub fn is_self_enabled(&self) -> bool {
        self.enabled
    }

    /// The attached components.
    pub fn components(&self) -> &ComponentSlots {
        &self.components
    }

    /// The local-to-parent matrix, rebuilt from the transform if dirty.
    pub fn local_matrix(&self) -> Mat4 {
        match self.local.get() {
            Some(m) => m,
            None => {
                let m = self.transform.to_mat4();
                self.local.set(Some(m));
                m
            }
        }
    }

    pub(crate) fn cached_world(&self) -> Option<Mat4> {
        self.world.get()
    }
}
