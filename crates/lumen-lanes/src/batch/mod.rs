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

//! Draw-call batching and instancing.
//!
//! The batcher turns a frustum and a list of mesh nodes into a [`DrawCallList`]:
//! visible instances grouped by mesh and material class, each group owning a
//! contiguous range of the frame's instance buffer.
//!
//! Batching is two-phased. Every list built during a frame appends its
//! instance blocks to a CPU staging area, then [`DrawCallBatcher::upload`]
//! writes the staging area into the instance buffer of the frame slot once.
//! Lists therefore never reference a buffer that grows after they were built.

use ahash::AHashMap;
use lumen_core::math::Frustum;
use lumen_core::renderer::api::{BufferId, BufferUsage};
use lumen_core::renderer::params::InstanceParams;
use lumen_core::renderer::{GraphicsDevice, PerFrameBuffer, RenderPass, ResourceError};
use lumen_data::assets::{MaterialClass, Mesh};
use lumen_data::scene::{NodeId, Scene};
use std::ops::Range;
use std::sync::Arc;

/// Initial capacity of each instance buffer slot, in instances.
pub const INITIAL_INSTANCE_CAPACITY: u64 = 256;

/// One instanced draw: a mesh drawn with one material class over a contiguous
/// range of instance blocks.
#[derive(Debug, Clone)]
pub struct DrawCall {
    /// The shared geometry.
    pub mesh: Arc<Mesh>,
    /// Pipeline variant and bound textures shared by every instance.
    pub class: MaterialClass,
    /// The instance blocks, as indices into the frame's instance buffer.
    pub instances: Range<u32>,
}

impl DrawCall {
    /// The number of instances drawn.
    pub fn instance_count(&self) -> u32 {
        self.instances.len() as u32
    }

    /// Records one indexed draw per submesh, binding the mesh buffers first.
    ///
    /// The pipeline and the instance buffer must already be bound.
    pub fn encode(&self, pass: &mut dyn RenderPass<'_>) {
        pass.set_vertex_buffer(0, self.mesh.vertex_buffer, 0);
        for submesh in &self.mesh.submeshes {
            pass.set_index_buffer(submesh.index_buffer, 0, submesh.index_format);
            pass.draw_indexed(submesh.indices.clone(), 0, self.instances.clone());
        }
    }
}

/// The draw calls visible within one frustum, in first-seen order.
///
/// Immutable once built and valid for the frame slot it was built in only.
#[derive(Debug, Clone, Default)]
pub struct DrawCallList {
    frustum: Option<Frustum>,
    draw_calls: Vec<DrawCall>,
    nodes: Vec<NodeId>,
    base_instance: u32,
}

impl DrawCallList {
    /// The frustum the list was culled against.
    pub fn frustum(&self) -> Option<&Frustum> {
        self.frustum.as_ref()
    }

    /// The draw calls.
    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.draw_calls
    }

    /// Returns `true` if nothing is visible.
    pub fn is_empty(&self) -> bool {
        self.draw_calls.is_empty()
    }

    /// The total number of instances across all draw calls.
    pub fn instance_count(&self) -> u32 {
        self.nodes.len() as u32
    }

    /// The node behind instance `index` of the instance buffer.
    pub fn node_of_instance(&self, index: u32) -> Option<NodeId> {
        index
            .checked_sub(self.base_instance)
            .and_then(|i| self.nodes.get(i as usize))
            .copied()
    }

    /// The nodes of every instance, in instance-buffer order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }
}

struct Group {
    mesh: Arc<Mesh>,
    class: MaterialClass,
    members: Vec<(NodeId, InstanceParams)>,
}

/// Builds [`DrawCallList`]s and owns the per-frame instance buffers.
#[derive(Debug)]
pub struct DrawCallBatcher {
    instances: PerFrameBuffer,
    staging: Vec<InstanceParams>,
    slot: usize,
    anisotropy: bool,
}

impl DrawCallBatcher {
    /// Creates a batcher with one instance buffer per frame in flight.
    pub fn new(
        device: &dyn GraphicsDevice,
        frames_in_flight: usize,
        anisotropy: bool,
    ) -> Result<Self, ResourceError> {
        Ok(Self {
            instances: PerFrameBuffer::new(
                device,
                frames_in_flight,
                INITIAL_INSTANCE_CAPACITY * InstanceParams::SIZE,
                BufferUsage::STORAGE,
                "Instance Params",
            )?,
            staging: Vec::new(),
            slot: 0,
            anisotropy,
        })
    }

    /// Enables or disables anisotropic material variants.
    pub fn set_anisotropy(&mut self, enabled: bool) {
        self.anisotropy = enabled;
    }

    /// Starts a frame writing into `slot`. Lists from the previous frame become invalid.
    pub fn begin_frame(&mut self, slot: usize) {
        self.slot = slot;
        self.staging.clear();
    }

    /// The number of instances staged this frame.
    pub fn staged_instances(&self) -> u32 {
        self.staging.len() as u32
    }

    /// Culls `candidates` against `frustum` and groups the survivors.
    ///
    /// Candidates that are stale, detached, disabled, lack a drawable mesh or
    /// sit under a singular transform are dropped with a warning; the rest of
    /// the list is still built.
    pub fn batch(&mut self, scene: &Scene, frustum: &Frustum, candidates: &[NodeId]) -> DrawCallList {
        let graph = &scene.graph;
        let mut groups: Vec<Group> = Vec::new();
        let mut lookup: AHashMap<(usize, MaterialClass), usize> = AHashMap::new();

        for &id in candidates {
            let Some(component) = graph.mesh(id) else {
                log::warn!("Dropping draw for {id:?}: node or mesh component no longer exists");
                continue;
            };
            if !graph.is_attached(id) || !graph.is_enabled(id) {
                continue;
            }
            let Some(mesh) = component.mesh.as_ref() else {
                log::warn!("Dropping draw for {id:?}: mesh asset is not available");
                continue;
            };
            if !mesh.is_drawable() {
                log::warn!("Dropping draw for {id:?}: mesh '{}' is malformed", mesh.label);
                continue;
            }
            let Ok(world) = graph.world_matrix(id) else {
                continue;
            };
            if frustum.is_culled(&mesh.bounds.transformed(&world)) {
                continue;
            }
            let Some(params) = component.instance_params(&world, self.anisotropy) else {
                log::warn!("Dropping draw for {id:?}: world transform is singular");
                continue;
            };

            let class = component.material.class(self.anisotropy);
            let key = (Arc::as_ptr(mesh) as usize, class);
            let index = *lookup.entry(key).or_insert_with(|| {
                groups.push(Group {
                    mesh: Arc::clone(mesh),
                    class,
                    members: Vec::new(),
                });
                groups.len() - 1
            });
            groups[index].members.push((id, params));
        }

        let base_instance = self.staging.len() as u32;
        let mut draw_calls = Vec::with_capacity(groups.len());
        let mut nodes = Vec::new();
        for group in groups {
            let start = self.staging.len() as u32;
            for (id, params) in group.members {
                self.staging.push(params);
                nodes.push(id);
            }
            draw_calls.push(DrawCall {
                mesh: group.mesh,
                class: group.class,
                instances: start..self.staging.len() as u32,
            });
        }

        DrawCallList {
            frustum: Some(*frustum),
            draw_calls,
            nodes,
            base_instance,
        }
    }

    /// Writes every staged instance into the current slot's buffer.
    ///
    /// The slot buffer grows if needed; the caller must hold the slot's fence.
    pub fn upload(&mut self, device: &dyn GraphicsDevice) -> Result<BufferId, ResourceError> {
        if !self.staging.is_empty() {
            let bytes: &[u8] = bytemuck::cast_slice(&self.staging);
            if self
                .instances
                .ensure_capacity(device, self.slot, bytes.len() as u64)?
            {
                log::debug!(
                    "Instance buffer slot {} grew to {} bytes",
                    self.slot,
                    self.instances.capacity(self.slot)
                );
            }
            self.instances.write(device, self.slot, 0, bytes)?;
        }
        Ok(self.instances.buffer(self.slot))
    }

    /// The instance buffer of the current slot.
    pub fn instance_buffer(&self) -> BufferId {
        self.instances.buffer(self.slot)
    }

    /// Releases the instance buffers.
    pub fn destroy(self, device: &dyn GraphicsDevice) {
        self.instances.destroy(device);
    }
}
