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

//! The immutable geometry contract consumed by the renderer.
//!
//! Meshes are produced by an external loader. The renderer only reads their
//! vertex layout, their submesh index ranges, and their bounding volumes.

use lumen_core::math::{Aabb, BoundingVolume};
use lumen_core::renderer::api::{BufferId, IndexFormat};
use std::ops::Range;

/// A per-vertex attribute a mesh may provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttribute {
    /// `vec3<f32>` object-space position.
    Position,
    /// `vec3<f32>` object-space normal.
    Normal,
    /// `vec4<f32>` tangent with handedness in `w`.
    Tangent,
    /// `vec2<f32>` texture coordinates.
    TexCoord0,
}

impl VertexAttribute {
    /// Size of the attribute in bytes.
    pub const fn size(&self) -> u32 {
        match self {
            VertexAttribute::Position | VertexAttribute::Normal => 12,
            VertexAttribute::Tangent => 16,
            VertexAttribute::TexCoord0 => 8,
        }
    }
}

/// The interleaved layout of a mesh vertex buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    /// Attributes with their byte offsets, in buffer order.
    pub attributes: Vec<(VertexAttribute, u32)>,
    /// Distance in bytes between consecutive vertices.
    pub stride: u32,
}

impl VertexLayout {
    /// Packs `attributes` tightly in the given order.
    pub fn packed(attributes: &[VertexAttribute]) -> Self {
        let mut offset = 0;
        let attributes = attributes
            .iter()
            .map(|&attribute| {
                let entry = (attribute, offset);
                offset += attribute.size();
                entry
            })
            .collect();
        Self {
            attributes,
            stride: offset,
        }
    }

    /// Position, normal, tangent and one UV set.
    pub fn standard() -> Self {
        Self::packed(&[
            VertexAttribute::Position,
            VertexAttribute::Normal,
            VertexAttribute::Tangent,
            VertexAttribute::TexCoord0,
        ])
    }

    /// Returns the byte offset of `attribute`, if present.
    pub fn offset_of(&self, attribute: VertexAttribute) -> Option<u32> {
        self.attributes
            .iter()
            .find(|(a, _)| *a == attribute)
            .map(|(_, offset)| *offset)
    }

    /// Returns `true` if the layout provides `attribute`.
    pub fn has(&self, attribute: VertexAttribute) -> bool {
        self.offset_of(attribute).is_some()
    }
}

/// A contiguous index range of a mesh drawn with one material.
#[derive(Debug, Clone, PartialEq)]
pub struct Submesh {
    /// The index buffer.
    pub index_buffer: BufferId,
    /// Width of each index.
    pub index_format: IndexFormat,
    /// The range of indices to draw.
    pub indices: Range<u32>,
    /// Object-space bounds of this submesh.
    pub bounds: BoundingVolume,
}

impl Submesh {
    /// The number of indices drawn.
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

/// Immutable, shareable geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    /// A debug label.
    pub label: String,
    /// The interleaved vertex buffer.
    pub vertex_buffer: BufferId,
    /// Number of vertices in the buffer.
    pub vertex_count: u32,
    /// How the vertex buffer is laid out.
    pub layout: VertexLayout,
    /// Submeshes, drawn in order.
    pub submeshes: Vec<Submesh>,
    /// Object-space bounds enclosing every submesh.
    pub bounds: BoundingVolume,
}

impl Mesh {
    /// Creates a mesh whose bounds enclose all of its submeshes.
    ///
    /// A mesh without submeshes gets empty bounds at the origin.
    pub fn new(
        label: impl Into<String>,
        vertex_buffer: BufferId,
        vertex_count: u32,
        layout: VertexLayout,
        submeshes: Vec<Submesh>,
    ) -> Self {
        let bounds = Aabb::from_points(
            submeshes
                .iter()
                .flat_map(|s| s.bounds.to_aabb().corners()),
        )
        .unwrap_or_else(|| Aabb::from_min_max(Default::default(), Default::default()));
        Self {
            label: label.into(),
            vertex_buffer,
            vertex_count,
            layout,
            submeshes,
            bounds: BoundingVolume::Box(bounds),
        }
    }

    /// Returns `true` if the mesh can produce at least one draw.
    ///
    /// A mesh without positions, submeshes or indices is malformed and is
    /// skipped by the batcher.
    pub fn is_drawable(&self) -> bool {
        self.layout.has(VertexAttribute::Position)
            && self.vertex_count > 0
            && !self.submeshes.is_empty()
            && self.submeshes.iter().all(|s| s.index_count() > 0)
    }
}
