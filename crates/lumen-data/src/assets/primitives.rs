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

//! Procedural primitives uploaded straight to the device.

use super::mesh::{Mesh, Submesh, VertexLayout};
use bytemuck::{Pod, Zeroable};
use lumen_core::math::{Aabb, BoundingVolume, Vec3};
use lumen_core::renderer::api::{BufferDescriptor, BufferUsage, IndexFormat};
use lumen_core::renderer::{GraphicsDevice, ResourceError};
use std::borrow::Cow;

/// A vertex in the [`VertexLayout::standard`] layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct StandardVertex {
    /// Object-space position.
    pub position: [f32; 3],
    /// Object-space normal.
    pub normal: [f32; 3],
    /// Tangent and handedness.
    pub tangent: [f32; 4],
    /// Texture coordinates.
    pub uv: [f32; 2],
}

/// Builds the 24 vertices and 36 indices of an axis-aligned cube with edge `size`.
pub fn cube_geometry(size: f32) -> (Vec<StandardVertex>, Vec<u16>) {
    let h = size * 0.5;
    // (normal, tangent, bitangent) per face
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (-Vec3::X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (-Vec3::Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, -Vec3::X, Vec3::Y),
    ];
    let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, tangent, bitangent) in faces {
        let base = vertices.len() as u16;
        for (u, v) in corners {
            let p = (normal + tangent * u + bitangent * v) * h;
            vertices.push(StandardVertex {
                position: p.to_array(),
                normal: normal.to_array(),
                tangent: [tangent.x, tangent.y, tangent.z, 1.0],
                uv: [(u + 1.0) * 0.5, 1.0 - (v + 1.0) * 0.5],
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}

/// Creates a cube mesh of edge `size` centered at the origin.
pub fn create_cube(device: &dyn GraphicsDevice, size: f32) -> Result<Mesh, ResourceError> {
    let (vertices, indices) = cube_geometry(size);
    let vertex_bytes: &[u8] = bytemuck::cast_slice(&vertices);
    let index_bytes: &[u8] = bytemuck::cast_slice(&indices);

    let vertex_buffer = device.create_buffer(&BufferDescriptor {
        label: Some(Cow::Borrowed("Cube Vertices")),
        size: vertex_bytes.len() as u64,
        usage: BufferUsage::VERTEX | BufferUsage::COPY_DST,
    })?;
    device.write_buffer(vertex_buffer, 0, vertex_bytes)?;

    let index_buffer = device.create_buffer(&BufferDescriptor {
        label: Some(Cow::Borrowed("Cube Indices")),
        size: index_bytes.len() as u64,
        usage: BufferUsage::INDEX | BufferUsage::COPY_DST,
    })?;
    device.write_buffer(index_buffer, 0, index_bytes)?;

    let half = Vec3::splat(size * 0.5);
    Ok(Mesh::new(
        "Cube",
        vertex_buffer,
        vertices.len() as u32,
        VertexLayout::standard(),
        vec![Submesh {
            index_buffer,
            index_format: IndexFormat::Uint16,
            indices: 0..indices.len() as u32,
            bounds: BoundingVolume::Box(Aabb::from_center_half_extents(Vec3::ZERO, half)),
        }],
    ))
}
