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

//! GPU parameter blocks shared between the CPU and the shaders.
//!
//! Every block is `#[repr(C)]`, `Pod`, and a multiple of 16 bytes so it can be
//! copied verbatim into a uniform or storage buffer.

use bytemuck::{Pod, Zeroable};

/// Per-camera parameters, one block per camera per frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraParams {
    /// World-to-view matrix.
    pub view: [[f32; 4]; 4],
    /// View-to-clip matrix.
    pub projection: [[f32; 4]; 4],
    /// World-to-clip matrix.
    pub view_projection: [[f32; 4]; 4],
    /// View-to-world matrix.
    pub view_inverse: [[f32; 4]; 4],
    /// Clip-to-view matrix, used to rebuild positions from depth.
    pub projection_inverse: [[f32; 4]; 4],
    /// Camera-to-world rotation without translation, used for sky lookups.
    pub rotation: [[f32; 4]; 4],
    /// Camera position in world space (xyz), w unused.
    pub position: [f32; 4],
    /// Viewport: width, height, 1/width, 1/height.
    pub viewport: [f32; 4],
    /// x = near, y = far, z = exposure multiplier, w = EV100.
    pub clip_exposure: [f32; 4],
}

/// Per-instance material block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MaterialParams {
    /// Linear base color (rgb) and opacity (a).
    pub albedo: [f32; 4],
    /// Perceptual roughness in `[0, 1]`.
    pub roughness: f32,
    /// Metalness in `[0, 1]`.
    pub metallic: f32,
    /// Anisotropy strength in `[-1, 1]`; zero when anisotropy is disabled.
    pub anisotropy: f32,
    /// Occlusion strength in `[0, 1]`.
    pub occlusion_strength: f32,
}

impl Default for MaterialParams {
    fn default() -> Self {
        Self {
            albedo: [1.0, 1.0, 1.0, 1.0],
            roughness: 0.5,
            metallic: 0.0,
            anisotropy: 0.0,
            occlusion_strength: 1.0,
        }
    }
}

/// Per-instance parameters written by the draw-call batcher.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct InstanceParams {
    /// Local-to-world matrix.
    pub model: [[f32; 4]; 4],
    /// Inverse transpose of the model matrix, for normals.
    pub normal_matrix: [[f32; 4]; 4],
    /// The instance material.
    pub material: MaterialParams,
}

impl InstanceParams {
    /// Size of one instance block in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;
}

/// A light in the unified GPU layout used by both the directional and tiled passes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightParams {
    /// World position (xyz) and influence radius (w). Unused for directional lights.
    pub position_radius: [f32; 4],
    /// Normalized world direction (xyz) the light travels in, and light type (w).
    pub direction_type: [f32; 4],
    /// Linear color (rgb) and intensity (a).
    pub color_intensity: [f32; 4],
    /// x = bias, y = shadow near, z = shadow far, w = shadow slot or -1.
    pub shadow: [f32; 4],
    /// World-to-shadow-clip matrix.
    pub shadow_view_projection: [[f32; 4]; 4],
}

impl LightParams {
    /// Light type code for directional lights.
    pub const TYPE_DIRECTIONAL: f32 = 0.0;
    /// Light type code for point lights.
    pub const TYPE_POINT: f32 = 1.0;
    /// Size of one light block in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;
}

/// Frame-global lighting parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightGlobalParams {
    /// Ambient color (rgb) and ambient intensity (a).
    pub ambient: [f32; 4],
    /// Number of directional lights at the start of the light buffer.
    pub num_directional: u32,
    /// Number of point lights following the directional ones.
    pub num_point: u32,
    /// Tile edge in pixels.
    pub tile_size: u32,
    /// Maximum light indices stored per tile.
    pub max_lights_per_tile: u32,
    /// Tile grid width.
    pub tiles_x: u32,
    /// Tile grid height.
    pub tiles_y: u32,
    /// 1 when image-based lighting maps are bound.
    pub ibl_enabled: u32,
    /// IBL intensity multiplier.
    pub ibl_intensity: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn blocks_are_sixteen_byte_aligned() {
        assert_eq!(size_of::<CameraParams>() % 16, 0);
        assert_eq!(size_of::<MaterialParams>(), 32);
        assert_eq!(size_of::<InstanceParams>(), 160);
        assert_eq!(size_of::<LightParams>(), 128);
        assert_eq!(size_of::<LightGlobalParams>(), 48);
    }
}
