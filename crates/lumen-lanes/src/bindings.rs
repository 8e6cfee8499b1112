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

//! Buffer and texture binding slots shared by every pass and its shaders.

/// `CameraParams` of the view being rendered.
pub const CAMERA: u32 = 0;
/// The frame's `InstanceParams` array.
pub const INSTANCES: u32 = 1;
/// The frame's `LightParams` array, directional lights first.
pub const LIGHTS: u32 = 2;
/// `LightGlobalParams`.
pub const LIGHT_GLOBALS: u32 = 3;
/// Per-tile `(offset, count)` pairs.
pub const LIGHT_GRID: u32 = 4;
/// Per-tile light index lists.
pub const LIGHT_INDICES: u32 = 5;
/// Shadow cascade matrices, one per shadow pass at `SHADOW_CAMERA_STRIDE` spacing.
pub const SHADOW_CASCADES: u32 = 6;

/// First material texture slot, in `[albedo, normal, roughness, metallic, occlusion]` order.
pub const MATERIAL_TEXTURES: u32 = 0;

/// G-buffer albedo.
pub const GBUFFER_ALBEDO: u32 = 0;
/// G-buffer normals.
pub const GBUFFER_NORMAL: u32 = 1;
/// G-buffer roughness, metalness, occlusion and anisotropy.
pub const GBUFFER_SHADING: u32 = 2;
/// G-buffer tangents.
pub const GBUFFER_TANGENT: u32 = 3;
/// G-buffer depth.
pub const GBUFFER_DEPTH: u32 = 4;
/// The light accumulation target.
pub const LIGHTING: u32 = 5;
/// Ambient occlusion produced by post-processing.
pub const AMBIENT_OCCLUSION: u32 = 6;
/// Reflections produced by post-processing.
pub const REFLECTION: u32 = 7;
/// IBL irradiance.
pub const IBL_IRRADIANCE: u32 = 8;
/// IBL prefiltered specular.
pub const IBL_SPECULAR: u32 = 9;
/// IBL BRDF lookup.
pub const IBL_BRDF: u32 = 10;
/// First shadow map slot; light `i` with a shadow map reads slot `SHADOW_MAPS + i`.
pub const SHADOW_MAPS: u32 = 16;
