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

//! Surface materials.
//!
//! A material has two halves: scalar parameters written per instance into the
//! instance buffer, and a [`MaterialClass`] (pipeline variant plus bound
//! textures) that decides which instances can share a draw call.

use lumen_core::renderer::api::{FunctionConstants, TextureId};
use lumen_core::renderer::params::MaterialParams;

/// A PBR metallic-roughness material.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Material {
    /// Per-instance scalar parameters.
    pub params: MaterialParams,
    /// Base color texture.
    pub albedo_map: Option<TextureId>,
    /// Tangent-space normal map.
    pub normal_map: Option<TextureId>,
    /// Roughness texture.
    pub roughness_map: Option<TextureId>,
    /// Metalness texture.
    pub metallic_map: Option<TextureId>,
    /// Baked occlusion texture.
    pub occlusion_map: Option<TextureId>,
    /// Enables anisotropic shading for this material.
    pub anisotropic: bool,
    /// Whether shadow maps darken this surface.
    pub receive_shadows: bool,
}

/// The part of a material that must match for two instances to share a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialClass {
    /// The pipeline variant.
    pub constants: FunctionConstants,
    /// Bound textures in `[albedo, normal, roughness, metallic, occlusion]` order.
    pub textures: [Option<TextureId>; 5],
}

impl Material {
    /// Creates an untextured material.
    pub fn new(albedo: [f32; 4], roughness: f32, metallic: f32) -> Self {
        Self {
            params: MaterialParams {
                albedo,
                roughness: roughness.clamp(0.0, 1.0),
                metallic: metallic.clamp(0.0, 1.0),
                ..MaterialParams::default()
            },
            receive_shadows: true,
            ..Self::default()
        }
    }

    /// The specialization flags this material selects.
    ///
    /// `anisotropy_allowed` is the renderer-wide switch; the material flag only
    /// takes effect when it is set.
    pub fn function_constants(&self, anisotropy_allowed: bool) -> FunctionConstants {
        let mut constants = FunctionConstants::empty();
        constants.set(FunctionConstants::HAS_ALBEDO_MAP, self.albedo_map.is_some());
        constants.set(FunctionConstants::HAS_NORMAL_MAP, self.normal_map.is_some());
        constants.set(
            FunctionConstants::HAS_ROUGHNESS_MAP,
            self.roughness_map.is_some(),
        );
        constants.set(
            FunctionConstants::HAS_METALLIC_MAP,
            self.metallic_map.is_some(),
        );
        constants.set(
            FunctionConstants::HAS_OCCLUSION_MAP,
            self.occlusion_map.is_some(),
        );
        constants.set(
            FunctionConstants::ANISOTROPIC,
            anisotropy_allowed && self.anisotropic,
        );
        constants.set(FunctionConstants::RECEIVE_SHADOWS, self.receive_shadows);
        constants
    }

    /// The batching class of this material.
    pub fn class(&self, anisotropy_allowed: bool) -> MaterialClass {
        MaterialClass {
            constants: self.function_constants(anisotropy_allowed),
            textures: [
                self.albedo_map,
                self.normal_map,
                self.roughness_map,
                self.metallic_map,
                self.occlusion_map,
            ],
        }
    }

    /// The parameters written into the instance buffer.
    pub fn instance_params(&self, anisotropy_allowed: bool) -> MaterialParams {
        let mut params = self.params;
        if !(anisotropy_allowed && self.anisotropic) {
            params.anisotropy = 0.0;
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_follow_bound_maps() {
        let material = Material {
            albedo_map: Some(TextureId(3)),
            normal_map: Some(TextureId(4)),
            ..Material::new([1.0; 4], 0.4, 0.0)
        };
        let constants = material.function_constants(true);
        assert!(constants.contains(
            FunctionConstants::HAS_ALBEDO_MAP
                | FunctionConstants::HAS_NORMAL_MAP
                | FunctionConstants::RECEIVE_SHADOWS
        ));
        assert!(!constants.contains(FunctionConstants::HAS_METALLIC_MAP));
    }

    #[test]
    fn anisotropy_needs_global_switch() {
        let mut material = Material::new([1.0; 4], 0.4, 1.0);
        material.anisotropic = true;
        material.params.anisotropy = 0.8;

        assert!(material
            .function_constants(true)
            .contains(FunctionConstants::ANISOTROPIC));
        assert!(!material
            .function_constants(false)
            .contains(FunctionConstants::ANISOTROPIC));
        assert_eq!(material.instance_params(false).anisotropy, 0.0);
        assert_eq!(material.instance_params(true).anisotropy, 0.8);
    }

    #[test]
    fn scalar_parameters_do_not_split_classes() {
        let a = Material::new([1.0, 0.0, 0.0, 1.0], 0.2, 0.0);
        let b = Material::new([0.0, 1.0, 0.0, 1.0], 0.9, 1.0);
        assert_eq!(a.class(true), b.class(true));
    }
}
