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

use crate::assets::{Material, Mesh};
use lumen_core::math::{BoundingVolume, Mat4};
use lumen_core::renderer::params::InstanceParams;
use std::sync::Arc;

/// Attaches shared geometry and a per-instance material to a node.
///
/// Many components may reference the same [`Mesh`]; it lives as long as the
/// longest-lived reference.
#[derive(Debug, Clone, Default)]
pub struct MeshComponent {
    /// The geometry, or `None` while the asset is not available.
    pub mesh: Option<Arc<Mesh>>,
    /// The material of this instance.
    pub material: Material,
}

impl MeshComponent {
    /// Creates a component referencing `mesh`.
    pub fn new(mesh: Arc<Mesh>, material: Material) -> Self {
        Self {
            mesh: Some(mesh),
            material,
        }
    }

    /// The mesh bounds re-expressed in world space.
    pub fn world_bounds(&self, world: &Mat4) -> Option<BoundingVolume> {
        self.mesh.as_ref().map(|mesh| mesh.bounds.transformed(world))
    }

    /// Builds the per-instance GPU block: model matrix, normal matrix and material.
    ///
    /// Returns `None` if `world` is singular, since no normal matrix exists.
    pub fn instance_params(&self, world: &Mat4, anisotropy_allowed: bool) -> Option<InstanceParams> {
        let normal_matrix = world.inverse()?.transpose();
        Some(InstanceParams {
            model: world.to_cols_array_2d(),
            normal_matrix: normal_matrix.to_cols_array_2d(),
            material: self.material.instance_params(anisotropy_allowed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::VertexLayout;
    use lumen_core::math::{Aabb, Vec3};
    use lumen_core::renderer::api::BufferId;

    fn unit_mesh() -> Arc<Mesh> {
        Arc::new(Mesh {
            label: "unit".into(),
            vertex_buffer: BufferId(0),
            vertex_count: 8,
            layout: VertexLayout::standard(),
            submeshes: Vec::new(),
            bounds: BoundingVolume::Box(Aabb::from_min_max(Vec3::splat(-0.5), Vec3::splat(0.5))),
        })
    }

    #[test]
    fn world_bounds_follow_the_node() {
        let component = MeshComponent::new(unit_mesh(), Material::default());
        let world = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        let bounds = component.world_bounds(&world).unwrap();
        assert_eq!(bounds.center(), Vec3::new(0.0, 0.0, -5.0));
        assert!(MeshComponent::default().world_bounds(&world).is_none());
    }

    #[test]
    fn singular_world_has_no_instance_block() {
        let component = MeshComponent::new(unit_mesh(), Material::default());
        assert!(component
            .instance_params(&Mat4::from_scale(Vec3::ZERO), true)
            .is_none());
        let params = component.instance_params(&Mat4::IDENTITY, true).unwrap();
        assert_eq!(params.normal_matrix, Mat4::IDENTITY.to_cols_array_2d());
    }
}
