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

//! Defines the light component.
//!
//! A light is placed by its node's world matrix: the translation is the light
//! position and the node's `-Z` axis is the direction the light travels in.

use lumen_core::config::ShadowConfig;
use lumen_core::math::{BoundingSphere, Frustum, Mat4, Vec3, FRAC_PI_2};
use lumen_core::renderer::params::LightParams;

/// The kind of light source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LightType {
    /// Infinitely distant light with parallel rays (sun-like).
    #[default]
    Directional,
    /// Omni-directional light with a finite influence radius.
    Point,
}

/// A light source attached to a scene node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightComponent {
    /// The kind of light.
    pub light_type: LightType,
    /// Linear RGB color.
    pub color: Vec3,
    /// Intensity multiplier.
    pub intensity: f32,
    /// Whether this light renders into a shadow map.
    pub cast_shadows: bool,
    /// Depth bias applied when comparing against the shadow map.
    pub shadow_bias: f32,
    /// Influence radius of point lights. Ignored for directional lights.
    pub radius: f32,
    /// Near plane of the shadow projection.
    pub shadow_near: f32,
    /// Far plane of the directional shadow projection.
    pub shadow_far: f32,
    /// Half-width of the directional shadow volume.
    pub shadow_extent: f32,
    /// Per-light shadow map resolution and cascade count, overriding the
    /// renderer defaults.
    pub shadow_settings: Option<ShadowConfig>,
}

impl Default for LightComponent {
    fn default() -> Self {
        Self {
            light_type: LightType::Directional,
            color: Vec3::ONE,
            intensity: 1.0,
            cast_shadows: false,
            shadow_bias: 0.005,
            radius: 10.0,
            shadow_near: 0.1,
            shadow_far: 100.0,
            shadow_extent: 20.0,
            shadow_settings: None,
        }
    }
}

impl LightComponent {
    /// Creates a directional light.
    pub fn directional(color: Vec3, intensity: f32) -> Self {
        Self {
            color,
            intensity,
            ..Self::default()
        }
    }

    /// Creates a point light reaching `radius` world units.
    pub fn point(color: Vec3, intensity: f32, radius: f32) -> Self {
        Self {
            light_type: LightType::Point,
            color,
            intensity,
            radius,
            ..Self::default()
        }
    }

    /// Enables shadow casting with the given depth bias.
    pub fn with_shadows(mut self, bias: f32) -> Self {
        self.cast_shadows = true;
        self.shadow_bias = bias;
        self
    }

    /// The normalized world direction the light travels in.
    pub fn direction(&self, world: &Mat4) -> Vec3 {
        world
            .transform_vector3(Vec3::NEG_Z)
            .try_normalize()
            .unwrap_or(Vec3::NEG_Z)
    }

    /// The far plane of the shadow projection.
    pub fn shadow_range(&self) -> f32 {
        match self.light_type {
            LightType::Directional => self.shadow_far,
            LightType::Point => self.radius,
        }
    }

    /// The world-to-light matrix.
    ///
    /// The up vector switches to `Z` when the light points almost straight up
    /// or down, so the basis never degenerates.
    pub fn view_matrix(&self, world: &Mat4) -> Option<Mat4> {
        let eye = world.translation();
        let direction = self.direction(world);
        let up = if direction.y.abs() > 0.99 { Vec3::Z } else { Vec3::Y };
        Mat4::look_at_rh(eye, eye + direction, up)
    }

    /// The shadow projection: orthographic for directional lights, a 90 degree
    /// perspective for point lights.
    pub fn projection_matrix(&self) -> Mat4 {
        match self.light_type {
            LightType::Directional => Mat4::orthographic_rh_zo(
                -self.shadow_extent,
                self.shadow_extent,
                -self.shadow_extent,
                self.shadow_extent,
                self.shadow_near,
                self.shadow_far,
            ),
            LightType::Point => Mat4::perspective_rh_zo(
                FRAC_PI_2,
                1.0,
                self.shadow_near,
                self.radius.max(self.shadow_near * 2.0),
            ),
        }
    }

    /// The world-to-shadow-clip matrix.
    pub fn view_projection(&self, world: &Mat4) -> Option<Mat4> {
        Some(self.projection_matrix() * self.view_matrix(world)?)
    }

    /// The shadow frustum in world space.
    pub fn frustum(&self, world: &Mat4) -> Option<Frustum> {
        Some(Frustum::from_view_projection(&self.view_projection(world)?))
    }

    /// The world-space volume a point light reaches; `None` for directional lights.
    pub fn influence_sphere(&self, world: &Mat4) -> Option<BoundingSphere> {
        match self.light_type {
            LightType::Directional => None,
            LightType::Point => Some(BoundingSphere::new(world.translation(), self.radius)),
        }
    }

    /// Builds the GPU parameter block.
    ///
    /// `shadow` carries the shadow map slot and its world-to-clip matrix when
    /// this light has a rendered shadow map.
    pub fn params(&self, world: &Mat4, shadow: Option<(u32, Mat4)>) -> LightParams {
        let position = world.translation();
        let direction = self.direction(world);
        let type_code = match self.light_type {
            LightType::Directional => LightParams::TYPE_DIRECTIONAL,
            LightType::Point => LightParams::TYPE_POINT,
        };
        let (slot, shadow_matrix) = match shadow {
            Some((slot, matrix)) => (slot as f32, matrix),
            None => (-1.0, Mat4::IDENTITY),
        };
        LightParams {
            position_radius: [position.x, position.y, position.z, self.radius],
            direction_type: [direction.x, direction.y, direction.z, type_code],
            color_intensity: [self.color.x, self.color.y, self.color.z, self.intensity],
            shadow: [self.shadow_bias, self.shadow_near, self.shadow_range(), slot],
            shadow_view_projection: shadow_matrix.to_cols_array_2d(),
        }
    }
}
