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

use lumen_core::math::{Frustum, Mat4};
use lumen_core::renderer::params::CameraParams;

/// Defines the type of camera projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectionType {
    /// Perspective projection with field of view.
    Perspective {
        /// The vertical field of view in radians.
        fov_y_radians: f32,
    },
    /// Orthographic projection; the width follows from the aspect ratio.
    Orthographic {
        /// The height of the orthographic view volume.
        height: f32,
    },
}

/// Physical camera settings used to derive exposure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exposure {
    /// Relative aperture (f-number).
    pub f_stop: f32,
    /// Shutter time in seconds.
    pub shutter_speed: f32,
    /// Sensor sensitivity.
    pub iso: f32,
}

impl Default for Exposure {
    /// f/1, one second, ISO 100: EV100 of zero.
    fn default() -> Self {
        Self {
            f_stop: 1.0,
            shutter_speed: 1.0,
            iso: 100.0,
        }
    }
}

impl Exposure {
    /// The exposure value at ISO 100, `log2(N² / t · 100 / ISO)`.
    pub fn ev100(&self) -> f32 {
        (self.f_stop * self.f_stop / self.shutter_speed * 100.0 / self.iso).log2()
    }

    /// The scale applied to scene luminance before tone mapping.
    pub fn multiplier(&self) -> f32 {
        1.0 / (1.2 * self.ev100().exp2())
    }
}

/// A camera attached to a scene node.
///
/// The node's world matrix places the camera; the camera looks down its local
/// `-Z` axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraComponent {
    /// The type of projection (perspective or orthographic).
    pub projection: ProjectionType,

    /// The aspect ratio of the viewport (width / height).
    pub aspect_ratio: f32,

    /// The distance to the near clipping plane.
    pub z_near: f32,

    /// The distance to the far clipping plane.
    pub z_far: f32,

    /// Render order among cameras: higher priority renders first.
    pub priority: u32,

    /// Exposure settings.
    pub exposure: Exposure,
}

impl CameraComponent {
    /// Creates a new perspective camera with the given parameters.
    pub fn new_perspective(fov_y_radians: f32, aspect_ratio: f32, z_near: f32, z_far: f32) -> Self {
        Self {
            projection: ProjectionType::Perspective { fov_y_radians },
            aspect_ratio,
            z_near,
            z_far,
            priority: 0,
            exposure: Exposure::default(),
        }
    }

    /// Creates a new orthographic camera with the given parameters.
    pub fn new_orthographic(height: f32, aspect_ratio: f32, z_near: f32, z_far: f32) -> Self {
        Self {
            projection: ProjectionType::Orthographic { height },
            ..Self::new_perspective(0.0, aspect_ratio, z_near, z_far)
        }
    }

    /// Creates a 60 degree, 16:9 perspective camera clipping at 0.1 and 1000.
    pub fn default_perspective() -> Self {
        Self::new_perspective(60.0_f32.to_radians(), 16.0 / 9.0, 0.1, 1000.0)
    }

    /// Sets the render priority.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Calculates the projection matrix for this camera.
    ///
    /// This uses a right-handed coordinate system with a [0, 1] depth range.
    pub fn projection_matrix(&self) -> Mat4 {
        match self.projection {
            ProjectionType::Perspective { fov_y_radians } => {
                Mat4::perspective_rh_zo(fov_y_radians, self.aspect_ratio, self.z_near, self.z_far)
            }
            ProjectionType::Orthographic { height } => {
                let half_height = height / 2.0;
                let half_width = half_height * self.aspect_ratio;
                Mat4::orthographic_rh_zo(
                    -half_width,
                    half_width,
                    -half_height,
                    half_height,
                    self.z_near,
                    self.z_far,
                )
            }
        }
    }

    /// The clip-to-view matrix, or `None` for a degenerate projection.
    pub fn projection_inverse(&self) -> Option<Mat4> {
        self.projection_matrix().inverse()
    }

    /// Updates the aspect ratio, typically called when the viewport is resized.
    pub fn set_aspect_ratio(&mut self, width: u32, height: u32) {
        if height > 0 {
            self.aspect_ratio = width as f32 / height as f32;
        }
    }

    /// The world-to-view matrix for a camera placed by `world`.
    pub fn view_matrix(&self, world: &Mat4) -> Option<Mat4> {
        world.inverse()
    }

    /// The world-to-clip matrix for a camera placed by `world`.
    pub fn view_projection(&self, world: &Mat4) -> Option<Mat4> {
        Some(self.projection_matrix() * self.view_matrix(world)?)
    }

    /// The world-space frustum for a camera placed by `world`.
    pub fn frustum(&self, world: &Mat4) -> Option<Frustum> {
        Some(Frustum::from_view_projection(&self.view_projection(world)?))
    }

    /// Builds the GPU parameter block for a camera placed by `world`.
    ///
    /// Returns `None` if the world or projection matrix is singular.
    pub fn params(&self, world: &Mat4, viewport: (u32, u32)) -> Option<CameraParams> {
        let view = self.view_matrix(world)?;
        let projection = self.projection_matrix();
        let projection_inverse = projection.inverse()?;
        let (w, h) = (viewport.0.max(1) as f32, viewport.1.max(1) as f32);
        let position = world.translation();
        Some(CameraParams {
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            view_projection: (projection * view).to_cols_array_2d(),
            view_inverse: world.to_cols_array_2d(),
            projection_inverse: projection_inverse.to_cols_array_2d(),
            rotation: world.without_translation().to_cols_array_2d(),
            position: [position.x, position.y, position.z, 1.0],
            viewport: [w, h, 1.0 / w, 1.0 / h],
            clip_exposure: [
                self.z_near,
                self.z_far,
                self.exposure.multiplier(),
                self.exposure.ev100(),
            ],
        })
    }
}

impl Default for CameraComponent {
    fn default() -> Self {
        Self::default_perspective()
    }
}
