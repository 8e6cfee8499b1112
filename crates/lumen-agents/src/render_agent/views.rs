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

//! Extraction of the views rendered this frame.

use lumen_core::math::{Frustum, Mat4};
use lumen_core::renderer::params::CameraParams;
use lumen_data::scene::{NodeId, Scene};

/// The most cameras rendered in one frame.
pub const MAX_VIEWS: usize = 4;

/// One camera, resolved for the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderView {
    /// The camera node.
    pub camera: NodeId,
    /// The GPU camera block.
    pub params: CameraParams,
    /// World-to-clip matrix.
    pub view_projection: Mat4,
    /// The culling volume.
    pub frustum: Frustum,
    /// Near plane distance.
    pub near: f32,
    /// Far plane distance.
    pub far: f32,
}

/// Resolves `cameras` (already in priority order) against an `extent` in pixels.
///
/// The aspect ratio follows the extent. Cameras whose placement cannot be
/// inverted are skipped; cameras past [`MAX_VIEWS`] are ignored.
pub fn collect_views(scene: &Scene, cameras: &[NodeId], extent: (u32, u32)) -> Vec<RenderView> {
    if cameras.len() > MAX_VIEWS {
        log::warn!(
            "{} cameras enabled; only the first {MAX_VIEWS} by priority are rendered",
            cameras.len()
        );
    }
    let mut views = Vec::with_capacity(cameras.len().min(MAX_VIEWS));
    for &id in cameras.iter().take(MAX_VIEWS) {
        let Some(component) = scene.graph.camera(id) else {
            continue;
        };
        let mut camera = *component;
        camera.set_aspect_ratio(extent.0, extent.1);

        let world = match scene.graph.world_matrix(id) {
            Ok(world) => world,
            Err(e) => {
                log::warn!("Camera {id:?} skipped: {e}");
                continue;
            }
        };
        let (Some(params), Some(view_projection)) =
            (camera.params(&world, extent), camera.view_projection(&world))
        else {
            log::warn!("Camera {id:?} has a singular transform; skipped");
            continue;
        };
        views.push(RenderView {
            camera: id,
            params,
            view_projection,
            frustum: Frustum::from_view_projection(&view_projection),
            near: camera.z_near,
            far: camera.z_far,
        });
    }
    views
}
