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

//! Light gathering and the light accumulation pass.

use super::gbuffer::{GBufferTargets, HDR_FORMAT};
use super::stage::{FrameStage, StageTracker, Targets};
use super::ViewBinding;
use crate::bindings;
use crate::shadow::ShadowManager;
use lumen_core::math::BoundingSphere;
use lumen_core::renderer::api::{
    BlendMode, BufferId, FunctionConstants, Operations, RenderPassColorAttachment,
    RenderPassDescriptor, RenderPipelineDescriptor, RenderPipelineId, TextureId,
};
use lumen_core::renderer::params::{LightGlobalParams, LightParams};
use lumen_core::renderer::tiled::TileConfig;
use lumen_core::renderer::{CommandEncoder, GraphicsDevice, RenderError, ResourceError};
use lumen_data::components::LightType;
use lumen_data::scene::{LightGlobals, NodeId, Scene};
use std::borrow::Cow;

/// The light buffer contents of one frame: directional lights, then point lights.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameLights {
    /// One block per light.
    pub params: Vec<LightParams>,
    /// Directional lights at the start of `params`.
    pub num_directional: u32,
    /// Point lights following them.
    pub num_point: u32,
    /// Influence spheres of the point lights, keyed by their index in `params`.
    pub point_spheres: Vec<(u32, BoundingSphere)>,
}

impl FrameLights {
    /// Builds the light blocks of `lights`, attaching the shadow data the
    /// shadow manager prepared this frame.
    pub fn gather(scene: &Scene, lights: &[NodeId], shadows: &ShadowManager) -> Self {
        let mut frame = Self::default();
        for pass in [LightType::Directional, LightType::Point] {
            for &id in lights {
                let Some(light) = scene.graph.light(id) else {
                    continue;
                };
                if light.light_type != pass {
                    continue;
                }
                let Ok(world) = scene.graph.world_matrix(id) else {
                    continue;
                };
                let index = frame.params.len() as u32;
                frame.params.push(light.params(&world, shadows.shadow_for(id)));
                match light.influence_sphere(&world) {
                    Some(sphere) => {
                        frame.point_spheres.push((index, sphere));
                        frame.num_point += 1;
                    }
                    None => frame.num_directional += 1,
                }
            }
        }
        frame
    }

    /// Returns `true` if no light contributes.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Builds the frame-global lighting block.
pub fn light_global_params(
    globals: &LightGlobals,
    ibl_bound: bool,
    tiles: &TileConfig,
    viewport: (u32, u32),
    lights: &FrameLights,
) -> LightGlobalParams {
    let (tiles_x, tiles_y) = tiles.tile_dimensions(viewport.0, viewport.1);
    let ambient = globals.ambient_color;
    LightGlobalParams {
        ambient: [ambient.x, ambient.y, ambient.z, globals.ambient_intensity],
        num_directional: lights.num_directional,
        num_point: lights.num_point,
        tile_size: tiles.tile_size.pixels(),
        max_lights_per_tile: tiles.max_lights_per_tile,
        tiles_x,
        tiles_y,
        ibl_enabled: ibl_bound as u32,
        ibl_intensity: globals.ibl_intensity,
    }
}

/// The buffers the light accumulation pass reads, as `(buffer, offset)`.
#[derive(Debug, Clone, Copy)]
pub struct LightingInputs<'a> {
    /// The frame's light blocks.
    pub lights: BufferId,
    /// The view's `LightGlobalParams`.
    pub globals: (BufferId, u64),
    /// The view's tile grid.
    pub light_grid: (BufferId, u64),
    /// The view's tile light lists.
    pub light_indices: (BufferId, u64),
    /// Shadow cascade matrices.
    pub shadow_cascades: BufferId,
    /// Shadow maps in shadow slot order.
    pub shadow_maps: &'a [TextureId],
    /// Directional light count.
    pub num_directional: u32,
    /// Point light count.
    pub num_point: u32,
}

/// Accumulates light contributions into the lighting target.
#[derive(Debug)]
pub struct LightAccumulationPass {
    directional: RenderPipelineId,
    tiled: RenderPipelineId,
}

impl LightAccumulationPass {
    /// Creates the directional and tiled pipelines.
    pub fn new(device: &dyn GraphicsDevice) -> Result<Self, ResourceError> {
        let create = |label: &'static str, fragment: &'static str| {
            device.create_render_pipeline(&RenderPipelineDescriptor {
                label: Some(Cow::Borrowed(label)),
                vertex_entry: Cow::Borrowed("fullscreen_vertex"),
                fragment_entry: Some(Cow::Borrowed(fragment)),
                color_formats: vec![HDR_FORMAT],
                depth_format: None,
                blend: BlendMode::Additive,
                constants: FunctionConstants::empty(),
            })
        };
        let directional = create("Directional Light Accumulation", "directional_light_fragment")?;
        let tiled = match create("Tiled Light Accumulation", "tiled_light_fragment") {
            Ok(tiled) => tiled,
            Err(e) => {
                let _ = device.destroy_render_pipeline(directional);
                return Err(e);
            }
        };
        Ok(Self { directional, tiled })
    }

    /// Records the light accumulation of one view.
    ///
    /// Directional lights are drawn as one fullscreen instance each. Point
    /// lights are drawn in a single fullscreen pass that walks the per-tile lists.
    pub fn encode(
        &self,
        encoder: &mut dyn CommandEncoder,
        tracker: &mut StageTracker,
        targets: &GBufferTargets,
        view: ViewBinding,
        inputs: &LightingInputs<'_>,
    ) -> Result<(), RenderError> {
        tracker.enter(FrameStage::LightAccumulation)?;
        tracker.require(FrameStage::LightAccumulation, Targets::GBUFFER)?;
        if !inputs.shadow_maps.is_empty() {
            tracker.require(FrameStage::LightAccumulation, Targets::SHADOW_MAPS)?;
        }

        let color_attachments = [RenderPassColorAttachment {
            texture: targets.lighting,
            array_layer: 0,
            ops: Operations::clear([0.0; 4]),
        }];
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Light Accumulation"),
            color_attachments: &color_attachments,
            depth_attachment: None,
        });
        pass.set_buffer(bindings::CAMERA, view.camera_buffer, view.camera_offset);
        pass.set_buffer(bindings::LIGHTS, inputs.lights, 0);
        pass.set_buffer(bindings::LIGHT_GLOBALS, inputs.globals.0, inputs.globals.1);
        pass.set_texture(bindings::GBUFFER_ALBEDO, targets.albedo);
        pass.set_texture(bindings::GBUFFER_NORMAL, targets.normal);
        pass.set_texture(bindings::GBUFFER_SHADING, targets.shading);
        pass.set_texture(bindings::GBUFFER_TANGENT, targets.tangent);
        pass.set_texture(bindings::GBUFFER_DEPTH, targets.depth);
        if !inputs.shadow_maps.is_empty() {
            pass.set_buffer(bindings::SHADOW_CASCADES, inputs.shadow_cascades, 0);
            for (slot, texture) in inputs.shadow_maps.iter().enumerate() {
                pass.set_texture(bindings::SHADOW_MAPS + slot as u32, *texture);
            }
        }

        if inputs.num_directional > 0 {
            pass.set_pipeline(self.directional);
            pass.draw(0..3, 0..inputs.num_directional);
        }
        if inputs.num_point > 0 {
            pass.set_pipeline(self.tiled);
            pass.set_buffer(bindings::LIGHT_GRID, inputs.light_grid.0, inputs.light_grid.1);
            pass.set_buffer(
                bindings::LIGHT_INDICES,
                inputs.light_indices.0,
                inputs.light_indices.1,
            );
            pass.draw(0..3, 0..1);
        }
        drop(pass);

        tracker.produce(Targets::LIGHTING);
        Ok(())
    }

    /// Frees both pipelines.
    pub fn destroy(self, device: &dyn GraphicsDevice) {
        for pipeline in [self.directional, self.tiled] {
            if let Err(e) = device.destroy_render_pipeline(pipeline) {
                log::warn!("Failed to destroy light accumulation pipeline: {e}");
            }
        }
    }
}
