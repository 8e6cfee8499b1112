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

//! The geometry prepass.
//!
//! Each material class selects a pipeline variant through its function
//! constants. Variants are created when a class is first seen and cached.

use super::gbuffer::{GBufferTargets, DEPTH_FORMAT, PREPASS_COLOR_FORMATS};
use super::stage::{FrameStage, StageTracker, Targets};
use super::ViewBinding;
use crate::batch::DrawCallList;
use crate::bindings;
use ahash::AHashMap;
use lumen_core::renderer::api::{
    BlendMode, BufferId, FunctionConstants, Operations, RenderPassColorAttachment,
    RenderPassDepthAttachment, RenderPassDescriptor, RenderPipelineDescriptor, RenderPipelineId,
};
use lumen_core::renderer::{CommandEncoder, GraphicsDevice, RenderError, ResourceError};
use std::borrow::Cow;

/// Renders draw calls into the G-buffer.
#[derive(Debug, Default)]
pub struct Prepass {
    pipelines: AHashMap<FunctionConstants, RenderPipelineId>,
}

impl Prepass {
    /// Creates a prepass with no compiled variant.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of cached pipeline variants.
    pub fn variant_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Returns the pipeline for `constants`, creating it on first use.
    pub fn pipeline_for(
        &mut self,
        device: &dyn GraphicsDevice,
        constants: FunctionConstants,
    ) -> Result<RenderPipelineId, ResourceError> {
        if let Some(pipeline) = self.pipelines.get(&constants) {
            return Ok(*pipeline);
        }
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(Cow::Owned(format!("GBuffer Prepass {:#x}", constants.bits()))),
            vertex_entry: Cow::Borrowed("gbuffer_vertex"),
            fragment_entry: Some(Cow::Borrowed("gbuffer_fragment")),
            color_formats: PREPASS_COLOR_FORMATS.to_vec(),
            depth_format: Some(DEPTH_FORMAT),
            blend: BlendMode::Replace,
            constants,
        })?;
        log::debug!("Created prepass variant {constants:?}");
        self.pipelines.insert(constants, pipeline);
        Ok(pipeline)
    }

    /// Creates every variant `list` needs. Must run before [`Prepass::encode`].
    pub fn prepare(
        &mut self,
        device: &dyn GraphicsDevice,
        list: &DrawCallList,
    ) -> Result<(), ResourceError> {
        for draw in list.draw_calls() {
            self.pipeline_for(device, draw.class.constants)?;
        }
        Ok(())
    }

    /// Records the prepass of one view.
    ///
    /// Draws are grouped by pipeline variant; the order within a variant
    /// follows the list.
    pub fn encode(
        &self,
        encoder: &mut dyn CommandEncoder,
        tracker: &mut StageTracker,
        targets: &GBufferTargets,
        view: ViewBinding,
        instances: BufferId,
        list: &DrawCallList,
    ) -> Result<(), RenderError> {
        tracker.enter(FrameStage::Prepass)?;

        let mut order: Vec<usize> = (0..list.draw_calls().len()).collect();
        order.sort_by_key(|&i| list.draw_calls()[i].class.constants.bits());

        let clear = Operations::clear([0.0; 4]);
        let color_attachments = [targets.albedo, targets.normal, targets.shading, targets.tangent]
            .map(|texture| RenderPassColorAttachment {
                texture,
                array_layer: 0,
                ops: clear,
            });
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("GBuffer Prepass"),
            color_attachments: &color_attachments,
            depth_attachment: Some(RenderPassDepthAttachment {
                texture: targets.depth,
                array_layer: 0,
                depth_ops: Operations::clear(1.0),
            }),
        });
        pass.set_buffer(bindings::CAMERA, view.camera_buffer, view.camera_offset);
        pass.set_buffer(bindings::INSTANCES, instances, 0);

        let mut bound: Option<RenderPipelineId> = None;
        for i in order {
            let draw = &list.draw_calls()[i];
            let pipeline = *self
                .pipelines
                .get(&draw.class.constants)
                .ok_or_else(|| {
                    RenderError::Internal(format!(
                        "prepass variant {:?} was not prepared",
                        draw.class.constants
                    ))
                })?;
            if bound != Some(pipeline) {
                pass.set_pipeline(pipeline);
                bound = Some(pipeline);
            }
            for (slot, texture) in draw.class.textures.iter().enumerate() {
                if let Some(texture) = texture {
                    pass.set_texture(bindings::MATERIAL_TEXTURES + slot as u32, *texture);
                }
            }
            draw.encode(pass.as_mut());
        }
        drop(pass);

        tracker.produce(Targets::GBUFFER);
        Ok(())
    }

    /// Frees every cached variant.
    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        for (_, pipeline) in self.pipelines.drain() {
            if let Err(e) = device.destroy_render_pipeline(pipeline) {
                log::warn!("Failed to destroy prepass pipeline: {e}");
            }
        }
    }
}
