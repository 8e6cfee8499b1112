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

//! The shading pass: combines lighting, ambient and IBL into the output target.

use super::gbuffer::{GBufferTargets, HDR_FORMAT};
use super::stage::{FrameStage, StageTracker, Targets};
use super::ViewBinding;
use crate::bindings;
use lumen_core::renderer::api::{
    BlendMode, BufferId, FunctionConstants, LoadOp, Operations, RenderPassColorAttachment,
    RenderPassDescriptor, RenderPipelineDescriptor, RenderPipelineId, StoreOp, TextureId,
};
use lumen_core::renderer::{CommandEncoder, GraphicsDevice, RenderError, ResourceError};
use lumen_data::scene::IblMaps;
use std::borrow::Cow;

/// What the shading pass samples besides the G-buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadingInputs {
    /// The view's `LightGlobalParams`.
    pub globals: (BufferId, u64),
    /// IBL maps, when all of them are up to date.
    pub ibl: Option<IblMaps>,
    /// Ambient occlusion written by post-processing before this pass.
    pub ambient_occlusion: Option<TextureId>,
    /// Reflections written by post-processing before this pass.
    pub reflection: Option<TextureId>,
    /// Clears the output first when set; otherwise earlier views are kept.
    pub clear_color: Option<[f32; 4]>,
}

/// Writes the final shaded image of a view.
#[derive(Debug)]
pub struct ShadingPass {
    pipeline: RenderPipelineId,
}

impl ShadingPass {
    /// Creates the shading pipeline.
    pub fn new(device: &dyn GraphicsDevice) -> Result<Self, ResourceError> {
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(Cow::Borrowed("Deferred Shading")),
            vertex_entry: Cow::Borrowed("fullscreen_vertex"),
            fragment_entry: Some(Cow::Borrowed("shading_fragment")),
            color_formats: vec![HDR_FORMAT],
            depth_format: None,
            blend: BlendMode::Replace,
            constants: FunctionConstants::empty(),
        })?;
        Ok(Self { pipeline })
    }

    /// Records the shading of one view.
    pub fn encode(
        &self,
        encoder: &mut dyn CommandEncoder,
        tracker: &mut StageTracker,
        targets: &GBufferTargets,
        view: ViewBinding,
        inputs: &ShadingInputs,
    ) -> Result<(), RenderError> {
        tracker.enter(FrameStage::Shading)?;
        let mut required = Targets::GBUFFER | Targets::LIGHTING;
        if inputs.ambient_occlusion.is_some() {
            required |= Targets::AMBIENT_OCCLUSION;
        }
        if inputs.reflection.is_some() {
            required |= Targets::REFLECTION;
        }
        tracker.require(FrameStage::Shading, required)?;

        let load = match inputs.clear_color {
            Some(color) => LoadOp::Clear(color),
            None => LoadOp::Load,
        };
        let color_attachments = [RenderPassColorAttachment {
            texture: targets.output,
            array_layer: 0,
            ops: Operations {
                load,
                store: StoreOp::Store,
            },
        }];
        let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("Deferred Shading"),
            color_attachments: &color_attachments,
            depth_attachment: None,
        });
        pass.set_pipeline(self.pipeline);
        pass.set_buffer(bindings::CAMERA, view.camera_buffer, view.camera_offset);
        pass.set_buffer(bindings::LIGHT_GLOBALS, inputs.globals.0, inputs.globals.1);
        pass.set_texture(bindings::GBUFFER_ALBEDO, targets.albedo);
        pass.set_texture(bindings::GBUFFER_NORMAL, targets.normal);
        pass.set_texture(bindings::GBUFFER_SHADING, targets.shading);
        pass.set_texture(bindings::GBUFFER_DEPTH, targets.depth);
        pass.set_texture(bindings::LIGHTING, targets.lighting);
        if let Some(ao) = inputs.ambient_occlusion {
            pass.set_texture(bindings::AMBIENT_OCCLUSION, ao);
        }
        if let Some(reflection) = inputs.reflection {
            pass.set_texture(bindings::REFLECTION, reflection);
        }
        if let Some(ibl) = inputs.ibl {
            pass.set_texture(bindings::IBL_IRRADIANCE, ibl.irradiance);
            pass.set_texture(bindings::IBL_SPECULAR, ibl.prefiltered_specular);
            pass.set_texture(bindings::IBL_BRDF, ibl.brdf_lookup);
        }
        pass.draw(0..3, 0..1);
        drop(pass);

        tracker.produce(Targets::OUTPUT);
        Ok(())
    }

    /// Frees the pipeline.
    pub fn destroy(self, device: &dyn GraphicsDevice) {
        if let Err(e) = device.destroy_render_pipeline(self.pipeline) {
            log::warn!("Failed to destroy shading pipeline: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::GBuffer;
    use lumen_core::renderer::api::{BufferDescriptor, BufferUsage};
    use lumen_infra::{HeadlessDevice, RecordedCommand};

    #[test]
    fn occlusion_must_be_produced_before_shading() {
        let device = HeadlessDevice::new();
        let shading = ShadingPass::new(&device).unwrap();
        let mut gbuffer = GBuffer::new();
        gbuffer.resize(&device, 32, 32).unwrap();
        let targets = *gbuffer.targets().unwrap();
        let globals = device
            .create_buffer(&BufferDescriptor {
                label: None,
                size: 256,
                usage: BufferUsage::UNIFORM,
            })
            .unwrap();
        let view = ViewBinding {
            camera_buffer: globals,
            camera_offset: 0,
        };
        let mut inputs = ShadingInputs {
            globals: (globals, 0),
            ibl: None,
            ambient_occlusion: Some(targets.albedo),
            reflection: None,
            clear_color: Some([0.1, 0.2, 0.3, 1.0]),
        };

        let mut tracker = StageTracker::new();
        tracker.produce(Targets::GBUFFER | Targets::LIGHTING);
        let mut encoder = device.create_command_encoder(None);
        let err = shading
            .encode(encoder.as_mut(), &mut tracker, &targets, view, &inputs)
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::OrderingViolation { target: "ambient occlusion", reader: "shading" }
        ));

        inputs.ambient_occlusion = None;
        shading
            .encode(encoder.as_mut(), &mut tracker, &targets, view, &inputs)
            .unwrap();
        let submission = device.submit_command_buffer(encoder.finish()).unwrap();
        let passes = device.submitted_passes(submission).unwrap();
        let output = &passes[0].color_attachments[0];
        assert_eq!(output.texture, targets.output);
        assert_eq!(output.ops.load, LoadOp::Clear([0.1, 0.2, 0.3, 1.0]));
        assert!(passes[0].commands.contains(&RecordedCommand::SetTexture {
            binding: bindings::LIGHTING,
            texture: targets.lighting,
        }));
    }
}
