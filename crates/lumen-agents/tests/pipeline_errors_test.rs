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

mod common;

use common::{cube_scene, renderer, VIEWPORT};
use lumen_agents::{FrameOutcome, SceneRenderer};
use lumen_core::config::AllocationFallback;
use lumen_core::renderer::api::{
    Extent3D, Operations, RenderPassColorAttachment, RenderPassDescriptor, TextureDescriptor,
    TextureFormat, TextureId, TextureUsage,
};
use lumen_core::renderer::{GraphicsDevice, RenderError, ResourceError};
use lumen_core::RenderConfig;
use lumen_infra::HeadlessDevice;
use lumen_lanes::deferred::Targets;
use lumen_lanes::{PostProcessContext, PostProcessLayer};
use std::borrow::Cow;
use std::sync::Arc;

/// An occlusion effect that renders into a cached texture.
struct Occlusion {
    order: u32,
    texture: Option<TextureId>,
}

impl PostProcessLayer for Occlusion {
    fn name(&self) -> &str {
        "occlusion"
    }

    fn rendering_order(&self) -> u32 {
        self.order
    }

    fn reads(&self) -> Targets {
        Targets::DEPTH | Targets::NORMAL
    }

    fn provides(&self) -> Targets {
        Targets::AMBIENT_OCCLUSION
    }

    fn output(&self, target: Targets) -> Option<TextureId> {
        if target == Targets::AMBIENT_OCCLUSION {
            self.texture
        } else {
            None
        }
    }

    fn resize(
        &mut self,
        device: &dyn GraphicsDevice,
        width: u32,
        height: u32,
    ) -> Result<(), ResourceError> {
        if let Some(old) = self.texture.take() {
            device.destroy_texture(old)?;
        }
        self.texture = Some(device.create_texture(&TextureDescriptor {
            label: Some(Cow::Borrowed("Occlusion")),
            size: Extent3D::new_2d(width, height),
            mip_level_count: 1,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        })?);
        Ok(())
    }

    fn render(&mut self, ctx: &mut PostProcessContext<'_>) -> Result<(), RenderError> {
        let Some(texture) = self.texture else {
            return Err(RenderError::Internal("occlusion target missing".to_string()));
        };
        let blur = ctx.textures.acquire(
            ctx.device,
            &TextureDescriptor {
                label: Some(Cow::Borrowed("Occlusion Blur")),
                size: Extent3D::new_2d(ctx.viewport.0, ctx.viewport.1),
                mip_level_count: 1,
                format: TextureFormat::Rgba8Unorm,
                usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
            },
        )?;
        for (label, target, source) in [
            ("Occlusion", blur, ctx.gbuffer.depth),
            ("Occlusion Blur", texture, blur),
        ] {
            let attachments = [RenderPassColorAttachment {
                texture: target,
                array_layer: 0,
                ops: Operations::clear([1.0; 4]),
            }];
            let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some(label),
                color_attachments: &attachments,
                depth_attachment: None,
            });
            pass.set_texture(0, source);
            pass.set_texture(1, ctx.gbuffer.normal);
            pass.draw(0..3, 0..1);
        }
        ctx.textures.release(blur);
        Ok(())
    }

    fn destroy(&mut self, device: &dyn GraphicsDevice) {
        if let Some(texture) = self.texture.take() {
            let _ = device.destroy_texture(texture);
        }
    }
}

fn target_sizes(device: &HeadlessDevice, renderer: &SceneRenderer) -> Vec<Extent3D> {
    renderer
        .gbuffer()
        .targets()
        .unwrap()
        .all()
        .iter()
        .map(|t| device.texture_info(*t).unwrap().size)
        .collect()
}

#[test]
fn resizing_twice_to_the_same_size_changes_nothing() {
    let device = HeadlessDevice::new();
    let mut world = cube_scene(&device);
    let mut renderer = renderer(&device, RenderConfig::default());
    renderer.render_frame(&mut world.scene, 0.0).unwrap();

    assert!(renderer.resize(640, 480).unwrap());
    let once = *renderer.gbuffer().targets().unwrap();
    let sizes = target_sizes(&device, &renderer);
    let live = device.live_texture_count();

    assert!(!renderer.resize(640, 480).unwrap());
    assert_eq!(*renderer.gbuffer().targets().unwrap(), once);
    assert_eq!(target_sizes(&device, &renderer), sizes);
    assert_eq!(device.live_texture_count(), live);
    assert!(sizes.iter().all(|s| *s == Extent3D::new_2d(640, 480)));

    let FrameOutcome::Presented(output) = renderer.render_frame(&mut world.scene, 0.0).unwrap()
    else {
        panic!("frame was skipped");
    };
    assert_eq!(output.size, (640, 480));
}

#[test]
fn render_scale_shrinks_the_gbuffer() {
    let device = HeadlessDevice::new();
    let config = RenderConfig {
        render_scale: 0.5,
        ..Default::default()
    };
    let renderer = renderer(&device, config);
    assert_eq!(renderer.render_extent(), (VIEWPORT.0 / 2, VIEWPORT.1 / 2));
    assert!(target_sizes(&device, &renderer)
        .iter()
        .all(|s| *s == Extent3D::new_2d(160, 120)));
}

#[test]
fn out_of_memory_skips_the_frame_and_retries() {
    let device = HeadlessDevice::new();
    let mut world = cube_scene(&device);
    let mut renderer = renderer(&device, RenderConfig::default());
    renderer.render_frame(&mut world.scene, 0.0).unwrap();
    let submitted = device.last_submission();

    // No room for the resized G-buffer.
    device.set_memory_budget(Some(device.allocated_bytes()));
    renderer.resize(1024, 768).unwrap_err();
    assert!(!renderer.gbuffer().is_allocated());

    let outcome = renderer.render_frame(&mut world.scene, 0.0).unwrap();
    assert_eq!(outcome, FrameOutcome::Skipped);
    assert_eq!(device.last_submission(), submitted);
    assert_eq!(device.pending_submissions(), 0);
    assert_eq!(renderer.stats().skipped_frames, 1);

    device.set_memory_budget(None);
    let FrameOutcome::Presented(output) = renderer.render_frame(&mut world.scene, 0.0).unwrap()
    else {
        panic!("retry was skipped");
    };
    assert_eq!(output.size, (1024, 768));
    assert_eq!(renderer.stats().frames, 2);
}

#[test]
fn fallback_policy_lowers_the_render_scale() {
    let device = HeadlessDevice::new();
    let mut world = cube_scene(&device);
    let config = RenderConfig {
        allocation_fallback: AllocationFallback::ReduceResolution { min_scale: 0.25 },
        ..Default::default()
    };
    let mut renderer = SceneRenderer::new(Arc::new(device.clone()), config, (800, 600)).unwrap();
    renderer.render_frame(&mut world.scene, 0.0).unwrap();

    // Full-size targets no longer fit; half-size ones do, with room for the
    // tile buffers of the slot that has not grown yet.
    device.set_memory_budget(Some(device.allocated_bytes() + (4 << 20)));
    renderer.resize(1600, 1200).unwrap_err();

    assert_eq!(renderer.render_frame(&mut world.scene, 0.0).unwrap(), FrameOutcome::Skipped);
    assert_eq!(renderer.render_scale(), 0.5);
    let FrameOutcome::Presented(output) = renderer.render_frame(&mut world.scene, 0.0).unwrap()
    else {
        panic!("reduced frame was skipped");
    };
    assert_eq!(output.size, (800, 600));
}

#[test]
fn occlusion_before_shading_is_blended_in() {
    let device = HeadlessDevice::new();
    let mut world = cube_scene(&device);
    let mut renderer = renderer(&device, RenderConfig::default());
    renderer
        .add_post_process(Box::new(Occlusion {
            order: 2000,
            texture: None,
        }))
        .unwrap();

    let FrameOutcome::Presented(output) = renderer.render_frame(&mut world.scene, 0.0).unwrap()
    else {
        panic!("frame was skipped");
    };
    let passes = device.submitted_passes(output.submission).unwrap();
    let labels: Vec<_> = passes.iter().filter_map(|p| p.label.as_deref()).collect();
    assert_eq!(
        labels,
        [
            "GBuffer Prepass",
            "Light Accumulation",
            "Occlusion",
            "Occlusion Blur",
            "Deferred Shading"
        ]
    );
    let occlusion = renderer
        .post_processing()
        .output(Targets::AMBIENT_OCCLUSION)
        .unwrap();
    assert!(passes[4].textures().any(|t| t == occlusion));

    // The blur target is recycled on the next frame.
    let cached = renderer.texture_cache().len();
    renderer.render_frame(&mut world.scene, 0.0).unwrap();
    assert_eq!(renderer.texture_cache().len(), cached);
}

#[test]
fn occlusion_scheduled_after_shading_is_fatal() {
    let device = HeadlessDevice::new();
    let mut world = cube_scene(&device);
    let mut renderer = renderer(&device, RenderConfig::default());
    renderer.render_frame(&mut world.scene, 0.0).unwrap();
    let submitted = device.last_submission();

    renderer
        .add_post_process(Box::new(Occlusion {
            order: 3000,
            texture: None,
        }))
        .unwrap();
    let err = renderer.render_frame(&mut world.scene, 0.0).unwrap_err();
    assert!(matches!(
        err,
        RenderError::OrderingViolation {
            target: "ambient occlusion",
            reader: "shading"
        }
    ));
    assert!(!err.is_recoverable());
    assert_eq!(device.last_submission(), submitted);

    assert!(renderer.remove_post_process("occlusion").unwrap());
    assert!(renderer.render_frame(&mut world.scene, 0.0).is_ok());
}

#[test]
fn occlusion_before_the_prepass_is_fatal() {
    let device = HeadlessDevice::new();
    let mut world = cube_scene(&device);
    let mut renderer = renderer(&device, RenderConfig::default());
    renderer
        .add_post_process(Box::new(Occlusion {
            order: 10,
            texture: None,
        }))
        .unwrap();
    let err = renderer.render_frame(&mut world.scene, 0.0).unwrap_err();
    assert!(matches!(err, RenderError::OrderingViolation { .. }));
}
