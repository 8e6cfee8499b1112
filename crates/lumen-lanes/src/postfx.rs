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

//! The ordering contract with post-processing effects.
//!
//! Effects live outside the renderer. Each one declares a numeric rendering
//! order; the stack runs them in ascending order, split into four buckets
//! that slot between the deferred stages:
//!
//! | bucket              | orders        | runs                         |
//! |---------------------|---------------|------------------------------|
//! | `BeforePrepass`     | `0..1000`     | after shadows                |
//! | `BeforeLightPass`   | `1000..2000`  | after the prepass            |
//! | `BeforeShadePass`   | `2000..3000`  | after light accumulation     |
//! | `AfterShadePass`    | `3000..`      | after shading                |
//!
//! An effect that produces ambient occlusion or reflections declares it, and
//! shading then refuses to run before that effect has.

use crate::deferred::{FrameStage, GBufferTargets, StageTracker, Targets, ViewBinding};
use crate::texture_cache::TextureCache;
use lumen_core::renderer::api::TextureId;
use lumen_core::renderer::{CommandEncoder, GraphicsDevice, RenderError, ResourceError};
use std::fmt;

/// The coarse slot of an effect in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RenderingOrder {
    /// Before the geometry prepass.
    BeforePrepass,
    /// Between the prepass and light accumulation.
    BeforeLightPass,
    /// Between light accumulation and shading.
    BeforeShadePass,
    /// After shading.
    AfterShadePass,
}

impl RenderingOrder {
    /// Every bucket, in execution order.
    pub const ALL: [RenderingOrder; 4] = [
        RenderingOrder::BeforePrepass,
        RenderingOrder::BeforeLightPass,
        RenderingOrder::BeforeShadePass,
        RenderingOrder::AfterShadePass,
    ];

    /// The lowest order tag of the bucket.
    pub const fn base(&self) -> u32 {
        match self {
            RenderingOrder::BeforePrepass => 0,
            RenderingOrder::BeforeLightPass => 1000,
            RenderingOrder::BeforeShadePass => 2000,
            RenderingOrder::AfterShadePass => 3000,
        }
    }

    /// The bucket an order tag falls into.
    pub const fn of(order: u32) -> Self {
        match order {
            0..=999 => RenderingOrder::BeforePrepass,
            1000..=1999 => RenderingOrder::BeforeLightPass,
            2000..=2999 => RenderingOrder::BeforeShadePass,
            _ => RenderingOrder::AfterShadePass,
        }
    }

    /// The frame stage the bucket runs in.
    pub const fn stage(&self) -> FrameStage {
        match self {
            RenderingOrder::BeforePrepass => FrameStage::Shadows,
            RenderingOrder::BeforeLightPass => FrameStage::Prepass,
            RenderingOrder::BeforeShadePass => FrameStage::LightAccumulation,
            RenderingOrder::AfterShadePass => FrameStage::PostProcess,
        }
    }
}

/// Everything an effect may use while recording.
pub struct PostProcessContext<'a> {
    /// The device.
    pub device: &'a dyn GraphicsDevice,
    /// The frame's encoder.
    pub encoder: &'a mut dyn CommandEncoder,
    /// Temporary textures.
    pub textures: &'a mut TextureCache,
    /// The G-buffer of the view.
    pub gbuffer: &'a GBufferTargets,
    /// The view's camera parameters.
    pub view: ViewBinding,
    /// The viewport in pixels.
    pub viewport: (u32, u32),
}

impl fmt::Debug for PostProcessContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostProcessContext")
            .field("gbuffer", &self.gbuffer)
            .field("view", &self.view)
            .field("viewport", &self.viewport)
            .finish_non_exhaustive()
    }
}

/// A post-processing effect.
pub trait PostProcessLayer: Send {
    /// A unique name used to look the layer up.
    fn name(&self) -> &str;

    /// The order tag; see [`RenderingOrder`] for the buckets.
    fn rendering_order(&self) -> u32;

    /// The targets the effect samples. They must exist when its bucket runs.
    fn reads(&self) -> Targets {
        Targets::empty()
    }

    /// The contributions the effect hands to shading: a subset of
    /// [`Targets::AMBIENT_OCCLUSION`] and [`Targets::REFLECTION`].
    fn provides(&self) -> Targets {
        Targets::empty()
    }

    /// The texture holding a provided contribution.
    fn output(&self, _target: Targets) -> Option<TextureId> {
        None
    }

    /// Reallocates size-dependent resources.
    fn resize(
        &mut self,
        _device: &dyn GraphicsDevice,
        _width: u32,
        _height: u32,
    ) -> Result<(), ResourceError> {
        Ok(())
    }

    /// Records the effect.
    fn render(&mut self, ctx: &mut PostProcessContext<'_>) -> Result<(), RenderError>;

    /// Frees the effect's resources.
    fn destroy(&mut self, _device: &dyn GraphicsDevice) {}
}

/// The registered effects, kept sorted by rendering order.
#[derive(Default)]
pub struct PostProcessStack {
    layers: Vec<Box<dyn PostProcessLayer>>,
    size: Option<(u32, u32)>,
}

impl fmt::Debug for PostProcessStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostProcessStack")
            .field("layers", &self.names().collect::<Vec<_>>())
            .field("size", &self.size)
            .finish()
    }
}

impl PostProcessStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `layer` after every layer with the same or a lower order.
    ///
    /// A layer added once the viewport is known is resized immediately.
    pub fn add(
        &mut self,
        device: &dyn GraphicsDevice,
        mut layer: Box<dyn PostProcessLayer>,
    ) -> Result<(), ResourceError> {
        if let Some((width, height)) = self.size {
            layer.resize(device, width, height)?;
        }
        let order = layer.rendering_order();
        let at = self
            .layers
            .partition_point(|l| l.rendering_order() <= order);
        log::debug!(
            "Post-processing layer '{}' added with order {order} ({:?})",
            layer.name(),
            RenderingOrder::of(order)
        );
        self.layers.insert(at, layer);
        Ok(())
    }

    /// Removes the layer called `name`.
    pub fn remove(&mut self, name: &str) -> Option<Box<dyn PostProcessLayer>> {
        let index = self.layers.iter().position(|l| l.name() == name)?;
        Some(self.layers.remove(index))
    }

    /// The layer called `name`.
    pub fn layer(&self, name: &str) -> Option<&dyn PostProcessLayer> {
        self.layers
            .iter()
            .find(|l| l.name() == name)
            .map(|l| l.as_ref())
    }

    /// The number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns `true` if no layer is registered.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Layer names in execution order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.layers.iter().map(|l| l.name())
    }

    /// Layer names of one bucket, in execution order.
    pub fn names_in(&self, bucket: RenderingOrder) -> impl Iterator<Item = &str> + '_ {
        self.layers
            .iter()
            .filter(move |l| RenderingOrder::of(l.rendering_order()) == bucket)
            .map(|l| l.name())
    }

    /// The contributions some layer provides to shading.
    pub fn provides(&self) -> Targets {
        self.layers
            .iter()
            .fold(Targets::empty(), |acc, l| acc | l.provides())
    }

    /// The texture a layer provides for `target`.
    pub fn output(&self, target: Targets) -> Option<TextureId> {
        self.layers
            .iter()
            .filter(|l| l.provides().contains(target))
            .find_map(|l| l.output(target))
    }

    /// Returns `true` if the layers are not sized for `width × height`.
    pub fn needs_resize(&self, width: u32, height: u32) -> bool {
        self.size != Some((width, height))
    }

    /// Resizes every layer.
    ///
    /// The new size is recorded only once every layer accepted it, so a
    /// failed resize is retried by the next call.
    pub fn resize(
        &mut self,
        device: &dyn GraphicsDevice,
        width: u32,
        height: u32,
    ) -> Result<(), ResourceError> {
        self.size = None;
        for layer in &mut self.layers {
            layer.resize(device, width, height)?;
        }
        self.size = Some((width, height));
        Ok(())
    }

    /// Runs the layers of `bucket` in order.
    ///
    /// Each layer's inputs are checked against `tracker`; its contributions
    /// are marked produced once it has recorded.
    pub fn render(
        &mut self,
        bucket: RenderingOrder,
        tracker: &mut StageTracker,
        ctx: &mut PostProcessContext<'_>,
    ) -> Result<(), RenderError> {
        let stage = bucket.stage();
        for layer in &mut self.layers {
            if RenderingOrder::of(layer.rendering_order()) != bucket {
                continue;
            }
            tracker.enter(stage)?;
            tracker.require(stage, layer.reads()).inspect_err(|_| {
                log::error!("Post-processing layer '{}' runs too early", layer.name());
            })?;
            layer.render(ctx)?;
            tracker.produce(layer.provides() & (Targets::AMBIENT_OCCLUSION | Targets::REFLECTION));
        }
        Ok(())
    }

    /// Destroys every layer.
    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        for layer in &mut self.layers {
            layer.destroy(device);
        }
        self.layers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::GBuffer;
    use lumen_core::renderer::api::{
        BufferDescriptor, BufferUsage, Extent3D, Operations, RenderPassColorAttachment,
        RenderPassDescriptor, TextureDescriptor, TextureFormat, TextureUsage,
    };
    use lumen_infra::HeadlessDevice;
    use std::borrow::Cow;
    use std::sync::{Arc, Mutex};

    /// Writes an occlusion texture from depth and normals.
    struct Occlusion {
        order: u32,
        texture: Option<TextureId>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl PostProcessLayer for Occlusion {
        fn name(&self) -> &str {
            "ssao"
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
            (target == Targets::AMBIENT_OCCLUSION).then_some(self.texture).flatten()
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
                label: Some(Cow::Borrowed("SSAO")),
                size: Extent3D::new_2d(width, height),
                mip_level_count: 1,
                format: TextureFormat::Rgba8Unorm,
                usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
            })?);
            Ok(())
        }
        fn render(&mut self, ctx: &mut PostProcessContext<'_>) -> Result<(), RenderError> {
            let texture = self.texture.ok_or(RenderError::Internal("not sized".into()))?;
            let attachments = [RenderPassColorAttachment {
                texture,
                array_layer: 0,
                ops: Operations::clear([1.0; 4]),
            }];
            let mut pass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("SSAO"),
                color_attachments: &attachments,
                depth_attachment: None,
            });
            pass.set_texture(0, ctx.gbuffer.depth);
            pass.draw(0..3, 0..1);
            self.log.lock().unwrap().push(self.name().to_string());
            Ok(())
        }
    }

    /// Records its name and nothing else.
    struct Marker(&'static str, u32, Arc<Mutex<Vec<String>>>);

    impl PostProcessLayer for Marker {
        fn name(&self) -> &str {
            self.0
        }
        fn rendering_order(&self) -> u32 {
            self.1
        }
        fn render(&mut self, _ctx: &mut PostProcessContext<'_>) -> Result<(), RenderError> {
            self.2.lock().unwrap().push(self.0.to_string());
            Ok(())
        }
    }

    #[test]
    fn buckets_partition_the_order_range() {
        assert_eq!(RenderingOrder::of(0), RenderingOrder::BeforePrepass);
        assert_eq!(RenderingOrder::of(999), RenderingOrder::BeforePrepass);
        assert_eq!(RenderingOrder::of(1000), RenderingOrder::BeforeLightPass);
        assert_eq!(RenderingOrder::of(2500), RenderingOrder::BeforeShadePass);
        assert_eq!(RenderingOrder::of(3000), RenderingOrder::AfterShadePass);
        assert_eq!(RenderingOrder::of(u32::MAX), RenderingOrder::AfterShadePass);
        for bucket in RenderingOrder::ALL {
            assert_eq!(RenderingOrder::of(bucket.base()), bucket);
        }
    }

    #[test]
    fn layers_stay_sorted_and_stable() {
        let device = HeadlessDevice::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut stack = PostProcessStack::new();
        for (name, order) in [("taa", 3100), ("fog", 1500), ("bloom", 3100), ("early", 10)] {
            stack
                .add(&device, Box::new(Marker(name, order, Arc::clone(&log))))
                .unwrap();
        }
        assert_eq!(stack.names().collect::<Vec<_>>(), ["early", "fog", "taa", "bloom"]);
        assert_eq!(
            stack.names_in(RenderingOrder::AfterShadePass).collect::<Vec<_>>(),
            ["taa", "bloom"]
        );
        assert!(stack.remove("fog").is_some());
        assert!(stack.layer("fog").is_none());
        assert_eq!(stack.len(), 3);
    }

    #[test]
    fn occlusion_must_run_after_the_prepass() {
        let device = HeadlessDevice::new();
        let mut gbuffer = GBuffer::new();
        gbuffer.resize(&device, 16, 16).unwrap();
        let targets = *gbuffer.targets().unwrap();
        let camera = device
            .create_buffer(&BufferDescriptor {
                label: None,
                size: 512,
                usage: BufferUsage::UNIFORM,
            })
            .unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut stack = PostProcessStack::new();
        stack.resize(&device, 16, 16).unwrap();
        stack
            .add(
                &device,
                Box::new(Occlusion {
                    order: 500,
                    texture: None,
                    log: Arc::clone(&log),
                }),
            )
            .unwrap();
        assert!(stack.output(Targets::AMBIENT_OCCLUSION).is_some());
        assert_eq!(stack.provides(), Targets::AMBIENT_OCCLUSION);

        let mut cache = TextureCache::new();
        let mut encoder = device.create_command_encoder(None);
        let mut ctx = PostProcessContext {
            device: &device,
            encoder: encoder.as_mut(),
            textures: &mut cache,
            gbuffer: &targets,
            view: ViewBinding {
                camera_buffer: camera,
                camera_offset: 0,
            },
            viewport: (16, 16),
        };

        // Placed before the prepass, the layer would read an empty G-buffer.
        let mut tracker = StageTracker::new();
        let err = stack
            .render(RenderingOrder::BeforePrepass, &mut tracker, &mut ctx)
            .unwrap_err();
        assert!(matches!(err, RenderError::OrderingViolation { .. }));
        assert!(log.lock().unwrap().is_empty());

        assert!(stack.remove("ssao").is_some());
        stack
            .add(
                &device,
                Box::new(Occlusion {
                    order: 2100,
                    texture: None,
                    log: Arc::clone(&log),
                }),
            )
            .unwrap();
        let mut tracker = StageTracker::new();
        tracker.enter(FrameStage::LightAccumulation).unwrap();
        tracker.produce(Targets::GBUFFER | Targets::LIGHTING);
        stack
            .render(RenderingOrder::BeforeShadePass, &mut tracker, &mut ctx)
            .unwrap();
        assert!(tracker.produced().contains(Targets::AMBIENT_OCCLUSION));
        assert_eq!(log.lock().unwrap().as_slice(), ["ssao"]);
    }

    /// Refuses its first resizes with an out-of-memory error.
    struct Flaky {
        failures: u32,
        size: Arc<Mutex<Option<(u32, u32)>>>,
    }

    impl PostProcessLayer for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }
        fn rendering_order(&self) -> u32 {
            3000
        }
        fn resize(
            &mut self,
            _device: &dyn GraphicsDevice,
            width: u32,
            height: u32,
        ) -> Result<(), ResourceError> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(ResourceError::OutOfMemory {
                    label: "flaky".to_string(),
                    requested_bytes: 1,
                });
            }
            *self.size.lock().unwrap() = Some((width, height));
            Ok(())
        }
        fn render(&mut self, _ctx: &mut PostProcessContext<'_>) -> Result<(), RenderError> {
            Ok(())
        }
    }

    #[test]
    fn failed_resize_stays_pending() {
        let device = HeadlessDevice::new();
        let size = Arc::new(Mutex::new(None));
        let mut stack = PostProcessStack::new();
        stack
            .add(
                &device,
                Box::new(Flaky {
                    failures: 1,
                    size: Arc::clone(&size),
                }),
            )
            .unwrap();

        assert!(stack.resize(&device, 64, 48).unwrap_err().is_out_of_memory());
        assert!(stack.needs_resize(64, 48));
        assert_eq!(*size.lock().unwrap(), None);

        stack.resize(&device, 64, 48).unwrap();
        assert!(!stack.needs_resize(64, 48));
        assert_eq!(*size.lock().unwrap(), Some((64, 48)));
    }
}
