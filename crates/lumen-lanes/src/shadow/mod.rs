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

//! Shadow buffer management and depth-only shadow passes.
//!
//! The [`ShadowManager`] keeps one [`ShadowBuffer`] per shadow-casting light.
//! Allocation changes are not frame-buffered: the caller checks
//! [`ShadowManager::needs_sync`] and drains in-flight frames before calling
//! [`ShadowManager::sync`]. Every frame, [`ShadowManager::prepare`] derives the
//! light frusta and batches their casters, and [`ShadowManager::encode`]
//! records the depth passes ahead of the main prepass.

pub mod cascades;

use crate::batch::{DrawCallBatcher, DrawCallList};
use crate::bindings;
use ahash::AHashMap;
use lumen_core::config::{ShadowConfig, MAX_SHADOW_CASCADES};
use lumen_core::math::{Frustum, Mat4};
use lumen_core::renderer::api::{
    BlendMode, BufferId, BufferUsage, Extent3D, FunctionConstants, Operations,
    RenderPassDepthAttachment, RenderPassDescriptor, RenderPipelineDescriptor, RenderPipelineId,
    TextureDescriptor, TextureFormat, TextureId, TextureUsage,
};
use lumen_core::renderer::{CommandEncoder, GraphicsDevice, PerFrameBuffer, ResourceError};
use lumen_data::components::{LightComponent, LightType};
use lumen_data::scene::{NodeId, Scene};
use std::borrow::Cow;

use self::cascades::directional_cascades;

/// Byte spacing of cascade matrices in the shadow camera buffer.
pub const SHADOW_CAMERA_STRIDE: u64 = 256;

/// The smallest shadow map edge [`ShadowManager::reduce_resolution`] goes down to.
pub const MIN_SHADOW_RESOLUTION: u32 = 256;

const MATRIX_BYTES: usize = std::mem::size_of::<[[f32; 4]; 4]>();

/// A depth target owned by one light, one array layer per cascade.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowBuffer {
    light: NodeId,
    resolution: u32,
    cascades: u32,
    texture: TextureId,
    view_projections: Vec<Mat4>,
    split_depths: Vec<f32>,
}

impl ShadowBuffer {
    /// The light this buffer belongs to.
    pub fn light(&self) -> NodeId {
        self.light
    }

    /// Edge length of each cascade in texels.
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// The number of cascades (array layers).
    pub fn cascades(&self) -> u32 {
        self.cascades
    }

    /// The depth texture.
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    /// The world-to-clip matrices rendered last frame, one per rendered cascade.
    pub fn view_projections(&self) -> &[Mat4] {
        &self.view_projections
    }

    /// The view distance at which each rendered cascade ends.
    pub fn split_depths(&self) -> &[f32] {
        &self.split_depths
    }

    fn matches(&self, resolution: u32, cascades: u32) -> bool {
        self.resolution == resolution && self.cascades == cascades
    }
}

/// The viewer used to fit directional cascades.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowView {
    /// World-to-clip matrix of the camera.
    pub view_projection: Mat4,
    /// Camera near plane.
    pub near: f32,
    /// Camera far plane.
    pub far: f32,
}

/// One depth-only pass into one cascade of a shadow buffer.
#[derive(Debug, Clone)]
pub struct ShadowPass {
    /// The light being rendered.
    pub light: NodeId,
    /// Index of the light's shadow map among this frame's shadow maps.
    pub shadow_slot: u32,
    /// The cascade, also the array layer written.
    pub cascade: u32,
    /// The target depth texture.
    pub texture: TextureId,
    /// The light's world-to-clip matrix for this cascade.
    pub view_projection: Mat4,
    /// The casters visible from the light.
    pub draws: DrawCallList,
    /// Offset of this pass's matrix in the shadow camera buffer.
    pub camera_offset: u64,
}

/// Owns every shadow buffer and renders them each frame.
#[derive(Debug)]
pub struct ShadowManager {
    buffers: AHashMap<NodeId, ShadowBuffer>,
    defaults: ShadowConfig,
    pipeline: RenderPipelineId,
    cameras: PerFrameBuffer,
    passes: Vec<ShadowPass>,
    slots: Vec<NodeId>,
    frame_slot: usize,
    resolution_shift: u32,
}

impl ShadowManager {
    /// Creates a manager and its depth-only pipeline.
    pub fn new(
        device: &dyn GraphicsDevice,
        frames_in_flight: usize,
        defaults: ShadowConfig,
    ) -> Result<Self, ResourceError> {
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(Cow::Borrowed("Shadow Depth")),
            vertex_entry: Cow::Borrowed("shadow_vertex"),
            fragment_entry: None,
            color_formats: Vec::new(),
            depth_format: Some(TextureFormat::Depth32Float),
            blend: BlendMode::Replace,
            constants: FunctionConstants::empty(),
        })?;
        let cameras = match PerFrameBuffer::new(
            device,
            frames_in_flight,
            SHADOW_CAMERA_STRIDE * MAX_SHADOW_CASCADES as u64,
            BufferUsage::UNIFORM,
            "Shadow Cameras",
        ) {
            Ok(cameras) => cameras,
            Err(e) => {
                let _ = device.destroy_render_pipeline(pipeline);
                return Err(e);
            }
        };
        Ok(Self {
            buffers: AHashMap::new(),
            defaults,
            pipeline,
            cameras,
            passes: Vec::new(),
            slots: Vec::new(),
            frame_slot: 0,
            resolution_shift: 0,
        })
    }

    /// Replaces the sizing used for lights without their own settings.
    ///
    /// Takes effect at the next [`ShadowManager::sync`].
    pub fn set_defaults(&mut self, defaults: ShadowConfig) {
        self.defaults = defaults;
    }

    /// The sizing a light's shadow buffer should have.
    ///
    /// Point lights always get a single cascade. A reduced resolution never
    /// goes below [`MIN_SHADOW_RESOLUTION`] unless the light asked for less.
    pub fn settings_for(&self, light: &LightComponent) -> ShadowConfig {
        let mut settings = light.shadow_settings.unwrap_or(self.defaults);
        settings.cascades = match light.light_type {
            LightType::Directional => settings.cascades.clamp(1, MAX_SHADOW_CASCADES),
            LightType::Point => 1,
        };
        settings.resolution = self.shifted(settings.resolution);
        settings
    }

    fn shifted(&self, resolution: u32) -> u32 {
        (resolution >> self.resolution_shift)
            .max(MIN_SHADOW_RESOLUTION.min(resolution))
            .max(1)
    }

    /// The edge of a default-sized shadow map after any reduction.
    pub fn default_resolution(&self) -> u32 {
        self.shifted(self.defaults.resolution)
    }

    /// Halves every shadow map's resolution from the next
    /// [`ShadowManager::sync`] on.
    ///
    /// Returns `false` once the defaults are at [`MIN_SHADOW_RESOLUTION`].
    pub fn reduce_resolution(&mut self) -> bool {
        if self.default_resolution() / 2 < MIN_SHADOW_RESOLUTION {
            return false;
        }
        self.resolution_shift += 1;
        true
    }

    /// The buffer of `light`, if allocated.
    pub fn buffer(&self, light: NodeId) -> Option<&ShadowBuffer> {
        self.buffers.get(&light)
    }

    /// The number of allocated shadow buffers.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Returns `true` if no shadow buffer is allocated.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Returns the buffer of `light` sized `resolution² × cascades`.
    ///
    /// An existing buffer with the same parameters is returned as is; any
    /// other existing buffer is replaced. The caller must have drained every
    /// frame that may still sample the old buffer.
    pub fn request(
        &mut self,
        device: &dyn GraphicsDevice,
        light: NodeId,
        resolution: u32,
        cascades: u32,
    ) -> Result<&ShadowBuffer, ResourceError> {
        let resolution = resolution.max(1);
        let cascades = cascades.clamp(1, MAX_SHADOW_CASCADES);
        if self
            .buffers
            .get(&light)
            .is_some_and(|b| b.matches(resolution, cascades))
        {
            return Ok(&self.buffers[&light]);
        }

        let texture = device.create_texture(&TextureDescriptor {
            label: Some(Cow::Owned(format!("Shadow Map {light:?}"))),
            size: Extent3D {
                width: resolution,
                height: resolution,
                depth_or_array_layers: cascades,
            },
            mip_level_count: 1,
            format: TextureFormat::Depth32Float,
            usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        })?;

        let buffer = ShadowBuffer {
            light,
            resolution,
            cascades,
            texture,
            view_projections: Vec::new(),
            split_depths: Vec::new(),
        };
        if let Some(old) = self.buffers.insert(light, buffer) {
            log::info!(
                "Shadow buffer of {light:?} reallocated: {}x{} ({} cascades) -> {resolution}x{resolution} ({cascades} cascades)",
                old.resolution,
                old.resolution,
                old.cascades
            );
            Self::destroy_texture(device, old.texture);
        } else {
            log::debug!("Shadow buffer of {light:?} allocated: {resolution}x{resolution} ({cascades} cascades)");
        }
        Ok(&self.buffers[&light])
    }

    /// Frees the buffer of `light`. Returns `false` if it had none.
    pub fn release(&mut self, device: &dyn GraphicsDevice, light: NodeId) -> bool {
        match self.buffers.remove(&light) {
            Some(buffer) => {
                log::debug!("Shadow buffer of {light:?} released");
                Self::destroy_texture(device, buffer.texture);
                true
            }
            None => false,
        }
    }

    fn destroy_texture(device: &dyn GraphicsDevice, texture: TextureId) {
        if let Err(e) = device.destroy_texture(texture) {
            log::warn!("Failed to destroy shadow map {texture:?}: {e}");
        }
    }

    fn wanted(&self, scene: &Scene, lights: &[NodeId]) -> Vec<(NodeId, ShadowConfig)> {
        lights
            .iter()
            .filter_map(|&id| {
                let light = scene.graph.light(id)?;
                light.cast_shadows.then(|| (id, self.settings_for(light)))
            })
            .collect()
    }

    /// Returns `true` if [`ShadowManager::sync`] would allocate or free anything.
    pub fn needs_sync(&self, scene: &Scene, lights: &[NodeId]) -> bool {
        let wanted = self.wanted(scene, lights);
        let mismatch = wanted.iter().any(|(id, settings)| {
            !self
                .buffers
                .get(id)
                .is_some_and(|b| b.matches(settings.resolution, settings.cascades))
        });
        mismatch || self.buffers.len() != wanted.len()
    }

    /// Allocates, resizes and frees buffers so exactly the shadow-casting
    /// `lights` own one.
    pub fn sync(
        &mut self,
        device: &dyn GraphicsDevice,
        scene: &Scene,
        lights: &[NodeId],
    ) -> Result<(), ResourceError> {
        let wanted = self.wanted(scene, lights);
        let stale: Vec<NodeId> = self
            .buffers
            .keys()
            .filter(|id| !wanted.iter().any(|(w, _)| w == *id))
            .copied()
            .collect();
        for id in stale {
            self.release(device, id);
        }
        for (id, settings) in wanted {
            self.request(device, id, settings.resolution, settings.cascades)?;
        }
        Ok(())
    }

    /// Derives every light frustum, batches its casters and uploads the
    /// cascade matrices into frame slot `frame_slot`.
    ///
    /// Directional lights are fitted to `view` when given; otherwise they use
    /// their own fixed shadow volume. Lights without a synced buffer are skipped.
    #[allow(clippy::too_many_arguments)]
    pub fn prepare(
        &mut self,
        device: &dyn GraphicsDevice,
        frame_slot: usize,
        scene: &Scene,
        batcher: &mut DrawCallBatcher,
        lights: &[NodeId],
        casters: &[NodeId],
        view: Option<&ShadowView>,
    ) -> Result<(), ResourceError> {
        self.passes.clear();
        self.slots.clear();
        self.frame_slot = frame_slot;

        for &id in lights {
            let Some(light) = scene.graph.light(id) else {
                continue;
            };
            if !light.cast_shadows {
                continue;
            }
            let Some(buffer) = self.buffers.get_mut(&id) else {
                log::warn!("Light {id:?} casts shadows but has no shadow buffer; skipped");
                continue;
            };
            let Ok(world) = scene.graph.world_matrix(id) else {
                continue;
            };

            let cascades = match (light.light_type, view) {
                (LightType::Directional, Some(view)) => directional_cascades(
                    &view.view_projection,
                    view.near,
                    view.far,
                    buffer.cascades,
                    light.direction(&world),
                ),
                _ => light
                    .view_projection(&world)
                    .map(|m| (vec![light.shadow_range()], vec![m])),
            };
            let Some((split_depths, view_projections)) = cascades else {
                log::warn!("Light {id:?} has a degenerate shadow basis; skipped");
                continue;
            };

            let shadow_slot = self.slots.len() as u32;
            self.slots.push(id);
            for (cascade, view_projection) in view_projections.iter().enumerate() {
                let frustum = Frustum::from_view_projection(view_projection);
                let draws = batcher.batch(scene, &frustum, casters);
                self.passes.push(ShadowPass {
                    light: id,
                    shadow_slot,
                    cascade: cascade as u32,
                    texture: buffer.texture,
                    view_projection: *view_projection,
                    draws,
                    camera_offset: self.passes.len() as u64 * SHADOW_CAMERA_STRIDE,
                });
            }
            buffer.split_depths = split_depths;
            buffer.view_projections = view_projections;
        }

        if self.passes.is_empty() {
            return Ok(());
        }
        let mut bytes = vec![0u8; self.passes.len() * SHADOW_CAMERA_STRIDE as usize];
        for pass in &self.passes {
            let offset = pass.camera_offset as usize;
            let matrix = pass.view_projection.to_cols_array_2d();
            bytes[offset..offset + MATRIX_BYTES].copy_from_slice(bytemuck::bytes_of(&matrix));
        }
        self.cameras
            .ensure_capacity(device, frame_slot, bytes.len() as u64)?;
        self.cameras.write(device, frame_slot, 0, &bytes)
    }

    /// The passes prepared for this frame.
    pub fn passes(&self) -> &[ShadowPass] {
        &self.passes
    }

    /// The shadow slot and first cascade matrix of `light` this frame.
    pub fn shadow_for(&self, light: NodeId) -> Option<(u32, Mat4)> {
        let slot = self.slots.iter().position(|id| *id == light)?;
        let matrix = *self.buffers.get(&light)?.view_projections.first()?;
        Some((slot as u32, matrix))
    }

    /// This frame's shadow textures, in shadow slot order.
    pub fn shadow_textures(&self) -> impl Iterator<Item = TextureId> + '_ {
        self.slots
            .iter()
            .filter_map(|id| self.buffers.get(id).map(|b| b.texture))
    }

    /// The buffer holding this frame's cascade matrices.
    pub fn camera_buffer(&self) -> BufferId {
        self.cameras.buffer(self.frame_slot)
    }

    /// Records one depth pass per prepared cascade.
    pub fn encode(&self, encoder: &mut dyn CommandEncoder, instance_buffer: BufferId) {
        for pass in &self.passes {
            let label = format!("Shadow Pass {:?} [cascade {}]", pass.light, pass.cascade);
            let mut render_pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some(label.as_str()),
                color_attachments: &[],
                depth_attachment: Some(RenderPassDepthAttachment {
                    texture: pass.texture,
                    array_layer: pass.cascade,
                    depth_ops: Operations::clear(1.0),
                }),
            });
            render_pass.set_pipeline(self.pipeline);
            render_pass.set_buffer(bindings::CAMERA, self.camera_buffer(), pass.camera_offset);
            render_pass.set_buffer(bindings::INSTANCES, instance_buffer, 0);
            for draw in pass.draws.draw_calls() {
                draw.encode(render_pass.as_mut());
            }
        }
    }

    /// Frees every buffer and the pipeline. Callers drain the pipeline first.
    pub fn destroy(mut self, device: &dyn GraphicsDevice) {
        for (_, buffer) in self.buffers.drain() {
            Self::destroy_texture(device, buffer.texture);
        }
        if let Err(e) = device.destroy_render_pipeline(self.pipeline) {
            log::warn!("Failed to destroy shadow pipeline: {e}");
        }
        self.cameras.destroy(device);
    }
}
