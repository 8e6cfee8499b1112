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

//! Defines the [`SceneRenderer`], the per-frame driver of the deferred pipeline.
//!
//! A frame runs in two phases. Preparation gathers the scene, batches every
//! view and every shadow cascade, and uploads the frame slot's buffers.
//! Recording then encodes, per view:
//!
//! ```text
//! shadows ─► [post 0..] ─► prepass ─► [post 1000..] ─► light accumulation
//!         ─► [post 2000..] ─► shading ─► [post 3000..]
//! ```
//!
//! Nothing is submitted unless both phases succeed.

use super::views::{collect_views, RenderView, MAX_VIEWS};
use anyhow::Context;
use lumen_core::config::{scale_extent, AllocationFallback, RenderConfig};
use lumen_core::renderer::api::{BufferUsage, SubmissionIndex, TextureId};
use lumen_core::renderer::params::{LightGlobalParams, LightParams};
use lumen_core::renderer::{
    CommandEncoder, FrameFences, GraphicsDevice, PerFrameBuffer, RenderError, ResourceError,
};
use lumen_data::scene::{ImageBasedLighting, Scene};
use lumen_lanes::deferred::{
    light_global_params, FrameLights, GBufferTargets, LightAccumulationPass, LightingInputs,
    Prepass, ShadingInputs, ShadingPass, Targets, TileLightGrid, ViewBinding, CAMERA_STRIDE,
};
use lumen_lanes::shadow::ShadowView;
use lumen_lanes::{
    process_pending_ibl, DrawCallBatcher, DrawCallList, FrameStage, GBuffer, IblProcessor,
    PostProcessContext, PostProcessLayer, PostProcessStack, RenderingOrder, ShadowManager,
    StageTracker, TextureCache,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Stride between the per-view `LightGlobalParams` blocks.
const GLOBALS_STRIDE: u64 = 256;

/// Alignment of per-view regions inside the tile buffers.
const STORAGE_ALIGNMENT: usize = 256;

/// Skipped frames in a row, without any fallback lowering a resolution,
/// after which an allocation failure is returned to the caller.
pub const MAX_CONSECUTIVE_SKIPS: u32 = 3;

/// The image a finished frame hands to the presentation surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOutput {
    /// The shaded HDR image.
    pub image: TextureId,
    /// Its size in pixels, after the render scale.
    pub size: (u32, u32),
    /// The submission that produces it.
    pub submission: SubmissionIndex,
}

/// What happened to a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame was submitted.
    Presented(FrameOutput),
    /// An allocation failed; nothing was submitted and the previous image stays on screen.
    Skipped,
}

/// Counters describing the last frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    /// CPU time spent in the last [`SceneRenderer::render_frame`].
    pub frame_time: Duration,
    /// Views rendered.
    pub views: u32,
    /// Draw calls recorded, shadow passes included.
    pub draw_calls: u32,
    /// Instances uploaded.
    pub instances: u32,
    /// Lights in the light buffer.
    pub lights: u32,
    /// Depth passes rendered into shadow maps.
    pub shadow_passes: u32,
    /// Frames submitted since creation.
    pub frames: u64,
    /// Frames skipped since creation.
    pub skipped_frames: u64,
}

/// The per-view offsets into the frame slot's buffers.
#[derive(Debug, Clone, Copy)]
struct ViewOffsets {
    camera: u64,
    globals: u64,
    grid: u64,
    indices: u64,
}

/// Owns every lane and renders a [`Scene`] once per call to [`Self::render_frame`].
pub struct SceneRenderer {
    device: Arc<dyn GraphicsDevice>,
    config: RenderConfig,
    // Frame pacing
    fences: FrameFences,
    tracker: StageTracker,
    // Lanes
    batcher: DrawCallBatcher,
    shadows: ShadowManager,
    gbuffer: GBuffer,
    prepass: Prepass,
    lighting: LightAccumulationPass,
    shading: ShadingPass,
    light_grid: TileLightGrid,
    post: PostProcessStack,
    textures: TextureCache,
    ibl_processor: Option<Box<dyn IblProcessor + Send>>,
    // Per-frame GPU state, one buffer per slot
    cameras: PerFrameBuffer,
    lights: PerFrameBuffer,
    globals: PerFrameBuffer,
    grid: PerFrameBuffer,
    indices: PerFrameBuffer,
    // Presentation
    viewport: (u32, u32),
    render_scale: f32,
    stats: FrameStats,
    // Allocation failure recovery
    shadow_allocation_failed: bool,
    consecutive_skips: u32,
}

impl std::fmt::Debug for SceneRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneRenderer")
            .field("viewport", &self.viewport)
            .field("render_scale", &self.render_scale)
            .field("frame_index", &self.fences.frame_index())
            .field("post", &self.post)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl SceneRenderer {
    /// Creates the renderer and allocates its targets for `viewport`.
    pub fn new(
        device: Arc<dyn GraphicsDevice>,
        config: RenderConfig,
        viewport: (u32, u32),
    ) -> anyhow::Result<Self> {
        config.validate().context("Invalid render configuration")?;
        let d = device.as_ref();
        let n = config.frames_in_flight;
        let per_frame = |size: u64, usage: BufferUsage, label: &'static str| {
            PerFrameBuffer::new(d, n, size, usage, label)
                .with_context(|| format!("Failed to allocate '{label}'"))
        };

        let cameras = per_frame(CAMERA_STRIDE * MAX_VIEWS as u64, BufferUsage::UNIFORM, "Camera Params")?;
        let lights = per_frame(LightParams::SIZE * 16, BufferUsage::STORAGE, "Light Params")?;
        let globals = per_frame(GLOBALS_STRIDE * MAX_VIEWS as u64, BufferUsage::UNIFORM, "Light Globals")?;
        let grid = per_frame(4096, BufferUsage::STORAGE, "Light Grid")?;
        let indices = per_frame(4096, BufferUsage::STORAGE, "Light Indices")?;

        let mut renderer = Self {
            batcher: DrawCallBatcher::new(d, n, config.anisotropy)
                .context("Failed to create the draw call batcher")?,
            shadows: ShadowManager::new(d, n, config.shadow)
                .context("Failed to create the shadow manager")?,
            lighting: LightAccumulationPass::new(d)
                .context("Failed to create the light accumulation pass")?,
            shading: ShadingPass::new(d).context("Failed to create the shading pass")?,
            light_grid: TileLightGrid::new(config.tiles),
            gbuffer: GBuffer::new(),
            prepass: Prepass::new(),
            post: PostProcessStack::new(),
            textures: TextureCache::new(),
            ibl_processor: None,
            fences: FrameFences::new(n),
            tracker: StageTracker::new(),
            cameras,
            lights,
            globals,
            grid,
            indices,
            viewport: (viewport.0.max(1), viewport.1.max(1)),
            render_scale: config.render_scale,
            stats: FrameStats::default(),
            shadow_allocation_failed: false,
            consecutive_skips: 0,
            config,
            device,
        };
        renderer
            .ensure_targets()
            .context("Failed to allocate the G-buffer")?;
        log::info!(
            "SceneRenderer created: {}x{} viewport, {} frames in flight",
            renderer.viewport.0,
            renderer.viewport.1,
            n
        );
        Ok(renderer)
    }

    /// The active configuration.
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// The requested viewport.
    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    /// The render scale in effect, possibly lowered by the allocation fallback.
    pub fn render_scale(&self) -> f32 {
        self.render_scale
    }

    /// The G-buffer.
    pub fn gbuffer(&self) -> &GBuffer {
        &self.gbuffer
    }

    /// The shadow manager.
    pub fn shadows(&self) -> &ShadowManager {
        &self.shadows
    }

    /// The tile grid of the last view rendered.
    pub fn light_grid(&self) -> &TileLightGrid {
        &self.light_grid
    }

    /// The frame fences.
    pub fn fences(&self) -> &FrameFences {
        &self.fences
    }

    /// Counters of the last frame.
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// The temporary textures shared with post-processing.
    pub fn texture_cache(&mut self) -> &mut TextureCache {
        &mut self.textures
    }

    /// The post-processing stack.
    pub fn post_processing(&self) -> &PostProcessStack {
        &self.post
    }

    /// Registers a post-processing effect.
    pub fn add_post_process(&mut self, layer: Box<dyn PostProcessLayer>) -> Result<(), RenderError> {
        Ok(self.post.add(self.device.as_ref(), layer)?)
    }

    /// Unregisters the effect called `name`. The pipeline is drained first.
    pub fn remove_post_process(&mut self, name: &str) -> Result<bool, RenderError> {
        let Some(mut layer) = self.post.remove(name) else {
            return Ok(false);
        };
        self.fences.drain(self.device.as_ref())?;
        layer.destroy(self.device.as_ref());
        Ok(true)
    }

    /// Installs the processor that bakes the scene's IBL maps when they are stale.
    pub fn set_ibl_processor(&mut self, processor: Box<dyn IblProcessor + Send>) {
        self.ibl_processor = Some(processor);
    }

    /// Applies a new configuration. Frame-buffered state keeps its slot count.
    pub fn set_config(&mut self, config: RenderConfig) -> anyhow::Result<()> {
        config.validate().context("Invalid render configuration")?;
        if config.frames_in_flight != self.config.frames_in_flight {
            log::warn!(
                "frames_in_flight cannot change at runtime; keeping {}",
                self.config.frames_in_flight
            );
        }
        self.batcher.set_anisotropy(config.anisotropy);
        self.shadows.set_defaults(config.shadow);
        self.light_grid.set_config(config.tiles);
        self.render_scale = config.render_scale;
        self.config = RenderConfig {
            frames_in_flight: self.config.frames_in_flight,
            ..config
        };
        self.ensure_targets()
            .context("Failed to reallocate the G-buffer")?;
        Ok(())
    }

    /// Propagates a viewport change to the G-buffer and post-processing.
    ///
    /// Returns `true` if the targets were reallocated. Resizing to the
    /// current size changes nothing.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<bool, RenderError> {
        self.viewport = (width.max(1), height.max(1));
        self.ensure_targets()
    }

    /// The extent the G-buffer is rendered at.
    pub fn render_extent(&self) -> (u32, u32) {
        scale_extent(self.viewport.0, self.viewport.1, self.render_scale)
    }

    /// Reallocates size-dependent targets when they are missing or stale.
    ///
    /// The G-buffer and the post-processing stack are checked separately, so
    /// a resize that failed halfway is finished by the next call. In-flight
    /// frames may still read the old targets, so the pipeline is drained
    /// before anything is freed.
    fn ensure_targets(&mut self) -> Result<bool, RenderError> {
        let device = Arc::clone(&self.device);
        let (width, height) = self.render_extent();
        let gbuffer_stale = self.gbuffer.needs_resize(width, height);
        let post_stale = self.post.needs_resize(width, height);
        if !gbuffer_stale && !post_stale {
            return Ok(false);
        }
        self.fences.drain(device.as_ref())?;
        if gbuffer_stale {
            self.gbuffer.resize(device.as_ref(), width, height)?;
        }
        if post_stale {
            self.post.resize(device.as_ref(), width, height)?;
        }
        let freed = self.textures.clear_unused(device.as_ref());
        if freed > 0 {
            log::debug!("Released {freed} cached textures after resize");
        }
        Ok(true)
    }

    /// Advances the scene by `dt` seconds and renders one frame.
    ///
    /// The scene's animations advance before anything else, so a skipped
    /// frame still consumes `dt`.
    ///
    /// Blocks while the frame slot is still in use by the GPU. An allocation
    /// failure skips the frame and drains the pipeline so the next frame can
    /// retry. With [`AllocationFallback::ReduceResolution`] the failing
    /// resource is shrunk first: the render scale for the G-buffer, the
    /// shadow map resolution for shadow buffers. After
    /// [`MAX_CONSECUTIVE_SKIPS`] skips in a row that lowered nothing, the
    /// allocation error is returned. Every other error is returned at once
    /// and nothing is submitted.
    pub fn render_frame(&mut self, scene: &mut Scene, dt: f32) -> Result<FrameOutcome, RenderError> {
        let start = Instant::now();
        scene.update(dt);
        let slot = self.fences.acquire(self.device.as_ref())?;

        let outcome = match self.record_frame(scene, slot) {
            Ok(output) => {
                self.consecutive_skips = 0;
                self.stats.frames += 1;
                FrameOutcome::Presented(output)
            }
            Err(e) if e.is_recoverable() => {
                if self.recover_from_allocation_failure()? {
                    self.consecutive_skips = 0;
                } else {
                    self.consecutive_skips += 1;
                }
                if self.consecutive_skips > MAX_CONSECUTIVE_SKIPS {
                    log::error!(
                        "Frame {} aborted after {MAX_CONSECUTIVE_SKIPS} skipped frames: {e}",
                        self.fences.frame_index()
                    );
                    self.consecutive_skips = 0;
                    return Err(e);
                }
                log::warn!("Frame {} skipped: {e}", self.fences.frame_index());
                self.stats.skipped_frames += 1;
                FrameOutcome::Skipped
            }
            Err(e) => {
                log::error!("Frame {} aborted: {e}", self.fences.frame_index());
                return Err(e);
            }
        };
        self.stats.frame_time = start.elapsed();
        Ok(outcome)
    }

    /// Drains the pipeline and applies the allocation fallback.
    ///
    /// Returns `true` if a resolution was lowered.
    fn recover_from_allocation_failure(&mut self) -> Result<bool, RenderError> {
        let device = Arc::clone(&self.device);
        self.fences.drain(device.as_ref())?;
        self.textures.clear_unused(device.as_ref());
        let shadow_failure = std::mem::take(&mut self.shadow_allocation_failed);
        let AllocationFallback::ReduceResolution { min_scale } = self.config.allocation_fallback else {
            return Ok(false);
        };
        if shadow_failure {
            let lowered = self.shadows.reduce_resolution();
            if lowered {
                log::warn!(
                    "Shadow map resolution reduced to {}",
                    self.shadows.default_resolution()
                );
            }
            return Ok(lowered);
        }
        if self.render_scale > min_scale {
            self.render_scale = (self.render_scale * 0.5).max(min_scale);
            log::warn!("Render scale reduced to {}", self.render_scale);
            return Ok(true);
        }
        Ok(false)
    }

    /// Prepares, records and submits one frame into `slot`.
    ///
    /// IBL stages baked in this frame are written back to the scene only once
    /// the frame is submitted.
    fn record_frame(&mut self, scene: &mut Scene, slot: usize) -> Result<FrameOutput, RenderError> {
        let device_handle = Arc::clone(&self.device);
        let device = device_handle.as_ref();
        self.shadow_allocation_failed = false;
        self.ensure_targets()?;
        let extent = self.gbuffer.size();
        let targets = *self
            .gbuffer
            .targets()
            .ok_or_else(|| RenderError::Internal("G-buffer is not allocated".to_string()))?;

        let mut encoder = device.create_command_encoder(Some("Scene Frame"));
        let baked_ibl = self.bake_ibl(scene.ibl.as_ref(), device, encoder.as_mut())?;

        // Gather
        let lists = scene.gather();
        if self.shadows.needs_sync(scene, &lists.lights) {
            self.fences.drain(device)?;
            self.shadows
                .sync(device, scene, &lists.lights)
                .inspect_err(|_| self.shadow_allocation_failed = true)?;
        }
        let views = collect_views(scene, &lists.cameras, extent);
        if views.is_empty() {
            log::debug!("No enabled camera; only shadows are rendered");
        }

        // Batch
        self.batcher.begin_frame(slot);
        let shadow_view = views.first().map(|view| ShadowView {
            view_projection: view.view_projection,
            near: view.near,
            far: view.far,
        });
        self.shadows.prepare(
            device,
            slot,
            scene,
            &mut self.batcher,
            &lists.lights,
            &lists.meshes,
            shadow_view.as_ref(),
        )?;
        let mut draws: Vec<DrawCallList> = Vec::with_capacity(views.len());
        for view in &views {
            let list = self.batcher.batch(scene, &view.frustum, &lists.meshes);
            self.prepass.prepare(device, &list)?;
            draws.push(list);
        }
        let frame_lights = FrameLights::gather(scene, &lists.lights, &self.shadows);
        let ibl_maps = baked_ibl
            .as_ref()
            .or(scene.ibl.as_ref())
            .and_then(ImageBasedLighting::maps);

        // Upload
        let offsets = self.upload_views(device, slot, scene, &views, &frame_lights, ibl_maps.is_some(), extent)?;
        let instances = self.batcher.upload(device)?;
        upload(&mut self.lights, device, slot, bytemuck::cast_slice(&frame_lights.params))?;

        // Record
        self.tracker.begin_frame();
        self.tracker.enter(FrameStage::Shadows)?;
        self.shadows.encode(encoder.as_mut(), instances);
        self.tracker.produce(Targets::SHADOW_MAPS);
        let shadow_maps: Vec<TextureId> = self.shadows.shadow_textures().collect();

        for (i, (view, list)) in views.iter().zip(&draws).enumerate() {
            log::trace!("Recording view {i} (camera {:?})", view.camera);
            let offsets = offsets[i];
            let binding = ViewBinding {
                camera_buffer: self.cameras.buffer(slot),
                camera_offset: offsets.camera,
            };
            let globals = (self.globals.buffer(slot), offsets.globals);
            self.tracker.begin_view();

            self.run_post(RenderingOrder::BeforePrepass, device, encoder.as_mut(), &targets, binding, extent)?;
            self.prepass
                .encode(encoder.as_mut(), &mut self.tracker, &targets, binding, instances, list)?;

            self.run_post(RenderingOrder::BeforeLightPass, device, encoder.as_mut(), &targets, binding, extent)?;
            let lighting = LightingInputs {
                lights: self.lights.buffer(slot),
                globals,
                light_grid: (self.grid.buffer(slot), offsets.grid),
                light_indices: (self.indices.buffer(slot), offsets.indices),
                shadow_cascades: self.shadows.camera_buffer(),
                shadow_maps: &shadow_maps,
                num_directional: frame_lights.num_directional,
                num_point: frame_lights.num_point,
            };
            self.lighting
                .encode(encoder.as_mut(), &mut self.tracker, &targets, binding, &lighting)?;

            self.run_post(RenderingOrder::BeforeShadePass, device, encoder.as_mut(), &targets, binding, extent)?;
            let shading = ShadingInputs {
                globals,
                ibl: ibl_maps,
                ambient_occlusion: self.post_output(Targets::AMBIENT_OCCLUSION),
                reflection: self.post_output(Targets::REFLECTION),
                clear_color: (i == 0).then_some(self.config.clear_color),
            };
            self.shading
                .encode(encoder.as_mut(), &mut self.tracker, &targets, binding, &shading)?;

            self.run_post(RenderingOrder::AfterShadePass, device, encoder.as_mut(), &targets, binding, extent)?;
        }

        // Submit
        let command_buffer = encoder.finish();
        let submission = device.submit_command_buffer(command_buffer)?;
        self.fences.signal(submission);
        if let Some(baked) = baked_ibl {
            scene.ibl = Some(baked);
        }

        let shadow_draws: usize = self.shadows.passes().iter().map(|p| p.draws.draw_calls().len()).sum();
        let view_draws: usize = draws.iter().map(|list| list.draw_calls().len()).sum();
        self.stats.views = views.len() as u32;
        self.stats.draw_calls = (shadow_draws + view_draws) as u32;
        self.stats.instances = self.batcher.staged_instances();
        self.stats.lights = frame_lights.params.len() as u32;
        self.stats.shadow_passes = self.shadows.passes().len() as u32;
        log::trace!(
            "Frame submitted as {submission:?}: {} views, {} draws, {} instances",
            self.stats.views,
            self.stats.draw_calls,
            self.stats.instances
        );

        Ok(FrameOutput {
            image: targets.output,
            size: extent,
            submission,
        })
    }

    /// Records the pending stages of `ibl` into `encoder`.
    ///
    /// Works on a copy: the scene keeps its stale stages until the frame
    /// carrying the bake is submitted.
    fn bake_ibl(
        &mut self,
        ibl: Option<&ImageBasedLighting>,
        device: &dyn GraphicsDevice,
        encoder: &mut dyn CommandEncoder,
    ) -> Result<Option<ImageBasedLighting>, RenderError> {
        let (Some(ibl), Some(processor)) = (ibl, self.ibl_processor.as_mut()) else {
            return Ok(None);
        };
        if !ibl.is_any_rendering_required() {
            return Ok(None);
        }
        let mut baked = ibl.clone();
        process_pending_ibl(&mut baked, processor.as_mut(), device, encoder)?;
        Ok(Some(baked))
    }

    /// Builds and uploads the camera, globals and tile buffers of every view.
    #[allow(clippy::too_many_arguments)]
    fn upload_views(
        &mut self,
        device: &dyn GraphicsDevice,
        slot: usize,
        scene: &Scene,
        views: &[RenderView],
        lights: &FrameLights,
        ibl_bound: bool,
        extent: (u32, u32),
    ) -> Result<Vec<ViewOffsets>, ResourceError> {
        let globals_size = std::mem::size_of::<LightGlobalParams>();
        let mut camera_bytes = vec![0u8; views.len() * CAMERA_STRIDE as usize];
        let mut globals_bytes = vec![0u8; views.len() * GLOBALS_STRIDE as usize];
        let mut grid_bytes: Vec<u8> = Vec::new();
        let mut index_bytes: Vec<u8> = Vec::new();
        let mut offsets = Vec::with_capacity(views.len());

        for (i, view) in views.iter().enumerate() {
            let camera = i * CAMERA_STRIDE as usize;
            camera_bytes[camera..camera + std::mem::size_of_val(&view.params)]
                .copy_from_slice(bytemuck::bytes_of(&view.params));

            self.light_grid
                .build(extent, &view.view_projection, &lights.point_spheres);
            let params = light_global_params(
                &scene.light_globals,
                ibl_bound,
                self.light_grid.config(),
                extent,
                lights,
            );
            let globals = i * GLOBALS_STRIDE as usize;
            globals_bytes[globals..globals + globals_size].copy_from_slice(bytemuck::bytes_of(&params));

            let grid = append_aligned(&mut grid_bytes, bytemuck::cast_slice(&self.light_grid.grid_data()));
            let indices = append_aligned(&mut index_bytes, bytemuck::cast_slice(self.light_grid.index_data()));
            offsets.push(ViewOffsets {
                camera: camera as u64,
                globals: globals as u64,
                grid,
                indices,
            });
        }

        upload(&mut self.cameras, device, slot, &camera_bytes)?;
        upload(&mut self.globals, device, slot, &globals_bytes)?;
        upload(&mut self.grid, device, slot, &grid_bytes)?;
        upload(&mut self.indices, device, slot, &index_bytes)?;
        Ok(offsets)
    }

    fn run_post(
        &mut self,
        bucket: RenderingOrder,
        device: &dyn GraphicsDevice,
        encoder: &mut dyn CommandEncoder,
        targets: &GBufferTargets,
        view: ViewBinding,
        viewport: (u32, u32),
    ) -> Result<(), RenderError> {
        if self.post.is_empty() {
            return Ok(());
        }
        let mut ctx = PostProcessContext {
            device,
            encoder,
            textures: &mut self.textures,
            gbuffer: targets,
            view,
            viewport,
        };
        self.post.render(bucket, &mut self.tracker, &mut ctx)
    }

    fn post_output(&self, target: Targets) -> Option<TextureId> {
        if self.post.provides().contains(target) {
            self.post.output(target)
        } else {
            None
        }
    }

    /// Waits for the GPU and frees every resource.
    pub fn destroy(mut self) -> Result<(), RenderError> {
        let device = Arc::clone(&self.device);
        let device = device.as_ref();
        self.fences.drain(device)?;
        self.post.destroy(device);
        self.textures.destroy_all(device);
        self.gbuffer.destroy(device);
        self.prepass.destroy(device);
        self.batcher.destroy(device);
        self.shadows.destroy(device);
        self.lighting.destroy(device);
        self.shading.destroy(device);
        for buffer in [self.cameras, self.lights, self.globals, self.grid, self.indices] {
            buffer.destroy(device);
        }
        Ok(())
    }
}

/// Appends `data` at the next aligned offset and returns that offset.
fn append_aligned(bytes: &mut Vec<u8>, data: &[u8]) -> u64 {
    let offset = bytes.len().next_multiple_of(STORAGE_ALIGNMENT);
    bytes.resize(offset, 0);
    bytes.extend_from_slice(data);
    offset as u64
}

fn upload(
    buffer: &mut PerFrameBuffer,
    device: &dyn GraphicsDevice,
    slot: usize,
    bytes: &[u8],
) -> Result<(), ResourceError> {
    if bytes.is_empty() {
        return Ok(());
    }
    buffer.ensure_capacity(device, slot, bytes.len() as u64)?;
    buffer.write(device, slot, 0, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_regions_do_not_overlap() {
        let mut bytes = Vec::new();
        assert_eq!(append_aligned(&mut bytes, &[1; 10]), 0);
        assert_eq!(append_aligned(&mut bytes, &[2; 4]), 256);
        assert_eq!(append_aligned(&mut bytes, &[]), 512);
        assert_eq!(bytes.len(), 512);
        assert_eq!(bytes[256], 2);
    }
}
