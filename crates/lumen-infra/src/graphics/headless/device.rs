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

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lumen_core::renderer::api::{
    BlendMode, BufferDescriptor, BufferId, BufferUsage, CommandBufferId, Extent3D,
    FunctionConstants, RenderPipelineDescriptor, RenderPipelineId, SubmissionIndex,
    TextureDescriptor, TextureFormat, TextureId, TextureUsage,
};
use lumen_core::renderer::traits::{CommandEncoder, GraphicsDevice};
use lumen_core::renderer::{PipelineError, RenderError, ResourceError};

use super::command::{HeadlessCommandEncoder, RecordedCommand, RecordedPass};

/// Something observable that happened on the device, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// The CPU wrote into a buffer.
    BufferWrite {
        /// The written buffer.
        buffer: BufferId,
        /// Byte offset of the write.
        offset: u64,
        /// Number of bytes written.
        len: u64,
    },
    /// A command buffer was submitted.
    Submit {
        /// The new submission.
        index: SubmissionIndex,
    },
    /// The CPU blocked on a submission.
    Wait {
        /// The awaited submission.
        index: SubmissionIndex,
    },
    /// A submission finished executing.
    Completed {
        /// The finished submission.
        index: SubmissionIndex,
    },
    /// A texture was allocated.
    TextureCreated {
        /// The new texture.
        texture: TextureId,
    },
    /// A texture was released.
    TextureDestroyed {
        /// The released texture.
        texture: TextureId,
    },
    /// A resource was destroyed while a pending submission still used it.
    DestroyedWhileInFlight {
        /// The submission still reading the resource.
        index: SubmissionIndex,
    },
}

/// What the device remembers about a texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureInfo {
    /// The label it was created with.
    pub label: Option<String>,
    /// Its size.
    pub size: Extent3D,
    /// Its format.
    pub format: TextureFormat,
    /// Its usages.
    pub usage: TextureUsage,
}

/// What the device remembers about a render pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineInfo {
    /// The label it was created with.
    pub label: Option<String>,
    /// The specialization flags it was built with.
    pub constants: FunctionConstants,
    /// Its blend mode.
    pub blend: BlendMode,
}

#[derive(Debug)]
struct HeadlessBufferEntry {
    label: Option<String>,
    usage: BufferUsage,
    data: Vec<u8>,
}

#[derive(Debug)]
struct HeadlessTextureEntry {
    info: TextureInfo,
    bytes: u64,
}

#[derive(Debug, Default)]
struct QueueState {
    /// The index handed to the last submission; 0 means nothing was submitted.
    last_submitted: u64,
    /// Every submission up to this index has completed.
    last_completed: u64,
    /// Recorded passes of every submission, kept for inspection.
    submissions: HashMap<SubmissionIndex, Vec<RecordedPass>>,
    events: Vec<DeviceEvent>,
}

/// The internal, non-clonable state of the [`HeadlessDevice`].
#[derive(Debug)]
struct HeadlessDeviceInternal {
    buffers: Mutex<HashMap<BufferId, HeadlessBufferEntry>>,
    textures: Mutex<HashMap<TextureId, HeadlessTextureEntry>>,
    pipelines: Mutex<HashMap<RenderPipelineId, PipelineInfo>>,
    pending_command_buffers: Mutex<HashMap<CommandBufferId, Vec<RecordedPass>>>,
    queue: Mutex<QueueState>,

    next_buffer_id: AtomicUsize,
    next_texture_id: AtomicUsize,
    next_pipeline_id: AtomicUsize,
    command_buffer_id_counter: AtomicU64,

    allocated_bytes: AtomicU64,
    peak_bytes: AtomicU64,
    /// Allocation limit in bytes; `u64::MAX` means unlimited.
    memory_budget: AtomicU64,
    lost: AtomicBool,
}

/// A clonable, thread-safe handle to a graphics device that records instead of rendering.
///
/// Submissions stay pending until the CPU waits on them (or calls
/// [`HeadlessDevice::complete_all`]), which makes frame pacing deterministic.
#[derive(Clone, Debug)]
pub struct HeadlessDevice {
    internal: Arc<HeadlessDeviceInternal>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    /// Creates a device with unlimited memory.
    pub fn new() -> Self {
        Self {
            internal: Arc::new(HeadlessDeviceInternal {
                buffers: Mutex::new(HashMap::new()),
                textures: Mutex::new(HashMap::new()),
                pipelines: Mutex::new(HashMap::new()),
                pending_command_buffers: Mutex::new(HashMap::new()),
                queue: Mutex::new(QueueState::default()),
                next_buffer_id: AtomicUsize::new(0),
                next_texture_id: AtomicUsize::new(0),
                next_pipeline_id: AtomicUsize::new(0),
                command_buffer_id_counter: AtomicU64::new(0),
                allocated_bytes: AtomicU64::new(0),
                peak_bytes: AtomicU64::new(0),
                memory_budget: AtomicU64::new(u64::MAX),
                lost: AtomicBool::new(false),
            }),
        }
    }

    /// Creates a device whose allocations fail once `bytes` are in use.
    pub fn with_memory_budget(bytes: u64) -> Self {
        let device = Self::new();
        device.set_memory_budget(Some(bytes));
        device
    }

    /// Changes the allocation limit; `None` removes it.
    pub fn set_memory_budget(&self, bytes: Option<u64>) {
        self.internal
            .memory_budget
            .store(bytes.unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    /// Simulates a lost device: every later submission and wait fails with
    /// [`RenderError::DeviceLost`]. Pending submissions never complete.
    pub fn lose_device(&self) {
        log::error!("HeadlessDevice: device lost");
        self.internal.lost.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once [`Self::lose_device`] was called.
    pub fn is_lost(&self) -> bool {
        self.internal.lost.load(Ordering::Relaxed)
    }

    fn check_alive(&self) -> Result<(), RenderError> {
        if self.is_lost() {
            return Err(RenderError::DeviceLost);
        }
        Ok(())
    }

    /// Bytes currently allocated by live buffers and textures.
    pub fn allocated_bytes(&self) -> u64 {
        self.internal.allocated_bytes.load(Ordering::Relaxed)
    }

    /// The highest value [`Self::allocated_bytes`] ever reached.
    pub fn peak_bytes(&self) -> u64 {
        self.internal.peak_bytes.load(Ordering::Relaxed)
    }

    fn reserve(&self, label: Option<&str>, bytes: u64) -> Result<(), ResourceError> {
        let budget = self.internal.memory_budget.load(Ordering::Relaxed);
        let current = self.internal.allocated_bytes.load(Ordering::Relaxed);
        if current.saturating_add(bytes) > budget {
            log::warn!(
                "HeadlessDevice: allocation of {bytes} bytes for '{}' exceeds budget ({current}/{budget})",
                label.unwrap_or("unnamed")
            );
            return Err(ResourceError::OutOfMemory {
                label: label.unwrap_or("unnamed").to_string(),
                requested_bytes: bytes,
            });
        }
        let now = self.internal.allocated_bytes.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.internal.peak_bytes.fetch_max(now, Ordering::Relaxed);
        Ok(())
    }

    fn release(&self, bytes: u64) {
        self.internal
            .allocated_bytes
            .fetch_sub(bytes, Ordering::Relaxed);
    }

    /// (crate-internal) Stores a finished pass list and returns its id.
    pub(crate) fn register_command_buffer(&self, passes: Vec<RecordedPass>) -> CommandBufferId {
        let id = CommandBufferId(
            self.internal
                .command_buffer_id_counter
                .fetch_add(1, Ordering::SeqCst),
        );
        lock(&self.internal.pending_command_buffers).insert(id, passes);
        id
    }

    fn push_event(&self, event: DeviceEvent) {
        lock(&self.internal.queue).events.push(event);
    }

    /// Returns the first pending submission that references the resource, if any.
    fn pending_use(
        &self,
        uses: impl Fn(&RecordedPass) -> bool,
    ) -> Option<SubmissionIndex> {
        let queue = lock(&self.internal.queue);
        (queue.last_completed + 1..=queue.last_submitted)
            .map(SubmissionIndex)
            .find(|index| {
                queue
                    .submissions
                    .get(index)
                    .is_some_and(|passes| passes.iter().any(&uses))
            })
    }

    fn complete_through(queue: &mut QueueState, index: u64) {
        let target = index.min(queue.last_submitted);
        while queue.last_completed < target {
            queue.last_completed += 1;
            let completed = SubmissionIndex(queue.last_completed);
            queue.events.push(DeviceEvent::Completed { index: completed });
        }
    }

    /// Marks every submitted command buffer as finished, as a GPU catching up would.
    pub fn complete_all(&self) {
        let mut queue = lock(&self.internal.queue);
        let last = queue.last_submitted;
        Self::complete_through(&mut queue, last);
    }

    /// The index of the most recent submission.
    pub fn last_submission(&self) -> Option<SubmissionIndex> {
        let queue = lock(&self.internal.queue);
        (queue.last_submitted > 0).then_some(SubmissionIndex(queue.last_submitted))
    }

    /// The number of submissions that have not completed yet.
    pub fn pending_submissions(&self) -> u64 {
        let queue = lock(&self.internal.queue);
        queue.last_submitted - queue.last_completed
    }

    /// The passes recorded by a submission.
    pub fn submitted_passes(&self, index: SubmissionIndex) -> Option<Vec<RecordedPass>> {
        lock(&self.internal.queue).submissions.get(&index).cloned()
    }

    /// A copy of the event log.
    pub fn events(&self) -> Vec<DeviceEvent> {
        lock(&self.internal.queue).events.clone()
    }

    /// Empties the event log.
    pub fn clear_events(&self) {
        lock(&self.internal.queue).events.clear();
    }

    /// The current contents of a buffer.
    pub fn buffer_contents(&self, id: BufferId) -> Option<Vec<u8>> {
        lock(&self.internal.buffers).get(&id).map(|e| e.data.clone())
    }

    /// The label a buffer was created with.
    pub fn buffer_label(&self, id: BufferId) -> Option<String> {
        lock(&self.internal.buffers)
            .get(&id)
            .and_then(|e| e.label.clone())
    }

    /// What the device knows about a live texture.
    pub fn texture_info(&self, id: TextureId) -> Option<TextureInfo> {
        lock(&self.internal.textures)
            .get(&id)
            .map(|e| e.info.clone())
    }

    /// What the device knows about a live pipeline.
    pub fn pipeline_info(&self, id: RenderPipelineId) -> Option<PipelineInfo> {
        lock(&self.internal.pipelines).get(&id).cloned()
    }

    /// The number of live buffers.
    pub fn live_buffer_count(&self) -> usize {
        lock(&self.internal.buffers).len()
    }

    /// The number of live textures.
    pub fn live_texture_count(&self) -> usize {
        lock(&self.internal.textures).len()
    }

    /// The number of live pipelines.
    pub fn live_pipeline_count(&self) -> usize {
        lock(&self.internal.pipelines).len()
    }

    fn validate_references(&self, passes: &[RecordedPass]) -> Result<(), ResourceError> {
        let buffers = lock(&self.internal.buffers);
        let textures = lock(&self.internal.textures);
        let pipelines = lock(&self.internal.pipelines);
        for pass in passes {
            if let Some(buffer) = pass.buffers().find(|b| !buffers.contains_key(b)) {
                log::error!(
                    "HeadlessDevice: pass {:?} binds unknown buffer {buffer:?}",
                    pass.label
                );
                return Err(ResourceError::InvalidHandle);
            }
            if let Some(texture) = pass.textures().find(|t| !textures.contains_key(t)) {
                log::error!(
                    "HeadlessDevice: pass {:?} uses unknown texture {texture:?}",
                    pass.label
                );
                return Err(ResourceError::InvalidHandle);
            }
            for command in &pass.commands {
                if let RecordedCommand::SetPipeline(id) = command {
                    if !pipelines.contains_key(id) {
                        return Err(PipelineError::InvalidRenderPipeline { id: *id }.into());
                    }
                }
            }
        }
        Ok(())
    }
}

impl GraphicsDevice for HeadlessDevice {
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError> {
        self.reserve(descriptor.label.as_deref(), descriptor.size)?;
        let id = BufferId(self.internal.next_buffer_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.internal.buffers).insert(
            id,
            HeadlessBufferEntry {
                label: descriptor.label.as_deref().map(str::to_owned),
                usage: descriptor.usage,
                data: vec![0; descriptor.size as usize],
            },
        );
        log::trace!(
            "HeadlessDevice: Created buffer '{}' with ID: {id:?}, size: {} bytes",
            descriptor.label.as_deref().unwrap_or_default(),
            descriptor.size
        );
        Ok(id)
    }

    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError> {
        if let Some(index) = self.pending_use(|pass| pass.buffers().any(|b| b == id)) {
            log::error!("HeadlessDevice: buffer {id:?} destroyed while {index:?} is pending");
            self.push_event(DeviceEvent::DestroyedWhileInFlight { index });
        }
        let entry = lock(&self.internal.buffers)
            .remove(&id)
            .ok_or(ResourceError::InvalidHandle)?;
        self.release(entry.data.len() as u64);
        Ok(())
    }

    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError> {
        {
            let mut buffers = lock(&self.internal.buffers);
            let entry = buffers.get_mut(&id).ok_or(ResourceError::InvalidHandle)?;
            if !entry.usage.contains(BufferUsage::COPY_DST) {
                return Err(ResourceError::BackendError(format!(
                    "buffer {id:?} was not created with COPY_DST"
                )));
            }
            let start = offset as usize;
            let end = start + data.len();
            if end > entry.data.len() {
                return Err(ResourceError::OutOfBounds);
            }
            entry.data[start..end].copy_from_slice(data);
        }
        self.push_event(DeviceEvent::BufferWrite {
            buffer: id,
            offset,
            len: data.len() as u64,
        });
        Ok(())
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError> {
        if descriptor.size.texel_count() == 0 {
            return Err(ResourceError::BackendError(format!(
                "texture '{}' has a zero-sized extent",
                descriptor.label.as_deref().unwrap_or("unnamed")
            )));
        }
        let bytes = descriptor.byte_size();
        self.reserve(descriptor.label.as_deref(), bytes)?;
        let id = TextureId(self.internal.next_texture_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.internal.textures).insert(
            id,
            HeadlessTextureEntry {
                info: TextureInfo {
                    label: descriptor.label.as_deref().map(str::to_owned),
                    size: descriptor.size,
                    format: descriptor.format,
                    usage: descriptor.usage,
                },
                bytes,
            },
        );
        self.push_event(DeviceEvent::TextureCreated { texture: id });
        log::trace!(
            "HeadlessDevice: Created texture '{}' {}x{}x{} ({:?})",
            descriptor.label.as_deref().unwrap_or_default(),
            descriptor.size.width,
            descriptor.size.height,
            descriptor.size.depth_or_array_layers,
            descriptor.format
        );
        Ok(id)
    }

    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError> {
        if let Some(index) = self.pending_use(|pass| pass.textures().any(|t| t == id)) {
            log::error!("HeadlessDevice: texture {id:?} destroyed while {index:?} is pending");
            self.push_event(DeviceEvent::DestroyedWhileInFlight { index });
        }
        let entry = lock(&self.internal.textures)
            .remove(&id)
            .ok_or(ResourceError::InvalidHandle)?;
        self.release(entry.bytes);
        self.push_event(DeviceEvent::TextureDestroyed { texture: id });
        Ok(())
    }

    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError> {
        if descriptor.vertex_entry.is_empty() {
            return Err(PipelineError::MissingEntryPoint {
                label: descriptor.label.as_deref().map(str::to_owned),
                entry_point: "vertex".to_string(),
            }
            .into());
        }
        if descriptor.color_formats.is_empty() && descriptor.depth_format.is_none() {
            return Err(PipelineError::CompilationFailed {
                label: descriptor.label.as_deref().map(str::to_owned),
                details: "pipeline has no attachments".to_string(),
            }
            .into());
        }
        let id = RenderPipelineId(self.internal.next_pipeline_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.internal.pipelines).insert(
            id,
            PipelineInfo {
                label: descriptor.label.as_deref().map(str::to_owned),
                constants: descriptor.constants,
                blend: descriptor.blend,
            },
        );
        log::debug!(
            "HeadlessDevice: Created pipeline '{}' ({:?}) with ID: {id:?}",
            descriptor.label.as_deref().unwrap_or_default(),
            descriptor.constants
        );
        Ok(id)
    }

    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError> {
        lock(&self.internal.pipelines)
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| PipelineError::InvalidRenderPipeline { id }.into())
    }

    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder> {
        Box::new(HeadlessCommandEncoder {
            label: label.map(str::to_owned),
            passes: Vec::new(),
            device: self.clone(),
        })
    }

    fn submit_command_buffer(
        &self,
        command_buffer: CommandBufferId,
    ) -> Result<SubmissionIndex, RenderError> {
        self.check_alive()?;
        let passes = lock(&self.internal.pending_command_buffers)
            .remove(&command_buffer)
            .ok_or(ResourceError::InvalidHandle)?;
        self.validate_references(&passes)?;

        let mut queue = lock(&self.internal.queue);
        queue.last_submitted += 1;
        let index = SubmissionIndex(queue.last_submitted);
        log::trace!(
            "HeadlessDevice: submitted {command_buffer:?} as {index:?} ({} passes)",
            passes.len()
        );
        queue.submissions.insert(index, passes);
        queue.events.push(DeviceEvent::Submit { index });
        Ok(index)
    }

    fn is_submission_complete(&self, index: SubmissionIndex) -> bool {
        index.0 <= lock(&self.internal.queue).last_completed
    }

    fn wait_for_submission(&self, index: SubmissionIndex) -> Result<(), RenderError> {
        self.check_alive()?;
        let mut queue = lock(&self.internal.queue);
        if index.0 > queue.last_submitted {
            return Err(RenderError::SubmissionFailed {
                index,
                details: "submission index was never issued".to_string(),
            });
        }
        queue.events.push(DeviceEvent::Wait { index });
        Self::complete_through(&mut queue, index.0);
        Ok(())
    }

    fn wait_idle(&self) -> Result<(), RenderError> {
        self.check_alive()?;
        self.complete_all();
        Ok(())
    }
}
