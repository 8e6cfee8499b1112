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

use crate::renderer::api::*;
use crate::renderer::error::{RenderError, ResourceError};
use crate::renderer::traits::CommandEncoder;
use std::fmt::Debug;

/// The device-facing contract every graphics backend implements.
///
/// Resource allocation, shader compilation and queue management live behind
/// this trait; the renderer only holds opaque ids.
pub trait GraphicsDevice: Send + Sync + Debug + 'static {
    /// Creates a GPU buffer.
    /// ## Errors
    /// * `ResourceError::OutOfMemory` - If the allocation does not fit.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<BufferId, ResourceError>;

    /// Destroys a buffer. The caller guarantees no in-flight submission reads it.
    fn destroy_buffer(&self, id: BufferId) -> Result<(), ResourceError>;

    /// Writes `data` into a buffer at `offset`, ordered before the next submission.
    /// ## Errors
    /// * `ResourceError::OutOfBounds` - If the write overruns the buffer.
    fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), ResourceError>;

    /// Creates a texture.
    /// ## Errors
    /// * `ResourceError::OutOfMemory` - If the allocation does not fit.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> Result<TextureId, ResourceError>;

    /// Destroys a texture. The caller guarantees no in-flight submission reads it.
    fn destroy_texture(&self, id: TextureId) -> Result<(), ResourceError>;

    /// Builds a render pipeline, specializing it with the descriptor's function constants.
    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> Result<RenderPipelineId, ResourceError>;

    /// Destroys a render pipeline.
    fn destroy_render_pipeline(&self, id: RenderPipelineId) -> Result<(), ResourceError>;

    /// Creates a new command encoder to record GPU commands.
    fn create_command_encoder(&self, label: Option<&str>) -> Box<dyn CommandEncoder>;

    /// Submits a finished command buffer and returns its submission index.
    fn submit_command_buffer(
        &self,
        command_buffer: CommandBufferId,
    ) -> Result<SubmissionIndex, RenderError>;

    /// Returns `true` once the GPU has finished executing the submission.
    fn is_submission_complete(&self, index: SubmissionIndex) -> bool;

    /// Blocks until the GPU has finished executing the submission.
    fn wait_for_submission(&self, index: SubmissionIndex) -> Result<(), RenderError>;

    /// Blocks until every submission so far has completed.
    fn wait_idle(&self) -> Result<(), RenderError>;
}
