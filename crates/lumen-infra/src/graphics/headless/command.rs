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

use lumen_core::renderer::api::{
    BufferId, CommandBufferId, IndexFormat, RenderPassColorAttachment, RenderPassDepthAttachment,
    RenderPassDescriptor, RenderPipelineId, TextureId,
};
use lumen_core::renderer::traits::{CommandEncoder, RenderPass};
use std::ops::Range;

use super::device::HeadlessDevice;

/// A single command recorded inside a render pass.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    /// `set_pipeline`.
    SetPipeline(RenderPipelineId),
    /// `set_vertex_buffer`.
    SetVertexBuffer {
        /// Vertex buffer slot.
        slot: u32,
        /// Bound buffer.
        buffer: BufferId,
        /// Byte offset.
        offset: u64,
    },
    /// `set_index_buffer`.
    SetIndexBuffer {
        /// Bound buffer.
        buffer: BufferId,
        /// Byte offset.
        offset: u64,
        /// Index width.
        format: IndexFormat,
    },
    /// `set_buffer`.
    SetBuffer {
        /// Shader binding.
        binding: u32,
        /// Bound buffer.
        buffer: BufferId,
        /// Byte offset.
        offset: u64,
    },
    /// `set_texture`.
    SetTexture {
        /// Shader binding.
        binding: u32,
        /// Bound texture.
        texture: TextureId,
    },
    /// `draw`.
    Draw {
        /// Vertex range.
        vertices: Range<u32>,
        /// Instance range.
        instances: Range<u32>,
    },
    /// `draw_indexed`.
    DrawIndexed {
        /// Index range.
        indices: Range<u32>,
        /// Value added to each index.
        base_vertex: i32,
        /// Instance range.
        instances: Range<u32>,
    },
}

/// A render pass as it was recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPass {
    /// The pass label.
    pub label: Option<String>,
    /// Color attachments.
    pub color_attachments: Vec<RenderPassColorAttachment>,
    /// Depth attachment.
    pub depth_attachment: Option<RenderPassDepthAttachment>,
    /// Commands in recording order.
    pub commands: Vec<RecordedCommand>,
}

impl RecordedPass {
    /// The total number of instances drawn by the pass.
    pub fn instance_count(&self) -> u32 {
        self.commands
            .iter()
            .map(|c| match c {
                RecordedCommand::Draw { instances, .. }
                | RecordedCommand::DrawIndexed { instances, .. } => instances.len() as u32,
                _ => 0,
            })
            .sum()
    }

    /// The number of draw commands in the pass.
    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    RecordedCommand::Draw { .. } | RecordedCommand::DrawIndexed { .. }
                )
            })
            .count()
    }

    /// Every buffer the pass binds.
    pub fn buffers(&self) -> impl Iterator<Item = BufferId> + '_ {
        self.commands.iter().filter_map(|c| match c {
            RecordedCommand::SetVertexBuffer { buffer, .. }
            | RecordedCommand::SetIndexBuffer { buffer, .. }
            | RecordedCommand::SetBuffer { buffer, .. } => Some(*buffer),
            _ => None,
        })
    }

    /// Every texture the pass reads or writes.
    pub fn textures(&self) -> impl Iterator<Item = TextureId> + '_ {
        let sampled = self.commands.iter().filter_map(|c| match c {
            RecordedCommand::SetTexture { texture, .. } => Some(*texture),
            _ => None,
        });
        self.color_attachments
            .iter()
            .map(|a| a.texture)
            .chain(self.depth_attachment.iter().map(|d| d.texture))
            .chain(sampled)
    }
}

/// A render pass recording into its encoder's pass list.
pub struct HeadlessRenderPass<'a> {
    pass: &'a mut RecordedPass,
}

impl<'pass> RenderPass<'pass> for HeadlessRenderPass<'pass> {
    fn set_pipeline(&mut self, pipeline: RenderPipelineId) {
        self.pass.commands.push(RecordedCommand::SetPipeline(pipeline));
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferId, offset: u64) {
        self.pass.commands.push(RecordedCommand::SetVertexBuffer {
            slot,
            buffer,
            offset,
        });
    }

    fn set_index_buffer(&mut self, buffer: BufferId, offset: u64, index_format: IndexFormat) {
        self.pass.commands.push(RecordedCommand::SetIndexBuffer {
            buffer,
            offset,
            format: index_format,
        });
    }

    fn set_buffer(&mut self, binding: u32, buffer: BufferId, offset: u64) {
        self.pass.commands.push(RecordedCommand::SetBuffer {
            binding,
            buffer,
            offset,
        });
    }

    fn set_texture(&mut self, binding: u32, texture: TextureId) {
        self.pass
            .commands
            .push(RecordedCommand::SetTexture { binding, texture });
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.pass
            .commands
            .push(RecordedCommand::Draw { vertices, instances });
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.pass.commands.push(RecordedCommand::DrawIndexed {
            indices,
            base_vertex,
            instances,
        });
    }
}

/// Records passes until [`CommandEncoder::finish`] hands them to the device.
pub struct HeadlessCommandEncoder {
    pub(crate) label: Option<String>,
    pub(crate) passes: Vec<RecordedPass>,
    pub(crate) device: HeadlessDevice,
}

impl CommandEncoder for HeadlessCommandEncoder {
    fn begin_render_pass<'encoder>(
        &'encoder mut self,
        descriptor: &RenderPassDescriptor<'_>,
    ) -> Box<dyn RenderPass<'encoder> + 'encoder> {
        self.passes.push(RecordedPass {
            label: descriptor.label.map(str::to_owned),
            color_attachments: descriptor.color_attachments.to_vec(),
            depth_attachment: descriptor.depth_attachment,
            commands: Vec::new(),
        });
        let index = self.passes.len() - 1;
        Box::new(HeadlessRenderPass {
            pass: &mut self.passes[index],
        })
    }

    fn finish(self: Box<Self>) -> CommandBufferId {
        let this = *self;
        log::trace!(
            "HeadlessCommandEncoder '{}': finished with {} passes",
            this.label.as_deref().unwrap_or("unnamed"),
            this.passes.len()
        );
        this.device.register_command_buffer(this.passes)
    }
}
