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

//! Descriptors and handles for command recording and submission.

use super::TextureId;

/// An opaque handle to a finished, not yet submitted, command buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandBufferId(pub u64);

/// Identifies one queue submission. Indices grow monotonically per device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubmissionIndex(pub u64);

/// Describes the operation to perform on an attachment at the start of a render pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LoadOp<V> {
    /// The existing contents of the attachment will be loaded into the pass.
    Load,
    /// The attachment will be cleared to the specified value before the pass begins.
    Clear(V),
}

/// Describes the operation to perform on an attachment at the end of a render pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreOp {
    /// The results of the render pass will be stored to the attachment's memory.
    Store,
    /// The results of the render pass will be discarded.
    Discard,
}

/// Defines the load and store operations for a single render pass attachment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Operations<V> {
    /// The operation to perform at the beginning of the pass.
    pub load: LoadOp<V>,
    /// The operation to perform at the end of the pass.
    pub store: StoreOp,
}

impl<V> Operations<V> {
    /// Clears the attachment to `value` and stores the result.
    pub fn clear(value: V) -> Self {
        Self {
            load: LoadOp::Clear(value),
            store: StoreOp::Store,
        }
    }

    /// Loads the existing contents and stores the result.
    pub fn load() -> Self {
        Self {
            load: LoadOp::Load,
            store: StoreOp::Store,
        }
    }
}

/// A color attachment of a render pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderPassColorAttachment {
    /// The texture rendered to.
    pub texture: TextureId,
    /// The array layer rendered to.
    pub array_layer: u32,
    /// Load and store operations; clear values are linear RGBA.
    pub ops: Operations<[f32; 4]>,
}

/// The depth attachment of a render pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderPassDepthAttachment {
    /// The depth texture.
    pub texture: TextureId,
    /// The array layer rendered to (one cascade of a shadow map, for example).
    pub array_layer: u32,
    /// Load and store operations for depth.
    pub depth_ops: Operations<f32>,
}

/// A descriptor for a render pass.
#[derive(Debug, Default)]
pub struct RenderPassDescriptor<'a> {
    /// An optional debug label for the render pass.
    pub label: Option<&'a str>,
    /// Color attachments, in shader output order.
    pub color_attachments: &'a [RenderPassColorAttachment],
    /// The depth attachment, if any.
    pub depth_attachment: Option<RenderPassDepthAttachment>,
}
