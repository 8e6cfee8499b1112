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

//! Defines data structures related to GPU texture resources.

use bitflags::bitflags;
use std::borrow::Cow;

/// Pixel formats the renderer allocates targets with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGBA, normalized.
    Rgba8Unorm,
    /// 8-bit RGBA, normalized, sRGB encoded.
    Rgba8UnormSrgb,
    /// 16-bit float RGBA.
    Rgba16Float,
    /// 32-bit float RGBA.
    Rgba32Float,
    /// 32-bit float depth.
    Depth32Float,
}

impl TextureFormat {
    /// The size of one texel in bytes.
    pub const fn bytes_per_texel(&self) -> u64 {
        match self {
            TextureFormat::Rgba8Unorm | TextureFormat::Rgba8UnormSrgb => 4,
            TextureFormat::Rgba16Float => 8,
            TextureFormat::Rgba32Float => 16,
            TextureFormat::Depth32Float => 4,
        }
    }

    /// Returns `true` for depth formats.
    pub const fn is_depth(&self) -> bool {
        matches!(self, TextureFormat::Depth32Float)
    }
}

bitflags! {
    /// A set of flags describing the allowed usages of a [`TextureId`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// The texture can be used as the destination of a copy operation.
        const COPY_DST = 1 << 0;
        /// The texture can be bound in a shader for sampling.
        const TEXTURE_BINDING = 1 << 1;
        /// The texture can be used as a storage texture.
        const STORAGE_BINDING = 1 << 2;
        /// The texture can be used as a color or depth attachment in a render pass.
        const RENDER_ATTACHMENT = 1 << 3;
    }
}

/// The size of a texture in texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent3D {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Depth for 3D textures, or layer count for array textures.
    pub depth_or_array_layers: u32,
}

impl Extent3D {
    /// Creates a single-layer 2D extent.
    pub const fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth_or_array_layers: 1,
        }
    }

    /// The number of texels across all layers.
    pub const fn texel_count(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.depth_or_array_layers as u64
    }
}

/// A descriptor used to create a [`TextureId`].
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The size of the texture.
    pub size: Extent3D,
    /// The number of mip levels.
    pub mip_level_count: u32,
    /// The texel format.
    pub format: TextureFormat,
    /// How the texture will be used.
    pub usage: TextureUsage,
}

impl TextureDescriptor<'_> {
    /// The number of bytes the base mip level occupies.
    pub fn byte_size(&self) -> u64 {
        self.size.texel_count() * self.format.bytes_per_texel()
    }
}

/// An opaque handle to a GPU texture resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub usize);
