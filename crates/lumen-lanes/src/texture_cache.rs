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

//! A pool of temporary render targets.
//!
//! Passes and post-processing layers borrow scratch textures for the span of
//! a frame and hand them back. The cache is owned by the renderer and passed
//! explicitly to whoever needs it.

use lumen_core::renderer::api::{Extent3D, TextureDescriptor, TextureFormat, TextureId, TextureUsage};
use lumen_core::renderer::{GraphicsDevice, ResourceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TextureKey {
    size: Extent3D,
    mip_level_count: u32,
    format: TextureFormat,
    usage: TextureUsage,
}

impl TextureKey {
    fn of(descriptor: &TextureDescriptor<'_>) -> Self {
        Self {
            size: descriptor.size,
            mip_level_count: descriptor.mip_level_count,
            format: descriptor.format,
            usage: descriptor.usage,
        }
    }
}

#[derive(Debug)]
struct Entry {
    texture: TextureId,
    key: TextureKey,
    in_use: bool,
}

/// Hands out temporary textures, reusing released ones with the same description.
#[derive(Debug, Default)]
pub struct TextureCache {
    entries: Vec<Entry>,
}

impl TextureCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a free texture matching `descriptor`, creating one if needed.
    ///
    /// The label of a reused texture is the one it was created with.
    pub fn acquire(
        &mut self,
        device: &dyn GraphicsDevice,
        descriptor: &TextureDescriptor<'_>,
    ) -> Result<TextureId, ResourceError> {
        let key = TextureKey::of(descriptor);
        if let Some(entry) = self.entries.iter_mut().find(|e| !e.in_use && e.key == key) {
            entry.in_use = true;
            return Ok(entry.texture);
        }
        let texture = device.create_texture(descriptor)?;
        log::trace!(
            "TextureCache: created {:?} for {:?}",
            texture,
            descriptor.label
        );
        self.entries.push(Entry {
            texture,
            key,
            in_use: true,
        });
        Ok(texture)
    }

    /// Returns `texture` to the pool. Returns `false` if the cache does not own it.
    pub fn release(&mut self, texture: TextureId) -> bool {
        match self.entries.iter_mut().find(|e| e.texture == texture) {
            Some(entry) => {
                entry.in_use = false;
                true
            }
            None => false,
        }
    }

    /// The number of textures owned by the cache.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the cache owns no texture.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The number of textures currently handed out.
    pub fn in_use(&self) -> usize {
        self.entries.iter().filter(|e| e.in_use).count()
    }

    /// Destroys every released texture and returns how many were freed.
    ///
    /// Released textures may still be read by in-flight frames; callers drain first.
    pub fn clear_unused(&mut self, device: &dyn GraphicsDevice) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| {
            if entry.in_use {
                return true;
            }
            if let Err(e) = device.destroy_texture(entry.texture) {
                log::warn!("TextureCache: failed to destroy {:?}: {e}", entry.texture);
            }
            false
        });
        before - self.entries.len()
    }

    /// Destroys every texture, including those handed out.
    pub fn destroy_all(&mut self, device: &dyn GraphicsDevice) {
        for entry in self.entries.drain(..) {
            if let Err(e) = device.destroy_texture(entry.texture) {
                log::warn!("TextureCache: failed to destroy {:?}: {e}", entry.texture);
            }
        }
    }
}
