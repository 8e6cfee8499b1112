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

//! The G-buffer: intermediate targets sized to the viewport.

use lumen_core::renderer::api::{
    Extent3D, TextureDescriptor, TextureFormat, TextureId, TextureUsage,
};
use lumen_core::renderer::{GraphicsDevice, ResourceError};
use std::borrow::Cow;

/// The textures of an allocated G-buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GBufferTargets {
    /// Base color.
    pub albedo: TextureId,
    /// View-space normals.
    pub normal: TextureId,
    /// Roughness, metalness, occlusion and anisotropy.
    pub shading: TextureId,
    /// Tangents for anisotropic shading.
    pub tangent: TextureId,
    /// Scene depth.
    pub depth: TextureId,
    /// Accumulated lighting.
    pub lighting: TextureId,
    /// The final shaded image.
    pub output: TextureId,
}

impl GBufferTargets {
    /// Every target, in declaration order.
    pub fn all(&self) -> [TextureId; 7] {
        [
            self.albedo,
            self.normal,
            self.shading,
            self.tangent,
            self.depth,
            self.lighting,
            self.output,
        ]
    }
}

const TARGETS: [(&str, TextureFormat); 7] = [
    ("GBuffer Albedo", TextureFormat::Rgba8Unorm),
    ("GBuffer Normal", TextureFormat::Rgba16Float),
    ("GBuffer Shading", TextureFormat::Rgba8Unorm),
    ("GBuffer Tangent", TextureFormat::Rgba16Float),
    ("GBuffer Depth", TextureFormat::Depth32Float),
    ("GBuffer Lighting", TextureFormat::Rgba16Float),
    ("GBuffer Output", TextureFormat::Rgba16Float),
];

/// The color formats the prepass writes, in attachment order.
pub const PREPASS_COLOR_FORMATS: [TextureFormat; 4] = [
    TARGETS[0].1,
    TARGETS[1].1,
    TARGETS[2].1,
    TARGETS[3].1,
];
/// The format of the depth target.
pub const DEPTH_FORMAT: TextureFormat = TARGETS[4].1;
/// The format of the lighting and output targets.
pub const HDR_FORMAT: TextureFormat = TARGETS[5].1;

/// G-buffer targets with their current size.
///
/// Resizing replaces every target. The caller must drain all in-flight frames
/// first since they may still sample the old targets.
#[derive(Debug, Default)]
pub struct GBuffer {
    size: (u32, u32),
    targets: Option<GBufferTargets>,
}

impl GBuffer {
    /// Creates an unallocated G-buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// The size the targets have, or will have once allocated.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// The targets, if allocated.
    pub fn targets(&self) -> Option<&GBufferTargets> {
        self.targets.as_ref()
    }

    /// Returns `true` if the targets exist at the current size.
    pub fn is_allocated(&self) -> bool {
        self.targets.is_some()
    }

    /// Returns `true` if [`GBuffer::resize`] to this size would reallocate.
    pub fn needs_resize(&self, width: u32, height: u32) -> bool {
        self.size != (width.max(1), height.max(1)) || self.targets.is_none()
    }

    /// Resizes every target to `width × height`.
    ///
    /// Resizing to the current size is a no-op returning `false`. On failure
    /// no target is allocated and [`GBuffer::ensure_allocated`] retries later.
    pub fn resize(
        &mut self,
        device: &dyn GraphicsDevice,
        width: u32,
        height: u32,
    ) -> Result<bool, ResourceError> {
        if !self.needs_resize(width, height) {
            return Ok(false);
        }
        self.destroy(device);
        self.size = (width.max(1), height.max(1));
        log::info!("Resizing G-buffer to {}x{}", self.size.0, self.size.1);
        self.ensure_allocated(device)?;
        Ok(true)
    }

    /// Allocates the targets if a previous allocation failed.
    pub fn ensure_allocated(&mut self, device: &dyn GraphicsDevice) -> Result<(), ResourceError> {
        if self.targets.is_some() {
            return Ok(());
        }
        let mut created: Vec<TextureId> = Vec::with_capacity(TARGETS.len());
        for (label, format) in TARGETS {
            let usage = if format.is_depth() {
                TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING
            } else {
                TextureUsage::RENDER_ATTACHMENT
                    | TextureUsage::TEXTURE_BINDING
                    | TextureUsage::STORAGE_BINDING
            };
            let result = device.create_texture(&TextureDescriptor {
                label: Some(Cow::Borrowed(label)),
                size: Extent3D::new_2d(self.size.0, self.size.1),
                mip_level_count: 1,
                format,
                usage,
            });
            match result {
                Ok(texture) => created.push(texture),
                Err(e) => {
                    log::error!("Failed to allocate '{label}': {e}");
                    for texture in created {
                        let _ = device.destroy_texture(texture);
                    }
                    return Err(e);
                }
            }
        }
        self.targets = Some(GBufferTargets {
            albedo: created[0],
            normal: created[1],
            shading: created[2],
            tangent: created[3],
            depth: created[4],
            lighting: created[5],
            output: created[6],
        });
        Ok(())
    }

    /// Frees every target. The size is kept.
    pub fn destroy(&mut self, device: &dyn GraphicsDevice) {
        if let Some(targets) = self.targets.take() {
            for texture in targets.all() {
                if let Err(e) = device.destroy_texture(texture) {
                    log::warn!("Failed to destroy G-buffer target {texture:?}: {e}");
                }
            }
        }
    }
}
