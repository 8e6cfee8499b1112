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

//! Render pipeline descriptors.
//!
//! Shader compilation happens in the backend; the core only names entry points
//! and the specialization flags a pipeline is built with.

use super::TextureFormat;
use bitflags::bitflags;
use std::borrow::Cow;

bitflags! {
    /// Specialization flags baked into a pipeline when it is built.
    ///
    /// Each bit maps to a boolean shader function constant. Materials select a
    /// pipeline variant once when they are bound, so shaders never branch on
    /// these per draw call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FunctionConstants: u32 {
        /// Sample base color from a texture.
        const HAS_ALBEDO_MAP = 1 << 0;
        /// Perturb normals from a tangent-space normal map.
        const HAS_NORMAL_MAP = 1 << 1;
        /// Sample roughness from a texture.
        const HAS_ROUGHNESS_MAP = 1 << 2;
        /// Sample metalness from a texture.
        const HAS_METALLIC_MAP = 1 << 3;
        /// Sample baked occlusion from a texture.
        const HAS_OCCLUSION_MAP = 1 << 4;
        /// Write tangent-space anisotropy to the G-buffer.
        const ANISOTROPIC = 1 << 5;
        /// Sample shadow maps while accumulating light.
        const RECEIVE_SHADOWS = 1 << 6;
    }
}

/// How fragment output combines with the existing attachment contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlendMode {
    /// Output overwrites the attachment.
    #[default]
    Replace,
    /// Output is added to the attachment (light accumulation).
    Additive,
}

/// A descriptor used to create a [`RenderPipelineId`].
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPipelineDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The vertex shader entry point.
    pub vertex_entry: Cow<'a, str>,
    /// The fragment shader entry point, absent for depth-only pipelines.
    pub fragment_entry: Option<Cow<'a, str>>,
    /// Formats of the color attachments, in attachment order.
    pub color_formats: Vec<TextureFormat>,
    /// Format of the depth attachment, if any.
    pub depth_format: Option<TextureFormat>,
    /// How color outputs are blended.
    pub blend: BlendMode,
    /// Specialization flags.
    pub constants: FunctionConstants,
}

/// An opaque handle to a compiled render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderPipelineId(pub usize);
