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

//! # Lumen Lanes
//!
//! The hot-path stages of a frame. Each stage consumes the data layer and the
//! device contracts from `lumen-core` and records commands; none of them owns
//! the frame loop, which lives in `lumen-agents`.
//!
//! - [`batch`]: culls mesh nodes and groups them into instanced draw calls.
//! - [`shadow`]: allocates shadow buffers and renders their depth passes.
//! - [`deferred`]: the G-buffer, the prepass, tiled light accumulation and shading.
//! - [`postfx`]: the ordering contract of post-processing effects.
//! - [`ibl`]: the handoff to an image-based-lighting precomputation.
//! - [`texture_cache`]: temporary render targets shared between stages.

#![warn(missing_docs)]

pub mod batch;
pub mod bindings;
pub mod deferred;
pub mod ibl;
pub mod postfx;
pub mod shadow;
pub mod texture_cache;

pub use batch::{DrawCall, DrawCallBatcher, DrawCallList};
pub use deferred::{FrameStage, GBuffer, StageTracker};
pub use ibl::{process_pending_ibl, IblProcessor};
pub use postfx::{PostProcessContext, PostProcessLayer, PostProcessStack, RenderingOrder};
pub use shadow::{ShadowBuffer, ShadowManager};
pub use texture_cache::TextureCache;
