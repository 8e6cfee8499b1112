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

//! The deferred pipeline: G-buffer prepass, light accumulation and shading.
//!
//! Per view, the stages run strictly in order:
//!
//! 1. [`Prepass`] writes the G-buffer from the view's draw calls.
//! 2. [`LightAccumulationPass`] adds directional lights over the whole screen
//!    and point lights through the per-tile lists built by [`TileLightGrid`].
//! 3. [`ShadingPass`] combines lighting, ambient/IBL and the occlusion
//!    produced by post-processing into the output target.
//!
//! Every pass checks its inputs against the frame's [`StageTracker`].

mod gbuffer;
mod light_grid;
mod lighting;
mod prepass;
mod shading;
mod stage;

pub use self::gbuffer::{GBuffer, GBufferTargets, DEPTH_FORMAT, HDR_FORMAT, PREPASS_COLOR_FORMATS};
pub use self::light_grid::{tile_frustum, TileLightGrid};
pub use self::lighting::{light_global_params, FrameLights, LightAccumulationPass, LightingInputs};
pub use self::prepass::Prepass;
pub use self::shading::{ShadingInputs, ShadingPass};
pub use self::stage::{FrameStage, StageTracker, Targets};

use lumen_core::renderer::api::BufferId;

/// Stride between camera parameter blocks of one frame.
pub const CAMERA_STRIDE: u64 = 512;

/// Where a view's camera parameters live in the frame's camera buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewBinding {
    /// The camera buffer of the frame slot.
    pub camera_buffer: BufferId,
    /// Byte offset of this view's `CameraParams`.
    pub camera_offset: u64,
}
