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

//! Provides the public, backend-agnostic rendering contracts.
//!
//! This module defines the "common language" for all rendering operations: the
//! abstract [`GraphicsDevice`] and command-recording traits, the resource
//! descriptors, the GPU parameter blocks shared with shaders, and the error
//! types. Concrete backends live in `lumen-infra`; the passes in `lumen-lanes`
//! and the driver in `lumen-agents` only talk to these traits.

pub mod api;
pub mod error;
pub mod frame;
pub mod params;
pub mod tiled;
pub mod traits;

// Re-export the most important traits and types for easier use.
pub use self::api::*;
pub use self::error::{PipelineError, RenderError, ResourceError};
pub use self::frame::{FrameFences, PerFrameBuffer, DEFAULT_FRAMES_IN_FLIGHT};
pub use self::params::{
    CameraParams, InstanceParams, LightGlobalParams, LightParams, MaterialParams,
};
pub use self::tiled::{TileConfig, TileSize};
pub use self::traits::{CommandEncoder, GraphicsDevice, RenderPass};
