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

//! # Lumen Infra
//!
//! Concrete implementations of the contracts defined in `lumen-core`.
//!
//! The [`HeadlessDevice`] backend executes no GPU work: it validates and records
//! every command stream, models queue completion as explicit fences, and can
//! enforce a memory budget. It drives the sandbox and the integration tests.

#[cfg(feature = "graphics")]
pub mod graphics;
pub mod logging;

#[cfg(feature = "graphics")]
pub use graphics::headless::{
    DeviceEvent, HeadlessDevice, RecordedCommand, RecordedPass, TextureInfo,
};
pub use logging::init_logging;
