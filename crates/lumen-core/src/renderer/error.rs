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

//! Defines the hierarchy of error types for the rendering subsystem.

use crate::renderer::api::{RenderPipelineId, SubmissionIndex};
use std::fmt;

/// An error related to the creation of a graphics pipeline.
#[derive(Debug)]
pub enum PipelineError {
    /// The backend could not find or compile the named shader entry point.
    MissingEntryPoint {
        /// A descriptive label for the pipeline, if available.
        label: Option<String>,
        /// The entry point that was requested.
        entry_point: String,
    },
    /// The graphics backend failed to build the pipeline state object.
    CompilationFailed {
        /// A descriptive label for the pipeline, if available.
        label: Option<String>,
        /// Detailed error messages from the backend.
        details: String,
    },
    /// The specified render pipeline ID is not valid.
    InvalidRenderPipeline {
        /// The ID of the invalid render pipeline.
        id: RenderPipelineId,
    },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::MissingEntryPoint { label, entry_point } => write!(
                f,
                "Missing entry point '{}' for pipeline '{}'",
                entry_point,
                label.as_deref().unwrap_or("Unknown")
            ),
            PipelineError::CompilationFailed { label, details } => write!(
                f,
                "Pipeline compilation failed for '{}': {}",
                label.as_deref().unwrap_or("Unknown"),
                details
            ),
            PipelineError::InvalidRenderPipeline { id } => {
                write!(f, "Invalid render pipeline ID: {id:?}")
            }
        }
    }
}

impl std::error::Error for PipelineError {}

/// An error related to the creation or use of a GPU resource (buffers, textures, pipelines).
#[derive(Debug)]
pub enum ResourceError {
    /// A pipeline-specific error occurred.
    Pipeline(PipelineError),
    /// The device ran out of memory while allocating a resource.
    OutOfMemory {
        /// A label for the resource that failed to allocate.
        label: String,
        /// The number of bytes requested.
        requested_bytes: u64,
    },
    /// The handle or ID used to reference a resource is invalid.
    InvalidHandle,
    /// An attempt was made to access a resource out of its bounds.
    OutOfBounds,
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
}

impl ResourceError {
    /// Returns `true` for allocation failures that a drain-and-retry may resolve.
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, ResourceError::OutOfMemory { .. })
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Pipeline(err) => write!(f, "Pipeline resource error: {err}"),
            ResourceError::OutOfMemory {
                label,
                requested_bytes,
            } => write!(
                f,
                "Out of device memory allocating '{label}' ({requested_bytes} bytes)"
            ),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::OutOfBounds => write!(f, "Resource access out of bounds."),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Pipeline(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PipelineError> for ResourceError {
    fn from(err: PipelineError) -> Self {
        ResourceError::Pipeline(err)
    }
}

/// A high-level error that can occur within the renderer or graphics device.
#[derive(Debug)]
pub enum RenderError {
    /// An error occurred while managing a GPU resource.
    ResourceError(ResourceError),
    /// A pass tried to read a target before the pass producing it had run.
    ///
    /// This is a programming error and is never retried.
    OrderingViolation {
        /// The target that was read too early.
        target: &'static str,
        /// The pass that attempted the read.
        reader: &'static str,
    },
    /// Waiting on a submitted command buffer failed.
    SubmissionFailed {
        /// The submission that could not be awaited.
        index: SubmissionIndex,
        /// Backend details.
        details: String,
    },
    /// The graphics device was lost and must be reinitialized.
    DeviceLost,
    /// An unexpected or internal error occurred.
    Internal(String),
}

impl RenderError {
    /// Returns `true` when the frame can be skipped and retried after a pipeline drain.
    pub fn is_recoverable(&self) -> bool {
        match self {
            RenderError::ResourceError(err) => err.is_out_of_memory(),
            _ => false,
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::OrderingViolation { target, reader } => write!(
                f,
                "Pass '{reader}' read target '{target}' before it was produced this frame"
            ),
            RenderError::SubmissionFailed { index, details } => {
                write!(f, "Submission {index:?} failed: {details}")
            }
            RenderError::DeviceLost => write!(
                f,
                "The graphics device was lost and needs to be reinitialized."
            ),
            RenderError::Internal(msg) => {
                write!(f, "An internal or unexpected error occurred: {msg}")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}
