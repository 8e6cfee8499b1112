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

//! Frames-in-flight bookkeeping.
//!
//! The CPU prepares frame `n` while the GPU may still execute frames
//! `n - 1 .. n - N`. All CPU-written GPU state is split into `N` slots and frame
//! `n` uses slot `n mod N`:
//!
//! ```text
//! Frame N:     [Slot 0: GPU reads]
//! Frame N+1:   [Slot 1: CPU writes]
//! Frame N+2:   [Slot 2: CPU writes]
//! Frame N+3:   [Slot 0: wait on fence, then CPU writes]
//! ```
//!
//! [`FrameFences`] records the submission that last consumed each slot and
//! blocks before the slot is reused. [`PerFrameBuffer`] owns one GPU buffer
//! per slot.

use crate::renderer::{
    api::{BufferDescriptor, BufferId, BufferUsage, SubmissionIndex},
    error::{RenderError, ResourceError},
    traits::GraphicsDevice,
};
use std::borrow::Cow;

/// The default number of frames the CPU may run ahead of the GPU.
pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 3;
/// The smallest supported number of frames in flight.
pub const MIN_FRAMES_IN_FLIGHT: usize = 2;

/// One fence per frame slot, gating reuse of that slot's GPU state.
#[derive(Debug)]
pub struct FrameFences {
    /// The submission that last read each slot.
    slots: Vec<Option<SubmissionIndex>>,
    /// The index of the frame being prepared.
    frame_index: u64,
}

impl FrameFences {
    /// Creates fences for `frames_in_flight` slots (at least [`MIN_FRAMES_IN_FLIGHT`]).
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            slots: vec![None; frames_in_flight.max(MIN_FRAMES_IN_FLIGHT)],
            frame_index: 0,
        }
    }

    /// The number of slots.
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// The index of the frame currently being prepared.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// The slot used by the frame currently being prepared.
    pub fn current_slot(&self) -> usize {
        (self.frame_index % self.slots.len() as u64) as usize
    }

    /// The submission that last consumed `slot`, if it has not been observed complete.
    pub fn pending(&self, slot: usize) -> Option<SubmissionIndex> {
        self.slots.get(slot).copied().flatten()
    }

    /// Blocks until the GPU has released the current slot, then returns it.
    ///
    /// This is the backpressure point: with `N` frames already queued, the
    /// producer waits here instead of dropping a frame.
    pub fn acquire(&mut self, device: &dyn GraphicsDevice) -> Result<usize, RenderError> {
        let slot = self.current_slot();
        if let Some(index) = self.slots[slot] {
            if !device.is_submission_complete(index) {
                log::trace!("FrameFences: slot {slot} busy, waiting on {index:?}");
                device.wait_for_submission(index)?;
            }
            self.slots[slot] = None;
        }
        Ok(slot)
    }

    /// Records that the current frame's work was submitted and moves to the next frame.
    pub fn signal(&mut self, submission: SubmissionIndex) {
        let slot = self.current_slot();
        self.slots[slot] = Some(submission);
        self.frame_index += 1;
    }

    /// Blocks until every slot has been released by the GPU.
    pub fn drain(&mut self, device: &dyn GraphicsDevice) -> Result<(), RenderError> {
        for slot in self.slots.iter_mut() {
            if let Some(index) = slot.take() {
                device.wait_for_submission(index)?;
            }
        }
        Ok(())
    }

    /// Returns `true` if no slot is waiting on the GPU.
    pub fn is_drained(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}

/// A GPU buffer per frame slot, written by the CPU once the slot is acquired.
///
/// Each slot grows independently: a slot is only reallocated while its frame
/// owns it, so no in-flight frame ever sees its buffer replaced.
#[derive(Debug)]
pub struct PerFrameBuffer {
    /// One buffer and its capacity in bytes per slot.
    slots: Vec<(BufferId, u64)>,
    /// Usage flags for every slot buffer.
    usage: BufferUsage,
    /// Debug label for logging.
    label: &'static str,
}

impl PerFrameBuffer {
    /// Allocates `frames_in_flight` buffers of `capacity` bytes each.
    ///
    /// # Errors
    ///
    /// Returns a [`ResourceError`] if any allocation fails; buffers created so
    /// far are released first.
    pub fn new(
        device: &dyn GraphicsDevice,
        frames_in_flight: usize,
        capacity: u64,
        usage: BufferUsage,
        label: &'static str,
    ) -> Result<Self, ResourceError> {
        let mut slots = Vec::with_capacity(frames_in_flight);
        for i in 0..frames_in_flight {
            match Self::allocate(device, label, i, capacity, usage) {
                Ok(buffer) => slots.push((buffer, capacity)),
                Err(e) => {
                    for (buffer, _) in slots {
                        let _ = device.destroy_buffer(buffer);
                    }
                    return Err(e);
                }
            }
        }
        Ok(Self {
            slots,
            usage,
            label,
        })
    }

    fn allocate(
        device: &dyn GraphicsDevice,
        label: &str,
        slot: usize,
        capacity: u64,
        usage: BufferUsage,
    ) -> Result<BufferId, ResourceError> {
        device.create_buffer(&BufferDescriptor {
            label: Some(Cow::Owned(format!("{label} [slot {slot}]"))),
            size: capacity.max(16),
            usage: usage | BufferUsage::COPY_DST,
        })
    }

    /// The number of slots.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// The buffer backing `slot`.
    pub fn buffer(&self, slot: usize) -> BufferId {
        self.slots[slot].0
    }

    /// The capacity of `slot` in bytes.
    pub fn capacity(&self, slot: usize) -> u64 {
        self.slots[slot].1
    }

    /// Grows `slot` so it can hold at least `required` bytes.
    ///
    /// Must only be called for a slot acquired through [`FrameFences::acquire`].
    /// Returns `true` if the buffer was replaced.
    pub fn ensure_capacity(
        &mut self,
        device: &dyn GraphicsDevice,
        slot: usize,
        required: u64,
    ) -> Result<bool, ResourceError> {
        let (buffer, capacity) = self.slots[slot];
        if required <= capacity {
            return Ok(false);
        }
        let new_capacity = required.next_power_of_two();
        let replacement = Self::allocate(device, self.label, slot, new_capacity, self.usage)?;
        device.destroy_buffer(buffer)?;
        log::debug!(
            "PerFrameBuffer({}): slot {slot} grown {capacity} -> {new_capacity} bytes",
            self.label
        );
        self.slots[slot] = (replacement, new_capacity);
        Ok(true)
    }

    /// Writes `data` into `slot` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::OutOfBounds`] if the write overruns the slot.
    pub fn write(
        &self,
        device: &dyn GraphicsDevice,
        slot: usize,
        offset: u64,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        let (buffer, capacity) = self.slots[slot];
        if offset + data.len() as u64 > capacity {
            return Err(ResourceError::OutOfBounds);
        }
        device.write_buffer(buffer, offset, data)
    }

    /// Releases every slot buffer. Callers drain the pipeline first.
    pub fn destroy(self, device: &dyn GraphicsDevice) {
        for (buffer, _) in self.slots {
            if let Err(e) = device.destroy_buffer(buffer) {
                log::warn!("PerFrameBuffer({}): failed to destroy buffer: {e}", self.label);
            }
        }
    }
}
