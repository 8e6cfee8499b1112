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

//! Frame fences and per-frame buffers driven against the headless backend.

use lumen_core::renderer::api::{BufferUsage, SubmissionIndex};
use lumen_core::renderer::{FrameFences, GraphicsDevice, PerFrameBuffer};
use lumen_infra::{DeviceEvent, HeadlessDevice};

fn submit_nothing(device: &HeadlessDevice) -> SubmissionIndex {
    let encoder = device.create_command_encoder(Some("empty"));
    device.submit_command_buffer(encoder.finish()).unwrap()
}

#[test]
fn acquire_blocks_only_when_the_slot_wraps() {
    let device = HeadlessDevice::new();
    let mut fences = FrameFences::new(3);

    for expected_slot in 0..3 {
        assert_eq!(fences.acquire(&device).unwrap(), expected_slot);
        let index = submit_nothing(&device);
        fences.signal(index);
    }
    assert!(!device
        .events()
        .iter()
        .any(|e| matches!(e, DeviceEvent::Wait { .. })));

    // Frame 3 reuses slot 0, last read by submission 1.
    assert_eq!(fences.acquire(&device).unwrap(), 0);
    assert!(device.events().contains(&DeviceEvent::Wait {
        index: SubmissionIndex(1)
    }));
    assert!(device.is_submission_complete(SubmissionIndex(1)));
    assert!(!device.is_submission_complete(SubmissionIndex(2)));
}

#[test]
fn acquire_skips_the_wait_for_completed_work() {
    let device = HeadlessDevice::new();
    let mut fences = FrameFences::new(2);
    for _ in 0..2 {
        fences.acquire(&device).unwrap();
        let index = submit_nothing(&device);
        fences.signal(index);
    }
    device.complete_all();
    device.clear_events();

    fences.acquire(&device).unwrap();
    assert!(device.events().is_empty());
}

#[test]
fn frames_in_flight_is_at_least_two() {
    assert_eq!(FrameFences::new(0).frames_in_flight(), 2);
    assert_eq!(FrameFences::new(4).frames_in_flight(), 4);
}

#[test]
fn drain_waits_for_every_slot() {
    let device = HeadlessDevice::new();
    let mut fences = FrameFences::new(3);
    for _ in 0..2 {
        fences.acquire(&device).unwrap();
        let index = submit_nothing(&device);
        fences.signal(index);
    }
    fences.drain(&device).unwrap();
    assert!(fences.is_drained());
    assert_eq!(device.pending_submissions(), 0);
}

#[test]
fn per_frame_buffer_grows_one_slot_at_a_time() {
    let device = HeadlessDevice::new();
    let mut ring = PerFrameBuffer::new(&device, 2, 64, BufferUsage::STORAGE, "Instances").unwrap();
    let before = ring.buffer(1);

    assert!(ring.ensure_capacity(&device, 0, 100).unwrap());
    assert_eq!(ring.capacity(0), 128);
    assert_eq!(ring.capacity(1), 64);
    assert_eq!(ring.buffer(1), before);

    assert!(ring.write(&device, 1, 60, &[0; 8]).is_err());
    ring.write(&device, 0, 64, &[7; 8]).unwrap();
    let contents = device.buffer_contents(ring.buffer(0)).unwrap();
    assert_eq!(&contents[64..72], &[7; 8]);
    assert_eq!(
        device.buffer_label(ring.buffer(0)).as_deref(),
        Some("Instances [slot 0]")
    );

    ring.destroy(&device);
    assert_eq!(device.live_buffer_count(), 0);
}
