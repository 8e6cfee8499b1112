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

//! Per-frame ordering of the deferred stages.
//!
//! Every pass declares the targets it reads and writes. Reading a target
//! nothing has written yet this frame is a programming error and surfaces as
//! [`RenderError::OrderingViolation`] instead of sampling a stale image.

use bitflags::bitflags;
use lumen_core::renderer::RenderError;

/// The stages of a frame, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FrameStage {
    /// Nothing recorded yet.
    Idle,
    /// Depth-only shadow passes.
    Shadows,
    /// Geometry into the G-buffer.
    Prepass,
    /// Directional and tiled light accumulation.
    LightAccumulation,
    /// Final combination into the output target.
    Shading,
    /// Effects running after shading.
    PostProcess,
}

impl FrameStage {
    /// A readable stage name.
    pub const fn name(&self) -> &'static str {
        match self {
            FrameStage::Idle => "idle",
            FrameStage::Shadows => "shadows",
            FrameStage::Prepass => "prepass",
            FrameStage::LightAccumulation => "light accumulation",
            FrameStage::Shading => "shading",
            FrameStage::PostProcess => "post-process",
        }
    }
}

bitflags! {
    /// Intermediate targets written during a frame.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Targets: u32 {
        /// Every shadow map of the frame.
        const SHADOW_MAPS = 1 << 0;
        /// G-buffer albedo.
        const ALBEDO = 1 << 1;
        /// G-buffer normals.
        const NORMAL = 1 << 2;
        /// G-buffer shading parameters.
        const SHADING = 1 << 3;
        /// G-buffer tangents.
        const TANGENT = 1 << 4;
        /// G-buffer depth.
        const DEPTH = 1 << 5;
        /// Accumulated lighting.
        const LIGHTING = 1 << 6;
        /// The final image.
        const OUTPUT = 1 << 7;
        /// Ambient occlusion from post-processing.
        const AMBIENT_OCCLUSION = 1 << 8;
        /// Reflections from post-processing.
        const REFLECTION = 1 << 9;

        /// Everything the prepass writes.
        const GBUFFER = Self::ALBEDO.bits()
            | Self::NORMAL.bits()
            | Self::SHADING.bits()
            | Self::TANGENT.bits()
            | Self::DEPTH.bits();
    }
}

impl Targets {
    /// The name of the lowest target in the set.
    pub fn first_name(&self) -> &'static str {
        const NAMES: [(Targets, &str); 10] = [
            (Targets::SHADOW_MAPS, "shadow maps"),
            (Targets::ALBEDO, "albedo"),
            (Targets::NORMAL, "normal"),
            (Targets::SHADING, "shading parameters"),
            (Targets::TANGENT, "tangent"),
            (Targets::DEPTH, "depth"),
            (Targets::LIGHTING, "lighting"),
            (Targets::OUTPUT, "output"),
            (Targets::AMBIENT_OCCLUSION, "ambient occlusion"),
            (Targets::REFLECTION, "reflection"),
        ];
        NAMES
            .iter()
            .find(|(flag, _)| self.contains(*flag))
            .map_or("unknown", |(_, name)| name)
    }
}

/// Tracks which stage is running and which targets hold this frame's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTracker {
    stage: FrameStage,
    produced: Targets,
}

impl Default for StageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StageTracker {
    /// Creates a tracker for a frame that has not started.
    pub const fn new() -> Self {
        Self {
            stage: FrameStage::Idle,
            produced: Targets::empty(),
        }
    }

    /// Forgets everything produced by the previous frame.
    pub fn begin_frame(&mut self) {
        *self = Self::new();
    }

    /// Starts the passes of another view within the same frame.
    ///
    /// Shadow maps and the output image survive; the G-buffer, lighting and
    /// post-processing contributions must be produced again.
    pub fn begin_view(&mut self) {
        self.produced &= Targets::SHADOW_MAPS | Targets::OUTPUT;
        self.stage = self.stage.min(FrameStage::Shadows);
    }

    /// The current stage.
    pub fn stage(&self) -> FrameStage {
        self.stage
    }

    /// The targets produced so far.
    pub fn produced(&self) -> Targets {
        self.produced
    }

    /// Moves to `stage`. Stages only move forward within a view.
    pub fn enter(&mut self, stage: FrameStage) -> Result<(), RenderError> {
        if stage < self.stage {
            log::error!(
                "Stage '{}' started after '{}' in the same view",
                stage.name(),
                self.stage.name()
            );
            return Err(RenderError::OrderingViolation {
                target: self.stage.name(),
                reader: stage.name(),
            });
        }
        self.stage = stage;
        Ok(())
    }

    /// Records that the current stage wrote `targets`.
    pub fn produce(&mut self, targets: Targets) {
        self.produced |= targets;
    }

    /// Fails unless every target in `targets` was written this frame.
    pub fn require(&self, reader: FrameStage, targets: Targets) -> Result<(), RenderError> {
        let missing = targets - self.produced;
        if missing.is_empty() {
            return Ok(());
        }
        log::error!(
            "'{}' reads '{}' before it was produced",
            reader.name(),
            missing.first_name()
        );
        Err(RenderError::OrderingViolation {
            target: missing.first_name(),
            reader: reader.name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_before_writing_is_a_violation() {
        let mut tracker = StageTracker::new();
        tracker.enter(FrameStage::LightAccumulation).unwrap();
        let err = tracker
            .require(FrameStage::LightAccumulation, Targets::DEPTH | Targets::NORMAL)
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::OrderingViolation { target: "normal", reader: "light accumulation" }
        ));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn stages_only_move_forward_within_a_view() {
        let mut tracker = StageTracker::new();
        tracker.enter(FrameStage::Prepass).unwrap();
        tracker.produce(Targets::GBUFFER);
        tracker.enter(FrameStage::Shading).unwrap();
        assert!(tracker.enter(FrameStage::Prepass).is_err());

        tracker.produce(Targets::OUTPUT);
        tracker.begin_view();
        tracker.enter(FrameStage::Prepass).unwrap();
        assert!(tracker.require(FrameStage::Shading, Targets::DEPTH).is_err());
        assert!(tracker.produced().contains(Targets::OUTPUT));
    }

    #[test]
    fn new_frame_forgets_targets() {
        let mut tracker = StageTracker::new();
        tracker.produce(Targets::SHADOW_MAPS | Targets::GBUFFER);
        tracker.begin_frame();
        assert_eq!(tracker.produced(), Targets::empty());
        assert_eq!(tracker.stage(), FrameStage::Idle);
    }
}
