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

//! Scene-wide lighting state: ambient terms and image-based lighting maps.

use bitflags::bitflags;
use lumen_core::math::Vec3;
use lumen_core::renderer::api::TextureId;

/// Ambient and IBL parameters shared by every light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightGlobals {
    /// Linear ambient color.
    pub ambient_color: Vec3,
    /// Ambient intensity.
    pub ambient_intensity: f32,
    /// Multiplier applied to the IBL contribution.
    pub ibl_intensity: f32,
}

impl Default for LightGlobals {
    fn default() -> Self {
        Self {
            ambient_color: Vec3::ONE,
            ambient_intensity: 0.03,
            ibl_intensity: 1.0,
        }
    }
}

bitflags! {
    /// The precomputed maps of image-based lighting.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct IblStages: u32 {
        /// The cube environment map converted from the source panorama.
        const ENVIRONMENT = 1 << 0;
        /// The diffuse irradiance map.
        const IRRADIANCE = 1 << 1;
        /// The prefiltered specular map.
        const SPECULAR = 1 << 2;
        /// The split-sum BRDF lookup table.
        const BRDF_LOOKUP = 1 << 3;
    }
}

/// The maps the shading pass samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IblMaps {
    /// Diffuse irradiance.
    pub irradiance: TextureId,
    /// Prefiltered specular radiance.
    pub prefiltered_specular: TextureId,
    /// BRDF lookup table.
    pub brdf_lookup: TextureId,
}

/// Handles to externally computed image-based lighting maps.
///
/// The maps are produced by an external processor. This type only tracks
/// which of them are stale: changing the source marks every map derived from
/// it as requiring a render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBasedLighting {
    source: TextureId,
    environment: Option<TextureId>,
    irradiance: Option<TextureId>,
    prefiltered_specular: Option<TextureId>,
    brdf_lookup: Option<TextureId>,
    pending: IblStages,
}

impl ImageBasedLighting {
    /// Creates IBL state for an equirectangular source panorama. Every map is pending.
    pub fn new(source: TextureId) -> Self {
        Self {
            source,
            environment: None,
            irradiance: None,
            prefiltered_specular: None,
            brdf_lookup: None,
            pending: IblStages::all(),
        }
    }

    /// The source panorama.
    pub fn source(&self) -> TextureId {
        self.source
    }

    /// Replaces the source panorama, marking the maps derived from it stale.
    ///
    /// The BRDF lookup does not depend on the environment and stays valid.
    pub fn set_source(&mut self, source: TextureId) {
        if source != self.source {
            self.source = source;
            self.pending |= IblStages::ENVIRONMENT | IblStages::IRRADIANCE | IblStages::SPECULAR;
            log::debug!("IBL source changed to {source:?}; derived maps marked stale");
        }
    }

    /// Marks `stages` as requiring a render, e.g. after a quality change.
    pub fn invalidate(&mut self, stages: IblStages) {
        self.pending |= stages;
    }

    /// The stages still waiting to be rendered.
    pub fn pending(&self) -> IblStages {
        self.pending
    }

    /// Returns `true` if any map must be rendered.
    pub fn is_any_rendering_required(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Returns `true` if `stage` must be rendered.
    pub fn is_rendering_required(&self, stage: IblStages) -> bool {
        self.pending.intersects(stage)
    }

    /// Records the texture an external processor produced for `stage`.
    pub fn complete(&mut self, stage: IblStages, texture: TextureId) {
        if stage.contains(IblStages::ENVIRONMENT) {
            self.environment = Some(texture);
        }
        if stage.contains(IblStages::IRRADIANCE) {
            self.irradiance = Some(texture);
        }
        if stage.contains(IblStages::SPECULAR) {
            self.prefiltered_specular = Some(texture);
        }
        if stage.contains(IblStages::BRDF_LOOKUP) {
            self.brdf_lookup = Some(texture);
        }
        self.pending.remove(stage);
    }

    /// The environment cube map, once rendered.
    pub fn environment_map(&self) -> Option<TextureId> {
        self.environment
    }

    /// The maps the shading pass binds, or `None` until all are up to date.
    pub fn maps(&self) -> Option<IblMaps> {
        if self.is_any_rendering_required() {
            return None;
        }
        Some(IblMaps {
            irradiance: self.irradiance?,
            prefiltered_specular: self.prefiltered_specular?,
            brdf_lookup: self.brdf_lookup?,
        })
    }
}
