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

//! Renderer configuration.
//!
//! Configurations are plain serde structs, usually stored as RON:
//!
//! ```ron
//! (
//!     tiles: (tile_size: X32, max_lights_per_tile: 64),
//!     frames_in_flight: 2,
//!     shadow: (resolution: 1024, cascades: 2),
//!     render_scale: 0.75,
//! )
//! ```
//!
//! Missing fields take their default values.

use crate::renderer::{frame::MIN_FRAMES_IN_FLIGHT, tiled::TileConfig, DEFAULT_FRAMES_IN_FLIGHT};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The largest cascade count a shadow buffer may hold.
pub const MAX_SHADOW_CASCADES: u32 = 4;

/// Errors raised while loading or validating a [`RenderConfig`].
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration text is not valid RON for this schema.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The configuration could not be serialized.
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// A field holds a value outside its accepted range.
    #[error("Invalid value for '{field}': {reason}")]
    Invalid {
        /// The offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Shadow map sizing applied to every shadow-casting light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Edge length in texels of each cascade.
    pub resolution: u32,
    /// Number of cascades per shadow buffer.
    pub cascades: u32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            resolution: 2048,
            cascades: 1,
        }
    }
}

/// What the renderer does when a G-buffer allocation runs out of memory.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum AllocationFallback {
    /// The failure propagates; the frame is skipped and retried at full size.
    #[default]
    None,
    /// Halve the render scale on each failure, down to `min_scale`.
    ReduceResolution {
        /// The smallest render scale the fallback may reach.
        min_scale: f32,
    },
}

/// The recognized renderer options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Tile grid used by tiled light culling.
    pub tiles: TileConfig,
    /// Number of frames the CPU may prepare ahead of the GPU.
    pub frames_in_flight: usize,
    /// Shadow map sizing.
    pub shadow: ShadowConfig,
    /// Fraction of the viewport resolution the G-buffer is allocated at.
    pub render_scale: f32,
    /// Allows materials to enable anisotropic shading.
    pub anisotropy: bool,
    /// Response to G-buffer allocation failures.
    pub allocation_fallback: AllocationFallback,
    /// Linear RGBA written to pixels no geometry covers.
    pub clear_color: [f32; 4],
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            tiles: TileConfig::default(),
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            shadow: ShadowConfig::default(),
            render_scale: 1.0,
            anisotropy: true,
            allocation_fallback: AllocationFallback::None,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl RenderConfig {
    /// Parses and validates a configuration from RON text.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a RON configuration file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    /// Serializes the configuration as pretty RON.
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Checks every field against its accepted range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames_in_flight < MIN_FRAMES_IN_FLIGHT {
            return Err(ConfigError::Invalid {
                field: "frames_in_flight",
                reason: format!("must be at least {MIN_FRAMES_IN_FLIGHT}"),
            });
        }
        if self.tiles.max_lights_per_tile == 0 {
            return Err(ConfigError::Invalid {
                field: "tiles.max_lights_per_tile",
                reason: "must be non-zero".to_string(),
            });
        }
        if self.shadow.resolution == 0 || !self.shadow.resolution.is_power_of_two() {
            return Err(ConfigError::Invalid {
                field: "shadow.resolution",
                reason: format!("{} is not a power of two", self.shadow.resolution),
            });
        }
        if !(1..=MAX_SHADOW_CASCADES).contains(&self.shadow.cascades) {
            return Err(ConfigError::Invalid {
                field: "shadow.cascades",
                reason: format!("must be in 1..={MAX_SHADOW_CASCADES}"),
            });
        }
        if !(self.render_scale > 0.0 && self.render_scale <= 2.0) {
            return Err(ConfigError::Invalid {
                field: "render_scale",
                reason: format!("{} is outside (0, 2]", self.render_scale),
            });
        }
        if let AllocationFallback::ReduceResolution { min_scale } = self.allocation_fallback {
            if !(min_scale > 0.0 && min_scale <= self.render_scale) {
                return Err(ConfigError::Invalid {
                    field: "allocation_fallback.min_scale",
                    reason: format!("{min_scale} is outside (0, render_scale]"),
                });
            }
        }
        Ok(())
    }

    /// The G-buffer extent for a viewport, after applying the render scale.
    pub fn scaled_extent(&self, width: u32, height: u32) -> (u32, u32) {
        scale_extent(width, height, self.render_scale)
    }
}

/// Scales a viewport extent, never going below one pixel.
pub fn scale_extent(width: u32, height: u32, scale: f32) -> (u32, u32) {
    let w = ((width as f32) * scale).round().max(1.0) as u32;
    let h = ((height as f32) * scale).round().max(1.0) as u32;
    (w, h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::tiled::TileSize;

    #[test]
    fn default_config_is_valid() {
        let config = RenderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.frames_in_flight, 3);
        assert_eq!(config.tiles.tile_size, TileSize::X16);
    }

    #[test]
    fn partial_ron_fills_defaults() {
        let config = RenderConfig::from_ron_str(
            "(tiles: (tile_size: X32, max_lights_per_tile: 64), frames_in_flight: 2, render_scale: 0.5)",
        )
        .unwrap();
        assert_eq!(config.tiles.tile_size, TileSize::X32);
        assert_eq!(config.frames_in_flight, 2);
        assert_eq!(config.shadow, ShadowConfig::default());
        assert_eq!(config.scaled_extent(1280, 720), (640, 360));
    }

    #[test]
    fn rejects_single_frame_in_flight() {
        let err = RenderConfig::from_ron_str("(frames_in_flight: 1)").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "frames_in_flight",
                ..
            }
        ));
    }

    #[test]
    fn rejects_bad_shadow_settings() {
        let mut config = RenderConfig::default();
        config.shadow.resolution = 1000;
        assert!(config.validate().is_err());

        config.shadow.resolution = 1024;
        config.shadow.cascades = MAX_SHADOW_CASCADES + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn fallback_scale_must_not_exceed_render_scale() {
        let config = RenderConfig {
            render_scale: 0.5,
            allocation_fallback: AllocationFallback::ReduceResolution { min_scale: 0.75 },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn ron_round_trip_preserves_values() {
        let config = RenderConfig {
            anisotropy: false,
            allocation_fallback: AllocationFallback::ReduceResolution { min_scale: 0.25 },
            ..Default::default()
        };
        let text = config.to_ron_string().unwrap();
        assert_eq!(RenderConfig::from_ron_str(&text).unwrap(), config);
    }

    #[test]
    fn scaled_extent_never_reaches_zero() {
        assert_eq!(scale_extent(1, 1, 0.1), (1, 1));
    }
}
