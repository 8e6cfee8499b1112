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

//! Tile grid configuration for tiled light culling.
//!
//! The screen is split into square tiles and each tile receives the list of
//! point lights whose influence volume reaches it. The light accumulation pass
//! then loops over tile-local lists instead of the global light list.
//!
//! # Buffer layout
//!
//! ```text
//! light grid:    [tile 0: (offset, count)] [tile 1: (offset, count)] ...
//! light indices: [tile 0: max_lights_per_tile slots] [tile 1: ...] ...
//! ```

use serde::{Deserialize, Serialize};

/// The tile edge used for light culling.
///
/// Smaller tiles cull more precisely but cost more per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TileSize {
    /// 16×16 pixel tiles.
    #[default]
    X16,
    /// 32×32 pixel tiles.
    X32,
}

impl TileSize {
    /// Returns the tile size in pixels.
    #[inline]
    pub const fn pixels(&self) -> u32 {
        match self {
            TileSize::X16 => 16,
            TileSize::X32 => 32,
        }
    }

    /// Calculates the number of tiles needed to cover `screen_size` pixels.
    #[inline]
    pub const fn tile_count(&self, screen_size: u32) -> u32 {
        screen_size.div_ceil(self.pixels())
    }
}

/// Configuration of the light-culling tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileConfig {
    /// The tile size for light culling.
    pub tile_size: TileSize,
    /// Maximum number of lights stored per tile. Longer lists are truncated.
    pub max_lights_per_tile: u32,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            tile_size: TileSize::X16,
            max_lights_per_tile: 128,
        }
    }
}

impl TileConfig {
    /// Calculates the tile grid dimensions for a given screen size.
    #[inline]
    pub const fn tile_dimensions(&self, screen_width: u32, screen_height: u32) -> (u32, u32) {
        (
            self.tile_size.tile_count(screen_width),
            self.tile_size.tile_count(screen_height),
        )
    }

    /// Calculates the total number of tiles for a given screen size.
    #[inline]
    pub fn total_tiles(&self, screen_width: u32, screen_height: u32) -> u32 {
        let (tiles_x, tiles_y) = self.tile_dimensions(screen_width, screen_height);
        tiles_x * tiles_y
    }

    /// Calculates the required light index buffer size in bytes.
    pub fn light_index_buffer_size(&self, screen_width: u32, screen_height: u32) -> u64 {
        let total_tiles = self.total_tiles(screen_width, screen_height) as u64;
        total_tiles * self.max_lights_per_tile as u64 * std::mem::size_of::<u32>() as u64
    }

    /// Calculates the required light grid buffer size in bytes.
    /// Each tile stores (offset: u32, count: u32).
    pub fn light_grid_buffer_size(&self, screen_width: u32, screen_height: u32) -> u64 {
        let total_tiles = self.total_tiles(screen_width, screen_height) as u64;
        total_tiles * 2 * std::mem::size_of::<u32>() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_count_rounds_up() {
        assert_eq!(TileSize::X16.tile_count(1920), 120);
        assert_eq!(TileSize::X16.tile_count(1921), 121);
        assert_eq!(TileSize::X32.tile_count(1080), 34);
    }

    #[test]
    fn buffer_sizes_follow_grid() {
        let config = TileConfig {
            tile_size: TileSize::X32,
            max_lights_per_tile: 8,
        };
        assert_eq!(config.tile_dimensions(64, 33), (2, 2));
        assert_eq!(config.light_index_buffer_size(64, 33), 4 * 8 * 4);
        assert_eq!(config.light_grid_buffer_size(64, 33), 4 * 2 * 4);
    }
}
