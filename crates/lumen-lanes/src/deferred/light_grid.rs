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

//! CPU tiled light culling.
//!
//! The screen is cut into square tiles. Each tile gets a frustum built by
//! narrowing the view's clip space to the tile rectangle, and a point light is
//! assigned to every tile whose frustum its influence sphere intersects.

use lumen_core::math::{BoundingSphere, Frustum, Mat4, Vec4};
use lumen_core::renderer::tiled::TileConfig;

/// Returns the frustum of tile `(x, y)`; row 0 is the top row of the screen.
pub fn tile_frustum(
    view_projection: &Mat4,
    viewport: (u32, u32),
    tile_size: u32,
    tile: (u32, u32),
) -> Frustum {
    let (width, height) = (viewport.0.max(1) as f32, viewport.1.max(1) as f32);
    let px0 = (tile.0 * tile_size) as f32;
    let px1 = ((tile.0 + 1) * tile_size) as f32;
    let py0 = (tile.1 * tile_size) as f32;
    let py1 = ((tile.1 + 1) * tile_size) as f32;

    let x0 = px0 / width * 2.0 - 1.0;
    let x1 = (px1.min(width) / width) * 2.0 - 1.0;
    // Pixel rows grow downwards, NDC y grows upwards.
    let y1 = 1.0 - py0 / height * 2.0;
    let y0 = 1.0 - (py1.min(height) / height) * 2.0;

    let sx = 2.0 / (x1 - x0);
    let sy = 2.0 / (y1 - y0);
    let narrow = Mat4::from_cols(
        Vec4::new(sx, 0.0, 0.0, 0.0),
        Vec4::new(0.0, sy, 0.0, 0.0),
        Vec4::new(0.0, 0.0, 1.0, 0.0),
        Vec4::new(-(x0 + x1) / (x1 - x0), -(y0 + y1) / (y1 - y0), 0.0, 1.0),
    );
    Frustum::from_view_projection(&(narrow * *view_projection))
}

/// Per-tile point light lists of one view.
#[derive(Debug, Clone)]
pub struct TileLightGrid {
    config: TileConfig,
    tiles: (u32, u32),
    counts: Vec<u32>,
    indices: Vec<u32>,
    truncated: usize,
}

impl TileLightGrid {
    /// Creates an empty grid.
    pub fn new(config: TileConfig) -> Self {
        Self {
            config,
            tiles: (0, 0),
            counts: Vec::new(),
            indices: Vec::new(),
            truncated: 0,
        }
    }

    /// The tile configuration.
    pub fn config(&self) -> &TileConfig {
        &self.config
    }

    /// Replaces the tile configuration. Takes effect at the next build.
    pub fn set_config(&mut self, config: TileConfig) {
        self.config = config;
    }

    /// The grid dimensions of the last build.
    pub fn tiles(&self) -> (u32, u32) {
        self.tiles
    }

    /// Assigns `lights` to tiles.
    ///
    /// Each light is `(index into the light buffer, influence sphere)`. Tiles
    /// keep at most `max_lights_per_tile` lights, in input order.
    pub fn build(
        &mut self,
        viewport: (u32, u32),
        view_projection: &Mat4,
        lights: &[(u32, BoundingSphere)],
    ) {
        self.tiles = self.config.tile_dimensions(viewport.0, viewport.1);
        let total = (self.tiles.0 * self.tiles.1) as usize;
        let max = self.config.max_lights_per_tile as usize;
        self.counts.clear();
        self.counts.resize(total, 0);
        self.indices.clear();
        self.indices.resize(total * max, 0);
        self.truncated = 0;

        let view_frustum = Frustum::from_view_projection(view_projection);
        let visible: Vec<&(u32, BoundingSphere)> = lights
            .iter()
            .filter(|(_, sphere)| !view_frustum.is_sphere_culled(sphere))
            .collect();
        if visible.is_empty() {
            return;
        }

        let tile_size = self.config.tile_size.pixels();
        for y in 0..self.tiles.1 {
            for x in 0..self.tiles.0 {
                let frustum = tile_frustum(view_projection, viewport, tile_size, (x, y));
                let tile = (y * self.tiles.0 + x) as usize;
                for (index, sphere) in &visible {
                    if frustum.is_sphere_culled(sphere) {
                        continue;
                    }
                    let count = self.counts[tile] as usize;
                    if count == max {
                        self.truncated += 1;
                        continue;
                    }
                    self.indices[tile * max + count] = *index;
                    self.counts[tile] += 1;
                }
            }
        }
        if self.truncated > 0 {
            log::warn!(
                "Tiled light culling dropped {} light assignments (max {max} per tile)",
                self.truncated
            );
        }
    }

    /// The lights assigned to tile `(x, y)`.
    pub fn lights_in_tile(&self, x: u32, y: u32) -> &[u32] {
        if x >= self.tiles.0 || y >= self.tiles.1 {
            return &[];
        }
        let tile = (y * self.tiles.0 + x) as usize;
        let start = tile * self.config.max_lights_per_tile as usize;
        &self.indices[start..start + self.counts[tile] as usize]
    }

    /// The number of (tile, light) pairs.
    pub fn total_assignments(&self) -> usize {
        self.counts.iter().map(|&c| c as usize).sum()
    }

    /// Assignments dropped by the per-tile limit in the last build.
    pub fn truncated(&self) -> usize {
        self.truncated
    }

    /// The light grid buffer contents: `(offset, count)` per tile.
    pub fn grid_data(&self) -> Vec<[u32; 2]> {
        let max = self.config.max_lights_per_tile;
        self.counts
            .iter()
            .enumerate()
            .map(|(tile, &count)| [tile as u32 * max, count])
            .collect()
    }

    /// The light index buffer contents.
    pub fn index_data(&self) -> &[u32] {
        &self.indices
    }
}
