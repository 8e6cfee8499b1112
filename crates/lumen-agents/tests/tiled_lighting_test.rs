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

mod common;

use common::{bound_buffer, cube_scene, pass, read, renderer};
use lumen_agents::FrameOutcome;
use lumen_core::math::Vec3;
use lumen_core::renderer::params::{LightGlobalParams, LightParams};
use lumen_core::renderer::tiled::{TileConfig, TileSize};
use lumen_core::RenderConfig;
use lumen_data::components::LightComponent;
use lumen_infra::HeadlessDevice;
use lumen_lanes::bindings;

fn config() -> RenderConfig {
    RenderConfig {
        tiles: TileConfig {
            tile_size: TileSize::X32,
            max_lights_per_tile: 8,
        },
        ..Default::default()
    }
}

#[test]
fn light_outside_every_tile_contributes_nowhere() {
    let device = HeadlessDevice::new();
    let mut world = cube_scene(&device);
    let lamp = world.scene.graph.spawn(world.scene.root(), "lamp").unwrap();
    world.scene.graph.set_position(lamp, Vec3::new(0.0, 0.0, 20.0)).unwrap();
    world
        .scene
        .graph
        .add_component(lamp, LightComponent::point(Vec3::ONE, 10.0, 2.0))
        .unwrap();
    let mut renderer = renderer(&device, config());

    let FrameOutcome::Presented(output) = renderer.render_frame(&mut world.scene, 0.0).unwrap()
    else {
        panic!("frame was skipped");
    };
    let grid = renderer.light_grid();
    assert_eq!(grid.tiles(), (10, 8));
    assert_eq!(grid.total_assignments(), 0);

    let passes = device.submitted_passes(output.submission).unwrap();
    let lighting = pass(&passes, "Light Accumulation");
    let (globals, offset) = bound_buffer(lighting, bindings::LIGHT_GLOBALS);
    let globals: LightGlobalParams = read(&device, globals, offset);
    assert_eq!((globals.num_directional, globals.num_point), (1, 1));
    assert_eq!((globals.tiles_x, globals.tiles_y, globals.tile_size), (10, 8, 32));

    // Every uploaded tile record has an empty light list.
    let (grid_buffer, offset) = bound_buffer(lighting, bindings::LIGHT_GRID);
    for tile in 0..80u64 {
        let [_, count]: [u32; 2] = read(&device, grid_buffer, offset + tile * 8);
        assert_eq!(count, 0, "tile {tile} lists a light");
    }
}

#[test]
fn light_reaches_only_the_tiles_it_covers() {
    let device = HeadlessDevice::new();
    let mut world = cube_scene(&device);
    let lamp = world.scene.graph.spawn(world.scene.root(), "lamp").unwrap();
    world.scene.graph.set_position(lamp, Vec3::new(0.0, 0.0, -4.0)).unwrap();
    world
        .scene
        .graph
        .add_component(lamp, LightComponent::point(Vec3::new(1.0, 0.5, 0.0), 10.0, 1.0))
        .unwrap();
    let mut renderer = renderer(&device, config());

    let FrameOutcome::Presented(output) = renderer.render_frame(&mut world.scene, 0.0).unwrap()
    else {
        panic!("frame was skipped");
    };
    let grid = renderer.light_grid();
    let (tiles_x, tiles_y) = grid.tiles();
    // Directional lights come first, so the lamp is light 1.
    assert_eq!(grid.lights_in_tile(tiles_x / 2, tiles_y / 2), &[1]);
    assert!(grid.lights_in_tile(0, 0).is_empty());
    assert!(grid.lights_in_tile(tiles_x - 1, tiles_y - 1).is_empty());
    let assigned = grid.total_assignments();
    assert!(assigned > 0 && assigned < (tiles_x * tiles_y) as usize);

    let passes = device.submitted_passes(output.submission).unwrap();
    let lighting = pass(&passes, "Light Accumulation");
    assert_eq!(lighting.draw_count(), 2);
    let (lights, offset) = bound_buffer(lighting, bindings::LIGHTS);
    let lamp_params: LightParams = read(&device, lights, offset + LightParams::SIZE);
    assert_eq!(lamp_params.direction_type[3], LightParams::TYPE_POINT);
    assert_eq!(lamp_params.position_radius, [0.0, 0.0, -4.0, 1.0]);
}
