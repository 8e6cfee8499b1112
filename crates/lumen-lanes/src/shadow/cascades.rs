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

//! Cascade split selection and fitting of directional shadow projections.

use lumen_core::math::{Frustum, Mat4, Vec3, Vec4};

/// Blend between logarithmic and uniform split placement.
pub const SPLIT_LAMBDA: f32 = 0.5;

/// Extra depth kept in front of and behind each cascade so casters outside
/// the view still land in the map.
pub const CASTER_DEPTH_PADDING: f32 = 100.0;

/// Returns the far distance of each of `count` cascades covering `[near, far]`.
///
/// Uses the practical split scheme: a `lambda` blend of logarithmic and
/// uniform distributions. The last split is always `far`.
pub fn cascade_splits(near: f32, far: f32, count: u32, lambda: f32) -> Vec<f32> {
    let count = count.max(1);
    (1..=count)
        .map(|i| {
            let p = i as f32 / count as f32;
            let log = near * (far / near).powf(p);
            let uniform = near + (far - near) * p;
            lambda * log + (1.0 - lambda) * uniform
        })
        .collect()
}

/// Fits an orthographic light projection around the slice `[near, far]` of a
/// camera frustum.
///
/// `camera_corners` are the eight world-space corners of the full camera
/// frustum (near plane first) spanning `[camera_near, camera_far]`. Returns the
/// light's world-to-clip matrix, or `None` if the light basis degenerates.
pub fn fit_directional_cascade(
    camera_corners: &[Vec3; 8],
    camera_near: f32,
    camera_far: f32,
    slice: (f32, f32),
    direction: Vec3,
) -> Option<Mat4> {
    let depth = (camera_far - camera_near).max(f32::EPSILON);
    let t0 = ((slice.0 - camera_near) / depth).clamp(0.0, 1.0);
    let t1 = ((slice.1 - camera_near) / depth).clamp(0.0, 1.0);

    let mut corners = [Vec3::ZERO; 8];
    for i in 0..4 {
        let (near_corner, far_corner) = (camera_corners[i], camera_corners[i + 4]);
        corners[i] = Vec3::lerp(near_corner, far_corner, t0);
        corners[i + 4] = Vec3::lerp(near_corner, far_corner, t1);
    }

    let center = corners.iter().fold(Vec3::ZERO, |acc, p| acc + *p) / 8.0;
    let direction = direction.try_normalize()?;
    let up = if direction.y.abs() > 0.99 { Vec3::Z } else { Vec3::Y };
    let light_view = Mat4::look_at_rh(center, center + direction, up)?;

    let mut min = Vec3::splat(f32::MAX);
    let mut max = Vec3::splat(f32::MIN);
    for p in corners {
        let p = (light_view * Vec4::from_vec3(p, 1.0)).truncate();
        min = min.min(p);
        max = max.max(p);
    }

    // View space looks down -Z, so the nearest point has the largest z.
    let light_projection = Mat4::orthographic_rh_zo(
        min.x,
        max.x,
        min.y,
        max.y,
        -max.z - CASTER_DEPTH_PADDING,
        -min.z + CASTER_DEPTH_PADDING,
    );
    Some(light_projection * light_view)
}

/// Computes the cascade matrices of a directional light for one camera.
///
/// Returns the split far distances and one world-to-clip matrix per cascade.
pub fn directional_cascades(
    camera_view_projection: &Mat4,
    camera_near: f32,
    camera_far: f32,
    cascades: u32,
    direction: Vec3,
) -> Option<(Vec<f32>, Vec<Mat4>)> {
    let corners = Frustum::corners(camera_view_projection)?;
    let splits = cascade_splits(camera_near, camera_far, cascades, SPLIT_LAMBDA);
    let mut matrices = Vec::with_capacity(splits.len());
    let mut previous = camera_near;
    for &split in &splits {
        matrices.push(fit_directional_cascade(
            &corners,
            camera_near,
            camera_far,
            (previous, split),
            direction,
        )?);
        previous = split;
    }
    Some((splits, matrices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lumen_core::math::{BoundingSphere, BoundingVolume};

    #[test]
    fn splits_are_monotonic_and_end_at_far() {
        let splits = cascade_splits(0.1, 100.0, 4, SPLIT_LAMBDA);
        assert_eq!(splits.len(), 4);
        assert!(splits.windows(2).all(|w| w[0] < w[1]));
        assert_relative_eq!(splits[3], 100.0, epsilon = 1e-3);

        let single = cascade_splits(0.1, 50.0, 1, SPLIT_LAMBDA);
        assert_relative_eq!(single[0], 50.0, epsilon = 1e-3);
    }

    #[test]
    fn cascades_cover_their_camera_slice() {
        let projection = Mat4::perspective_rh_zo(60f32.to_radians(), 1.0, 0.1, 50.0);
        let down = Vec3::new(0.3, -1.0, -0.2);
        let (splits, matrices) = directional_cascades(&projection, 0.1, 50.0, 3, down).unwrap();
        assert_eq!(matrices.len(), 3);

        // A point on the view axis inside each slice must land in that cascade.
        let mut near = 0.1;
        for (split, matrix) in splits.iter().zip(&matrices) {
            let depth = (near + split) * 0.5;
            let frustum = Frustum::from_view_projection(matrix);
            let marker = BoundingVolume::Sphere(BoundingSphere::new(Vec3::new(0.0, 0.0, -depth), 0.01));
            assert!(!frustum.is_culled(&marker), "slice ending at {split} misses its center");
            near = *split;
        }
    }
}
