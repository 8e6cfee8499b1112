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

//! Provides the 3D mathematics primitives used by the scene graph and renderer.
//!
//! Conventions used throughout the engine:
//! - Right-handed coordinates, cameras look down `-Z`.
//! - Column vectors, so a point is transformed as `M * p` and transforms
//!   compose right-to-left (`parent_world * local`).
//! - Clip-space depth in `[0, 1]`.
//!
//! All angular functions operate in **radians** unless stated otherwise.

/// A small constant for floating-point comparisons.
pub const EPSILON: f32 = 1e-5;

pub use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI, TAU};

/// The factor to convert degrees to radians (PI / 180.0).
pub const DEG_TO_RAD: f32 = PI / 180.0;

pub mod euler;
pub mod frustum;
pub mod geometry;
pub mod matrix;
pub mod vector;

pub use self::euler::{decompose_trs, matrix_from_euler, TrsParts};
pub use self::frustum::{Frustum, FrustumPlane, Plane};
pub use self::geometry::{Aabb, BoundingSphere, BoundingVolume};
pub use self::matrix::Mat4;
pub use self::vector::{Vec3, Vec4};

/// Converts an angle from degrees to radians.
///
/// # Examples
///
/// ```
/// use lumen_core::math::{degrees_to_radians, PI};
/// assert_eq!(degrees_to_radians(180.0), PI);
/// ```
#[inline]
pub fn degrees_to_radians(degrees: f32) -> f32 {
    degrees * DEG_TO_RAD
}

/// Performs an approximate equality comparison using the module's default [`EPSILON`].
#[inline]
pub fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}
