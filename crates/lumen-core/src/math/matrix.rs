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

//! Defines the `Mat4` type and associated operations.

use super::{Vec3, Vec4, EPSILON};
use approx::AbsDiffEq;
use std::ops::Mul;

/// A 4x4 column-major matrix.
///
/// This is the primary type for representing node transforms, camera view and
/// projection matrices. The memory layout is column-major, which is what the
/// GPU parameter blocks expect.
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Mat4 {
    /// The columns of the matrix. `cols[0]` is the first column, and so on.
    pub cols: [Vec4; 4],
}

impl Mat4 {
    /// The 4x4 identity matrix.
    pub const IDENTITY: Self = Self {
        cols: [Vec4::X, Vec4::Y, Vec4::Z, Vec4::W],
    };

    /// A 4x4 matrix with all elements set to 0.
    pub const ZERO: Self = Self {
        cols: [Vec4::ZERO; 4],
    };

    /// Creates a new matrix from four column vectors.
    #[inline]
    pub const fn from_cols(c0: Vec4, c1: Vec4, c2: Vec4, c3: Vec4) -> Self {
        Self {
            cols: [c0, c1, c2, c3],
        }
    }

    /// Creates a matrix from a column-major 2D array.
    #[inline]
    pub fn from_cols_array_2d(m: &[[f32; 4]; 4]) -> Self {
        Self::from_cols(
            Vec4::new(m[0][0], m[0][1], m[0][2], m[0][3]),
            Vec4::new(m[1][0], m[1][1], m[1][2], m[1][3]),
            Vec4::new(m[2][0], m[2][1], m[2][2], m[2][3]),
            Vec4::new(m[3][0], m[3][1], m[3][2], m[3][3]),
        )
    }

    /// Returns the matrix as a column-major 2D array, ready for a GPU parameter block.
    #[inline]
    pub fn to_cols_array_2d(&self) -> [[f32; 4]; 4] {
        [
            self.cols[0].to_array(),
            self.cols[1].to_array(),
            self.cols[2].to_array(),
            self.cols[3].to_array(),
        ]
    }

    /// Returns a row of the matrix as a `Vec4`.
    #[inline]
    pub fn get_row(&self, index: usize) -> Vec4 {
        Vec4::new(
            self.cols[0].get(index),
            self.cols[1].get(index),
            self.cols[2].get(index),
            self.cols[3].get(index),
        )
    }

    /// Creates a translation matrix.
    #[inline]
    pub fn from_translation(v: Vec3) -> Self {
        Self::from_cols(Vec4::X, Vec4::Y, Vec4::Z, Vec4::from_vec3(v, 1.0))
    }

    /// Creates a non-uniform scaling matrix.
    #[inline]
    pub fn from_scale(scale: Vec3) -> Self {
        Self::from_cols(
            Vec4::X * scale.x,
            Vec4::Y * scale.y,
            Vec4::Z * scale.z,
            Vec4::W,
        )
    }

    /// Creates a rotation matrix whose columns are the given orthonormal basis axes.
    #[inline]
    pub fn from_basis(x_axis: Vec3, y_axis: Vec3, z_axis: Vec3) -> Self {
        Self::from_cols(
            Vec4::from_vec3(x_axis, 0.0),
            Vec4::from_vec3(y_axis, 0.0),
            Vec4::from_vec3(z_axis, 0.0),
            Vec4::W,
        )
    }

    /// Creates a matrix for a rotation of `angle` radians around the X-axis.
    #[inline]
    pub fn from_rotation_x(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_basis(Vec3::X, Vec3::new(0.0, c, s), Vec3::new(0.0, -s, c))
    }

    /// Creates a matrix for a rotation of `angle` radians around the Y-axis.
    #[inline]
    pub fn from_rotation_y(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_basis(Vec3::new(c, 0.0, -s), Vec3::Y, Vec3::new(s, 0.0, c))
    }

    /// Creates a matrix for a rotation of `angle` radians around the Z-axis.
    #[inline]
    pub fn from_rotation_z(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_basis(Vec3::new(c, s, 0.0), Vec3::new(-s, c, 0.0), Vec3::Z)
    }

    /// Creates a right-handed perspective projection with a `[0, 1]` depth range.
    ///
    /// * `fov_y_radians`: Vertical field of view in radians.
    /// * `aspect_ratio`: Width divided by height of the viewport.
    /// * `z_near`, `z_far`: Positive clip distances with `z_far > z_near`.
    #[inline]
    pub fn perspective_rh_zo(fov_y_radians: f32, aspect_ratio: f32, z_near: f32, z_far: f32) -> Self {
        let f = 1.0 / (fov_y_radians * 0.5).tan();
        let range = z_far / (z_near - z_far);
        Self::from_cols(
            Vec4::new(f / aspect_ratio, 0.0, 0.0, 0.0),
            Vec4::new(0.0, f, 0.0, 0.0),
            Vec4::new(0.0, 0.0, range, -1.0),
            Vec4::new(0.0, 0.0, range * z_near, 0.0),
        )
    }

    /// Creates a right-handed orthographic projection with a `[0, 1]` depth range.
    #[inline]
    pub fn orthographic_rh_zo(
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        z_near: f32,
        z_far: f32,
    ) -> Self {
        let inv_w = 1.0 / (right - left);
        let inv_h = 1.0 / (top - bottom);
        let inv_d = 1.0 / (z_far - z_near);
        Self::from_cols(
            Vec4::new(2.0 * inv_w, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 2.0 * inv_h, 0.0, 0.0),
            Vec4::new(0.0, 0.0, -inv_d, 0.0),
            Vec4::new(
                -(right + left) * inv_w,
                -(top + bottom) * inv_h,
                -z_near * inv_d,
                1.0,
            ),
        )
    }

    /// Creates a right-handed view matrix looking from `eye` towards `target`.
    ///
    /// Returns `None` if `eye` and `target` coincide, or if `up` is parallel to
    /// the view direction.
    pub fn look_at_rh(eye: Vec3, target: Vec3, up: Vec3) -> Option<Self> {
        let forward = (target - eye).try_normalize()?;
        let side = forward.cross(up).try_normalize()?;
        let true_up = side.cross(forward);

        Some(Self::from_cols(
            Vec4::new(side.x, true_up.x, -forward.x, 0.0),
            Vec4::new(side.y, true_up.y, -forward.y, 0.0),
            Vec4::new(side.z, true_up.z, -forward.z, 0.0),
            Vec4::new(-eye.dot(side), -eye.dot(true_up), eye.dot(forward), 1.0),
        ))
    }

    /// Returns the transpose of the matrix.
    #[inline]
    pub fn transpose(&self) -> Self {
        Self::from_cols(
            self.get_row(0),
            self.get_row(1),
            self.get_row(2),
            self.get_row(3),
        )
    }

    /// Computes the inverse of the matrix, or `None` if it is singular.
    pub fn inverse(&self) -> Option<Self> {
        let a = self.to_cols_array_2d();

        let s0 = a[0][0] * a[1][1] - a[1][0] * a[0][1];
        let s1 = a[0][0] * a[1][2] - a[1][0] * a[0][2];
        let s2 = a[0][0] * a[1][3] - a[1][0] * a[0][3];
        let s3 = a[0][1] * a[1][2] - a[1][1] * a[0][2];
        let s4 = a[0][1] * a[1][3] - a[1][1] * a[0][3];
        let s5 = a[0][2] * a[1][3] - a[1][2] * a[0][3];

        let c5 = a[2][2] * a[3][3] - a[3][2] * a[2][3];
        let c4 = a[2][1] * a[3][3] - a[3][1] * a[2][3];
        let c3 = a[2][1] * a[3][2] - a[3][1] * a[2][2];
        let c2 = a[2][0] * a[3][3] - a[3][0] * a[2][3];
        let c1 = a[2][0] * a[3][2] - a[3][0] * a[2][2];
        let c0 = a[2][0] * a[3][1] - a[3][0] * a[2][1];

        let det = s0 * c5 - s1 * c4 + s2 * c3 + s3 * c2 - s4 * c1 + s5 * c0;
        if det.abs() <= f32::MIN_POSITIVE || !det.is_finite() {
            return None;
        }
        let inv = 1.0 / det;

        let b = [
            [
                (a[1][1] * c5 - a[1][2] * c4 + a[1][3] * c3) * inv,
                (-a[0][1] * c5 + a[0][2] * c4 - a[0][3] * c3) * inv,
                (a[3][1] * s5 - a[3][2] * s4 + a[3][3] * s3) * inv,
                (-a[2][1] * s5 + a[2][2] * s4 - a[2][3] * s3) * inv,
            ],
            [
                (-a[1][0] * c5 + a[1][2] * c2 - a[1][3] * c1) * inv,
                (a[0][0] * c5 - a[0][2] * c2 + a[0][3] * c1) * inv,
                (-a[3][0] * s5 + a[3][2] * s2 - a[3][3] * s1) * inv,
                (a[2][0] * s5 - a[2][2] * s2 + a[2][3] * s1) * inv,
            ],
            [
                (a[1][0] * c4 - a[1][1] * c2 + a[1][3] * c0) * inv,
                (-a[0][0] * c4 + a[0][1] * c2 - a[0][3] * c0) * inv,
                (a[3][0] * s4 - a[3][1] * s2 + a[3][3] * s0) * inv,
                (-a[2][0] * s4 + a[2][1] * s2 - a[2][3] * s0) * inv,
            ],
            [
                (-a[1][0] * c3 + a[1][1] * c1 - a[1][2] * c0) * inv,
                (a[0][0] * c3 - a[0][1] * c1 + a[0][2] * c0) * inv,
                (-a[3][0] * s3 + a[3][1] * s1 - a[3][2] * s0) * inv,
                (a[2][0] * s3 - a[2][1] * s1 + a[2][2] * s0) * inv,
            ],
        ];

        Some(Self::from_cols_array_2d(&b))
    }

    /// Returns the translation part of an affine matrix.
    #[inline]
    pub fn translation(&self) -> Vec3 {
        self.cols[3].truncate()
    }

    /// Returns a copy with the translation removed, keeping rotation and scale.
    #[inline]
    pub fn without_translation(&self) -> Self {
        Self::from_cols(self.cols[0], self.cols[1], self.cols[2], Vec4::W)
    }

    /// Transforms a point (`w = 1`), applying the perspective divide when `w != 1`.
    #[inline]
    pub fn transform_point3(&self, p: Vec3) -> Vec3 {
        let v = *self * Vec4::from_vec3(p, 1.0);
        if (v.w - 1.0).abs() > EPSILON && v.w.abs() > EPSILON {
            v.truncate() / v.w
        } else {
            v.truncate()
        }
    }

    /// Transforms a direction (`w = 0`), ignoring translation.
    #[inline]
    pub fn transform_vector3(&self, v: Vec3) -> Vec3 {
        (*self * Vec4::from_vec3(v, 0.0)).truncate()
    }
}

impl Default for Mat4 {
    /// Returns the 4x4 identity matrix.
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul<Mat4> for Mat4 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Mat4) -> Self {
        Self::from_cols(
            self * rhs.cols[0],
            self * rhs.cols[1],
            self * rhs.cols[2],
            self * rhs.cols[3],
        )
    }
}

impl Mul<Vec4> for Mat4 {
    type Output = Vec4;
    #[inline]
    fn mul(self, rhs: Vec4) -> Vec4 {
        self.cols[0] * rhs.x + self.cols[1] * rhs.y + self.cols[2] * rhs.z + self.cols[3] * rhs.w
    }
}

impl AbsDiffEq for Mat4 {
    type Epsilon = f32;

    fn default_epsilon() -> f32 {
        EPSILON
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.cols
            .iter()
            .zip(other.cols.iter())
            .all(|(a, b)| a.abs_diff_eq(b, epsilon))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::FRAC_PI_2;
    use approx::assert_abs_diff_eq;

    #[test]
    fn inverse_of_trs_round_trips() {
        let m = Mat4::from_translation(Vec3::new(1.0, -2.0, 3.0))
            * Mat4::from_rotation_y(0.7)
            * Mat4::from_scale(Vec3::new(2.0, 0.5, 1.5));
        let inv = m.inverse().expect("trs matrix is invertible");
        assert_abs_diff_eq!(m * inv, Mat4::IDENTITY, epsilon = 1e-5);
        assert_abs_diff_eq!(inv * m, Mat4::IDENTITY, epsilon = 1e-5);
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        let m = Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0));
        assert!(m.inverse().is_none());
    }

    #[test]
    fn rotation_z_turns_x_into_y() {
        let r = Mat4::from_rotation_z(FRAC_PI_2);
        assert_abs_diff_eq!(r.transform_vector3(Vec3::X), Vec3::Y, epsilon = 1e-6);
    }

    #[test]
    fn perspective_maps_near_and_far_to_unit_depth_range() {
        let p = Mat4::perspective_rh_zo(1.0, 1.0, 0.5, 50.0);
        let near = p.transform_point3(Vec3::new(0.0, 0.0, -0.5));
        let far = p.transform_point3(Vec3::new(0.0, 0.0, -50.0));
        assert_abs_diff_eq!(near.z, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(far.z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn look_at_rejects_parallel_up() {
        assert!(Mat4::look_at_rh(Vec3::ZERO, Vec3::Y, Vec3::Y).is_none());
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y)
            .expect("valid look-at");
        assert_abs_diff_eq!(
            view.transform_point3(Vec3::ZERO),
            Vec3::new(0.0, 0.0, -5.0),
            epsilon = 1e-5
        );
    }
}
