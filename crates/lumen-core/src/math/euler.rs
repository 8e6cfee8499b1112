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

//! Euler-angle rotations and translation/rotation/scale decomposition.
//!
//! Euler angles are stored as `(x, y, z)` radians and applied X first, then Y,
//! then Z, so the rotation matrix is `Rz * Ry * Rx`.

use super::{Mat4, Vec3};

/// Scale magnitude under which an axis is treated as collapsed during decomposition.
pub const DEGENERATE_SCALE_EPSILON: f32 = 1e-6;

/// Builds the rotation matrix `Rz * Ry * Rx` for the given Euler angles.
pub fn matrix_from_euler(euler: Vec3) -> Mat4 {
    let (sx, cx) = euler.x.sin_cos();
    let (sy, cy) = euler.y.sin_cos();
    let (sz, cz) = euler.z.sin_cos();
    Mat4::from_basis(
        Vec3::new(cy * cz, cy * sz, -sy),
        Vec3::new(sx * sy * cz - cx * sz, sx * sy * sz + cx * cz, sx * cy),
        Vec3::new(cx * sy * cz + sx * sz, cx * sy * sz - sx * cz, cx * cy),
    )
}

/// Extracts Euler angles from an orthonormal rotation basis.
///
/// At gimbal lock (`|y| == PI/2`) the Z angle is pinned to zero and the whole
/// roll is attributed to X.
pub fn euler_from_basis(x_axis: Vec3, y_axis: Vec3, z_axis: Vec3) -> Vec3 {
    let sin_y = (-x_axis.z).clamp(-1.0, 1.0);
    let y = sin_y.asin();
    if sin_y.abs() < 1.0 - DEGENERATE_SCALE_EPSILON {
        Vec3::new(
            y_axis.z.atan2(z_axis.z),
            y,
            x_axis.y.atan2(x_axis.x),
        )
    } else {
        Vec3::new((-z_axis.y).atan2(y_axis.y), y, 0.0)
    }
}

/// The parts of an affine transform split by [`decompose_trs`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrsParts {
    /// The translation column.
    pub translation: Vec3,
    /// Euler angles, or `None` when two or more axes are collapsed and no
    /// rotation can be recovered.
    pub rotation: Option<Vec3>,
    /// Per-axis scale. A mirrored matrix reports a negative X scale.
    pub scale: Vec3,
}

/// Splits an affine matrix into translation, Euler rotation and scale.
///
/// An axis whose scale is below [`DEGENERATE_SCALE_EPSILON`] carries no
/// direction. When exactly one axis is collapsed, it is rebuilt as the cross
/// product of the other two; when more are collapsed, `rotation` is `None`.
pub fn decompose_trs(m: &Mat4) -> TrsParts {
    let translation = m.translation();
    let mut axes = [
        m.cols[0].truncate(),
        m.cols[1].truncate(),
        m.cols[2].truncate(),
    ];
    let mut scale = Vec3::new(axes[0].length(), axes[1].length(), axes[2].length());

    if axes[0].cross(axes[1]).dot(axes[2]) < 0.0 {
        scale.x = -scale.x;
    }

    let lengths = [scale.x, scale.y, scale.z];
    let mut collapsed = Vec::with_capacity(3);
    for (i, axis) in axes.iter_mut().enumerate() {
        if lengths[i].abs() < DEGENERATE_SCALE_EPSILON {
            collapsed.push(i);
        } else {
            *axis = *axis / lengths[i];
        }
    }

    let rotation = match collapsed.as_slice() {
        [] => Some(euler_from_basis(axes[0], axes[1], axes[2])),
        [0] => Some(euler_from_basis(axes[1].cross(axes[2]), axes[1], axes[2])),
        [1] => Some(euler_from_basis(axes[0], axes[2].cross(axes[0]), axes[2])),
        [2] => Some(euler_from_basis(axes[0], axes[1], axes[0].cross(axes[1]))),
        _ => None,
    };

    TrsParts {
        translation,
        rotation,
        scale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn trs(t: Vec3, r: Vec3, s: Vec3) -> Mat4 {
        Mat4::from_translation(t) * matrix_from_euler(r) * Mat4::from_scale(s)
    }

    #[test]
    fn euler_matrix_matches_axis_rotation_product() {
        let e = Vec3::new(0.3, -0.4, 1.1);
        let expected =
            Mat4::from_rotation_z(e.z) * Mat4::from_rotation_y(e.y) * Mat4::from_rotation_x(e.x);
        assert_abs_diff_eq!(matrix_from_euler(e), expected, epsilon = 1e-6);
    }

    #[test]
    fn decompose_recovers_components() {
        let t = Vec3::new(4.0, -1.0, 2.5);
        let r = Vec3::new(0.2, 0.5, -0.9);
        let s = Vec3::new(2.0, 3.0, 0.5);
        let parts = decompose_trs(&trs(t, r, s));
        assert_abs_diff_eq!(parts.translation, t, epsilon = 1e-5);
        assert_abs_diff_eq!(parts.scale, s, epsilon = 1e-5);
        assert_abs_diff_eq!(parts.rotation.expect("rotation"), r, epsilon = 1e-4);
    }

    #[test]
    fn decompose_rebuilds_single_collapsed_axis() {
        let r = Vec3::new(0.0, 0.0, 0.6);
        let parts = decompose_trs(&trs(Vec3::ZERO, r, Vec3::new(1.0, 0.0, 1.0)));
        assert_abs_diff_eq!(parts.scale.y, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(parts.rotation.expect("rotation"), r, epsilon = 1e-5);
    }

    #[test]
    fn decompose_gives_up_when_two_axes_collapse() {
        let parts = decompose_trs(&trs(Vec3::X, Vec3::new(0.1, 0.2, 0.3), Vec3::new(0.0, 0.0, 2.0)));
        assert!(parts.rotation.is_none());
        assert_abs_diff_eq!(parts.translation, Vec3::X);
    }

    #[test]
    fn gimbal_lock_keeps_combined_rotation() {
        let e = Vec3::new(0.4, crate::math::FRAC_PI_2, 0.0);
        let m = matrix_from_euler(e);
        let parts = decompose_trs(&m);
        let rebuilt = matrix_from_euler(parts.rotation.expect("rotation"));
        assert_abs_diff_eq!(rebuilt, m, epsilon = 1e-4);
    }
}
