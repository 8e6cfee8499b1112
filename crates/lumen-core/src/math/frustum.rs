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

//! Planes and six-plane view frusta for visibility culling.
//!
//! A [`Frustum`] is extracted algebraically from a view-projection matrix
//! (Gribb/Hartmann row combinations, adapted to a `[0, 1]` clip depth). Every
//! plane is normalized and faces inward, so a point is visible when its signed
//! distance to all six planes is non-negative.

use super::{Aabb, BoundingSphere, BoundingVolume, Mat4, Vec3, Vec4};

/// A plane in Hessian normal form: `normal · p + d = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Unit normal pointing into the positive half-space.
    pub normal: Vec3,
    /// Signed offset from the origin along `-normal`.
    pub d: f32,
}

impl Plane {
    /// Creates a plane passing through `point` with the given normal.
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let n = normal.normalize();
        Self {
            normal: n,
            d: -n.dot(point),
        }
    }

    /// Creates a normalized plane from raw `(a, b, c, d)` coefficients.
    pub fn from_coefficients(coefficients: Vec4) -> Self {
        let n = coefficients.truncate();
        let len = n.length();
        if len > 0.0 {
            Self {
                normal: n / len,
                d: coefficients.w / len,
            }
        } else {
            Self {
                normal: Vec3::ZERO,
                d: coefficients.w,
            }
        }
    }

    /// Returns the plane equation as `(a, b, c, d)`.
    #[inline]
    pub fn equation(&self) -> Vec4 {
        Vec4::from_vec3(self.normal, self.d)
    }

    /// Signed distance from `point` to the plane; positive on the normal side.
    #[inline]
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }

    /// Re-expresses the plane in the space reached by `m`.
    ///
    /// `inverse` must be the inverse of `m`; plane equations transform by the
    /// inverse transpose.
    pub fn transformed_with_inverse(&self, inverse: &Mat4) -> Self {
        let p = self.equation();
        Self::from_coefficients(Vec4::new(
            p.dot(inverse.cols[0]),
            p.dot(inverse.cols[1]),
            p.dot(inverse.cols[2]),
            p.dot(inverse.cols[3]),
        ))
    }
}

/// Identifies one of the six frustum planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrustumPlane {
    /// The near clipping plane.
    Near = 0,
    /// The far clipping plane.
    Far = 1,
    /// The left side plane.
    Left = 2,
    /// The right side plane.
    Right = 3,
    /// The bottom side plane.
    Bottom = 4,
    /// The top side plane.
    Top = 5,
}

/// A convex visibility volume bounded by six inward-facing planes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    /// The planes, indexed by [`FrustumPlane`].
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Builds a frustum from planes ordered near, far, left, right, bottom, top.
    pub fn from_planes(planes: [Plane; 6]) -> Self {
        Self { planes }
    }

    /// Extracts the frustum of a view-projection matrix.
    pub fn from_view_projection(view_projection: &Mat4) -> Self {
        let r0 = view_projection.get_row(0);
        let r1 = view_projection.get_row(1);
        let r2 = view_projection.get_row(2);
        let r3 = view_projection.get_row(3);

        Self {
            planes: [
                Plane::from_coefficients(r2),
                Plane::from_coefficients(r3 - r2),
                Plane::from_coefficients(r3 + r0),
                Plane::from_coefficients(r3 - r0),
                Plane::from_coefficients(r3 + r1),
                Plane::from_coefficients(r3 - r1),
            ],
        }
    }

    /// Returns one plane.
    #[inline]
    pub fn plane(&self, which: FrustumPlane) -> &Plane {
        &self.planes[which as usize]
    }

    /// Re-expresses the frustum under an additional transform `m`.
    ///
    /// Returns `None` if `m` is not invertible.
    pub fn transformed(&self, m: &Mat4) -> Option<Self> {
        let inverse = m.inverse()?;
        let mut planes = self.planes;
        for plane in planes.iter_mut() {
            *plane = plane.transformed_with_inverse(&inverse);
        }
        Some(Self { planes })
    }

    /// Returns `true` if `point` is inside or on every plane.
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|p| p.signed_distance(point) >= 0.0)
    }

    /// Returns `true` when the sphere lies entirely outside at least one plane.
    pub fn is_sphere_culled(&self, sphere: &BoundingSphere) -> bool {
        self.planes
            .iter()
            .any(|p| p.signed_distance(sphere.center) < -sphere.radius)
    }

    /// Returns `true` when the box lies entirely outside at least one plane.
    ///
    /// Uses the box corner furthest along each plane normal.
    pub fn is_aabb_culled(&self, aabb: &Aabb) -> bool {
        self.planes.iter().any(|p| {
            let support = Vec3::new(
                if p.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if p.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if p.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            p.signed_distance(support) < 0.0
        })
    }

    /// Returns `true` when the volume is certainly invisible.
    ///
    /// The test is conservative: a volume straddling a corner of the frustum
    /// may be reported visible even though it is not.
    pub fn is_culled(&self, volume: &BoundingVolume) -> bool {
        match volume {
            BoundingVolume::Box(b) => self.is_aabb_culled(b),
            BoundingVolume::Sphere(s) => self.is_sphere_culled(s),
        }
    }

    /// Returns the eight world-space corners of the volume clipped by `view_projection`.
    ///
    /// The first four corners lie on the near plane. Returns `None` if the
    /// matrix is not invertible.
    pub fn corners(view_projection: &Mat4) -> Option<[Vec3; 8]> {
        let inverse = view_projection.inverse()?;
        let mut corners = [Vec3::ZERO; 8];
        let mut i = 0;
        for z in [0.0, 1.0] {
            for y in [-1.0, 1.0] {
                for x in [-1.0, 1.0] {
                    corners[i] = inverse.transform_point3(Vec3::new(x, y, z));
                    i += 1;
                }
            }
        }
        Some(corners)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn camera_frustum() -> Frustum {
        let proj = Mat4::perspective_rh_zo(crate::math::FRAC_PI_2, 1.0, 0.1, 100.0);
        Frustum::from_view_projection(&proj)
    }

    #[test]
    fn planes_are_normalized_and_face_inward() {
        let f = camera_frustum();
        for plane in &f.planes {
            assert_abs_diff_eq!(plane.normal.length(), 1.0, epsilon = 1e-5);
            assert!(plane.signed_distance(Vec3::new(0.0, 0.0, -10.0)) > 0.0);
        }
    }

    #[test]
    fn near_plane_sits_at_near_distance() {
        let f = camera_frustum();
        let near = f.plane(FrustumPlane::Near);
        assert_abs_diff_eq!(
            near.signed_distance(Vec3::new(0.0, 0.0, -0.1)),
            0.0,
            epsilon = 1e-4
        );
    }

    #[test]
    fn sphere_culling_is_conservative() {
        let f = camera_frustum();
        let inside = BoundingSphere::new(Vec3::new(0.0, 0.0, -5.0), 1.0);
        let behind = BoundingSphere::new(Vec3::new(0.0, 0.0, 5.0), 1.0);
        let straddling = BoundingSphere::new(Vec3::new(0.0, 0.0, 0.5), 1.0);
        assert!(!f.is_sphere_culled(&inside));
        assert!(f.is_sphere_culled(&behind));
        assert!(!f.is_sphere_culled(&straddling));
    }

    #[test]
    fn box_culling_uses_support_point() {
        let f = camera_frustum();
        let visible = Aabb::from_center_half_extents(Vec3::new(0.0, 0.0, -3.0), Vec3::ONE);
        let far_right = Aabb::from_center_half_extents(Vec3::new(50.0, 0.0, -3.0), Vec3::ONE);
        let beyond_far = Aabb::from_center_half_extents(Vec3::new(0.0, 0.0, -150.0), Vec3::ONE);
        assert!(!f.is_aabb_culled(&visible));
        assert!(f.is_aabb_culled(&far_right));
        assert!(f.is_aabb_culled(&beyond_far));
    }

    #[test]
    fn transformed_frustum_follows_the_transform() {
        let f = camera_frustum();
        let shift = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let moved = f.transformed(&shift).expect("invertible");
        assert!(moved.contains_point(Vec3::new(10.0, 0.0, -5.0)));
        assert!(!moved.contains_point(Vec3::new(0.0, 0.0, 5.0)));
    }

    #[test]
    fn corners_lie_on_near_and_far_planes() {
        let proj = Mat4::perspective_rh_zo(crate::math::FRAC_PI_2, 1.0, 1.0, 10.0);
        let corners = Frustum::corners(&proj).expect("invertible");
        assert_abs_diff_eq!(corners[0].z, -1.0, epsilon = 1e-4);
        assert_abs_diff_eq!(corners[7].z, -10.0, epsilon = 1e-3);
        assert_abs_diff_eq!(corners[7].x, 10.0, epsilon = 1e-3);
    }
}
