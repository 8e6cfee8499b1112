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

//! Bounding volumes used for visibility culling.

use super::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box defined by its minimum and maximum corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    /// The corner with the smallest coordinates.
    pub min: Vec3,
    /// The corner with the largest coordinates.
    pub max: Vec3,
}

impl Aabb {
    /// Creates a box from two corners, ordering them component-wise.
    #[inline]
    pub fn from_min_max(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Creates a box from its center and half extents.
    #[inline]
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        let h = half_extents.abs();
        Self {
            min: center - h,
            max: center + h,
        }
    }

    /// Creates the smallest box enclosing all `points`, or `None` if there are none.
    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(Self { min: first, max: first }, |acc, p| Self {
            min: acc.min.min(p),
            max: acc.max.max(p),
        }))
    }

    /// The center of the box.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half of the box size along each axis.
    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Returns the eight corners of the box.
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Returns the axis-aligned box enclosing this box after an affine transform.
    pub fn transformed(&self, m: &Mat4) -> Self {
        let center = m.transform_point3(self.center());
        let e = self.half_extents();
        let row = |i: usize| {
            let r = m.get_row(i);
            r.x.abs() * e.x + r.y.abs() * e.y + r.z.abs() * e.z
        };
        Self::from_center_half_extents(center, Vec3::new(row(0), row(1), row(2)))
    }
}

/// A sphere defined by its center and radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingSphere {
    /// The center of the sphere.
    pub center: Vec3,
    /// The radius of the sphere.
    pub radius: f32,
}

impl BoundingSphere {
    /// Creates a new sphere.
    #[inline]
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Returns the sphere enclosing this one after an affine transform.
    ///
    /// Non-uniform scale is handled by taking the largest axis scale.
    pub fn transformed(&self, m: &Mat4) -> Self {
        let scale = Vec3::new(
            m.cols[0].truncate().length(),
            m.cols[1].truncate().length(),
            m.cols[2].truncate().length(),
        )
        .max_element();
        Self::new(m.transform_point3(self.center), self.radius * scale)
    }
}

/// The bounding volume attached to a mesh or submesh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BoundingVolume {
    /// An axis-aligned box in the mesh's local space.
    Box(Aabb),
    /// A sphere in the mesh's local space.
    Sphere(BoundingSphere),
}

impl BoundingVolume {
    /// Re-expresses the volume under a local-to-world transform.
    pub fn transformed(&self, m: &Mat4) -> Self {
        match self {
            BoundingVolume::Box(b) => BoundingVolume::Box(b.transformed(m)),
            BoundingVolume::Sphere(s) => BoundingVolume::Sphere(s.transformed(m)),
        }
    }

    /// Returns the center of the volume.
    pub fn center(&self) -> Vec3 {
        match self {
            BoundingVolume::Box(b) => b.center(),
            BoundingVolume::Sphere(s) => s.center,
        }
    }

    /// Returns an axis-aligned box enclosing the volume.
    pub fn to_aabb(&self) -> Aabb {
        match self {
            BoundingVolume::Box(b) => *b,
            BoundingVolume::Sphere(s) => {
                Aabb::from_center_half_extents(s.center, Vec3::splat(s.radius))
            }
        }
    }
}

impl From<Aabb> for BoundingVolume {
    fn from(value: Aabb) -> Self {
        BoundingVolume::Box(value)
    }
}

impl From<BoundingSphere> for BoundingVolume {
    fn from(value: BoundingSphere) -> Self {
        BoundingVolume::Sphere(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::FRAC_PI_4;
    use approx::assert_abs_diff_eq;

    #[test]
    fn transformed_box_grows_under_rotation() {
        let unit = Aabb::from_center_half_extents(Vec3::ZERO, Vec3::ONE);
        let rotated = unit.transformed(&Mat4::from_rotation_y(FRAC_PI_4));
        let expected = 2.0_f32.sqrt();
        assert_abs_diff_eq!(rotated.max.x, expected, epsilon = 1e-5);
        assert_abs_diff_eq!(rotated.max.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn transformed_sphere_uses_largest_scale() {
        let s = BoundingSphere::new(Vec3::ZERO, 1.0);
        let m = Mat4::from_translation(Vec3::X) * Mat4::from_scale(Vec3::new(1.0, 3.0, 2.0));
        let t = s.transformed(&m);
        assert_abs_diff_eq!(t.center, Vec3::X);
        assert_abs_diff_eq!(t.radius, 3.0);
    }

    #[test]
    fn from_points_encloses_everything() {
        let b = Aabb::from_points([Vec3::new(1.0, -1.0, 0.0), Vec3::new(-2.0, 4.0, 1.0)])
            .expect("non-empty");
        assert_eq!(b.min, Vec3::new(-2.0, -1.0, 0.0));
        assert_eq!(b.max, Vec3::new(1.0, 4.0, 1.0));
        assert!(Aabb::from_points(std::iter::empty()).is_none());
    }
}
