//! Axis Aligned Bounding Boxes.

use crate::utils::{fast_max, fast_min};
use nalgebra::{Point3, Vector3};
use std::fmt;

/// Index of the X axis. Used access `Vector3`/`Point3` structs via index.
pub const X_AXIS: usize = 0;

/// Index of the Y axis. Used access `Vector3`/`Point3` structs via index.
pub const Y_AXIS: usize = 1;

/// Index of the Z axis. Used access `Vector3`/`Point3` structs via index.
pub const Z_AXIS: usize = 2;

/// [`Aabb`] struct.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Aabb {
    /// Minimum coordinates
    pub min: Point3<f32>,

    /// Maximum coordinates
    pub max: Point3<f32>,
}

impl fmt::Display for Aabb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Min bound: {}; Max bound: {}", self.min, self.max)
    }
}

/// A trait implemented by things which can be bounded by an [`Aabb`].
pub trait Bounded {
    /// Returns the geometric bounds of this object in the form of an [`Aabb`].
    fn aabb(&self) -> Aabb;
}

/// A trait implemented by things that may or may not intersect an [`Aabb`] and, by
/// extension, things that can be used to traverse a flat BVH.
///
/// # Examples
/// ```
/// use index_bvh::aabb::{Aabb, IntersectsAabb};
/// use nalgebra::Point3;
///
/// struct XyPlane;
///
/// impl IntersectsAabb for XyPlane {
///     fn intersects_aabb(&self, aabb: &Aabb) -> bool {
///         aabb.min.z <= 0.0 && aabb.max.z >= 0.0
///     }
/// }
///
/// let aabb = Aabb::with_bounds(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
/// assert!(XyPlane.intersects_aabb(&aabb));
/// ```
pub trait IntersectsAabb {
    /// Returns whether this object intersects an [`Aabb`].
    fn intersects_aabb(&self, aabb: &Aabb) -> bool;
}

impl Aabb {
    /// Creates a new [`Aabb`] with the given bounds.
    ///
    /// # Examples
    /// ```
    /// use index_bvh::aabb::Aabb;
    /// use nalgebra::Point3;
    ///
    /// let aabb = Aabb::with_bounds(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
    /// assert_eq!(aabb.min.x, -1.0);
    /// assert_eq!(aabb.max.z, 1.0);
    /// ```
    pub fn with_bounds(min: Point3<f32>, max: Point3<f32>) -> Aabb {
        Aabb { min, max }
    }

    /// Creates a new [`Aabb`] spanning `center ± radius` on every axis.
    ///
    /// A zero `radius` gives a degenerate box that only contains `center`.
    pub fn around_point(center: &Point3<f32>, radius: f32) -> Aabb {
        let half_size = Vector3::repeat(radius);
        Aabb::with_bounds(center - half_size, center + half_size)
    }

    /// Creates a new empty [`Aabb`].
    ///
    /// # Examples
    /// ```
    /// use index_bvh::aabb::Aabb;
    ///
    /// let aabb = Aabb::empty();
    /// assert!(aabb.is_empty());
    /// ```
    pub fn empty() -> Aabb {
        Aabb {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    /// Returns true if this [`Aabb`] does not contain any point, i.e. some
    /// minimum coordinate is larger than the matching maximum coordinate.
    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.min[i] > self.max[i])
    }

    /// Returns true if the [`Point3`] is inside the [`Aabb`].
    ///
    /// # Examples
    /// ```
    /// use index_bvh::aabb::Aabb;
    /// use nalgebra::Point3;
    ///
    /// let aabb = Aabb::with_bounds(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0));
    /// assert!(aabb.contains(&Point3::new(0.0, 0.0, 0.0)));
    /// assert!(!aabb.contains(&Point3::new(1.5, 0.0, 0.0)));
    /// ```
    pub fn contains(&self, p: &Point3<f32>) -> bool {
        (0..3).all(|i| p[i] >= self.min[i] && p[i] <= self.max[i])
    }

    /// Returns a new minimal [`Aabb`] which contains both this [`Aabb`] and `other`.
    /// The result is the convex hull of the both [`Aabb`]s.
    ///
    /// # Examples
    /// ```
    /// use index_bvh::aabb::Aabb;
    /// use nalgebra::Point3;
    ///
    /// let aabb1 = Aabb::with_bounds(Point3::new(-101.0, 0.0, 0.0), Point3::new(-100.0, 1.0, 1.0));
    /// let aabb2 = Aabb::with_bounds(Point3::new(100.0, 0.0, 0.0), Point3::new(101.0, 1.0, 1.0));
    /// let joint = aabb1.join(&aabb2);
    ///
    /// assert_eq!(joint.min, Point3::new(-101.0, 0.0, 0.0));
    /// assert_eq!(joint.max, Point3::new(101.0, 1.0, 1.0));
    /// ```
    pub fn join(&self, other: &Aabb) -> Aabb {
        Aabb::with_bounds(
            Point3::new(
                fast_min(self.min.x, other.min.x),
                fast_min(self.min.y, other.min.y),
                fast_min(self.min.z, other.min.z),
            ),
            Point3::new(
                fast_max(self.max.x, other.max.x),
                fast_max(self.max.y, other.max.y),
                fast_max(self.max.z, other.max.z),
            ),
        )
    }

    /// Mutable version of [`Aabb::join`].
    pub fn join_mut(&mut self, other: &Aabb) {
        *self = self.join(other);
    }

    /// Returns a new minimal [`Aabb`] which contains both this [`Aabb`] and the [`Point3`] `other`.
    pub fn grow(&self, other: &Point3<f32>) -> Aabb {
        self.join(&Aabb::with_bounds(*other, *other))
    }

    /// Mutable version of [`Aabb::grow`].
    pub fn grow_mut(&mut self, other: &Point3<f32>) {
        *self = self.grow(other);
    }

    /// Returns the size of this [`Aabb`] in all three dimensions.
    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    /// Returns the center [`Point3`] of the [`Aabb`].
    pub fn center(&self) -> Point3<f32> {
        self.min + (self.size() / 2.0)
    }

    /// Returns the total surface area of this [`Aabb`]. Empty boxes have no area.
    ///
    /// # Examples
    /// ```
    /// use index_bvh::aabb::Aabb;
    /// use nalgebra::Point3;
    ///
    /// let aabb = Aabb::with_bounds(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 2.0, 3.0));
    /// assert_eq!(aabb.surface_area(), 22.0);
    /// ```
    pub fn surface_area(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let size = self.size();
        2.0 * (size.x * size.y + size.x * size.z + size.y * size.z)
    }

    /// Returns the axis along which the [`Aabb`] is stretched the most.
    pub fn largest_axis(&self) -> usize {
        let size = self.size();
        if size.x > size.y && size.x > size.z {
            X_AXIS
        } else if size.y > size.z {
            Y_AXIS
        } else {
            Z_AXIS
        }
    }

    /// Returns the bounds as `[min.x, min.y, min.z, max.x, max.y, max.z]`.
    pub fn to_array(&self) -> [f32; 6] {
        [
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z,
        ]
    }

    /// Inverse of [`Aabb::to_array`].
    pub fn from_array(bounds: [f32; 6]) -> Aabb {
        Aabb::with_bounds(
            Point3::new(bounds[0], bounds[1], bounds[2]),
            Point3::new(bounds[3], bounds[4], bounds[5]),
        )
    }
}

impl Default for Aabb {
    fn default() -> Aabb {
        Aabb::empty()
    }
}

impl Bounded for Aabb {
    fn aabb(&self) -> Aabb {
        *self
    }
}

/// Implementation of [`Bounded`] for single points.
impl Bounded for Point3<f32> {
    fn aabb(&self) -> Aabb {
        Aabb::with_bounds(*self, *self)
    }
}

impl IntersectsAabb for Aabb {
    fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        (0..3).all(|i| self.max[i] >= aabb.min[i] && aabb.max[i] >= self.min[i])
    }
}

impl IntersectsAabb for Point3<f32> {
    fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        aabb.contains(self)
    }
}
