//! Spheres, used for radius queries against a flat BVH.

use crate::aabb::{Aabb, IntersectsAabb};
use nalgebra::Point3;

/// A sphere that can be used for traversing flat BVHs.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ball {
    /// The center of the ball.
    pub center: Point3<f32>,
    /// The radius of the ball.
    pub radius: f32,
}

impl Ball {
    /// Creates a [`Ball`] with the given `center` and `radius`.
    ///
    /// # Panics
    /// Panics, in debug mode, if the radius is negative.
    ///
    /// # Examples
    /// ```
    /// use index_bvh::ball::Ball;
    /// use nalgebra::Point3;
    ///
    /// let ball = Ball::new(Point3::new(1.0, 1.0, 1.0), 1.0);
    /// assert_eq!(ball.center, Point3::new(1.0, 1.0, 1.0));
    /// assert_eq!(ball.radius, 1.0)
    /// ```
    pub fn new(center: Point3<f32>, radius: f32) -> Self {
        debug_assert!(radius >= 0.0);
        Self { center, radius }
    }

    /// Returns true if this [`Ball`] contains the [`Point3`].
    ///
    /// # Examples
    /// ```
    /// use index_bvh::ball::Ball;
    /// use nalgebra::Point3;
    ///
    /// let ball = Ball::new(Point3::new(1.0, 1.0, 1.0), 1.0);
    /// let point = Point3::new(1.25, 1.25, 1.25);
    ///
    /// assert!(ball.contains(&point));
    /// ```
    pub fn contains(&self, point: &Point3<f32>) -> bool {
        // Squaring the RHS is faster than computing the square root of the LHS.
        nalgebra::distance_squared(point, &self.center) <= self.radius * self.radius
    }

    /// Returns true if this [`Ball`] intersects the [`Aabb`].
    ///
    /// # Examples
    /// ```
    /// use index_bvh::{aabb::Aabb, ball::Ball};
    /// use nalgebra::Point3;
    ///
    /// let ball = Ball::new(Point3::new(1.0, 1.0, 1.0), 1.0);
    /// let aabb = Aabb::with_bounds(Point3::new(1.25, 1.25, 1.25), Point3::new(3.0, 3.0, 3.0));
    ///
    /// assert!(ball.intersects_aabb(&aabb));
    /// ```
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        // https://gamemath.com/book/geomtests.html#intersection_sphere_aabb
        // Find the squared distance between the ball's center and the point in/on the
        // Aabb that is closest to it.
        let mut distance_squared = 0.0;
        for i in 0..3 {
            let closest_on_aabb = self.center[i].clamp(aabb.min[i], aabb.max[i]);
            distance_squared += (closest_on_aabb - self.center[i]).powi(2);
        }

        distance_squared <= self.radius * self.radius
    }
}

impl IntersectsAabb for Ball {
    fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.intersects_aabb(aabb)
    }
}
