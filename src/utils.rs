//! Utilities module.

use crate::aabb::Aabb;
use crate::primitive::BuildPrimitive;

/// Fast floating point minimum.  This function matches the semantics of
///
/// ```no_compile
/// if x < y { x } else { y }
/// ```
///
/// which has efficient instruction sequences on many platforms (1 instruction on x86).  For most
/// values, it matches the semantics of `x.min(y)`; the special cases are:
///
/// ```text
/// min(-0.0, +0.0); +0.0
/// min(+0.0, -0.0): -0.0
/// min( NaN,  1.0):  1.0
/// min( 1.0,  NaN):  NaN
/// ```
///
/// Note: This exists because [`std::cmp::min`] requires Ord which floating point types do not satisfy
#[inline(always)]
pub fn fast_min(x: f32, y: f32) -> f32 {
    if x < y {
        x
    } else {
        y
    }
}

/// Fast floating point maximum.  This function matches the semantics of
///
/// ```no_compile
/// if x > y { x } else { y }
/// ```
///
/// which has efficient instruction sequences on many platforms (1 instruction on x86).  For most
/// values, it matches the semantics of `x.max(y)`; the special cases are:
///
/// ```text
/// max(-0.0, +0.0); +0.0
/// max(+0.0, -0.0): -0.0
/// max( NaN,  1.0):  1.0
/// max( 1.0,  NaN):  NaN
/// ```
///
/// Note: This exists because [`std::cmp::max`] requires Ord which floating point types do not satisfy
#[inline(always)]
pub fn fast_max(x: f32, y: f32) -> f32 {
    if x > y {
        x
    } else {
        y
    }
}

/// Defines a Bucket utility object. Used to store the properties of primitive partitions
/// in the binned SAH build procedure.
#[derive(Clone, Copy)]
pub struct Bucket {
    /// The number of primitives in this [`Bucket`].
    pub size: usize,

    /// The joint [`Aabb`] of the primitives in this [`Bucket`].
    pub aabb: Aabb,
}

impl Bucket {
    /// Returns an empty bucket.
    pub fn empty() -> Bucket {
        Bucket {
            size: 0,
            aabb: Aabb::empty(),
        }
    }

    /// Extend this [`Bucket`] by a primitive with the given [`Aabb`].
    pub fn add_aabb(&mut self, aabb: &Aabb) {
        self.size += 1;
        self.aabb.join_mut(aabb);
    }

    /// Join the contents of two [`Bucket`]s.
    pub fn join_bucket(a: Bucket, b: &Bucket) -> Bucket {
        Bucket {
            size: a.size + b.size,
            aabb: a.aabb.join(&b.aabb),
        }
    }
}

/// Returns the joint [`Aabb`] of the primitives and the [`Aabb`] of their centers.
pub fn joint_aabb_of_primitives(primitives: &[BuildPrimitive]) -> (Aabb, Aabb) {
    let mut aabb = Aabb::empty();
    let mut centroid = Aabb::empty();
    for primitive in primitives {
        aabb.join_mut(&primitive.aabb);
        centroid.grow_mut(&primitive.aabb.center());
    }
    (aabb, centroid)
}

#[cfg(test)]
mod tests {
    use crate::aabb::Aabb;
    use crate::primitive::BuildPrimitive;
    use crate::utils::{fast_max, fast_min, joint_aabb_of_primitives, Bucket};
    use nalgebra::Point3;

    #[test]
    fn test_fast_min_max() {
        assert_eq!(fast_min(1.0, 2.0), 1.0);
        assert_eq!(fast_max(1.0, 2.0), 2.0);
        assert_eq!(fast_min(f32::NAN, 1.0), 1.0);
        assert_eq!(fast_max(f32::NAN, 1.0), 1.0);
    }

    #[test]
    /// Test that joining buckets adds up sizes and bounds.
    fn test_join_buckets() {
        let mut a = Bucket::empty();
        a.add_aabb(&Aabb::with_bounds(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)));
        let mut b = Bucket::empty();
        b.add_aabb(&Aabb::with_bounds(Point3::new(2.0, 2.0, 2.0), Point3::new(3.0, 3.0, 3.0)));
        b.add_aabb(&Aabb::with_bounds(Point3::new(4.0, 4.0, 4.0), Point3::new(5.0, 5.0, 5.0)));

        let joint = Bucket::join_bucket(a, &b);
        assert_eq!(joint.size, 3);
        assert_eq!(joint.aabb.min, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(joint.aabb.max, Point3::new(5.0, 5.0, 5.0));
    }

    #[test]
    fn test_joint_aabb_of_primitives() {
        let primitives = [
            BuildPrimitive::new(Aabb::around_point(&Point3::new(0.0, 0.0, 0.0), 1.0), 0),
            BuildPrimitive::new(Aabb::around_point(&Point3::new(4.0, 0.0, 0.0), 1.0), 1),
        ];
        let (aabb, centroid) = joint_aabb_of_primitives(&primitives);
        assert_eq!(aabb.min, Point3::new(-1.0, -1.0, -1.0));
        assert_eq!(aabb.max, Point3::new(5.0, 1.0, 1.0));
        assert_eq!(centroid.min, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(centroid.max, Point3::new(4.0, 0.0, 0.0));
    }
}
