//! This module defines the [`Entry`] trait implemented by everything an
//! [`IndexBvh`](crate::index_bvh::IndexBvh) can store.

use nalgebra::Point3;

/// A point-like record with a position in 3D space.
///
/// The index only reads the position; the rest of the record is payload that the
/// caller gets back through the entry index stored in each leaf.
///
/// # Examples
/// ```
/// use index_bvh::entry::Entry;
/// use nalgebra::{Point3, Vector3};
///
/// struct Photon {
///     position: Point3<f32>,
///     direction: Vector3<f32>,
///     power: [f32; 3],
/// }
///
/// impl Entry for Photon {
///     fn position(&self) -> Point3<f32> {
///         self.position
///     }
/// }
/// ```
pub trait Entry {
    /// Returns the position of this entry.
    fn position(&self) -> Point3<f32>;
}

impl Entry for Point3<f32> {
    fn position(&self) -> Point3<f32> {
        *self
    }
}

impl Entry for [f32; 3] {
    fn position(&self) -> Point3<f32> {
        Point3::from(*self)
    }
}

impl<E: Entry> Entry for &E {
    fn position(&self) -> Point3<f32> {
        (**self).position()
    }
}
