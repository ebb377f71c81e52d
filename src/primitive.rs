//! Conversion of entries into the build primitives handed to the bulk builder.

use crate::aabb::{Aabb, Bounded};
use crate::entry::Entry;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// An axis-aligned box tagged with the index of the entry it was created from.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BuildPrimitive {
    /// The bounds of the entry.
    pub aabb: Aabb,

    /// Opaque identifier of the entry; for an index this is the entry's position in
    /// the entry sequence.
    pub prim_id: u32,
}

impl BuildPrimitive {
    /// Creates a new [`BuildPrimitive`].
    pub fn new(aabb: Aabb, prim_id: u32) -> BuildPrimitive {
        BuildPrimitive { aabb, prim_id }
    }
}

impl Bounded for BuildPrimitive {
    fn aabb(&self) -> Aabb {
        self.aabb
    }
}

/// Creates one [`BuildPrimitive`] per entry, spanning `position ± radius` and tagged with
/// the entry's index.
///
/// A zero `radius` produces degenerate boxes that only contain the entry's position.
///
/// # Examples
/// ```
/// use index_bvh::primitive::build_primitives;
/// use nalgebra::Point3;
///
/// let entries = [Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0)];
/// let primitives = build_primitives(&entries, 1.0);
///
/// assert_eq!(primitives[1].prim_id, 1);
/// assert_eq!(primitives[1].aabb.min, Point3::new(9.0, -1.0, -1.0));
/// assert_eq!(primitives[1].aabb.max, Point3::new(11.0, 1.0, 1.0));
/// ```
pub fn build_primitives<E: Entry + Sync>(entries: &[E], radius: f32) -> Vec<BuildPrimitive> {
    #[cfg(feature = "rayon")]
    let entries = entries.par_iter();
    #[cfg(not(feature = "rayon"))]
    let entries = entries.iter();

    entries
        .enumerate()
        .map(|(index, entry)| primitive_of(index, entry, radius))
        .collect()
}

#[inline]
fn primitive_of<E: Entry>(index: usize, entry: &E, radius: f32) -> BuildPrimitive {
    // The index checks the entry count against `MAX_ENTRIES` before getting here.
    BuildPrimitive::new(Aabb::around_point(&entry.position(), radius), index as u32)
}
