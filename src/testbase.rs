//! Common utilities shared by unit tests.
#![cfg(test)]

use crate::aabb::Aabb;
use crate::entry::Entry;
use crate::flat_bvh::FlatNode;

use nalgebra::Point3;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A vector represented as a tuple
pub type TupleVec = (f32, f32, f32);

/// Generate a `TupleVec` for [`proptest::strategy::Strategy`] from -10e10 to 10e10
/// A small enough range to prevent most fp32 errors from breaking certain tests
pub fn tuplevec_small_strategy() -> impl Strategy<Value = TupleVec> {
    (
        -10e10_f32..10e10_f32,
        -10e10_f32..10e10_f32,
        -10e10_f32..10e10_f32,
    )
}

/// Convert a `TupleVec` to a [`Point3`].
pub fn tuple_to_point(tpl: &TupleVec) -> Point3<f32> {
    Point3::new(tpl.0, tpl.1, tpl.2)
}

/// Generate entry positions in a cube of edge length 2000 around the origin.
pub fn point_strategy() -> impl Strategy<Value = Point3<f32>> {
    (-1000.0f32..1000.0, -1000.0f32..1000.0, -1000.0f32..1000.0)
        .prop_map(|(x, y, z)| Point3::new(x, y, z))
}

/// An entry carrying some payload next to its position.
#[derive(Debug, Clone, PartialEq)]
pub struct TestEntry {
    pub position: Point3<f32>,
    pub payload: u64,
}

impl TestEntry {
    pub fn new(position: Point3<f32>) -> TestEntry {
        TestEntry::with_payload(position, 0)
    }

    pub fn with_payload(position: Point3<f32>, payload: u64) -> TestEntry {
        TestEntry { position, payload }
    }
}

impl Entry for TestEntry {
    fn position(&self) -> Point3<f32> {
        self.position
    }
}

/// Generates 21 points along the x-axis, from `-10` to `10`.
pub fn generate_aligned_points() -> Vec<Point3<f32>> {
    (-10..11).map(|x| Point3::new(x as f32, 0.0, 0.0)).collect()
}

/// Generates `n` deterministic random points in `[-100, 100)³`.
pub fn random_points(n: usize, seed: u64) -> Vec<Point3<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            Point3::new(
                rng.random_range(-100.0..100.0),
                rng.random_range(-100.0..100.0),
                rng.random_range(-100.0..100.0),
            )
        })
        .collect()
}

/// Returns the sorted indices of all `points` within `radius` of `query`.
pub fn brute_force_within(points: &[Point3<f32>], query: &Point3<f32>, radius: f32) -> Vec<usize> {
    points
        .iter()
        .enumerate()
        .filter(|(_, p)| nalgebra::distance_squared(*p, query) <= radius * radius)
        .map(|(index, _)| index)
        .collect()
}

/// Checks the structure of a flat BVH and returns the entry indices of its leaves in
/// array order.
///
/// Verifies that every skip index points right behind its subtree, that every inner node
/// has between one and four children and that every inner box is exactly the union of
/// its children's boxes. `leaf_aabb` returns the box of an entry.
pub fn check_flat_bvh<F>(flat_nodes: &[FlatNode], leaf_aabb: &F) -> Vec<u32>
where
    F: Fn(u32) -> Aabb,
{
    assert!(!flat_nodes.is_empty());
    let mut entries = Vec::new();
    let (end, _) = check_flat_subtree(flat_nodes, 0, leaf_aabb, &mut entries);
    assert_eq!(end, flat_nodes.len());
    assert_eq!(flat_nodes[0].exit_index() as usize, flat_nodes.len());
    entries
}

/// Checks the subtree rooted at `index`. Returns the index behind the subtree and the
/// subtree's bounds.
fn check_flat_subtree<F>(
    flat_nodes: &[FlatNode],
    index: usize,
    leaf_aabb: &F,
    entries: &mut Vec<u32>,
) -> (usize, Aabb)
where
    F: Fn(u32) -> Aabb,
{
    let node = &flat_nodes[index];
    if let Some(entry) = node.entry_index() {
        entries.push(entry);
        if index > 0 {
            assert_eq!(node.exit_index() as usize, index + 1);
        }
        return (index + 1, leaf_aabb(entry));
    }

    let aabb = node.aabb().expect("Inner nodes carry a box.");
    let end = node.exit_index() as usize;
    let mut child = index + 1;
    let mut children = 0;
    let mut joint = Aabb::empty();
    while child < end {
        let (next, child_aabb) = check_flat_subtree(flat_nodes, child, leaf_aabb, entries);
        joint.join_mut(&child_aabb);
        child = next;
        children += 1;
    }

    assert_eq!(child, end);
    assert!((1..=4).contains(&children));
    assert_eq!(joint, aabb);
    (end, aabb)
}
