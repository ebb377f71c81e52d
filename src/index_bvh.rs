//! This module defines [`IndexBvh`], an immutable spatial index over point entries.

use crate::aabb::Aabb;
use crate::ball::Ball;
use crate::build_tree::{BuildContext, BRANCHING_FACTOR, MAX_LEAF_SIZE};
use crate::builder::{build_bvh, BuildArguments, BuildQuality};
use crate::entry::Entry;
use crate::error::IndexBvhError;
use crate::flat_bvh::{linearize, FlatNode, FlatTraverseIter, MAX_ENTRIES};
use crate::primitive::build_primitives;

use log::{debug, trace};
use nalgebra::Point3;
use std::time::Instant;

/// Settings for building an [`IndexBvh`].
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IndexBvhSettings {
    /// Split quality of the bulk build.
    pub quality: BuildQuality,

    /// Subtrees over more entries than this are built in parallel when the `rayon`
    /// feature is enabled.
    pub parallel_threshold: usize,
}

impl Default for IndexBvhSettings {
    fn default() -> IndexBvhSettings {
        IndexBvhSettings {
            quality: BuildQuality::High,
            parallel_threshold: 64,
        }
    }
}

/// A spatial index over entries that all share the same query radius.
///
/// The index is built once from an owned entry sequence and never changes afterwards.
/// Its BVH is stored as a flat array of [`FlatNode`]s (see [`crate::flat_bvh`]) whose
/// leaves reference the entries by their position in [`IndexBvh::entries`].
///
/// # Examples
///
/// ```
/// use index_bvh::index_bvh::IndexBvh;
/// use nalgebra::Point3;
///
/// let entries = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0)];
/// let index = IndexBvh::new(entries, 1.0);
///
/// assert_eq!(index.node_count(), 3);
/// assert_eq!(index.entries_near(&Point3::new(9.5, 0.0, 0.5)), vec![1]);
/// ```
#[derive(Debug, Clone)]
pub struct IndexBvh<E> {
    entries: Vec<E>,
    radius: f32,
    radius_squared: f32,
    nodes: Vec<FlatNode>,
    settings: IndexBvhSettings,
}

impl<E: Entry + Sync> IndexBvh<E> {
    /// Builds an index over `entries` with the default [`IndexBvhSettings`].
    ///
    /// # Errors
    ///
    /// See [`IndexBvh::try_with_settings`].
    pub fn try_new(entries: Vec<E>, radius: f32) -> Result<IndexBvh<E>, IndexBvhError> {
        IndexBvh::try_with_settings(entries, radius, IndexBvhSettings::default())
    }

    /// Builds an index over `entries`, each one spanning `position ± radius`.
    ///
    /// # Errors
    ///
    /// Fails if `entries` is empty or holds more than [`MAX_ENTRIES`] entries, if `radius`
    /// is negative or not finite, if an entry's bounds are not finite, or if the bulk
    /// builder produced an inconsistent tree.
    pub fn try_with_settings(
        entries: Vec<E>,
        radius: f32,
        settings: IndexBvhSettings,
    ) -> Result<IndexBvh<E>, IndexBvhError> {
        let nodes = build_flat_nodes(&entries, radius, &settings)?;
        Ok(IndexBvh {
            entries,
            radius,
            radius_squared: radius * radius,
            nodes,
            settings,
        })
    }

    /// Builds an index over `entries` with the default [`IndexBvhSettings`].
    ///
    /// # Panics
    ///
    /// Panics on any error [`IndexBvh::try_new`] would return.
    pub fn new(entries: Vec<E>, radius: f32) -> IndexBvh<E> {
        IndexBvh::with_settings(entries, radius, IndexBvhSettings::default())
    }

    /// Builds an index over `entries`.
    ///
    /// # Panics
    ///
    /// Panics on any error [`IndexBvh::try_with_settings`] would return.
    pub fn with_settings(entries: Vec<E>, radius: f32, settings: IndexBvhSettings) -> IndexBvh<E> {
        match IndexBvh::try_with_settings(entries, radius, settings) {
            Ok(index) => index,
            Err(err) => panic!("Failed to build index: {}", err),
        }
    }
}

impl<E> IndexBvh<E> {
    /// The flat BVH array. Record `0` is the root.
    pub fn nodes(&self) -> &[FlatNode] {
        &self.nodes
    }

    /// The number of records in [`IndexBvh::nodes`].
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The indexed entries, in the order they were given.
    pub fn entries(&self) -> &[E] {
        &self.entries
    }

    /// The radius every entry was expanded by.
    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// The square of [`IndexBvh::radius`].
    pub fn radius_squared(&self) -> f32 {
        self.radius_squared
    }

    /// The settings the index was built with.
    pub fn settings(&self) -> &IndexBvhSettings {
        &self.settings
    }

    /// The flat BVH array as raw bytes, e.g. for uploading it to a GPU buffer.
    #[cfg(feature = "bytemuck")]
    pub fn nodes_as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.nodes)
    }
}

impl<E: Entry> IndexBvh<E> {
    /// The bounds of all entries, each expanded by the radius.
    pub fn bounds(&self) -> Aabb {
        let root = &self.nodes[0];
        match root.entry_index() {
            Some(entry_index) => self.entry_aabb(entry_index as usize),
            None => root.aabb().unwrap_or_default(),
        }
    }

    /// Returns the bounds of the leaf for entry `index`.
    pub fn entry_aabb(&self, index: usize) -> Aabb {
        Aabb::around_point(&self.entries[index].position(), self.radius)
    }

    /// Returns the indices of all entries within the index radius of `point`, in the
    /// order the flat BVH stores them.
    pub fn entries_near(&self, point: &Point3<f32>) -> Vec<usize> {
        // Each leaf's box contains `point` whenever the entry is within the radius.
        FlatTraverseIter::new(&self.nodes, point)
            .filter(|&index| {
                nalgebra::distance_squared(&self.entries[index].position(), point)
                    <= self.radius_squared
            })
            .collect()
    }

    /// Returns the indices of all entries within `radius` of `point`. `radius` does not
    /// need to match the index radius.
    ///
    /// A negative or NaN `radius` contains nothing and yields no entries.
    pub fn entries_within(&self, point: &Point3<f32>, radius: f32) -> Vec<usize> {
        if !(radius >= 0.0) {
            return Vec::new();
        }
        let ball = Ball::new(*point, radius);
        FlatTraverseIter::new(&self.nodes, &ball)
            .filter(|&index| ball.contains(&self.entries[index].position()))
            .collect()
    }

    /// Returns the entry closest to `point` among those within the index radius, and its
    /// squared distance.
    pub fn nearest_entry(&self, point: &Point3<f32>) -> Option<(usize, f32)> {
        FlatTraverseIter::new(&self.nodes, point)
            .map(|index| {
                let distance_squared =
                    nalgebra::distance_squared(&self.entries[index].position(), point);
                (index, distance_squared)
            })
            .filter(|&(_, distance_squared)| distance_squared <= self.radius_squared)
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }
}

/// Checks the input, builds the BVH and linearizes it.
fn build_flat_nodes<E: Entry + Sync>(
    entries: &[E],
    radius: f32,
    settings: &IndexBvhSettings,
) -> Result<Vec<FlatNode>, IndexBvhError> {
    if entries.is_empty() {
        return Err(IndexBvhError::EmptyEntrySet);
    }
    if entries.len() > MAX_ENTRIES {
        return Err(IndexBvhError::TooManyEntries(entries.len()));
    }
    if !(radius >= 0.0 && radius.is_finite()) {
        return Err(IndexBvhError::InvalidRadius(radius));
    }

    let start = Instant::now();
    let mut primitives = build_primitives(entries, radius);
    let finite = |aabb: &Aabb| aabb.to_array().iter().all(|bound| bound.is_finite());
    if let Some(index) = primitives.iter().position(|primitive| !finite(&primitive.aabb)) {
        return Err(IndexBvhError::NonFinitePosition { index });
    }
    debug!("IndexBvh preprocessing time: {:?}", start.elapsed());

    let start = Instant::now();
    let arguments = BuildArguments {
        quality: settings.quality,
        max_branching_factor: BRANCHING_FACTOR,
        max_leaf_size: MAX_LEAF_SIZE,
        parallel_threshold: settings.parallel_threshold,
    };
    let context = BuildContext::with_capacity(2 * entries.len());
    let root = build_bvh(&arguments, &mut primitives, &context);
    let tree = context.finish(root);
    debug!("IndexBvh bulk build time: {:?}", start.elapsed());

    let start = Instant::now();
    let nodes = linearize(&tree)?;
    debug!("IndexBvh linearization time: {:?}", start.elapsed());
    trace!(
        "IndexBvh built {} nodes over {} entries",
        nodes.len(),
        entries.len()
    );

    Ok(nodes)
}


#[cfg(all(feature = "bench", test))]
mod bench {
    use crate::index_bvh::IndexBvh;
    use crate::testbase::random_points;
    use nalgebra::Point3;

    #[bench]
    /// Benchmark building an index over 120,000 entries.
    fn bench_build_120k_entries(b: &mut ::test::Bencher) {
        let points = random_points(120_000, 0);
        b.iter(|| IndexBvh::new(points.clone(), 0.5));
    }

    #[bench]
    /// Benchmark radius queries against an index over 120,000 entries.
    fn bench_query_120k_entries(b: &mut ::test::Bencher) {
        let points = random_points(120_000, 0);
        let index = IndexBvh::new(points, 2.0);
        let mut x = -100.0;

        b.iter(|| {
            x = if x > 100.0 { -100.0 } else { x + 0.37 };
            index.entries_near(&Point3::new(x, x * 0.5, -x))
        });
    }
}
