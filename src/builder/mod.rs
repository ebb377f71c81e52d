//! A multi-way bulk BVH builder driven through callbacks.
//!
//! The builder never allocates tree nodes itself. Instead it asks a [`BuildCallbacks`]
//! implementation to create inner nodes and leaves, and later hands every inner node its
//! children and their bounds. The caller decides how nodes are stored; the builder only
//! passes around the opaque [`BuildCallbacks::Node`] handles it got back.
//!
//! The call order for an inner node is always `create_node`, then the whole subtree of
//! every child, then `set_node_children` and `set_node_bounds` with the same number of
//! entries that were announced to `create_node`. With the `rayon` feature enabled, sibling
//! subtrees are built concurrently, so all callbacks may run on several threads at once.

mod binned;

use crate::aabb::Aabb;
use crate::primitive::BuildPrimitive;

use self::binned::{BinnedBuilder, Subset};

/// Largest number of SAH bins any [`BuildQuality`] uses.
pub(crate) const MAX_BUCKETS: usize = 32;

/// Hint for how much work the builder spends on finding good splits.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BuildQuality {
    /// Few SAH bins, fastest build.
    Low,
    /// A middle ground.
    Medium,
    /// Many SAH bins, best trees for query-heavy workloads.
    #[default]
    High,
}

impl BuildQuality {
    /// Number of SAH bins evaluated per split.
    pub fn bucket_count(&self) -> usize {
        match self {
            BuildQuality::Low => 6,
            BuildQuality::Medium => 16,
            BuildQuality::High => MAX_BUCKETS,
        }
    }
}

/// Parameters of a single [`build_bvh`] call.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BuildArguments {
    /// Split quality.
    pub quality: BuildQuality,

    /// Maximum number of children of an inner node. Must be at least 2.
    pub max_branching_factor: usize,

    /// Maximum number of primitives passed to [`BuildCallbacks::create_leaf`]. Must be at least 1.
    pub max_leaf_size: usize,

    /// Subsets with more primitives than this are built in parallel when the `rayon`
    /// feature is enabled.
    pub parallel_threshold: usize,
}

impl Default for BuildArguments {
    fn default() -> BuildArguments {
        BuildArguments {
            quality: BuildQuality::default(),
            max_branching_factor: 2,
            max_leaf_size: 1,
            parallel_threshold: 64,
        }
    }
}

/// The callbacks through which [`build_bvh`] materializes a tree.
///
/// Implementations must be thread-safe: with the `rayon` feature the builder calls them
/// from several worker threads at once. A handle returned by `create_node` is only ever
/// passed to `set_node_children` and `set_node_bounds` by the thread that created it.
pub trait BuildCallbacks: Sync {
    /// Handle of a created node.
    type Node: Copy + Send;

    /// Creates an inner node that will get `child_count` children.
    fn create_node(&self, child_count: usize) -> Self::Node;

    /// Creates a leaf holding `primitives`. Never called with an empty slice.
    fn create_leaf(&self, primitives: &[BuildPrimitive]) -> Self::Node;

    /// Stores the children of `node`, in slot order.
    fn set_node_children(&self, node: Self::Node, children: &[Self::Node]);

    /// Stores the bounds of the children of `node`; `bounds[i]` belongs to `children[i]`.
    fn set_node_bounds(&self, node: Self::Node, bounds: &[Aabb]);
}

/// Builds a BVH over `primitives` using binned SAH splits and returns the root handle,
/// or [`None`] if there are no primitives.
///
/// The order of `primitives` is changed in the process; primitives are identified by
/// their [`BuildPrimitive::prim_id`].
///
/// # Panics
///
/// Panics if `max_branching_factor < 2` or `max_leaf_size < 1`.
pub fn build_bvh<C: BuildCallbacks>(
    arguments: &BuildArguments,
    primitives: &mut [BuildPrimitive],
    callbacks: &C,
) -> Option<C::Node> {
    assert!(
        arguments.max_branching_factor >= 2,
        "An inner node needs room for at least two children."
    );
    assert!(
        arguments.max_leaf_size >= 1,
        "A leaf must be able to hold at least one primitive."
    );

    if primitives.is_empty() {
        return None;
    }

    let builder = BinnedBuilder::new(*arguments, callbacks);
    let (root, _) = builder.build_subtree(Subset::new(primitives));
    Some(root)
}
