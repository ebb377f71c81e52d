//! This module linearizes a [`BuildTree`] into a flat array of [`FlatNode`]s and traverses
//! that array iteratively.
//!
//! The array is laid out in depth-first pre-order: an inner node at index `i` is followed
//! by the records of its first child's subtree, then its second child's subtree, and so on.
//! Each record carries a single control word. For a leaf it holds [`LEAF_FLAG`] and the
//! index right after the leaf; for an inner node it holds the index right after its whole
//! subtree (the skip index). A traversal therefore needs neither child pointers nor a
//! stack: descend by moving to `i + 1`, skip a subtree by jumping to its skip index.

use crate::aabb::{Aabb, IntersectsAabb};
use crate::build_tree::{BuildNode, BuildTree, NodeId};
use crate::error::IndexBvhError;

/// The high bit of [`FlatNode::node_data`], set for leaves.
pub const LEAF_FLAG: u32 = 0x8000_0000;

/// Largest number of entries an index can hold. A tree over `n` single-entry leaves has
/// fewer than `2n` nodes, so this keeps every skip index below [`LEAF_FLAG`].
pub const MAX_ENTRIES: usize = (LEAF_FLAG / 2) as usize;

/// A record of the flat BVH array.
///
/// The layout is `#[repr(C)]`: a 24 byte payload followed by the 32 bit control word. For
/// inner nodes the payload holds the six `f32`s `min.x, min.y, min.z, max.x, max.y, max.z`
/// of the node's bounds; for leaves its first word holds the entry index and the rest is
/// zero.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[repr(C)]
#[cfg_attr(feature = "bytemuck", derive(bytemuck::Pod, bytemuck::Zeroable))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlatNode {
    /// Bit patterns of the bounds, or the entry index in the first word.
    payload: [u32; 6],

    /// [`LEAF_FLAG`] plus the next index for leaves, the skip index for inner nodes.
    node_data: u32,
}

impl FlatNode {
    /// Creates a leaf record for `entry_index`, followed by `next_index`.
    pub fn leaf(entry_index: u32, next_index: u32) -> FlatNode {
        let mut node = FlatNode::default();
        node.set_entry_index(entry_index);
        node.set_node_data(next_index | LEAF_FLAG);
        node
    }

    /// Creates an inner record with the given bounds and skip index.
    pub fn inner(aabb: &Aabb, skip_index: u32) -> FlatNode {
        let mut node = FlatNode::default();
        node.set_aabb(aabb);
        node.set_node_data(skip_index);
        node
    }

    /// Returns the raw control word.
    pub fn node_data(&self) -> u32 {
        self.node_data
    }

    /// Returns true if this record is a leaf.
    pub fn is_leaf(&self) -> bool {
        self.node_data & LEAF_FLAG != 0
    }

    /// The index to continue at when this record does not need to be descended into:
    /// the next record for a leaf, the skip index for an inner node.
    pub fn exit_index(&self) -> u32 {
        self.node_data & !LEAF_FLAG
    }

    /// Returns the index of the referenced entry for leaves, [`None`] for inner nodes.
    pub fn entry_index(&self) -> Option<u32> {
        if self.is_leaf() {
            Some(self.payload[0])
        } else {
            None
        }
    }

    /// Returns the bounds of an inner node, [`None`] for leaves.
    pub fn aabb(&self) -> Option<Aabb> {
        if self.is_leaf() {
            None
        } else {
            Some(self.bounds())
        }
    }

    fn bounds(&self) -> Aabb {
        Aabb::from_array(self.payload.map(f32::from_bits))
    }

    fn set_aabb(&mut self, aabb: &Aabb) {
        self.payload = aabb.to_array().map(f32::to_bits);
    }

    fn set_entry_index(&mut self, entry_index: u32) {
        self.payload = [entry_index, 0, 0, 0, 0, 0];
    }

    fn set_node_data(&mut self, node_data: u32) {
        self.node_data = node_data;
    }
}

/// Writes the records of one [`BuildTree`] into a pre-sized array.
struct Linearizer<'a> {
    nodes: &'a [BuildNode],
    flat_nodes: &'a mut [FlatNode],
}

impl Linearizer<'_> {
    /// Writes the subtree of `node` starting at `offset` and returns the index right
    /// after it.
    ///
    /// The control word of an inner node is left for the caller to fill in, since the
    /// skip index is only known once the whole subtree has been written.
    fn write_subtree(&mut self, node: Option<NodeId>, mut offset: u32) -> u32 {
        let Some(node) = node else {
            return offset;
        };
        let nodes = self.nodes;

        match &nodes[node.index()] {
            BuildNode::Leaf { entry_index } => {
                let flat_node = &mut self.flat_nodes[offset as usize];
                flat_node.set_entry_index(*entry_index);
                offset += 1;
                // Mark as a leaf
                flat_node.set_node_data(offset | LEAF_FLAG);
                offset
            }
            BuildNode::Inner {
                announced,
                children,
                bounds,
            } => {
                let node_index = offset as usize;
                offset += 1;

                let mut aabb = Aabb::empty();
                let mut child_count = 0;
                for (child, child_aabb) in children.iter().zip(bounds.iter()) {
                    let Some(child) = *child else {
                        continue;
                    };

                    // Add the child tree to the array
                    let child_index = offset;
                    offset = self.write_subtree(Some(child), child_index);
                    if !nodes[child.index()].is_leaf() {
                        // If the child was an inner node, set the skip index
                        self.flat_nodes[child_index as usize].set_node_data(offset);
                    }

                    aabb.join_mut(child_aabb);
                    child_count += 1;
                }
                assert!(child_count > 0, "Found inner node without children.");
                assert_eq!(
                    child_count, *announced as usize,
                    "Inner node announced {} children but {} were linearized.",
                    announced, child_count
                );

                self.flat_nodes[node_index].set_aabb(&aabb);
                offset
            }
        }
    }
}

/// Linearizes `tree` into an array of exactly `tree.node_count` [`FlatNode`]s.
///
/// Returns [`IndexBvhError::NodeCountMismatch`] if the number of nodes reachable from the
/// root differs from the node count reported by the build callbacks.
///
/// # Panics
///
/// Panics if an inner node has no children, has a different number of children than it
/// announced, or if a node is reachable more than once.
pub fn linearize(tree: &BuildTree) -> Result<Vec<FlatNode>, IndexBvhError> {
    let reported = tree.node_count;
    if tree.nodes.len() != reported as usize {
        return Err(IndexBvhError::NodeCountMismatch {
            reported,
            linearized: tree.nodes.len() as u32,
        });
    }

    let mut flat_nodes = vec![FlatNode::default(); reported as usize];
    let Some(root) = tree.root else {
        return Ok(flat_nodes);
    };

    let mut linearizer = Linearizer {
        nodes: &tree.nodes,
        flat_nodes: &mut flat_nodes,
    };
    let end = linearizer.write_subtree(Some(root), 0);
    if end != reported {
        return Err(IndexBvhError::NodeCountMismatch {
            reported,
            linearized: end,
        });
    }

    flat_nodes[0].set_node_data(end);
    // A leaf root has no parent that could mark it.
    if tree.nodes[root.index()].is_leaf() {
        flat_nodes[0].set_node_data(end | LEAF_FLAG);
    }

    Ok(flat_nodes)
}

/// Prints a textual representation of a flat BVH.
pub fn pretty_print_flat_bvh(flat_nodes: &[FlatNode]) {
    for (i, node) in flat_nodes.iter().enumerate() {
        match (node.entry_index(), node.aabb()) {
            (Some(entry_index), _) => {
                println!("{}\tleaf\tentry {}\tnext {}", i, entry_index, node.exit_index())
            }
            (None, Some(aabb)) => println!("{}\tinner\t{}\tskip {}", i, aabb, node.exit_index()),
            (None, None) => unreachable!(),
        }
    }
}

/// Iterator over the entry indices of all leaves a flat BVH traversal with `query` reaches.
///
/// Leaves carry no bounds of their own, so the yielded entries are candidates that the
/// caller still has to test against the query.
pub struct FlatTraverseIter<'a, Q: IntersectsAabb> {
    flat_nodes: &'a [FlatNode],
    query: &'a Q,
    index: usize,
}

impl<'a, Q: IntersectsAabb> FlatTraverseIter<'a, Q> {
    /// Creates a new [`FlatTraverseIter`] starting at the root.
    pub fn new(flat_nodes: &'a [FlatNode], query: &'a Q) -> Self {
        FlatTraverseIter {
            flat_nodes,
            query,
            index: 0,
        }
    }
}

impl<Q: IntersectsAabb> Iterator for FlatTraverseIter<'_, Q> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        // The traversal ends when the index runs past the last record
        while let Some(node) = self.flat_nodes.get(self.index) {
            if node.is_leaf() {
                self.index = node.exit_index() as usize;
                return Some(node.payload[0] as usize);
            } else if self.query.intersects_aabb(&node.bounds()) {
                // Descend into the first child
                self.index += 1;
            } else {
                // Skip the whole subtree
                self.index = node.exit_index() as usize;
            }
        }
        None
    }
}

/// Traverses a flat BVH iteratively.
/// Returns the entry indices of all leaves whose ancestors' bounds are hit by `query`.
///
/// # Examples
///
/// ```
/// use index_bvh::flat_bvh::traverse_flat_bvh;
/// use index_bvh::index_bvh::IndexBvh;
/// use nalgebra::Point3;
///
/// let entries = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0)];
/// let index = IndexBvh::new(entries, 1.0);
///
/// let candidates = traverse_flat_bvh(&Point3::new(9.5, 0.0, 0.0), index.nodes());
/// assert!(candidates.contains(&1));
/// ```
pub fn traverse_flat_bvh<Q: IntersectsAabb>(query: &Q, flat_nodes: &[FlatNode]) -> Vec<usize> {
    FlatTraverseIter::new(flat_nodes, query).collect()
}
