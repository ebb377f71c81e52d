//! The build-time node tree and the [`BuildContext`] that lets the bulk builder
//! ([`crate::builder::build_bvh`]) construct it.
//!
//! Nodes reference their children by [`NodeId`]. Ids come from the atomic node counter of
//! one [`BuildContext`], which exists for exactly one index construction. While the
//! builder runs, every worker thread appends what its callbacks produce to its own shard
//! of the context; [`BuildContext::finish`] places the nodes by id into a single arena and
//! drops the shards as a whole.

use crate::aabb::Aabb;
use crate::builder::BuildCallbacks;
use crate::primitive::BuildPrimitive;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

/// Maximum number of children of an inner [`BuildNode`].
pub const BRANCHING_FACTOR: usize = 4;

/// Maximum number of entries in a leaf [`BuildNode`].
pub const MAX_LEAF_SIZE: usize = 1;

/// Index of a [`BuildNode`] in the arena of a [`BuildTree`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Returns the position of the node in the arena.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node of the tree produced by the bulk builder.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildNode {
    /// Inner node with up to [`BRANCHING_FACTOR`] children. Unused slots are [`None`]
    /// and their bounds are undefined.
    Inner {
        /// The number of children announced when the node was created.
        announced: u8,

        /// The children, in the order the builder supplied them.
        children: [Option<NodeId>; BRANCHING_FACTOR],

        /// The bounds of each child.
        bounds: [Aabb; BRANCHING_FACTOR],
    },
    /// Leaf referencing a single entry.
    Leaf {
        /// Index of the entry.
        entry_index: u32,
    },
}

impl BuildNode {
    /// Creates an inner node without children that expects `child_count` of them.
    ///
    /// # Panics
    ///
    /// Panics if `child_count` exceeds [`BRANCHING_FACTOR`].
    pub fn empty_inner(child_count: usize) -> BuildNode {
        assert!(child_count <= BRANCHING_FACTOR);
        BuildNode::Inner {
            announced: child_count as u8,
            children: [None; BRANCHING_FACTOR],
            bounds: [Aabb::empty(); BRANCHING_FACTOR],
        }
    }

    /// Returns true if this node is a [`BuildNode::Leaf`].
    pub fn is_leaf(&self) -> bool {
        matches!(self, BuildNode::Leaf { .. })
    }

    /// Returns the number of occupied child slots. Leaves have no children.
    pub fn child_count(&self) -> usize {
        match self {
            BuildNode::Inner { children, .. } => children.iter().flatten().count(),
            BuildNode::Leaf { .. } => 0,
        }
    }
}

/// The arena-allocated tree handed from the builder to the linearizer.
#[derive(Debug, Clone)]
pub struct BuildTree {
    /// All nodes, indexed by [`NodeId`].
    pub nodes: Vec<BuildNode>,

    /// The root, [`None`] for an empty tree.
    pub root: Option<NodeId>,

    /// The number of nodes counted by the build callbacks.
    pub node_count: u32,
}

/// Children or bounds handed to an inner node after its subtrees were built.
#[derive(Debug)]
enum Patch {
    Children([Option<NodeId>; BRANCHING_FACTOR]),
    Bounds([Aabb; BRANCHING_FACTOR]),
}

/// What one callback left behind in a shard.
#[derive(Debug)]
enum BuildRecord {
    Node(NodeId, BuildNode),
    Patch {
        node: NodeId,
        len: usize,
        patch: Patch,
    },
}

/// Short-lived state of one build: the atomic node counter and one record shard per
/// worker thread.
///
/// All callbacks take `&self`, so the builder may call them from several threads. Each
/// worker of the rayon pool locks only its own shard; threads outside the pool share
/// shard `0`.
#[derive(Debug)]
pub struct BuildContext {
    shards: Vec<Mutex<Vec<BuildRecord>>>,
    node_counter: AtomicU32,
}

impl Default for BuildContext {
    fn default() -> BuildContext {
        BuildContext::with_capacity(0)
    }
}

impl BuildContext {
    /// Creates a context with empty shards.
    pub fn new() -> BuildContext {
        BuildContext::default()
    }

    /// Creates a context with room for about `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> BuildContext {
        #[cfg(feature = "rayon")]
        let shard_count = rayon::current_num_threads() + 1;
        #[cfg(not(feature = "rayon"))]
        let shard_count = 1;

        BuildContext {
            shards: (0..shard_count)
                .map(|_| Mutex::new(Vec::with_capacity(capacity / shard_count)))
                .collect(),
            node_counter: AtomicU32::new(0),
        }
    }

    /// Returns the number of nodes created so far.
    pub fn node_count(&self) -> u32 {
        self.node_counter.load(Ordering::Relaxed)
    }

    /// Consumes the context and returns the built tree.
    ///
    /// # Panics
    ///
    /// Panics if an inner node got a different number of children or bounds than it
    /// announced, or if children were set on a leaf.
    pub fn finish(self, root: Option<NodeId>) -> BuildTree {
        let node_count = self.node_count();
        let mut slots: Vec<Option<BuildNode>> = vec![None; node_count as usize];
        let mut patches = Vec::new();

        for shard in self.shards {
            for record in shard.into_inner().unwrap_or_else(PoisonError::into_inner) {
                match record {
                    BuildRecord::Node(id, node) => slots[id.index()] = Some(node),
                    BuildRecord::Patch { node, len, patch } => patches.push((node, len, patch)),
                }
            }
        }

        for (node, len, patch) in patches {
            match &mut slots[node.index()] {
                Some(BuildNode::Inner {
                    announced,
                    children,
                    bounds,
                }) => {
                    assert_eq!(
                        len, *announced as usize,
                        "Node {} announced {} children but got {}.",
                        node.0, announced, len
                    );
                    match patch {
                        Patch::Children(new_children) => *children = new_children,
                        Patch::Bounds(new_bounds) => *bounds = new_bounds,
                    }
                }
                Some(BuildNode::Leaf { .. }) => panic!("Tried to set the children of a leaf node."),
                None => panic!("Tried to set the children of unknown node {}.", node.0),
            }
        }

        BuildTree {
            // Only a lost record leaves a hole, and the linearizer reports the shorter arena.
            nodes: slots.into_iter().flatten().collect(),
            root,
            node_count,
        }
    }

    fn push(&self, record: BuildRecord) {
        #[cfg(feature = "rayon")]
        let index = rayon::current_thread_index().map_or(0, |index| index + 1);
        #[cfg(not(feature = "rayon"))]
        let index = 0;

        let shard = &self.shards[index % self.shards.len()];
        shard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    fn allocate(&self, node: BuildNode) -> NodeId {
        let id = NodeId(self.node_counter.fetch_add(1, Ordering::Relaxed));
        self.push(BuildRecord::Node(id, node));
        id
    }
}

impl BuildCallbacks for BuildContext {
    type Node = NodeId;

    fn create_node(&self, child_count: usize) -> NodeId {
        self.allocate(BuildNode::empty_inner(child_count))
    }

    fn create_leaf(&self, primitives: &[BuildPrimitive]) -> NodeId {
        // The builder is configured with `MAX_LEAF_SIZE` entries per leaf.
        assert_eq!(primitives.len(), MAX_LEAF_SIZE);
        self.allocate(BuildNode::Leaf {
            entry_index: primitives[0].prim_id,
        })
    }

    fn set_node_children(&self, node: NodeId, new_children: &[NodeId]) {
        assert!(new_children.len() <= BRANCHING_FACTOR);
        let mut children = [None; BRANCHING_FACTOR];
        for (slot, child) in children.iter_mut().zip(new_children) {
            *slot = Some(*child);
        }
        self.push(BuildRecord::Patch {
            node,
            len: new_children.len(),
            patch: Patch::Children(children),
        });
    }

    fn set_node_bounds(&self, node: NodeId, new_bounds: &[Aabb]) {
        assert!(new_bounds.len() <= BRANCHING_FACTOR);
        let mut bounds = [Aabb::empty(); BRANCHING_FACTOR];
        bounds[..new_bounds.len()].copy_from_slice(new_bounds);
        self.push(BuildRecord::Patch {
            node,
            len: new_bounds.len(),
            patch: Patch::Bounds(bounds),
        });
    }
}

#[cfg(test)]
mod tests {
    use crate::aabb::Aabb;
    use crate::build_tree::{BuildContext, BuildNode, NodeId, BRANCHING_FACTOR};
    use crate::builder::{build_bvh, BuildArguments, BuildCallbacks};
    use crate::primitive::{build_primitives, BuildPrimitive};
    use crate::testbase::random_points;
    use nalgebra::Point3;

    #[test]
    /// Sequential callbacks fill the arena in creation order and count every node.
    fn test_callbacks_fill_arena() {
        let context = BuildContext::new();
        let a = Aabb::around_point(&Point3::new(0.0, 0.0, 0.0), 1.0);
        let b = Aabb::around_point(&Point3::new(5.0, 0.0, 0.0), 1.0);

        let root = context.create_node(2);
        let leaf_a = context.create_leaf(&[BuildPrimitive::new(a, 7)]);
        let leaf_b = context.create_leaf(&[BuildPrimitive::new(b, 3)]);
        context.set_node_children(root, &[leaf_a, leaf_b]);
        context.set_node_bounds(root, &[a, b]);
        assert_eq!(context.node_count(), 3);

        let tree = context.finish(Some(root));
        assert_eq!(tree.node_count, 3);
        assert_eq!(tree.root, Some(NodeId(0)));
        assert_eq!(tree.nodes[1], BuildNode::Leaf { entry_index: 7 });
        assert_eq!(tree.nodes[2], BuildNode::Leaf { entry_index: 3 });
        match &tree.nodes[0] {
            BuildNode::Inner {
                announced,
                children,
                bounds,
            } => {
                assert_eq!(*announced, 2);
                assert_eq!(children, &[Some(leaf_a), Some(leaf_b), None, None]);
                assert_eq!(bounds[0], a);
                assert_eq!(bounds[1], b);
            }
            BuildNode::Leaf { .. } => panic!("Root must be an inner node."),
        }
        assert_eq!(tree.nodes[0].child_count(), 2);
    }

    #[test]
    #[should_panic]
    fn test_leaf_rejects_multiple_primitives() {
        let context = BuildContext::new();
        let aabb = Aabb::around_point(&Point3::origin(), 1.0);
        context.create_leaf(&[BuildPrimitive::new(aabb, 0), BuildPrimitive::new(aabb, 1)]);
    }

    #[test]
    #[should_panic]
    fn test_leaf_rejects_children() {
        let context = BuildContext::new();
        let aabb = Aabb::around_point(&Point3::origin(), 1.0);
        let leaf = context.create_leaf(&[BuildPrimitive::new(aabb, 0)]);
        context.set_node_children(leaf, &[leaf]);
        context.finish(Some(leaf));
    }

    #[test]
    #[should_panic(expected = "announced 3 children but got 2")]
    /// An inner node must get exactly the children it announced.
    fn test_children_must_match_announced_count() {
        let context = BuildContext::new();
        let a = Aabb::around_point(&Point3::new(0.0, 0.0, 0.0), 1.0);
        let b = Aabb::around_point(&Point3::new(5.0, 0.0, 0.0), 1.0);
        let root = context.create_node(3);
        let leaf_a = context.create_leaf(&[BuildPrimitive::new(a, 0)]);
        let leaf_b = context.create_leaf(&[BuildPrimitive::new(b, 1)]);
        context.set_node_children(root, &[leaf_a, leaf_b]);
        context.set_node_bounds(root, &[a, b]);
        context.finish(Some(root));
    }

    #[test]
    #[should_panic(expected = "announced 2 children but got 1")]
    /// Fewer bounds than children would leave a child outside its parent's box.
    fn test_bounds_must_match_announced_count() {
        let context = BuildContext::new();
        let a = Aabb::around_point(&Point3::new(0.0, 0.0, 0.0), 1.0);
        let b = Aabb::around_point(&Point3::new(5.0, 0.0, 0.0), 1.0);
        let root = context.create_node(2);
        let leaf_a = context.create_leaf(&[BuildPrimitive::new(a, 0)]);
        let leaf_b = context.create_leaf(&[BuildPrimitive::new(b, 1)]);
        context.set_node_children(root, &[leaf_a, leaf_b]);
        context.set_node_bounds(root, &[a]);
        context.finish(Some(root));
    }

    #[test]
    #[should_panic]
    fn test_inner_rejects_too_many_children() {
        BuildContext::new().create_node(BRANCHING_FACTOR + 1);
    }

    #[test]
    /// Callbacks running on several threads at once get distinct, dense ids.
    fn test_concurrent_callbacks_get_distinct_ids() {
        let context = BuildContext::new();
        let aabb = Aabb::around_point(&Point3::origin(), 1.0);
        std::thread::scope(|scope| {
            for thread in 0..4u32 {
                let context = &context;
                scope.spawn(move || {
                    for i in 0..250 {
                        context.create_leaf(&[BuildPrimitive::new(aabb, thread * 250 + i)]);
                    }
                });
            }
        });

        let tree = context.finish(None);
        assert_eq!(tree.node_count, 1000);
        assert_eq!(tree.nodes.len(), 1000);
        let mut entries = tree
            .nodes
            .iter()
            .map(|node| match node {
                BuildNode::Leaf { entry_index } => *entry_index,
                BuildNode::Inner { .. } => panic!("Only leaves were created."),
            })
            .collect::<Vec<_>>();
        entries.sort_unstable();
        assert_eq!(entries, (0..1000).collect::<Vec<_>>());
    }

    #[test]
    /// Builds a large tree in parallel and checks that the counter matches the arena.
    fn test_parallel_build_counts_every_node() {
        let points = random_points(10_000, 1);
        let mut primitives = build_primitives(&points, 0.5);
        let arguments = BuildArguments {
            max_branching_factor: BRANCHING_FACTOR,
            ..Default::default()
        };
        let context = BuildContext::with_capacity(2 * points.len());
        let root = build_bvh(&arguments, &mut primitives, &context);
        let tree = context.finish(root);

        assert_eq!(tree.node_count as usize, tree.nodes.len());
        let leaves = tree.nodes.iter().filter(|node| node.is_leaf()).count();
        assert_eq!(leaves, points.len());
        for node in &tree.nodes {
            if !node.is_leaf() {
                assert!((2..=BRANCHING_FACTOR).contains(&node.child_count()));
            }
        }
    }
}
