use crate::aabb::Aabb;
use crate::builder::{BuildArguments, BuildCallbacks, MAX_BUCKETS};
use crate::primitive::BuildPrimitive;
use crate::utils::{joint_aabb_of_primitives, Bucket};
use crate::EPSILON;

use num_traits::ToPrimitive;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// A range of primitives that will become one subtree, together with its bounds.
pub(crate) struct Subset<'a> {
    primitives: &'a mut [BuildPrimitive],

    /// The joint [`Aabb`] of all primitives.
    aabb: Aabb,

    /// The [`Aabb`] of the primitive centers.
    centroid: Aabb,
}

impl<'a> Subset<'a> {
    pub(crate) fn new(primitives: &'a mut [BuildPrimitive]) -> Subset<'a> {
        let (aabb, centroid) = joint_aabb_of_primitives(primitives);
        Subset {
            primitives,
            aabb,
            centroid,
        }
    }
}

/// Recursive binned SAH builder. Every inner node is created by repeatedly splitting the
/// largest of its prospective children in two until the branching factor is reached or
/// no child can be split any further.
pub(crate) struct BinnedBuilder<'c, C> {
    arguments: BuildArguments,
    callbacks: &'c C,
}

impl<'c, C: BuildCallbacks> BinnedBuilder<'c, C> {
    pub(crate) fn new(arguments: BuildArguments, callbacks: &'c C) -> BinnedBuilder<'c, C> {
        BinnedBuilder {
            arguments,
            callbacks,
        }
    }

    /// Builds the subtree over `subset` and returns its root handle and bounds.
    pub(crate) fn build_subtree(&self, subset: Subset<'_>) -> (C::Node, Aabb) {
        let aabb = subset.aabb;

        // If the primitives fit into a leaf, don't split anymore
        if subset.primitives.len() <= self.arguments.max_leaf_size {
            return (self.callbacks.create_leaf(subset.primitives), aabb);
        }

        let children = self.open_children(subset);
        let node = self.callbacks.create_node(children.len());
        let (child_nodes, child_bounds): (Vec<_>, Vec<_>) =
            self.build_children(children).into_iter().unzip();
        self.callbacks.set_node_children(node, &child_nodes);
        self.callbacks.set_node_bounds(node, &child_bounds);

        (node, aabb)
    }

    #[cfg(feature = "rayon")]
    fn build_children(&self, children: Vec<Subset<'_>>) -> Vec<(C::Node, Aabb)> {
        let size: usize = children.iter().map(|child| child.primitives.len()).sum();
        if size > self.arguments.parallel_threshold {
            children
                .into_par_iter()
                .map(|child| self.build_subtree(child))
                .collect()
        } else {
            children
                .into_iter()
                .map(|child| self.build_subtree(child))
                .collect()
        }
    }

    #[cfg(not(feature = "rayon"))]
    fn build_children(&self, children: Vec<Subset<'_>>) -> Vec<(C::Node, Aabb)> {
        children
            .into_iter()
            .map(|child| self.build_subtree(child))
            .collect()
    }

    /// Splits `subset` into at most `max_branching_factor` subsets. The subset with the
    /// largest surface area that can still be split is split next; the two halves take
    /// its place so the children stay in split order.
    fn open_children<'a>(&self, subset: Subset<'a>) -> Vec<Subset<'a>> {
        let mut children = Vec::with_capacity(self.arguments.max_branching_factor);
        children.push(subset);

        while children.len() < self.arguments.max_branching_factor {
            let candidate = children
                .iter()
                .enumerate()
                .filter(|(_, child)| child.primitives.len() > self.arguments.max_leaf_size)
                .max_by(|(_, a), (_, b)| a.aabb.surface_area().total_cmp(&b.aabb.surface_area()))
                .map(|(index, _)| index);
            let Some(index) = candidate else {
                break;
            };

            let (left, right) = self.split(children.remove(index));
            children.insert(index, right);
            children.insert(index, left);
        }

        children
    }

    /// Splits `subset` in two non-empty halves.
    fn split<'a>(&self, subset: Subset<'a>) -> (Subset<'a>, Subset<'a>) {
        let Subset {
            primitives,
            aabb,
            centroid,
        } = subset;

        // Find the axis along which the primitives are spread the most.
        let split_axis = centroid.largest_axis();
        let split_axis_size = centroid.max[split_axis] - centroid.min[split_axis];

        // Centers closer than this cannot be told apart at the magnitude of the coordinates.
        let scale = centroid.min[split_axis].abs().max(centroid.max[split_axis].abs());
        let split_index = if !(split_axis_size > EPSILON * scale) {
            // The primitives lie too close together to split them in a sensible way.
            // Instead we just split the list of primitives in half.
            primitives.len() / 2
        } else {
            self.partition_buckets(primitives, split_axis, split_axis_size, &centroid, &aabb)
        };

        let (left, right) = primitives.split_at_mut(split_index);
        (Subset::new(left), Subset::new(right))
    }

    /// Partitions `primitives` at the cheapest bucket boundary along `split_axis`.
    /// Returns the number of primitives on the left side, which is never `0` or
    /// `primitives.len()`.
    fn partition_buckets(
        &self,
        primitives: &mut [BuildPrimitive],
        split_axis: usize,
        split_axis_size: f32,
        centroid_bounds: &Aabb,
        aabb_bounds: &Aabb,
    ) -> usize {
        let bucket_count = self.arguments.quality.bucket_count();
        let mut buckets = [Bucket::empty(); MAX_BUCKETS];
        let buckets = &mut buckets[..bucket_count];

        let bucket_of = |primitive: &BuildPrimitive| -> usize {
            // Get the relative position of the primitive centroid `[0.0..1.0]`.
            let bucket_num_relative = (primitive.aabb.center()[split_axis]
                - centroid_bounds.min[split_axis])
                / split_axis_size;

            // Convert that to the actual `Bucket` number.
            (bucket_num_relative * (bucket_count as f32 - 0.01))
                .to_usize()
                .map_or(0, |bucket| bucket.min(bucket_count - 1))
        };

        for primitive in primitives.iter() {
            buckets[bucket_of(primitive)].add_aabb(&primitive.aabb);
        }

        // Compute the costs for each configuration and select the best configuration.
        // Equal costs, which happen for flat or degenerate boxes, prefer balanced splits.
        let mut min_bucket = 0;
        let mut min_cost = f32::INFINITY;
        let mut min_imbalance = usize::MAX;
        let bounds_area = aabb_bounds.surface_area().max(f32::MIN_POSITIVE);
        for i in 0..(bucket_count - 1) {
            let (l_buckets, r_buckets) = buckets.split_at(i + 1);
            let child_l = l_buckets.iter().fold(Bucket::empty(), Bucket::join_bucket);
            let child_r = r_buckets.iter().fold(Bucket::empty(), Bucket::join_bucket);
            if child_l.size == 0 || child_r.size == 0 {
                continue;
            }

            let cost = (child_l.size as f32 * child_l.aabb.surface_area()
                + child_r.size as f32 * child_r.aabb.surface_area())
                / bounds_area;
            let imbalance = child_l.size.abs_diff(child_r.size);
            if cost < min_cost || (cost == min_cost && imbalance < min_imbalance) {
                min_bucket = i;
                min_cost = cost;
                min_imbalance = imbalance;
            }
        }

        // Move everything up to and including `min_bucket` to the front.
        let mut split_index = 0;
        for i in 0..primitives.len() {
            if bucket_of(&primitives[i]) <= min_bucket {
                primitives.swap(split_index, i);
                split_index += 1;
            }
        }

        if split_index == 0 || split_index == primitives.len() {
            primitives.len() / 2
        } else {
            split_index
        }
    }
}
