//! A crate which builds immutable bounding volume hierarchies over point entries and
//! exports them as flat arrays that can be traversed without recursion.
//!
//! ## About
//!
//! Many renderers and simulations need to find all stored records near a query point,
//! e.g. the photons around a shading point in photon mapping. When every record shares
//! the same query radius, an [`IndexBvh`](index_bvh::IndexBvh) expands each entry's
//! position by that radius, builds a 4-wide BVH over the resulting boxes with a binned
//! SAH builder and linearizes it into an array of fixed-size [`FlatNode`](flat_bvh::FlatNode)s.
//! The array is laid out so that a traversal needs neither a stack nor child pointers,
//! which makes it easy to upload to a GPU buffer (enable the `bytemuck` feature for a
//! `Pod` view of it).
//!
//! ## Example
//!
//! ```
//! use index_bvh::index_bvh::IndexBvh;
//! use nalgebra::Point3;
//!
//! let entries = (0..1000)
//!     .map(|i| Point3::new(i as f32, (i % 10) as f32, 0.0))
//!     .collect::<Vec<_>>();
//!
//! let index = IndexBvh::try_new(entries, 1.5).unwrap();
//! let near = index.entries_near(&Point3::new(500.0, 0.5, 0.0));
//! assert!(near.contains(&500));
//!
//! let (nearest, _) = index.nearest_entry(&Point3::new(42.1, 2.0, 0.0)).unwrap();
//! assert_eq!(nearest, 42);
//! ```
//!
//! ## Features
//!
//! - `rayon` (default **enabled**) - builds large subtrees in parallel
//! - `serde` (default **disabled**) - adds `Serialize` and `Deserialize` implementations for some types
//! - `bytemuck` (default **disabled**) - derives `Pod` for [`FlatNode`](flat_bvh::FlatNode)
//! - `bench` (default **disabled**) - enables the nightly benchmarks
//!

#![cfg_attr(all(feature = "bench", test), feature(test))]

#[cfg(all(feature = "bench", test))]
extern crate test;

/// Relative tolerance below which the builder treats primitive centers as coincident.
pub const EPSILON: f32 = 0.00001;

pub mod aabb;
pub mod ball;
pub mod build_tree;
pub mod builder;
pub mod entry;
pub mod error;
pub mod flat_bvh;
pub mod index_bvh;
pub mod primitive;
mod utils;

#[cfg(test)]
mod testbase;

#[cfg(doctest)]
doc_comment::doctest!("../README.md");
