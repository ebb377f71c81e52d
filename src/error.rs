//! Errors reported while building an [`IndexBvh`](crate::index_bvh::IndexBvh).

/// Errors that can occur while building an index.
///
/// Configuration problems are detected before the bulk builder runs. A builder that
/// disagrees with the linearized tree about the number of nodes it created is reported
/// as [`IndexBvhError::NodeCountMismatch`]; there is no partially built index in either
/// case.
///
/// # Example
///
/// ```
/// use index_bvh::error::IndexBvhError;
/// use index_bvh::index_bvh::IndexBvh;
/// use nalgebra::Point3;
///
/// let entries: Vec<Point3<f32>> = Vec::new();
/// match IndexBvh::try_new(entries, 1.0) {
///     Err(IndexBvhError::EmptyEntrySet) => {}
///     _ => unreachable!(),
/// }
/// ```
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum IndexBvhError {
    /// No entries were given.
    #[error("Cannot build an index over an empty entry set")]
    EmptyEntrySet,

    /// The query radius is negative, infinite or NaN.
    #[error("Invalid entry radius {0}, expected a finite, non-negative value")]
    InvalidRadius(f32),

    /// An entry position has an infinite or NaN coordinate.
    #[error("Entry {index} has a non-finite position")]
    NonFinitePosition {
        /// Index of the offending entry.
        index: usize,
    },

    /// Entry indices and skip indices must stay below the leaf flag of the flat node
    /// control word.
    #[error("Too many entries ({0}), at most {max} are supported", max = crate::flat_bvh::MAX_ENTRIES)]
    TooManyEntries(usize),

    /// The bulk builder reported a different number of nodes than the linearizer wrote.
    #[error("Builder reported {reported} nodes but {linearized} were linearized")]
    NodeCountMismatch {
        /// Number of nodes counted by the build callbacks.
        reported: u32,
        /// Number of records written to the flat array.
        linearized: u32,
    },
}
