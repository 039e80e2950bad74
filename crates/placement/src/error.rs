use thiserror::Error;

/// Placement errors.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    /// The node list is too short for the requested layout.
    #[error("not enough nodes for cluster layout: {available} < {required}")]
    InsufficientNodes {
        /// Nodes available.
        available: usize,

        /// Nodes required (`shard_count * replication_factor`).
        required: usize,
    },
}
