//! Deterministic assignment of shard replicas to the nodes of a node set.
//!
//! Replicas are striped round-robin over the node list: replica `r` of shard `s` lands on
//! `nodes[s + r * shard_count]`. With a duplicate-free node list every replica of a shard lands
//! on a distinct node, and the same input always yields the same placement.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

/// Target node for one replica slot of one shard.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Assignment<'a, N> {
    /// Index of the shard within its collection.
    pub shard: usize,

    /// Replica slot within the shard.
    pub replica: usize,

    /// Node the replica should live on.
    pub node: &'a N,
}

/// Maps every `(shard, replica)` slot to a node.
///
/// Assignments are returned shard-major, replica-minor. A layout with no shards or no replicas
/// yields no assignments.
///
/// # Errors
///
/// Returns [`Error::InsufficientNodes`] if `nodes` holds fewer than
/// `shard_count * replication_factor` entries.
pub fn assign_replicas<N>(
    nodes: &[N],
    shard_count: usize,
    replication_factor: usize,
) -> Result<Vec<Assignment<'_, N>>, Error> {
    let required = shard_count * replication_factor;

    if nodes.len() < required {
        return Err(Error::InsufficientNodes {
            available: nodes.len(),
            required,
        });
    }

    Ok((0..shard_count)
        .flat_map(|shard| {
            (0..replication_factor).map(move |replica| Assignment {
                shard,
                replica,
                node: &nodes[shard + replica * shard_count],
            })
        })
        .collect())
}
