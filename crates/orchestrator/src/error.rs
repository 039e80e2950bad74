use std::path::PathBuf;
use std::time::Duration;

use bluegreen_fleet::{FleetError, FleetErrorKind};
use bluegreen_membership::{MembershipError, MembershipErrorKind};
use bluegreen_topology::NodeAddress;
use thiserror::Error;

/// Errors that can occur while orchestrating the cluster.
#[derive(Debug, Error)]
pub enum Error {
    /// New nodes did not register with the cluster in time.
    #[error("timeout while creating new cluster, nodes {missing:?} were not registered within {timeout:?}")]
    ClusterCreationTimeout {
        /// Nodes still missing at the last poll.
        missing: Vec<NodeAddress>,

        /// Configured bound.
        timeout: Duration,
    },

    /// Added replicas did not become active in time.
    #[error("timeout while adding new nodes to cluster, replicas were not active within {timeout:?}")]
    AddNodesTimeout {
        /// Configured bound.
        timeout: Duration,
    },

    /// The node set has fewer hosts than the layout needs.
    #[error("not enough instances for current cluster layout: [{available}]<[{required}]")]
    InsufficientNodes {
        /// Hosts in the node set.
        available: usize,

        /// Hosts the layout needs.
        required: usize,
    },

    /// A shard never reported exactly one active leader.
    #[error("shard [{shard}] of collection [{collection}] has no active leader")]
    NoActiveLeader {
        /// Collection name.
        collection: String,

        /// Shard name.
        shard: String,
    },

    /// A shard never reported enough active replicas.
    #[error("shard [{shard}] of collection [{collection}] has not enough active replicas: [{active}]")]
    InsufficientActiveReplicas {
        /// Collection name.
        collection: String,

        /// Shard name.
        shard: String,

        /// Active replicas at the last check.
        active: usize,
    },

    /// There is no node set to tear down.
    #[error("no active version found")]
    NoActiveVersion,

    /// A collection does not follow the inferred layout.
    #[error("collection [{collection}] has {actual} shards, the cluster layout has {expected}")]
    LayoutMismatch {
        /// Collection name.
        collection: String,

        /// Shard count of the layout.
        expected: usize,

        /// Shard count of the collection.
        actual: usize,
    },

    /// A node set has to be created but no image version was given.
    #[error("an image version is required to create a node set")]
    MissingImageVersion,

    /// Replicas could not be placed.
    #[error(transparent)]
    Placement(#[from] bluegreen_placement::Error),

    /// The membership API failed.
    #[error("membership error ({kind}): {message}")]
    Membership {
        /// Kind reported by the client.
        kind: MembershipErrorKind,

        /// Rendered client error.
        message: String,
    },

    /// The fleet controller failed.
    #[error("fleet error ({kind}): {message}")]
    Fleet {
        /// Kind reported by the controller.
        kind: FleetErrorKind,

        /// Rendered controller error.
        message: String,
    },

    /// The collection config directory could not be read.
    #[error("failed to read collection configs from [{path}]: {source}")]
    ConfigDir {
        /// Directory path.
        path: PathBuf,

        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn membership<E>(error: E) -> Self
    where
        E: MembershipError,
    {
        Self::Membership {
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    pub(crate) fn fleet<E>(error: E) -> Self
    where
        E: FleetError,
    {
        Self::Fleet {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}
