//! Point-in-time view of cluster membership.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::NodeAddress;
use crate::de;

/// The only shard/replica state with orchestration meaning.
pub const ACTIVE_STATE: &str = "active";

/// Envelope of a cluster status response.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ClusterStatus {
    /// The cluster state.
    pub cluster: ClusterSnapshot,
}

/// Immutable view of membership state at one point in time.
///
/// Collections and shards keep the order the membership API reported them in.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
pub struct ClusterSnapshot {
    /// Collections by name.
    #[serde(default)]
    pub collections: IndexMap<String, Collection>,

    /// Nodes currently registered with the cluster.
    #[serde(default)]
    pub live_nodes: BTreeSet<NodeAddress>,
}

/// One shard-replicated logical dataset.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct Collection {
    /// Number of replicas per shard the collection was created with.
    #[serde(rename = "replicationFactor", deserialize_with = "de::number_or_string")]
    pub replication_factor: usize,

    /// Shards by name.
    #[serde(default)]
    pub shards: IndexMap<String, Shard>,
}

/// One partition of a collection.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct Shard {
    /// Opaque shard state.
    pub state: String,

    /// Replicas by id.
    #[serde(default)]
    pub replicas: IndexMap<String, Replica>,
}

/// One copy of a shard hosted on one node.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct Replica {
    /// Node hosting the replica.
    pub node_name: NodeAddress,

    /// Opaque replica state.
    pub state: String,

    /// Whether the replica is the shard leader.
    #[serde(default, deserialize_with = "de::flag")]
    pub leader: bool,
}

impl Shard {
    /// Whether the shard reports the active state.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == ACTIVE_STATE
    }

    /// Whether one of the replicas lives on `node`.
    #[must_use]
    pub fn is_hosted_on(&self, node: &NodeAddress) -> bool {
        self.replicas.values().any(|replica| &replica.node_name == node)
    }
}

impl Replica {
    /// Whether the replica reports the active state.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == ACTIVE_STATE
    }
}
