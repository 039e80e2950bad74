//! Read-only health and layout queries over a [`ClusterSnapshot`].

use tracing::{debug, warn};

use crate::{ClusterSnapshot, NodeAddress, Shard};

/// Minimum number of active replicas a shard must keep before one of its replicas may be removed.
pub const MIN_ACTIVE_REPLICAS: usize = 2;

/// Sharding layout of the cluster.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Layout {
    /// Number of shards per collection.
    pub shard_count: usize,

    /// Number of replicas per shard.
    pub replication_factor: usize,
}

impl Layout {
    /// Creates a layout.
    #[must_use]
    pub const fn new(shard_count: usize, replication_factor: usize) -> Self {
        Self {
            shard_count,
            replication_factor,
        }
    }

    /// Number of nodes needed to host every replica of one collection on its own node.
    #[must_use]
    pub const fn required_nodes(&self) -> usize {
        self.shard_count * self.replication_factor
    }

    /// Whether no layout could be observed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.required_nodes() == 0
    }
}

impl ClusterSnapshot {
    /// Looks up a shard of a collection.
    #[must_use]
    pub fn shard(&self, collection: &str, shard: &str) -> Option<&Shard> {
        self.collections.get(collection)?.shards.get(shard)
    }

    /// Whether the shard is active and exactly one of its active replicas is the leader.
    #[must_use]
    pub fn has_active_leader(&self, collection: &str, shard: &str) -> bool {
        let Some(current) = self.shard(collection, shard) else {
            return false;
        };

        if !current.is_active() {
            warn!(
                "shard [{}] of collection [{}] is not active (state=[{}])",
                shard, collection, current.state
            );
            return false;
        }

        let leaders: Vec<&str> = current
            .replicas
            .iter()
            .filter(|(_, replica)| replica.is_active() && replica.leader)
            .map(|(name, _)| name.as_str())
            .collect();

        match leaders.as_slice() {
            [leader] => {
                debug!(
                    "active leader of shard [{}] in collection [{}] is [{}]",
                    shard, collection, leader
                );
                true
            }
            _ => false,
        }
    }

    /// Number of replicas of the shard in the active state.
    #[must_use]
    pub fn count_active_replicas(&self, collection: &str, shard: &str) -> usize {
        let active = self.shard(collection, shard).map_or(0, |current| {
            current
                .replicas
                .values()
                .filter(|replica| replica.is_active())
                .count()
        });

        debug!(
            "number of active replicas in shard [{}] of collection [{}] is [{}]",
            shard, collection, active
        );

        active
    }

    /// Whether a replica of the shard can be removed without losing the leader or quorum.
    #[must_use]
    pub fn is_shard_healthy(&self, collection: &str, shard: &str) -> bool {
        self.has_active_leader(collection, shard)
            && self.count_active_replicas(collection, shard) >= MIN_ACTIVE_REPLICAS
    }

    /// Whether every replica of every shard of every collection is active.
    #[must_use]
    pub fn all_replicas_active(&self) -> bool {
        self.collections
            .values()
            .flat_map(|collection| collection.shards.values())
            .flat_map(|shard| shard.replicas.values())
            .all(|replica| replica.is_active())
    }

    /// Whether the node is registered with the cluster.
    #[must_use]
    pub fn is_live(&self, node: &NodeAddress) -> bool {
        self.live_nodes.contains(node)
    }

    /// Whether the shard already has a replica on `node`; unknown shards host nothing.
    #[must_use]
    pub fn shard_hosts(&self, collection: &str, shard: &str, node: &NodeAddress) -> bool {
        self.shard(collection, shard)
            .is_some_and(|current| current.is_hosted_on(node))
    }

    /// Infers the sharding layout from the first collection in response order.
    ///
    /// Which collection comes first is up to the membership API; all collections are expected to
    /// share one layout. An empty cluster yields the empty layout.
    #[must_use]
    pub fn infer_layout(&self) -> Layout {
        self.collections
            .first()
            .map_or_else(Layout::default, |(_, collection)| {
                Layout::new(collection.shards.len(), collection.replication_factor)
            })
    }
}
