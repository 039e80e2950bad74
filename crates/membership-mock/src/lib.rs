//! In-memory implementation of the membership interface for testing purposes.
//!
//! The mock keeps a [`ClusterSnapshot`] and mutates it the way the collections API would:
//! collections get one replica per shard and replica slot on the live nodes, added replicas come
//! up after a configurable number of snapshot fetches, and deleting a leader elects the next
//! active replica.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::collections::HashSet;
use std::fmt::{self, Debug};
use std::sync::Arc;

use async_trait::async_trait;
use bluegreen_membership::{MembershipClient, MutationOutcome};
use bluegreen_topology::{ACTIVE_STATE, ClusterSnapshot, Collection, NodeAddress, Replica, Shard};
use indexmap::IndexMap;
use tokio::sync::Mutex;

/// State of a replica that has been added but is not serving yet.
const RECOVERING_STATE: &str = "recovering";

/// A call received by the mock.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MembershipCall {
    /// `get_cluster_snapshot`.
    GetClusterSnapshot,

    /// `create_collection`.
    CreateCollection {
        /// Collection name.
        name: String,

        /// Requested shard count.
        shard_count: usize,

        /// Requested replication factor.
        replication_factor: usize,
    },

    /// `delete_collection`.
    DeleteCollection {
        /// Collection name.
        name: String,
    },

    /// `add_replica`.
    AddReplica {
        /// Collection name.
        collection: String,

        /// Shard name.
        shard: String,

        /// Target node.
        node: NodeAddress,
    },

    /// `delete_replica`.
    DeleteReplica {
        /// Collection name.
        collection: String,

        /// Shard name.
        shard: String,

        /// Replica id.
        replica: String,
    },
}

type Observer = Arc<dyn Fn(&MembershipCall) + Send + Sync>;

struct PendingReplica {
    collection: String,
    shard: String,
    replica: String,
    remaining_polls: usize,
}

struct PendingNode {
    node: NodeAddress,
    remaining_polls: usize,
}

#[derive(Default)]
struct State {
    calls: Vec<MembershipCall>,
    failing_deletes: HashSet<String>,
    failing_snapshots: usize,
    next_replica: usize,
    pending_nodes: Vec<PendingNode>,
    pending_replicas: Vec<PendingReplica>,
    snapshot: ClusterSnapshot,
}

impl State {
    fn record(&mut self, call: MembershipCall, observer: Option<&Observer>) {
        if let Some(observer) = observer {
            observer(&call);
        }
        self.calls.push(call);
    }

    fn next_replica_id(&mut self) -> String {
        self.next_replica += 1;
        format!("core_node{}", self.next_replica)
    }

    fn advance(&mut self) {
        for pending in &mut self.pending_nodes {
            pending.remaining_polls = pending.remaining_polls.saturating_sub(1);
        }
        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_nodes)
            .into_iter()
            .partition(|pending| pending.remaining_polls == 0);
        self.pending_nodes = waiting;
        self.snapshot
            .live_nodes
            .extend(ready.into_iter().map(|pending| pending.node));

        for pending in &mut self.pending_replicas {
            pending.remaining_polls = pending.remaining_polls.saturating_sub(1);
        }
        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending_replicas)
            .into_iter()
            .partition(|pending| pending.remaining_polls == 0);
        self.pending_replicas = waiting;

        for pending in ready {
            if let Some(replica) = self
                .snapshot
                .collections
                .get_mut(&pending.collection)
                .and_then(|collection| collection.shards.get_mut(&pending.shard))
                .and_then(|shard| shard.replicas.get_mut(&pending.replica))
            {
                ACTIVE_STATE.clone_into(&mut replica.state);
            }
        }
    }

    fn build_collection(&mut self, shard_count: usize, replication_factor: usize) -> Collection {
        let live_nodes: Vec<NodeAddress> = self.snapshot.live_nodes.iter().cloned().collect();
        let mut shards = IndexMap::new();

        for shard_index in 0..shard_count {
            let mut replicas = IndexMap::new();

            if !live_nodes.is_empty() {
                for replica_index in 0..replication_factor {
                    let node = &live_nodes
                        [(shard_index + replica_index * shard_count) % live_nodes.len()];
                    replicas.insert(
                        self.next_replica_id(),
                        Replica {
                            node_name: node.clone(),
                            state: ACTIVE_STATE.to_string(),
                            leader: replica_index == 0,
                        },
                    );
                }
            }

            shards.insert(
                format!("shard{}", shard_index + 1),
                Shard {
                    state: ACTIVE_STATE.to_string(),
                    replicas,
                },
            );
        }

        Collection {
            replication_factor,
            shards,
        }
    }
}

/// Mock implementation of the membership client.
#[derive(Clone, Default)]
pub struct MockMembership {
    activation_polls: usize,
    observer: Option<Observer>,
    state: Arc<Mutex<State>>,
}

impl Debug for MockMembership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockMembership")
            .field("activation_polls", &self.activation_polls)
            .finish_non_exhaustive()
    }
}

impl MockMembership {
    /// Creates a mock of an empty cluster with no live nodes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a mock starting from the given cluster state.
    #[must_use]
    pub fn with_snapshot(snapshot: ClusterSnapshot) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                snapshot,
                ..State::default()
            })),
            ..Self::default()
        }
    }

    /// Number of snapshot fetches after which an added replica becomes active.
    ///
    /// Zero, the default, makes added replicas active right away.
    #[must_use]
    pub const fn with_activation_polls(mut self, polls: usize) -> Self {
        self.activation_polls = polls;
        self
    }

    /// Calls `observer` with every call before it is applied.
    #[must_use]
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&MembershipCall) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Registers nodes as live right away.
    pub async fn add_live_nodes<I>(&self, nodes: I)
    where
        I: IntoIterator<Item = NodeAddress> + Send,
        I::IntoIter: Send,
    {
        self.state.lock().await.snapshot.live_nodes.extend(nodes);
    }

    /// Registers nodes as live once `polls` more snapshots have been fetched.
    pub async fn add_live_nodes_after<I>(&self, nodes: I, polls: usize)
    where
        I: IntoIterator<Item = NodeAddress> + Send,
        I::IntoIter: Send,
    {
        let mut state = self.state.lock().await;
        for node in nodes {
            state.pending_nodes.push(PendingNode {
                node,
                remaining_polls: polls,
            });
        }
    }

    /// Creates a collection on the current live nodes without recording a call.
    pub async fn seed_collection(&self, name: &str, shard_count: usize, replication_factor: usize) {
        let mut state = self.state.lock().await;
        let collection = state.build_collection(shard_count, replication_factor);
        state
            .snapshot
            .collections
            .insert(name.to_string(), collection);
    }

    /// Makes every later attempt to delete the collection fail.
    pub async fn fail_collection_delete(&self, name: &str) {
        self.state
            .lock()
            .await
            .failing_deletes
            .insert(name.to_string());
    }

    /// Makes the next `count` snapshot fetches fail.
    pub async fn fail_snapshots(&self, count: usize) {
        self.state.lock().await.failing_snapshots = count;
    }

    /// Current cluster state, without counting as a fetch.
    pub async fn snapshot(&self) -> ClusterSnapshot {
        self.state.lock().await.snapshot.clone()
    }

    /// Every call received so far.
    pub async fn calls(&self) -> Vec<MembershipCall> {
        self.state.lock().await.calls.clone()
    }
}

#[async_trait]
impl MembershipClient for MockMembership {
    type Error = Error;

    async fn get_cluster_snapshot(&self) -> Result<ClusterSnapshot, Self::Error> {
        let mut state = self.state.lock().await;
        state.record(MembershipCall::GetClusterSnapshot, self.observer.as_ref());

        if state.failing_snapshots > 0 {
            state.failing_snapshots -= 1;
            return Err(Error::Unavailable);
        }

        state.advance();

        Ok(state.snapshot.clone())
    }

    async fn create_collection(
        &self,
        name: &str,
        shard_count: usize,
        replication_factor: usize,
    ) -> Result<MutationOutcome, Self::Error> {
        let mut state = self.state.lock().await;
        state.record(
            MembershipCall::CreateCollection {
                name: name.to_string(),
                shard_count,
                replication_factor,
            },
            self.observer.as_ref(),
        );

        if state.snapshot.collections.contains_key(name) {
            return Ok(MutationOutcome::Ignored);
        }

        let collection = state.build_collection(shard_count, replication_factor);
        state
            .snapshot
            .collections
            .insert(name.to_string(), collection);

        Ok(MutationOutcome::Applied)
    }

    async fn delete_collection(&self, name: &str) -> Result<MutationOutcome, Self::Error> {
        let mut state = self.state.lock().await;
        state.record(
            MembershipCall::DeleteCollection {
                name: name.to_string(),
            },
            self.observer.as_ref(),
        );

        if state.failing_deletes.contains(name) {
            return Err(Error::Rejected(format!("cannot delete collection [{name}]")));
        }

        Ok(match state.snapshot.collections.shift_remove(name) {
            Some(_) => MutationOutcome::Applied,
            None => MutationOutcome::Ignored,
        })
    }

    async fn add_replica(
        &self,
        collection: &str,
        shard: &str,
        node: &NodeAddress,
    ) -> Result<MutationOutcome, Self::Error> {
        let mut state = self.state.lock().await;
        state.record(
            MembershipCall::AddReplica {
                collection: collection.to_string(),
                shard: shard.to_string(),
                node: node.clone(),
            },
            self.observer.as_ref(),
        );

        if state.snapshot.shard(collection, shard).is_none() {
            return Err(Error::UnknownShard {
                collection: collection.to_string(),
                shard: shard.to_string(),
            });
        }

        let replica_id = state.next_replica_id();
        let replica_state = if self.activation_polls == 0 {
            ACTIVE_STATE
        } else {
            state.pending_replicas.push(PendingReplica {
                collection: collection.to_string(),
                shard: shard.to_string(),
                replica: replica_id.clone(),
                remaining_polls: self.activation_polls,
            });
            RECOVERING_STATE
        };

        if let Some(target) = state
            .snapshot
            .collections
            .get_mut(collection)
            .and_then(|current| current.shards.get_mut(shard))
        {
            target.replicas.insert(
                replica_id,
                Replica {
                    node_name: node.clone(),
                    state: replica_state.to_string(),
                    leader: false,
                },
            );
        }

        Ok(MutationOutcome::Applied)
    }

    async fn delete_replica(
        &self,
        collection: &str,
        shard: &str,
        replica: &str,
    ) -> Result<MutationOutcome, Self::Error> {
        let mut state = self.state.lock().await;
        state.record(
            MembershipCall::DeleteReplica {
                collection: collection.to_string(),
                shard: shard.to_string(),
                replica: replica.to_string(),
            },
            self.observer.as_ref(),
        );

        let Some(target) = state
            .snapshot
            .collections
            .get_mut(collection)
            .and_then(|current| current.shards.get_mut(shard))
        else {
            return Ok(MutationOutcome::Ignored);
        };

        let Some(removed) = target.replicas.shift_remove(replica) else {
            return Ok(MutationOutcome::Ignored);
        };

        if removed.leader {
            if let Some(successor) = target
                .replicas
                .values_mut()
                .find(|candidate| candidate.is_active())
            {
                successor.leader = true;
            }
        }

        Ok(MutationOutcome::Applied)
    }
}
