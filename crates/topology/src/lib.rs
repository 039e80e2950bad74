//! Cluster membership topology for blue/green deployments.
//!
//! This crate provides:
//! - Snapshot types mirroring the cluster status document (collections, shards, replicas)
//! - Node addresses as reported by the membership API
//! - Read-only health queries (leader detection, active-replica counts, layout inference)
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod de;
pub mod health;
pub mod node;
pub mod snapshot;

pub use health::{Layout, MIN_ACTIVE_REPLICAS};
pub use node::{DEFAULT_SERVICE_PORT, NodeAddress};
pub use snapshot::{ACTIVE_STATE, ClusterSnapshot, ClusterStatus, Collection, Replica, Shard};
