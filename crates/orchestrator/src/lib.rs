//! Bootstrap, blue/green deployment and teardown of a sharded, replicated search cluster.
//!
//! The orchestrators drive two control planes: a [`FleetController`] that provisions node sets
//! and routes traffic between the two slots, and a [`MembershipClient`] that reports and mutates
//! which nodes host which shard replicas. Every step reads fresh cluster state, so each can be
//! re-run on its own after a failure.
//!
//! [`FleetController`]: bluegreen_fleet::FleetController
//! [`MembershipClient`]: bluegreen_membership::MembershipClient
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod bootstrap;
mod config;
mod deploy;
mod error;
mod slot;
mod teardown;

pub use bootstrap::BootstrapOrchestrator;
pub use config::{BootstrapConfig, DeployConfig};
pub use deploy::BlueGreenOrchestrator;
pub use error::Error;
pub use slot::Slot;
pub use teardown::TeardownOrchestrator;
