//! Abstract interface for provisioning node sets and steering traffic between them.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod command;

use std::error::Error;
use std::fmt::{self, Debug, Display};
use std::time::Duration;

use async_trait::async_trait;

pub use command::{CommandError, CommandRunner, SystemCommandRunner};

#[cfg(any(test, feature = "test-helpers"))]
pub use command::ScriptedRunner;

/// Traffic weight of the node set serving all requests.
pub const ACTIVE_WEIGHT: u8 = 100;

/// Traffic weight of a node set serving no requests.
pub const PASSIVE_WEIGHT: u8 = 0;

/// A group of provisioned hosts sharing one slot label.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeSet {
    /// Slot label, e.g. `A` or `B`.
    pub name: String,

    /// Hosts of the node set.
    pub nodes: Vec<String>,

    /// Share of traffic routed to the node set, 0 to 100.
    pub weight_percent: u8,
}

impl NodeSet {
    /// Whether the node set receives all traffic.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.weight_percent == ACTIVE_WEIGHT
    }

    /// Whether the node set receives no traffic.
    #[must_use]
    pub const fn is_passive(&self) -> bool {
        self.weight_percent == PASSIVE_WEIGHT
    }
}

/// The kind of fleet error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FleetErrorKind {
    /// The provisioner refused or failed to create the node set.
    CreationFailed,

    /// The node set did not finish creating in time.
    CreationTimeout,

    /// The provisioner did not apply the requested traffic weight.
    TrafficSwitchFailed,

    /// The traffic weight already had the requested value.
    TrafficUnchanged,

    /// The provisioner command could not be run or exited with an error.
    Command,

    /// The provisioner output could not be decoded.
    Decode,

    /// Other/unknown error
    Other,
}

impl Display for FleetErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Marker trait for `FleetController` errors
pub trait FleetError: Debug + Error + Send + Sync + 'static {
    /// Returns the kind of this error
    fn kind(&self) -> FleetErrorKind;
}

/// Provisions node sets ("slots") of an application and routes traffic between them.
#[async_trait]
pub trait FleetController
where
    Self: Clone + Send + Sync + 'static,
{
    /// The error type for this controller.
    type Error: FleetError;

    /// Provisions a node set and blocks until it is created.
    async fn create_node_set(
        &self,
        app: &str,
        slot: &str,
        image_version: &str,
    ) -> Result<(), Self::Error>;

    /// Polls the provisioner until the node set is created, failed, or `timeout` has passed.
    async fn wait_for_node_set_created(
        &self,
        app: &str,
        slot: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<(), Self::Error>;

    /// Deletes a node set and blocks until it is gone.
    async fn delete_node_set(&self, app: &str, slot: &str) -> Result<(), Self::Error>;

    /// Lists every node set of the application.
    async fn get_all_node_sets(&self, app: &str) -> Result<Vec<NodeSet>, Self::Error>;

    /// Hosts of one node set, sorted ascending.
    async fn get_node_set_members(&self, app: &str, slot: &str)
    -> Result<Vec<String>, Self::Error>;

    /// Slot receiving all traffic, if any.
    async fn get_active_node_set(&self, app: &str) -> Result<Option<String>, Self::Error> {
        Ok(self
            .get_all_node_sets(app)
            .await?
            .into_iter()
            .find(NodeSet::is_active)
            .map(|node_set| node_set.name))
    }

    /// Slot receiving no traffic, if any.
    async fn get_passive_node_set(&self, app: &str) -> Result<Option<String>, Self::Error> {
        Ok(self
            .get_all_node_sets(app)
            .await?
            .into_iter()
            .find(NodeSet::is_passive)
            .map(|node_set| node_set.name))
    }

    /// Routes `weight` percent of the traffic to the slot.
    async fn switch_traffic(&self, app: &str, slot: &str, weight: u8) -> Result<(), Self::Error>;
}
