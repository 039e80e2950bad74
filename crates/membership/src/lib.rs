//! Abstract interface for querying and mutating the membership of a search cluster.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod policy;
pub mod retry;

use std::error::Error;
use std::fmt::{self, Debug, Display};

use async_trait::async_trait;
use bluegreen_topology::{ClusterSnapshot, NodeAddress};

pub use policy::{Disposition, Mutation};
pub use retry::{MutationError, RetryPolicy};

/// Result of a mutation the membership API accepted, or that is treated as accepted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MutationOutcome {
    /// The API confirmed the mutation.
    Applied,

    /// The API timed out; the mutation most likely completed server-side.
    AssumedApplied,

    /// The API rejected the mutation in a way that means there is nothing left to do.
    Ignored,
}

/// The kind of membership error.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MembershipErrorKind {
    /// The API answered with a status that is not handled for the call.
    UnexpectedStatus,

    /// Every attempt of a retried mutation failed transiently.
    RetriesExhausted,

    /// The request could not be sent or its response not read.
    Transport,

    /// The response body could not be decoded.
    Decode,

    /// Other/unknown error
    Other,
}

impl Display for MembershipErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Marker trait for `MembershipClient` errors
pub trait MembershipError: Debug + Error + Send + Sync + 'static {
    /// Returns the kind of this error
    fn kind(&self) -> MembershipErrorKind;
}

/// Typed access to the collections API of a search cluster.
#[async_trait]
pub trait MembershipClient
where
    Self: Clone + Send + Sync + 'static,
{
    /// The error type for this client.
    type Error: MembershipError;

    /// Fetches the current cluster state.
    async fn get_cluster_snapshot(&self) -> Result<ClusterSnapshot, Self::Error>;

    /// Creates a collection, retrying while the cluster is not ready to accept it.
    async fn create_collection(
        &self,
        name: &str,
        shard_count: usize,
        replication_factor: usize,
    ) -> Result<MutationOutcome, Self::Error>;

    /// Deletes a collection.
    async fn delete_collection(&self, name: &str) -> Result<MutationOutcome, Self::Error>;

    /// Adds a replica of a shard on the given node, retrying while placement conflicts last.
    async fn add_replica(
        &self,
        collection: &str,
        shard: &str,
        node: &NodeAddress,
    ) -> Result<MutationOutcome, Self::Error>;

    /// Deletes one replica of a shard.
    async fn delete_replica(
        &self,
        collection: &str,
        shard: &str,
        replica: &str,
    ) -> Result<MutationOutcome, Self::Error>;
}
