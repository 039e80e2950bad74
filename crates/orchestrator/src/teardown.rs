use bluegreen_fleet::{FleetController, FleetError, FleetErrorKind, PASSIVE_WEIGHT};
use bluegreen_membership::MembershipClient;
use tracing::{info, warn};

use crate::Error;

/// Removes every collection and every node set of an application.
#[derive(Clone, Debug)]
pub struct TeardownOrchestrator<M, F>
where
    M: MembershipClient,
    F: FleetController,
{
    app: String,
    fleet: F,
    membership: M,
}

impl<M, F> TeardownOrchestrator<M, F>
where
    M: MembershipClient,
    F: FleetController,
{
    /// Creates a teardown orchestrator for `app`.
    pub fn new(app: impl Into<String>, membership: M, fleet: F) -> Self {
        Self {
            app: app.into(),
            fleet,
            membership,
        }
    }

    /// Deletes all collections, then switches off and deletes every node set.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::NoActiveVersion`] if the application has no node sets, and on any
    /// fleet error other than an unchanged traffic weight. Collection deletions that fail are
    /// only logged.
    pub async fn delete_cluster(&self) -> Result<(), Error> {
        let node_sets = self
            .fleet
            .get_all_node_sets(&self.app)
            .await
            .map_err(Error::fleet)?;

        if node_sets.is_empty() {
            return Err(Error::NoActiveVersion);
        }

        self.delete_all_collections_in_cluster().await?;

        for node_set in node_sets {
            self.switch_off_traffic(&node_set.name).await?;
            self.fleet
                .delete_node_set(&self.app, &node_set.name)
                .await
                .map_err(Error::fleet)?;
        }

        Ok(())
    }

    /// Deletes every collection in the cluster, logging the ones that fail.
    ///
    /// # Errors
    ///
    /// Fails only if the cluster state cannot be fetched.
    pub async fn delete_all_collections_in_cluster(&self) -> Result<(), Error> {
        let snapshot = self
            .membership
            .get_cluster_snapshot()
            .await
            .map_err(Error::membership)?;

        for name in snapshot.collections.keys() {
            match self.membership.delete_collection(name).await {
                Ok(outcome) => info!("collection [{}] deleted ({:?})", name, outcome),
                Err(e) => warn!("could not delete collection [{}] in cluster: [{}]", name, e),
            }
        }

        Ok(())
    }

    /// Routes no traffic to the node set; a weight that is already zero is fine.
    ///
    /// # Errors
    ///
    /// Fails on any fleet error other than an unchanged traffic weight.
    pub async fn switch_off_traffic(&self, slot: &str) -> Result<(), Error> {
        match self
            .fleet
            .switch_traffic(&self.app, slot, PASSIVE_WEIGHT)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == FleetErrorKind::TrafficUnchanged => {
                info!(
                    "traffic was not switched, it was already off for node set [{}]",
                    slot
                );
                Ok(())
            }
            Err(e) => Err(Error::fleet(e)),
        }
    }
}
