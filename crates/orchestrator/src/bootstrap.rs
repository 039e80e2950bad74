use std::path::Path;

use bluegreen_fleet::{ACTIVE_WEIGHT, FleetController};
use bluegreen_membership::MembershipClient;
use bluegreen_topology::Layout;
use tracing::{info, warn};

use crate::{BootstrapConfig, Error, Slot};

/// Creates a fresh cluster in slot [`Slot::A`] and one collection per config directory entry.
#[derive(Clone, Debug)]
pub struct BootstrapOrchestrator<M, F>
where
    M: MembershipClient,
    F: FleetController,
{
    app: String,
    config: BootstrapConfig,
    fleet: F,
    image_version: String,
    layout: Layout,
    membership: M,
}

impl<M, F> BootstrapOrchestrator<M, F>
where
    M: MembershipClient,
    F: FleetController,
{
    /// Creates a bootstrap orchestrator for `app`.
    pub fn new(
        app: impl Into<String>,
        image_version: impl Into<String>,
        layout: Layout,
        config: BootstrapConfig,
        membership: M,
        fleet: F,
    ) -> Self {
        Self {
            app: app.into(),
            config,
            fleet,
            image_version: image_version.into(),
            layout,
            membership,
        }
    }

    /// Runs every bootstrap step in order.
    ///
    /// # Errors
    ///
    /// Fails if the node set cannot be created or switched on, the config directory cannot be
    /// read, or a collection cannot be created. A cluster that never becomes ready is only
    /// logged.
    pub async fn bootstrap_cluster(&self) -> Result<(), Error> {
        self.create_cluster().await?;
        self.switch_on_traffic().await?;
        self.wait_for_cluster_to_be_ready().await;
        self.add_all_collections_to_cluster().await
    }

    /// Provisions the initial node set.
    ///
    /// # Errors
    ///
    /// Fails if the fleet controller cannot create the node set.
    pub async fn create_cluster(&self) -> Result<(), Error> {
        info!(
            "creating initial node set [{}] of [{}] with image version [{}]",
            Slot::A,
            self.app,
            self.image_version
        );

        self.fleet
            .create_node_set(&self.app, Slot::A.as_str(), &self.image_version)
            .await
            .map_err(Error::fleet)
    }

    /// Routes all traffic to the initial node set.
    ///
    /// # Errors
    ///
    /// Fails if the fleet controller does not apply the weight.
    pub async fn switch_on_traffic(&self) -> Result<(), Error> {
        self.fleet
            .switch_traffic(&self.app, Slot::A.as_str(), ACTIVE_WEIGHT)
            .await
            .map_err(Error::fleet)
    }

    /// Polls until enough nodes are live to host the layout, or the retries run out.
    ///
    /// Returns whether the cluster became ready.
    pub async fn wait_for_cluster_to_be_ready(&self) -> bool {
        let required = self.layout.required_nodes();
        let attempts = self.config.retry_count + 1;

        for attempt in 1..=attempts {
            match self.membership.get_cluster_snapshot().await {
                Ok(snapshot) if snapshot.live_nodes.len() >= required => {
                    info!(
                        "cluster is ready with [{}] live nodes",
                        snapshot.live_nodes.len()
                    );
                    return true;
                }
                Ok(snapshot) => warn!(
                    "cluster is not ready yet, [{}] of [{}] nodes are live ({}/{})",
                    snapshot.live_nodes.len(),
                    required,
                    attempt,
                    attempts
                ),
                Err(e) => warn!("could not get cluster state: {} ({}/{})", e, attempt, attempts),
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.retry_wait).await;
            }
        }

        warn!("cluster did not become ready in time");

        false
    }

    /// Creates one collection per entry of the config directory, in name order.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be read; the first failing creation aborts the rest.
    pub async fn add_all_collections_to_cluster(&self) -> Result<(), Error> {
        for name in collection_names(&self.config.config_dir).await? {
            self.add_collection_to_cluster(&name).await?;
        }

        Ok(())
    }

    /// Creates one collection with the bootstrap layout.
    ///
    /// # Errors
    ///
    /// Fails if the membership API does not accept the collection.
    pub async fn add_collection_to_cluster(&self, name: &str) -> Result<(), Error> {
        let outcome = self
            .membership
            .create_collection(
                name,
                self.layout.shard_count,
                self.layout.replication_factor,
            )
            .await
            .map_err(Error::membership)?;

        info!("collection [{}] created ({:?})", name, outcome);

        Ok(())
    }
}

async fn collection_names(config_dir: &Path) -> Result<Vec<String>, Error> {
    let read_error = |source| Error::ConfigDir {
        path: config_dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(config_dir).await.map_err(read_error)?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(read_error)? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();

    Ok(names)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bluegreen_fleet_mock::MockFleet;
    use bluegreen_membership_mock::{MembershipCall, MockMembership};
    use bluegreen_topology::NodeAddress;
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::*;

    fn orchestrator(
        config: BootstrapConfig,
        membership: MockMembership,
    ) -> BootstrapOrchestrator<MockMembership, MockFleet> {
        BootstrapOrchestrator::new(
            "search",
            "1.0",
            Layout::new(1, 3),
            config,
            membership,
            MockFleet::new(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_gives_up_after_retries() {
        let membership = MockMembership::new();
        let config = BootstrapConfig {
            retry_count: 2,
            retry_wait: Duration::from_secs(10),
            ..BootstrapConfig::default()
        };

        let started = tokio::time::Instant::now();
        let ready = orchestrator(config, membership.clone())
            .wait_for_cluster_to_be_ready()
            .await;

        assert!(!ready);
        assert_eq!(membership.calls().await.len(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_survives_snapshot_errors() {
        let membership = MockMembership::new();
        membership.fail_snapshots(1).await;
        membership
            .add_live_nodes((1..=3).map(|i| NodeAddress::from_host(&format!("10.0.0.{i}"), 8983)))
            .await;

        let ready = orchestrator(BootstrapConfig::default(), membership.clone())
            .wait_for_cluster_to_be_ready()
            .await;

        assert!(ready);
        assert_eq!(
            membership.calls().await,
            vec![
                MembershipCall::GetClusterSnapshot,
                MembershipCall::GetClusterSnapshot
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_config_dir() {
        let config = BootstrapConfig {
            config_dir: "/definitely/not/here".into(),
            ..BootstrapConfig::default()
        };

        let error = orchestrator(config, MockMembership::new())
            .add_all_collections_to_cluster()
            .await
            .unwrap_err();

        assert!(matches!(error, Error::ConfigDir { .. }));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_ready_cluster_is_not_polled_again() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("products")).unwrap();

        let membership = MockMembership::new();
        membership
            .add_live_nodes((1..=3).map(|i| NodeAddress::from_host(&format!("10.0.0.{i}"), 8983)))
            .await;
        let config = BootstrapConfig {
            config_dir: dir.path().to_path_buf(),
            ..BootstrapConfig::default()
        };

        orchestrator(config, membership.clone())
            .bootstrap_cluster()
            .await
            .unwrap();

        assert!(logs_contain("cluster is ready with [3] live nodes"));
        assert!(!logs_contain("not ready"));
        assert_eq!(
            membership.calls().await,
            vec![
                MembershipCall::GetClusterSnapshot,
                MembershipCall::CreateCollection {
                    name: "products".to_string(),
                    shard_count: 1,
                    replication_factor: 3,
                },
            ]
        );
    }
}
