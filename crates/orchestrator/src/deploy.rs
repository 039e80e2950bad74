use std::collections::HashSet;

use bluegreen_fleet::{ACTIVE_WEIGHT, FleetController};
use bluegreen_membership::MembershipClient;
use bluegreen_placement::assign_replicas;
use bluegreen_topology::{ClusterSnapshot, Layout, MIN_ACTIVE_REPLICAS, NodeAddress};
use tracing::{debug, info, warn};

use crate::{DeployConfig, Error, Slot};

/// Replaces the nodes of the active slot with a freshly provisioned passive slot.
///
/// The layout is read from the cluster once, on construction. Every step resolves the passive
/// slot and fetches cluster state anew, so steps can be run one by one.
#[derive(Clone, Debug)]
pub struct BlueGreenOrchestrator<M, F>
where
    M: MembershipClient,
    F: FleetController,
{
    app: String,
    config: DeployConfig,
    fleet: F,
    image_version: Option<String>,
    layout: Layout,
    membership: M,
}

impl<M, F> BlueGreenOrchestrator<M, F>
where
    M: MembershipClient,
    F: FleetController,
{
    /// Creates an orchestrator for `app`, inferring the layout from the current cluster.
    ///
    /// `image_version` is only needed by [`Self::create_cluster`].
    ///
    /// # Errors
    ///
    /// Fails if the cluster state cannot be fetched.
    pub async fn new(
        app: impl Into<String> + Send,
        image_version: Option<String>,
        config: DeployConfig,
        membership: M,
        fleet: F,
    ) -> Result<Self, Error> {
        let snapshot = membership
            .get_cluster_snapshot()
            .await
            .map_err(Error::membership)?;

        let layout = snapshot.infer_layout();
        if layout.is_empty() {
            warn!("no collections found, replicas will neither be added nor removed");
        } else {
            info!(
                "cluster layout is [{}] shards with replication factor [{}]",
                layout.shard_count, layout.replication_factor
            );
        }

        Ok(Self {
            app: app.into(),
            config,
            fleet,
            image_version,
            layout,
            membership,
        })
    }

    /// Layout inferred on construction.
    #[must_use]
    pub const fn layout(&self) -> Layout {
        self.layout
    }

    /// Runs every deployment step in order, without rolling back on failure.
    ///
    /// # Errors
    ///
    /// Fails with the error of the first failing step.
    pub async fn deploy_new_version(&self) -> Result<(), Error> {
        self.create_cluster().await?;
        self.add_new_nodes_to_cluster().await?;
        self.switch_traffic().await?;
        self.delete_old_nodes_from_cluster().await?;
        self.delete_cluster().await
    }

    /// Slot that currently receives no traffic.
    ///
    /// # Errors
    ///
    /// Fails if the fleet controller cannot be queried.
    pub async fn passive_slot(&self) -> Result<String, Error> {
        if let Some(passive) = self
            .fleet
            .get_passive_node_set(&self.app)
            .await
            .map_err(Error::fleet)?
        {
            return Ok(passive);
        }

        let active = self
            .fleet
            .get_active_node_set(&self.app)
            .await
            .map_err(Error::fleet)?;

        Ok(Slot::complement_of(active.as_deref()).as_str().to_string())
    }

    async fn passive_nodes(&self, slot: &str) -> Result<Vec<NodeAddress>, Error> {
        Ok(self
            .fleet
            .get_node_set_members(&self.app, slot)
            .await
            .map_err(Error::fleet)?
            .iter()
            .map(|host| NodeAddress::from_host(host, self.config.service_port))
            .collect())
    }

    async fn snapshot(&self) -> Result<ClusterSnapshot, Error> {
        self.membership
            .get_cluster_snapshot()
            .await
            .map_err(Error::membership)
    }

    /// Provisions the passive slot and waits until all of its nodes joined the cluster.
    ///
    /// # Errors
    ///
    /// Fails if no image version was given, the node set cannot be created, or its nodes do
    /// not register in time.
    pub async fn create_cluster(&self) -> Result<(), Error> {
        let image_version = self
            .image_version
            .as_deref()
            .ok_or(Error::MissingImageVersion)?;
        let slot = self.passive_slot().await?;

        info!(
            "creating node set [{}] of [{}] with image version [{}]",
            slot, self.app, image_version
        );
        self.fleet
            .create_node_set(&self.app, &slot, image_version)
            .await
            .map_err(Error::fleet)?;

        let nodes = self.passive_nodes(&slot).await?;
        let mut waited = std::time::Duration::ZERO;

        while waited < self.config.create_cluster_timeout {
            let snapshot = self.snapshot().await?;
            if nodes.iter().all(|node| snapshot.is_live(node)) {
                info!("all [{}] new nodes registered with the cluster", nodes.len());
                return Ok(());
            }

            debug!("waiting for new nodes to register");
            tokio::time::sleep(self.config.create_cluster_retry_wait).await;
            waited += self.config.create_cluster_retry_wait;
        }

        let snapshot = self.snapshot().await?;
        let missing: Vec<NodeAddress> = nodes
            .into_iter()
            .filter(|node| !snapshot.is_live(node))
            .collect();

        if missing.is_empty() {
            info!("all new nodes registered with the cluster on the last poll");
            return Ok(());
        }

        Err(Error::ClusterCreationTimeout {
            missing,
            timeout: self.config.create_cluster_timeout,
        })
    }

    /// Adds the missing replicas of every shard on the passive nodes and waits until all
    /// replicas are active.
    ///
    /// # Errors
    ///
    /// Fails if the passive slot has too few nodes, a collection does not follow the layout,
    /// a replica cannot be added, or the replicas do not become active in time.
    pub async fn add_new_nodes_to_cluster(&self) -> Result<(), Error> {
        if self.layout.is_empty() {
            warn!("cluster layout is empty, not adding any replicas");
            return Ok(());
        }

        let slot = self.passive_slot().await?;
        let nodes = self.passive_nodes(&slot).await?;
        let required = self.layout.required_nodes();

        if nodes.len() < required {
            return Err(Error::InsufficientNodes {
                available: nodes.len(),
                required,
            });
        }

        let snapshot = self.snapshot().await?;
        for (name, collection) in &snapshot.collections {
            if collection.shards.len() != self.layout.shard_count {
                return Err(Error::LayoutMismatch {
                    collection: name.clone(),
                    expected: self.layout.shard_count,
                    actual: collection.shards.len(),
                });
            }
        }

        let assignments = assign_replicas(
            &nodes,
            self.layout.shard_count,
            self.layout.replication_factor,
        )?;

        for (name, collection) in &snapshot.collections {
            let shard_names: Vec<&String> = collection.shards.keys().collect();

            for assignment in &assignments {
                let shard = shard_names[assignment.shard];

                if snapshot.shard_hosts(name, shard, assignment.node) {
                    debug!(
                        "node [{}] already hosts shard [{}] of collection [{}]",
                        assignment.node, shard, name
                    );
                    continue;
                }

                info!(
                    "adding replica for collection [{}], shard [{}] on node [{}]",
                    name, shard, assignment.node
                );
                self.membership
                    .add_replica(name, shard, assignment.node)
                    .await
                    .map_err(Error::membership)?;
            }
        }

        self.wait_for_replicas_to_be_active().await
    }

    async fn wait_for_replicas_to_be_active(&self) -> Result<(), Error> {
        let mut waited = std::time::Duration::ZERO;

        while waited < self.config.add_node_timeout {
            if self.snapshot().await?.all_replicas_active() {
                info!("all replicas are active");
                return Ok(());
            }

            debug!("waiting for replicas to become active");
            tokio::time::sleep(self.config.add_node_retry_wait).await;
            waited += self.config.add_node_retry_wait;
        }

        Err(Error::AddNodesTimeout {
            timeout: self.config.add_node_timeout,
        })
    }

    /// Routes all traffic to the passive slot.
    ///
    /// # Errors
    ///
    /// Fails if the fleet controller does not apply the weight.
    pub async fn switch_traffic(&self) -> Result<(), Error> {
        let slot = self.passive_slot().await?;
        info!("switching all traffic of [{}] to node set [{}]", self.app, slot);

        self.fleet
            .switch_traffic(&self.app, &slot, ACTIVE_WEIGHT)
            .await
            .map_err(Error::fleet)
    }

    /// Removes every replica hosted on a node of the passive slot, once its shard can spare it.
    ///
    /// # Errors
    ///
    /// Fails if a shard never reports a single active leader and enough active replicas, or a
    /// replica cannot be removed.
    pub async fn delete_old_nodes_from_cluster(&self) -> Result<(), Error> {
        if self.layout.is_empty() {
            warn!("cluster layout is empty, not removing any replicas");
            return Ok(());
        }

        let slot = self.passive_slot().await?;
        let old_nodes: HashSet<NodeAddress> = self.passive_nodes(&slot).await?.into_iter().collect();
        let snapshot = self.snapshot().await?;

        for (name, collection) in &snapshot.collections {
            for (shard, current) in &collection.shards {
                for (replica, state) in &current.replicas {
                    if !old_nodes.contains(&state.node_name) {
                        continue;
                    }

                    info!(
                        "checking for active replicas and leader in shard [{}] of collection [{}]",
                        shard, name
                    );
                    self.wait_for_healthy_shard(name, shard).await?;

                    info!(
                        "deleting replica [{}] for collection [{}] and shard [{}]",
                        replica, name, shard
                    );
                    self.membership
                        .delete_replica(name, shard, replica)
                        .await
                        .map_err(Error::membership)?;
                }
            }
        }

        Ok(())
    }

    async fn wait_for_healthy_shard(&self, collection: &str, shard: &str) -> Result<(), Error> {
        let attempts = self.config.leader_check_retry_count + 1;
        let mut has_leader = false;
        let mut active = 0;

        for attempt in 1..=attempts {
            let snapshot = self.snapshot().await?;
            has_leader = snapshot.has_active_leader(collection, shard);
            active = snapshot.count_active_replicas(collection, shard);

            if has_leader && active >= MIN_ACTIVE_REPLICAS {
                return Ok(());
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.leader_check_retry_wait).await;
            }
        }

        if !has_leader {
            return Err(Error::NoActiveLeader {
                collection: collection.to_string(),
                shard: shard.to_string(),
            });
        }

        Err(Error::InsufficientActiveReplicas {
            collection: collection.to_string(),
            shard: shard.to_string(),
            active,
        })
    }

    /// Deletes the passive slot.
    ///
    /// # Errors
    ///
    /// Fails if the fleet controller cannot delete the node set.
    pub async fn delete_cluster(&self) -> Result<(), Error> {
        let slot = self.passive_slot().await?;
        info!("deleting node set [{}] of [{}]", slot, self.app);

        self.fleet
            .delete_node_set(&self.app, &slot)
            .await
            .map_err(Error::fleet)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bluegreen_fleet::NodeSet;
    use bluegreen_fleet_mock::MockFleet;
    use bluegreen_membership_mock::{MembershipCall, MockMembership};
    use pretty_assertions::assert_eq;

    use super::*;

    const APP: &str = "search";

    fn node(host: &str) -> NodeAddress {
        NodeAddress::from_host(host, 8983)
    }

    async fn fleet_with_active(slot: &str, hosts: &[&str]) -> MockFleet {
        let fleet = MockFleet::new();
        fleet
            .seed_node_set(
                APP,
                NodeSet {
                    name: slot.to_string(),
                    nodes: hosts.iter().map(ToString::to_string).collect(),
                    weight_percent: 100,
                },
            )
            .await;
        fleet
    }

    async fn membership_on(
        hosts: &[&str],
        shard_count: usize,
        replication_factor: usize,
    ) -> MockMembership {
        let membership = MockMembership::new();
        membership
            .add_live_nodes(hosts.iter().map(|host| node(host)).collect::<Vec<_>>())
            .await;
        membership
            .seed_collection("products", shard_count, replication_factor)
            .await;
        membership
    }

    async fn orchestrator(
        membership: MockMembership,
        fleet: MockFleet,
        config: DeployConfig,
    ) -> BlueGreenOrchestrator<MockMembership, MockFleet> {
        BlueGreenOrchestrator::new(APP, Some("2.0".to_string()), config, membership, fleet)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_passive_slot_falls_back_to_complement() {
        let membership = MockMembership::new();

        let fleet = fleet_with_active("A", &["10.0.0.1"]).await;
        let deploy = orchestrator(membership.clone(), fleet, DeployConfig::default()).await;
        assert_eq!(deploy.passive_slot().await.unwrap(), "B");

        let fleet = fleet_with_active("B", &["10.0.0.1"]).await;
        let deploy = orchestrator(membership.clone(), fleet, DeployConfig::default()).await;
        assert_eq!(deploy.passive_slot().await.unwrap(), "A");

        let deploy = orchestrator(membership, MockFleet::new(), DeployConfig::default()).await;
        assert_eq!(deploy.passive_slot().await.unwrap(), "A");
    }

    #[tokio::test]
    async fn test_layout_is_inferred() {
        let membership = membership_on(&["10.0.0.1", "10.0.0.2"], 2, 1).await;

        let deploy = orchestrator(membership, MockFleet::new(), DeployConfig::default()).await;

        assert_eq!(deploy.layout(), Layout::new(2, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_cluster_times_out_when_nodes_never_register() {
        let membership = membership_on(&["10.0.0.1"], 1, 1).await;
        let fleet = fleet_with_active("A", &["10.0.0.1"]).await;
        fleet.register_members("B", ["10.0.1.1"]).await;

        let config = DeployConfig {
            create_cluster_timeout: Duration::from_secs(30),
            create_cluster_retry_wait: Duration::from_secs(10),
            ..DeployConfig::default()
        };
        let deploy = orchestrator(membership, fleet, config).await;

        let error = deploy.create_cluster().await.unwrap_err();

        match error {
            Error::ClusterCreationTimeout { missing, timeout } => {
                assert_eq!(missing, vec![node("10.0.1.1")]);
                assert_eq!(timeout, Duration::from_secs(30));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_cluster_accepts_nodes_registered_on_last_poll() {
        let membership = membership_on(&["10.0.0.1"], 1, 1).await;
        let fleet = fleet_with_active("A", &["10.0.0.1"]).await;
        fleet.register_members("B", ["10.0.1.1"]).await;

        let config = DeployConfig {
            create_cluster_timeout: Duration::from_secs(20),
            create_cluster_retry_wait: Duration::from_secs(10),
            ..DeployConfig::default()
        };
        let deploy = orchestrator(membership.clone(), fleet, config).await;
        membership.add_live_nodes_after([node("10.0.1.1")], 3).await;

        deploy.create_cluster().await.unwrap();

        assert!(membership.snapshot().await.is_live(&node("10.0.1.1")));
    }

    #[tokio::test]
    async fn test_create_cluster_requires_image_version() {
        let deploy = BlueGreenOrchestrator::new(
            APP,
            None,
            DeployConfig::default(),
            MockMembership::new(),
            MockFleet::new(),
        )
        .await
        .unwrap();

        assert!(matches!(
            deploy.create_cluster().await,
            Err(Error::MissingImageVersion)
        ));
    }

    #[tokio::test]
    async fn test_add_nodes_requires_enough_passive_nodes() {
        let membership = membership_on(&["10.0.0.1", "10.0.0.2", "10.0.0.3"], 1, 3).await;
        let fleet = fleet_with_active("A", &["10.0.0.1", "10.0.0.2", "10.0.0.3"]).await;
        fleet.register_members("B", ["10.0.1.1", "10.0.1.2"]).await;
        fleet.create_node_set(APP, "B", "2.0").await.unwrap();

        let deploy = orchestrator(membership.clone(), fleet, DeployConfig::default()).await;
        let error = deploy.add_new_nodes_to_cluster().await.unwrap_err();

        assert!(matches!(
            error,
            Error::InsufficientNodes {
                available: 2,
                required: 3
            }
        ));
        assert!(
            !membership
                .calls()
                .await
                .iter()
                .any(|call| matches!(call, MembershipCall::AddReplica { .. }))
        );
    }

    #[tokio::test]
    async fn test_add_nodes_skips_hosted_replicas() {
        let membership = membership_on(&["10.0.1.1"], 1, 1).await;
        let fleet = MockFleet::new();
        fleet.register_members("A", ["10.0.1.1", "10.0.1.2"]).await;
        fleet.create_node_set(APP, "A", "2.0").await.unwrap();

        let deploy = orchestrator(membership.clone(), fleet, DeployConfig::default()).await;
        deploy.add_new_nodes_to_cluster().await.unwrap();
        deploy.add_new_nodes_to_cluster().await.unwrap();

        let added: Vec<MembershipCall> = membership
            .calls()
            .await
            .into_iter()
            .filter(|call| matches!(call, MembershipCall::AddReplica { .. }))
            .collect();
        assert!(added.is_empty());
    }

    #[tokio::test]
    async fn test_add_nodes_rejects_layout_mismatch() {
        let membership = membership_on(&["10.0.0.1", "10.0.0.2"], 1, 1).await;
        membership.seed_collection("orders", 2, 1).await;
        let fleet = MockFleet::new();
        fleet.register_members("A", ["10.0.1.1", "10.0.1.2"]).await;
        fleet.create_node_set(APP, "A", "2.0").await.unwrap();

        let deploy = orchestrator(membership, fleet, DeployConfig::default()).await;
        let error = deploy.add_new_nodes_to_cluster().await.unwrap_err();

        assert!(matches!(
            error,
            Error::LayoutMismatch {
                expected: 1,
                actual: 2,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_nodes_times_out_when_replicas_stay_inactive() {
        let membership = MockMembership::new().with_activation_polls(usize::MAX);
        membership.add_live_nodes([node("10.0.0.1")]).await;
        membership.seed_collection("products", 1, 1).await;
        let fleet = fleet_with_active("A", &["10.0.0.1"]).await;
        fleet.register_members("B", ["10.0.1.1"]).await;
        fleet.create_node_set(APP, "B", "2.0").await.unwrap();

        let config = DeployConfig {
            add_node_timeout: Duration::from_secs(20),
            add_node_retry_wait: Duration::from_secs(10),
            ..DeployConfig::default()
        };
        let deploy = orchestrator(membership, fleet, config).await;

        let error = deploy.add_new_nodes_to_cluster().await.unwrap_err();

        assert!(matches!(error, Error::AddNodesTimeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_old_nodes_refuses_to_break_quorum() {
        let membership = membership_on(&["10.0.0.1"], 1, 1).await;
        let fleet = MockFleet::new();
        fleet
            .seed_node_set(
                APP,
                NodeSet {
                    name: "A".to_string(),
                    nodes: vec!["10.0.0.1".to_string()],
                    weight_percent: 0,
                },
            )
            .await;

        let config = DeployConfig {
            leader_check_retry_count: 2,
            ..DeployConfig::default()
        };
        let deploy = orchestrator(membership.clone(), fleet, config).await;

        let error = deploy.delete_old_nodes_from_cluster().await.unwrap_err();

        assert!(matches!(
            error,
            Error::InsufficientActiveReplicas { active: 1, .. }
        ));
        let calls = membership.calls().await;
        assert!(
            !calls
                .iter()
                .any(|call| matches!(call, MembershipCall::DeleteReplica { .. }))
        );
        // construction + initial snapshot + three health checks
        assert_eq!(calls.len(), 5);
    }

    #[tokio::test]
    async fn test_empty_layout_skips_replica_steps() {
        let membership = MockMembership::new();
        let fleet = fleet_with_active("A", &["10.0.0.1"]).await;

        let deploy = orchestrator(membership.clone(), fleet, DeployConfig::default()).await;
        deploy.add_new_nodes_to_cluster().await.unwrap();
        deploy.delete_old_nodes_from_cluster().await.unwrap();

        assert_eq!(membership.calls().await, vec![MembershipCall::GetClusterSnapshot]);
    }
}
