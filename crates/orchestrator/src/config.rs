use std::path::PathBuf;
use std::time::Duration;

use bluegreen_topology::DEFAULT_SERVICE_PORT;

/// Settings of the bootstrap orchestrator.
#[derive(Clone, Debug)]
pub struct BootstrapConfig {
    /// Readiness polls after the first one.
    pub retry_count: usize,

    /// Wait between two readiness polls.
    pub retry_wait: Duration,

    /// Directory whose entry names are the collections to create.
    pub config_dir: PathBuf,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            retry_count: 30,
            retry_wait: Duration::from_secs(10),
            config_dir: PathBuf::from("configs"),
        }
    }
}

/// Settings of the blue/green orchestrator.
#[derive(Clone, Debug)]
pub struct DeployConfig {
    /// Health checks of a shard after the first one, before one of its replicas is removed.
    pub leader_check_retry_count: usize,

    /// Wait between two health checks of a shard.
    pub leader_check_retry_wait: Duration,

    /// Wait between two polls for added replicas to become active.
    pub add_node_retry_wait: Duration,

    /// Upper bound for added replicas to become active.
    pub add_node_timeout: Duration,

    /// Wait between two polls for new nodes to register.
    pub create_cluster_retry_wait: Duration,

    /// Upper bound for new nodes to register.
    pub create_cluster_timeout: Duration,

    /// Port the search service listens on, part of every node name.
    pub service_port: u16,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            leader_check_retry_count: 30,
            leader_check_retry_wait: Duration::from_secs(1),
            add_node_retry_wait: Duration::from_secs(10),
            add_node_timeout: Duration::from_secs(900),
            create_cluster_retry_wait: Duration::from_secs(10),
            create_cluster_timeout: Duration::from_secs(120),
            service_port: DEFAULT_SERVICE_PORT,
        }
    }
}
