use std::path::PathBuf;
use std::time::Duration;

/// Configuration for [`KubectlFleetController`](crate::KubectlFleetController).
#[derive(Clone, Debug)]
pub struct KubectlConfig {
    /// Executable to run.
    pub program: String,

    /// Namespace holding the deployments.
    pub namespace: String,

    /// Directory holding one `<app>-<slot>-deployment.yaml` manifest per node set.
    pub manifest_dir: PathBuf,

    /// Upper bound for a deployment to finish rolling out.
    pub rollout_timeout: Duration,

    /// Wait between two polls while a deployment is deleted.
    pub delete_poll_interval: Duration,

    /// Upper bound for a deployment to disappear; unbounded when unset.
    pub delete_timeout: Option<Duration>,
}

impl Default for KubectlConfig {
    fn default() -> Self {
        Self {
            program: "kubectl".to_string(),
            namespace: "diamond".to_string(),
            manifest_dir: PathBuf::from("."),
            rollout_timeout: Duration::from_secs(900),
            delete_poll_interval: Duration::from_secs(1),
            delete_timeout: None,
        }
    }
}
