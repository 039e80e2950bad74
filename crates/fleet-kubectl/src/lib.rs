//! Fleet controller backed by `kubectl`, where every node set is a labelled deployment.
//!
//! Routing is left to the service selecting on the application label. The traffic weight of a
//! node set is recorded in a `traffic-weight` label on its deployment; deployments without the
//! label count as active.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod config;
mod error;

pub use config::KubectlConfig;
pub use error::Error;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bluegreen_fleet::command::command_line;
use bluegreen_fleet::{
    ACTIVE_WEIGHT, CommandRunner, FleetController, NodeSet, PASSIVE_WEIGHT, SystemCommandRunner,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

const APPLICATION_LABEL: &str = "application";
const RELEASE_LABEL: &str = "release";
const WEIGHT_LABEL: &str = "traffic-weight";

#[derive(Deserialize)]
struct ItemList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Deserialize)]
struct Deployment {
    metadata: Metadata,
}

#[derive(Deserialize)]
struct Metadata {
    #[serde(default)]
    labels: HashMap<String, String>,
}

#[derive(Deserialize)]
struct Pod {
    #[serde(default)]
    status: PodStatus,
}

#[derive(Default, Deserialize)]
struct PodStatus {
    #[serde(rename = "podIP")]
    pod_ip: Option<String>,
}

/// Fleet controller that manages deployments with kubectl.
#[derive(Clone, Debug)]
pub struct KubectlFleetController<R = SystemCommandRunner>
where
    R: CommandRunner,
{
    config: KubectlConfig,
    runner: R,
}

impl KubectlFleetController {
    /// Creates a controller running the kubectl executable.
    #[must_use]
    pub const fn new(config: KubectlConfig) -> Self {
        Self::with_runner(config, SystemCommandRunner)
    }
}

impl<R> KubectlFleetController<R>
where
    R: CommandRunner,
{
    /// Creates a controller running commands through `runner`.
    #[must_use]
    pub const fn with_runner(config: KubectlConfig, runner: R) -> Self {
        Self { config, runner }
    }

    fn deployment_name(app: &str, slot: &str) -> String {
        format!("{app}-{slot}")
    }

    fn args(&self, command: &str, rest: &[&str]) -> Vec<String> {
        let mut args = vec![
            command.to_string(),
            format!("--namespace={}", self.config.namespace),
        ];
        args.extend(rest.iter().map(ToString::to_string));
        args
    }

    async fn get<T>(&self, kind: &str, selector: &str) -> Result<Vec<T>, Error>
    where
        T: DeserializeOwned,
    {
        let args = self.args("get", &[kind, "--output", "json", "--selector", selector]);
        let stdout = self.runner.output(&self.config.program, &args).await?;

        if stdout.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        serde_json::from_slice::<ItemList<T>>(&stdout)
            .map(|list| list.items)
            .map_err(|source| Error::Decode {
                command: command_line(&self.config.program, &args),
                source,
            })
    }

    async fn label_weight(&self, deployment: String, weight: u8) -> Result<(), Error> {
        let label = format!("{WEIGHT_LABEL}={weight}");
        let args = self.args(
            "label",
            &["deployment", deployment.as_str(), label.as_str(), "--overwrite"],
        );

        let code = self.runner.status(&self.config.program, &args).await?;
        if code != 0 {
            return Err(Error::LabelFailed {
                deployment,
                weight,
                code,
            });
        }

        Ok(())
    }

    async fn pod_ips(&self, app: &str, release: &str) -> Result<Vec<String>, Error> {
        let selector = format!("{APPLICATION_LABEL}={app},{RELEASE_LABEL}={release}");

        Ok(self
            .get::<Pod>("pods", &selector)
            .await?
            .into_iter()
            .filter_map(|pod| pod.status.pod_ip)
            .collect())
    }
}

#[async_trait]
impl<R> FleetController for KubectlFleetController<R>
where
    R: CommandRunner,
{
    type Error = Error;

    async fn create_node_set(
        &self,
        app: &str,
        slot: &str,
        image_version: &str,
    ) -> Result<(), Self::Error> {
        let deployment = Self::deployment_name(app, slot);
        let manifest = self
            .config
            .manifest_dir
            .join(format!("{deployment}-deployment.yaml"));
        info!(
            "creating deployment [{}] from [{}] (image version [{}] comes from the manifest)",
            deployment,
            manifest.display(),
            image_version
        );

        let manifest = manifest.to_string_lossy().into_owned();
        let args = self.args("create", &["-f", manifest.as_str(), "--record"]);
        let code = self.runner.status(&self.config.program, &args).await?;
        if code != 0 {
            return Err(Error::CreationFailed { deployment, code });
        }
        self.label_weight(deployment, PASSIVE_WEIGHT).await?;

        self.wait_for_node_set_created(app, slot, self.config.rollout_timeout, Duration::ZERO)
            .await
    }

    /// Delegates waiting to `kubectl rollout status`, which polls on its own.
    async fn wait_for_node_set_created(
        &self,
        app: &str,
        slot: &str,
        timeout: Duration,
        _poll_interval: Duration,
    ) -> Result<(), Self::Error> {
        let deployment = Self::deployment_name(app, slot);
        let target = format!("deployment/{deployment}");
        let bound = format!("--timeout={}s", timeout.as_secs());

        let args = self.args("rollout", &["status", target.as_str(), bound.as_str()]);
        let code = self.runner.status(&self.config.program, &args).await?;
        if code != 0 {
            return Err(Error::CreationTimeout {
                deployment,
                timeout,
            });
        }

        info!("deployment [{}] has rolled out", deployment);

        Ok(())
    }

    async fn delete_node_set(&self, app: &str, slot: &str) -> Result<(), Self::Error> {
        let deployment = Self::deployment_name(app, slot);
        info!("deleting deployment [{}]", deployment);

        let args = self.args("delete", &["deployment", deployment.as_str()]);
        self.runner.output(&self.config.program, &args).await?;

        let selector = format!("{APPLICATION_LABEL}={app},{RELEASE_LABEL}={slot}");
        let mut waited = Duration::ZERO;
        while !self
            .get::<Deployment>("deployments", &selector)
            .await?
            .is_empty()
        {
            if let Some(timeout) = self.config.delete_timeout {
                if waited >= timeout {
                    return Err(Error::DeletionTimeout {
                        deployment,
                        timeout,
                    });
                }
            }

            tokio::time::sleep(self.config.delete_poll_interval).await;
            waited += self.config.delete_poll_interval;
        }

        info!("deployment [{}] has been deleted", deployment);

        Ok(())
    }

    async fn get_all_node_sets(&self, app: &str) -> Result<Vec<NodeSet>, Self::Error> {
        let selector = format!("{APPLICATION_LABEL}={app}");
        let deployments = self.get::<Deployment>("deployments", &selector).await?;

        let mut node_sets = Vec::with_capacity(deployments.len());
        for deployment in deployments {
            let Some(release) = deployment.metadata.labels.get(RELEASE_LABEL) else {
                warn!(
                    "deployment of [{}] has no [{}] label, skipping",
                    app, RELEASE_LABEL
                );
                continue;
            };

            let weight_percent = match deployment.metadata.labels.get(WEIGHT_LABEL) {
                None => ACTIVE_WEIGHT,
                Some(weight) => weight.parse().unwrap_or_else(|_| {
                    warn!(
                        "deployment [{}] has an invalid [{}] label [{}], treating it as active",
                        release, WEIGHT_LABEL, weight
                    );
                    ACTIVE_WEIGHT
                }),
            };

            node_sets.push(NodeSet {
                name: release.clone(),
                nodes: self.pod_ips(app, release).await?,
                weight_percent,
            });
        }

        Ok(node_sets)
    }

    async fn get_node_set_members(
        &self,
        app: &str,
        slot: &str,
    ) -> Result<Vec<String>, Self::Error> {
        let mut hosts = self.pod_ips(app, slot).await?;
        hosts.sort();

        Ok(hosts)
    }

    async fn switch_traffic(&self, app: &str, slot: &str, weight: u8) -> Result<(), Self::Error> {
        let weight = weight.min(ACTIVE_WEIGHT);
        info!("recording [{}]% traffic for [{}] of [{}]", weight, slot, app);

        self.label_weight(Self::deployment_name(app, slot), weight)
            .await?;

        let selector = format!("{APPLICATION_LABEL}={app}");
        for deployment in self.get::<Deployment>("deployments", &selector).await? {
            let Some(release) = deployment.metadata.labels.get(RELEASE_LABEL) else {
                continue;
            };
            if release != slot {
                self.label_weight(Self::deployment_name(app, release), ACTIVE_WEIGHT - weight)
                    .await?;
            }
        }

        Ok(())
    }
}
