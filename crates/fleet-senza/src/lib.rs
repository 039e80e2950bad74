//! Fleet controller backed by the `senza` CLI, where every node set is a stack version.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod config;
mod error;
mod rows;

pub use config::{DEFAULT_REGION, SenzaConfig};
pub use error::Error;

use std::time::Duration;

use async_trait::async_trait;
use bluegreen_fleet::command::command_line;
use bluegreen_fleet::{CommandRunner, FleetController, NodeSet, SystemCommandRunner};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use rows::{EventRow, InstanceRow, TrafficChangeRow, TrafficRow, latest_event, whole_percent};

/// Fleet controller that provisions stack versions with senza.
#[derive(Clone, Debug)]
pub struct SenzaFleetController<R = SystemCommandRunner>
where
    R: CommandRunner,
{
    config: SenzaConfig,
    runner: R,
}

impl SenzaFleetController {
    /// Creates a controller running the senza executable.
    #[must_use]
    pub const fn new(config: SenzaConfig) -> Self {
        Self::with_runner(config, SystemCommandRunner)
    }
}

impl<R> SenzaFleetController<R>
where
    R: CommandRunner,
{
    /// Creates a controller running commands through `runner`.
    #[must_use]
    pub const fn with_runner(config: SenzaConfig, runner: R) -> Self {
        Self { config, runner }
    }

    fn base_args(&self, command: &str) -> Vec<String> {
        vec![
            command.to_string(),
            "--region".to_string(),
            self.config.region.clone(),
        ]
    }

    /// Runs a command that reports through its exit code.
    async fn call(&self, command: &str, args: &[&str]) -> Result<i32, Error> {
        let mut full = self.base_args(command);
        full.extend(args.iter().map(ToString::to_string));

        Ok(self.runner.status(&self.config.program, &full).await?)
    }

    /// Runs a command with JSON output; blank output decodes to `None`.
    async fn query<T>(&self, command: &str, args: &[&str]) -> Result<Option<T>, Error>
    where
        T: DeserializeOwned,
    {
        let mut full = self.base_args(command);
        full.extend(["--output".to_string(), "json".to_string()]);
        full.extend(args.iter().map(ToString::to_string));

        let stdout = self.runner.output(&self.config.program, &full).await?;
        let text = String::from_utf8_lossy(&stdout);
        if text.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| Error::Decode {
                command: command_line(&self.config.program, &full),
                reason: e.to_string(),
            })
    }

    async fn events(&self, app: &str, slot: &str) -> Result<Vec<EventRow>, Error> {
        Ok(self
            .query::<Vec<EventRow>>("events", &[app, slot])
            .await?
            .unwrap_or_default())
    }

    async fn is_listed(&self, app: &str, slot: &str) -> Result<bool, Error> {
        let listed = self.query::<Value>("list", &[app, slot]).await?;

        Ok(match listed {
            None | Some(Value::Null) => false,
            Some(Value::Array(rows)) => !rows.is_empty(),
            Some(Value::Object(fields)) => !fields.is_empty(),
            Some(_) => true,
        })
    }
}

#[async_trait]
impl<R> FleetController for SenzaFleetController<R>
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
        info!(
            "creating stack [{}] version [{}] with image version [{}]",
            app, slot, image_version
        );

        let definition = self.config.definition.to_string_lossy().into_owned();
        let mut parameters = vec![format!("ImageVersion={image_version}")];
        parameters.extend(
            self.config
                .parameters
                .iter()
                .filter(|(key, value)| !key.is_empty() && !value.is_empty())
                .map(|(key, value)| format!("{key}={value}")),
        );

        let mut args = vec!["--disable-rollback", definition.as_str(), slot];
        args.extend(parameters.iter().map(String::as_str));

        let code = self.call("create", &args).await?;
        if code != 0 {
            return Err(Error::CreationFailed {
                app: app.to_string(),
                slot: slot.to_string(),
                reason: format!("senza create exited with code [{code}]"),
            });
        }

        self.wait_for_node_set_created(
            app,
            slot,
            self.config.creation_timeout,
            self.config.creation_poll_interval,
        )
        .await
    }

    async fn wait_for_node_set_created(
        &self,
        app: &str,
        slot: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<(), Self::Error> {
        let mut waited = Duration::ZERO;

        while waited < timeout {
            let events = self.events(app, slot).await?;

            if let Some(latest) = latest_event(&events) {
                if latest.is_stack_created() {
                    info!("stack [{}] version [{}] has been created", app, slot);
                    return Ok(());
                }

                if latest.is_creation_failed() {
                    return Err(Error::CreationFailed {
                        app: app.to_string(),
                        slot: slot.to_string(),
                        reason: format!("stack reported [{}]", latest.resource_status),
                    });
                }

                debug!(
                    "stack [{}] version [{}] is at [{}] of [{}]",
                    app, slot, latest.resource_status, latest.resource_type
                );
            }

            tokio::time::sleep(poll_interval).await;
            waited += poll_interval;
        }

        Err(Error::CreationTimeout {
            app: app.to_string(),
            slot: slot.to_string(),
            timeout,
        })
    }

    async fn delete_node_set(&self, app: &str, slot: &str) -> Result<(), Self::Error> {
        info!("deleting stack [{}] version [{}]", app, slot);

        let code = self.call("delete", &[app, slot]).await?;
        if code != 0 {
            debug!("senza delete exited with code [{}]", code);
        }

        let mut waited = Duration::ZERO;
        while self.is_listed(app, slot).await? {
            if let Some(timeout) = self.config.delete_timeout {
                if waited >= timeout {
                    return Err(Error::DeletionTimeout {
                        app: app.to_string(),
                        slot: slot.to_string(),
                        timeout,
                    });
                }
            }

            tokio::time::sleep(self.config.delete_poll_interval).await;
            waited += self.config.delete_poll_interval;
        }

        info!("stack [{}] version [{}] has been deleted", app, slot);

        Ok(())
    }

    async fn get_all_node_sets(&self, app: &str) -> Result<Vec<NodeSet>, Self::Error> {
        let traffic = self
            .query::<Vec<TrafficRow>>("traffic", &[app])
            .await?
            .unwrap_or_default();

        let mut node_sets = Vec::with_capacity(traffic.len());
        for row in traffic {
            let nodes = self.get_node_set_members(app, &row.version).await?;
            node_sets.push(NodeSet {
                name: row.version,
                nodes,
                weight_percent: whole_percent(row.weight),
            });
        }

        Ok(node_sets)
    }

    async fn get_node_set_members(
        &self,
        app: &str,
        slot: &str,
    ) -> Result<Vec<String>, Self::Error> {
        let mut hosts: Vec<String> = self
            .query::<Vec<InstanceRow>>("instances", &[app, slot])
            .await?
            .unwrap_or_default()
            .into_iter()
            .map(|row| row.private_ip)
            .collect();
        hosts.sort();

        Ok(hosts)
    }

    async fn get_active_node_set(&self, app: &str) -> Result<Option<String>, Self::Error> {
        Ok(self
            .query::<Vec<TrafficRow>>("traffic", &[app])
            .await?
            .unwrap_or_default()
            .into_iter()
            .find(TrafficRow::is_active)
            .map(|row| row.version))
    }

    async fn get_passive_node_set(&self, app: &str) -> Result<Option<String>, Self::Error> {
        Ok(self
            .query::<Vec<TrafficRow>>("traffic", &[app])
            .await?
            .unwrap_or_default()
            .into_iter()
            .find(TrafficRow::is_passive)
            .map(|row| row.version))
    }

    async fn switch_traffic(&self, app: &str, slot: &str, weight: u8) -> Result<(), Self::Error> {
        info!(
            "switching [{}]% traffic to stack [{}] version [{}]",
            weight, app, slot
        );

        let requested = weight.to_string();
        let Some(changes) = self
            .query::<Vec<TrafficChangeRow>>("traffic", &[app, slot, requested.as_str()])
            .await?
        else {
            return Ok(());
        };

        let target = changes
            .iter()
            .filter(|row| row.stack_name == app && row.version == slot);

        for row in target {
            if whole_percent(row.new_weight) != weight {
                return Err(Error::TrafficSwitchFailed {
                    app: app.to_string(),
                    slot: slot.to_string(),
                    weight,
                    actual: row.new_weight,
                });
            }

            if whole_percent(row.new_weight) == whole_percent(row.old_weight) {
                return Err(Error::TrafficUnchanged {
                    app: app.to_string(),
                    slot: slot.to_string(),
                    weight,
                });
            }
        }

        Ok(())
    }
}
