//! `bluegreen` binary: bootstraps, deploys and tears down a search cluster in two slots.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod settings;

use std::path::PathBuf;

use bluegreen_fleet::FleetController;
use bluegreen_fleet_kubectl::{KubectlConfig, KubectlFleetController};
use bluegreen_fleet_senza::{SenzaConfig, SenzaFleetController};
use bluegreen_membership_http::{HttpMembershipClient, HttpMembershipConfig};
use bluegreen_orchestrator::{
    BlueGreenOrchestrator, BootstrapConfig, BootstrapOrchestrator, DeployConfig,
    TeardownOrchestrator,
};
use bluegreen_topology::Layout;
use clap::{Parser, ValueEnum};
use settings::Settings;
use tracing::info;

/// CLI-specific error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Orchestration failed
    #[error(transparent)]
    Orchestrator(#[from] bluegreen_orchestrator::Error),

    /// Settings could not be loaded
    #[error(transparent)]
    Settings(#[from] settings::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Command {
    /// Create the first node set and all collections
    Bootstrap,

    /// Run a complete blue/green deployment
    Deploy,

    /// Delete all collections and node sets
    Delete,

    /// Create the passive node set
    CreateNewCluster,

    /// Delete the passive node set
    DeleteOldCluster,

    /// Add replicas on the passive node set
    AddNewNodes,

    /// Remove replicas from the passive node set
    DeleteOldNodes,

    /// Route all traffic to the passive node set
    Switch,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum DeploymentMode {
    /// Stacks managed with senza
    Stups,

    /// Deployments managed with kubectl
    K8s,
}

#[derive(Clone, Debug, Parser)]
#[command(version, about = "SolrCloud blue/green deployment CLI", long_about = None)]
struct Args {
    /// Command to run
    #[arg(value_enum)]
    command: Command,

    /// Image version of the search instances
    #[arg(short, long)]
    image_version: Option<String>,

    /// Number of shards per collection
    #[arg(short, long, default_value_t = 1)]
    sharding_level: usize,

    /// Number of replicas per shard
    #[arg(short, long, default_value_t = 3)]
    replication_level: usize,

    /// Senza definition of the cluster stacks
    #[arg(short = 'c', long, default_value = "solrcloud-appliance.yaml")]
    senza_configuration: PathBuf,

    /// Bearer token for the collections API
    #[arg(short, long, env = "BLUEGREEN_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Path to the settings file
    #[arg(
        short = 'f',
        long = "config-file",
        default_value = "example.yaml",
        env = "BLUEGREEN_CONFIG_FILE"
    )]
    config: PathBuf,

    /// Cloud region of the stacks
    #[arg(long)]
    region: Option<String>,

    /// Deployment mode
    #[arg(short, long, value_enum, default_value_t = DeploymentMode::Stups)]
    deployment_mode: DeploymentMode,

    /// Directory whose entry names are the collections to bootstrap
    #[arg(long, default_value = "configs", env = "BLUEGREEN_CONFIG_DIR")]
    config_dir: PathBuf,

    /// Kubernetes namespace of the deployments
    #[arg(long, default_value = "diamond")]
    namespace: String,

    /// Directory holding the deployment manifests
    #[arg(long, default_value = ".")]
    manifest_dir: PathBuf,
}

async fn deployer<F>(
    app: String,
    image_version: Option<String>,
    membership: HttpMembershipClient,
    fleet: F,
) -> Result<BlueGreenOrchestrator<HttpMembershipClient, F>, Error>
where
    F: FleetController,
{
    let orchestrator =
        BlueGreenOrchestrator::new(app, image_version, DeployConfig::default(), membership, fleet)
            .await?;

    Ok(orchestrator)
}

async fn run<F>(
    args: Args,
    settings: Settings,
    membership: HttpMembershipClient,
    fleet: F,
) -> Result<(), Error>
where
    F: FleetController,
{
    let app = settings.application_id;

    match args.command {
        Command::Bootstrap => {
            let image_version = args
                .image_version
                .ok_or(bluegreen_orchestrator::Error::MissingImageVersion)?;
            let config = BootstrapConfig {
                config_dir: args.config_dir,
                ..BootstrapConfig::default()
            };

            BootstrapOrchestrator::new(
                app,
                image_version,
                Layout::new(args.sharding_level, args.replication_level),
                config,
                membership,
                fleet,
            )
            .bootstrap_cluster()
            .await?;
        }
        Command::Delete => {
            TeardownOrchestrator::new(app, membership, fleet)
                .delete_cluster()
                .await?;
        }
        Command::Deploy => {
            deployer(app, args.image_version, membership, fleet)
                .await?
                .deploy_new_version()
                .await?;
        }
        Command::CreateNewCluster => {
            deployer(app, args.image_version, membership, fleet)
                .await?
                .create_cluster()
                .await?;
        }
        Command::AddNewNodes => {
            deployer(app, args.image_version, membership, fleet)
                .await?
                .add_new_nodes_to_cluster()
                .await?;
        }
        Command::Switch => {
            deployer(app, args.image_version, membership, fleet)
                .await?
                .switch_traffic()
                .await?;
        }
        Command::DeleteOldNodes => {
            deployer(app, args.image_version, membership, fleet)
                .await?
                .delete_old_nodes_from_cluster()
                .await?;
        }
        Command::DeleteOldCluster => {
            deployer(app, args.image_version, membership, fleet)
                .await?
                .delete_cluster()
                .await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let settings = Settings::load(&args.config).await?;
    info!(
        "running [{:?}] for [{}] against [{}]",
        args.command, settings.application_id, settings.solr_base_url
    );

    let membership = HttpMembershipClient::new(HttpMembershipConfig {
        token: args.token.clone(),
        ..HttpMembershipConfig::new(settings.solr_base_url.clone())
    });

    match args.deployment_mode {
        DeploymentMode::Stups => {
            let mut config = SenzaConfig::new(args.senza_configuration.clone());
            if let Some(region) = args.region.clone() {
                config.region = region;
            }
            config.parameters.clone_from(&settings.parameters);

            run(args, settings, membership, SenzaFleetController::new(config)).await
        }
        DeploymentMode::K8s => {
            let config = KubectlConfig {
                namespace: args.namespace.clone(),
                manifest_dir: args.manifest_dir.clone(),
                ..KubectlConfig::default()
            };

            run(args, settings, membership, KubectlFleetController::new(config)).await
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["bluegreen", "deploy"]).unwrap();

        assert_eq!(args.command, Command::Deploy);
        assert_eq!(args.sharding_level, 1);
        assert_eq!(args.replication_level, 3);
        assert_eq!(args.deployment_mode, DeploymentMode::Stups);
        assert_eq!(args.image_version, None);
    }

    #[test]
    fn test_short_flags_and_kebab_commands() {
        let args = Args::try_parse_from([
            "bluegreen",
            "-i",
            "2.0",
            "-s",
            "2",
            "-r",
            "2",
            "-d",
            "k8s",
            "delete-old-nodes",
        ])
        .unwrap();

        assert_eq!(args.command, Command::DeleteOldNodes);
        assert_eq!(args.image_version.as_deref(), Some("2.0"));
        assert_eq!(args.sharding_level, 2);
        assert_eq!(args.deployment_mode, DeploymentMode::K8s);
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(Args::try_parse_from(["bluegreen", "unknown"]).is_err());
        assert!(Args::try_parse_from(["bluegreen"]).is_err());
    }
}
