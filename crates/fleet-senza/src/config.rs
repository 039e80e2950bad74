use std::path::PathBuf;
use std::time::Duration;

use indexmap::IndexMap;

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "eu-west-1";

/// Configuration for [`SenzaFleetController`](crate::SenzaFleetController).
#[derive(Clone, Debug)]
pub struct SenzaConfig {
    /// Executable to run.
    pub program: String,

    /// Stack definition passed to `senza create`.
    pub definition: PathBuf,

    /// Cloud region of the stacks.
    pub region: String,

    /// Extra `Key=Value` stack parameters, in order.
    pub parameters: IndexMap<String, String>,

    /// Wait between two polls of the stack events.
    pub creation_poll_interval: Duration,

    /// Upper bound for a stack to finish creating.
    pub creation_timeout: Duration,

    /// Wait between two polls while a stack is deleted.
    pub delete_poll_interval: Duration,

    /// Upper bound for a stack to disappear; unbounded when unset.
    pub delete_timeout: Option<Duration>,
}

impl SenzaConfig {
    /// Creates a configuration for the given stack definition with default settings.
    #[must_use]
    pub fn new(definition: impl Into<PathBuf>) -> Self {
        Self {
            definition: definition.into(),
            ..Self::default()
        }
    }
}

impl Default for SenzaConfig {
    fn default() -> Self {
        Self {
            program: "senza".to_string(),
            definition: PathBuf::from("solrcloud-appliance.yaml"),
            region: DEFAULT_REGION.to_string(),
            parameters: IndexMap::new(),
            creation_poll_interval: Duration::from_secs(10),
            creation_timeout: Duration::from_secs(900),
            delete_poll_interval: Duration::from_secs(1),
            delete_timeout: None,
        }
    }
}
