use std::time::Duration;

use bluegreen_fleet::{CommandError, FleetError, FleetErrorKind};
use thiserror::Error;

/// Errors that can occur driving kubectl.
#[derive(Debug, Error)]
pub enum Error {
    /// kubectl exited with an error.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The deployment could not be created.
    #[error("creation of deployment [{deployment}] failed with exit code [{code}]")]
    CreationFailed {
        /// Deployment name.
        deployment: String,

        /// kubectl exit code.
        code: i32,
    },

    /// The traffic weight label of the deployment could not be set.
    #[error("setting traffic weight [{weight}] on deployment [{deployment}] failed with exit code [{code}]")]
    LabelFailed {
        /// Deployment name.
        deployment: String,

        /// Requested weight.
        weight: u8,

        /// kubectl exit code.
        code: i32,
    },

    /// The deployment did not finish rolling out in time.
    #[error("deployment [{deployment}] did not roll out within {timeout:?}")]
    CreationTimeout {
        /// Deployment name.
        deployment: String,

        /// Configured bound.
        timeout: Duration,
    },

    /// The deployment was still listed when the delete bound ran out.
    #[error("deployment [{deployment}] still exists after {timeout:?}")]
    DeletionTimeout {
        /// Deployment name.
        deployment: String,

        /// Configured bound.
        timeout: Duration,
    },

    /// kubectl printed something that is not the expected JSON.
    #[error("unexpected output of [{command}]: {source}")]
    Decode {
        /// Command line.
        command: String,

        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },
}

impl FleetError for Error {
    fn kind(&self) -> FleetErrorKind {
        match self {
            Self::Command(_) => FleetErrorKind::Command,
            Self::CreationFailed { .. } => FleetErrorKind::CreationFailed,
            Self::CreationTimeout { .. } => FleetErrorKind::CreationTimeout,
            Self::LabelFailed { .. } => FleetErrorKind::TrafficSwitchFailed,
            Self::DeletionTimeout { .. } => FleetErrorKind::Other,
            Self::Decode { .. } => FleetErrorKind::Decode,
        }
    }
}
