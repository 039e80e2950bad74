use std::time::Duration;

use bluegreen_fleet::{CommandError, FleetError, FleetErrorKind};
use thiserror::Error;

/// Errors that can occur driving senza.
#[derive(Debug, Error)]
pub enum Error {
    /// senza exited with an error.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// The stack could not be created.
    #[error("creation of stack [{app}] version [{slot}] failed: {reason}")]
    CreationFailed {
        /// Application name.
        app: String,

        /// Stack version.
        slot: String,

        /// What went wrong.
        reason: String,
    },

    /// The stack did not finish creating in time.
    #[error("timeout after {timeout:?} while creating stack [{app}] version [{slot}]")]
    CreationTimeout {
        /// Application name.
        app: String,

        /// Stack version.
        slot: String,

        /// Configured bound.
        timeout: Duration,
    },

    /// The stack was still listed when the delete bound ran out.
    #[error("timeout after {timeout:?} while deleting stack [{app}] version [{slot}]")]
    DeletionTimeout {
        /// Application name.
        app: String,

        /// Stack version.
        slot: String,

        /// Configured bound.
        timeout: Duration,
    },

    /// senza reported a different weight than requested.
    #[error("switching of [{weight}]% traffic to stack [{app}] version [{slot}] failed, weight is [{actual}]%")]
    TrafficSwitchFailed {
        /// Application name.
        app: String,

        /// Stack version.
        slot: String,

        /// Requested weight.
        weight: u8,

        /// Weight senza reported.
        actual: f64,
    },

    /// The weight already had the requested value.
    #[error("traffic weight did not change, traffic for stack [{app}] version [{slot}] is still at [{weight}]%")]
    TrafficUnchanged {
        /// Application name.
        app: String,

        /// Stack version.
        slot: String,

        /// Requested weight.
        weight: u8,
    },

    /// senza printed something that is not the expected JSON.
    #[error("unexpected output of [{command}]: {reason}")]
    Decode {
        /// Command line.
        command: String,

        /// What could not be decoded.
        reason: String,
    },
}

impl FleetError for Error {
    fn kind(&self) -> FleetErrorKind {
        match self {
            Self::Command(_) => FleetErrorKind::Command,
            Self::CreationFailed { .. } => FleetErrorKind::CreationFailed,
            Self::CreationTimeout { .. } => FleetErrorKind::CreationTimeout,
            Self::DeletionTimeout { .. } => FleetErrorKind::Other,
            Self::TrafficSwitchFailed { .. } => FleetErrorKind::TrafficSwitchFailed,
            Self::TrafficUnchanged { .. } => FleetErrorKind::TrafficUnchanged,
            Self::Decode { .. } => FleetErrorKind::Decode,
        }
    }
}
