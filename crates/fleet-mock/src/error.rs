use bluegreen_fleet::{FleetError, FleetErrorKind};
use thiserror::Error;

/// Errors that can occur in the mock fleet controller.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// The mock was told to fail creating the node set, or it exists already.
    #[error("failed to create node set [{0}]")]
    CreationFailed(String),

    /// The node set was never created.
    #[error("node set [{0}] was not created in time")]
    CreationTimeout(String),

    /// The mock was told to reject traffic switches.
    #[error("switching [{weight}]% traffic to node set [{slot}] failed")]
    TrafficSwitchFailed {
        /// Node set name.
        slot: String,

        /// Requested weight.
        weight: u8,
    },

    /// The node set already had the requested weight.
    #[error("traffic for node set [{slot}] is still at [{weight}]%")]
    TrafficUnchanged {
        /// Node set name.
        slot: String,

        /// Requested weight.
        weight: u8,
    },

    /// No node set with that name exists.
    #[error("unknown node set [{0}]")]
    UnknownNodeSet(String),
}

impl FleetError for Error {
    fn kind(&self) -> FleetErrorKind {
        match self {
            Self::CreationFailed(_) => FleetErrorKind::CreationFailed,
            Self::CreationTimeout(_) => FleetErrorKind::CreationTimeout,
            Self::TrafficSwitchFailed { .. } => FleetErrorKind::TrafficSwitchFailed,
            Self::TrafficUnchanged { .. } => FleetErrorKind::TrafficUnchanged,
            Self::UnknownNodeSet(_) => FleetErrorKind::Other,
        }
    }
}
