use bluegreen_membership::{MembershipError, MembershipErrorKind};
use thiserror::Error;

/// Errors that can occur in the mock membership client.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// The collection or shard does not exist.
    #[error("unknown shard [{shard}] of collection [{collection}]")]
    UnknownShard {
        /// Collection name.
        collection: String,

        /// Shard name.
        shard: String,
    },

    /// The mock was told to reject the call.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The mock was told to fail snapshot fetches.
    #[error("cluster status unavailable")]
    Unavailable,
}

impl MembershipError for Error {
    fn kind(&self) -> MembershipErrorKind {
        match self {
            Self::UnknownShard { .. } | Self::Rejected(_) => MembershipErrorKind::UnexpectedStatus,
            Self::Unavailable => MembershipErrorKind::Transport,
        }
    }
}
