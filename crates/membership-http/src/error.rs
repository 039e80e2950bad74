use bluegreen_membership::{MembershipError, MembershipErrorKind, MutationError};
use http::StatusCode;
use thiserror::Error;
use url::Url;

/// Error type for the HTTP membership client.
#[derive(Debug, Error)]
pub enum Error {
    /// The request could not be sent or its response not read.
    #[error("failed sending request to [{url}]: {source}")]
    Request {
        /// Request URL.
        url: String,

        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a status the call does not handle.
    #[error("received unexpected status [{status}] from [{url}]")]
    UnexpectedStatus {
        /// Request URL.
        url: String,

        /// Response status.
        status: StatusCode,
    },

    /// Every attempt of a retried mutation was answered with a retryable status.
    #[error("giving up on [{url}] after {attempts} attempts, last status [{status}]")]
    RetriesExhausted {
        /// Request URL.
        url: String,

        /// Requests sent.
        attempts: usize,

        /// Status of the last response.
        status: StatusCode,
    },

    /// The cluster status document could not be decoded.
    #[error("failed decoding response from [{url}]: {source}")]
    Decode {
        /// Request URL.
        url: String,

        /// Decoder error.
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    pub(crate) fn from_mutation(url: &Url, error: MutationError<reqwest::Error>) -> Self {
        let url = url.to_string();

        match error {
            MutationError::Send(source) => Self::Request { url, source },
            MutationError::UnexpectedStatus(status) => Self::UnexpectedStatus { url, status },
            MutationError::RetriesExhausted { attempts, status } => Self::RetriesExhausted {
                url,
                attempts,
                status,
            },
        }
    }
}

impl MembershipError for Error {
    fn kind(&self) -> MembershipErrorKind {
        match self {
            Self::Request { .. } => MembershipErrorKind::Transport,
            Self::UnexpectedStatus { .. } => MembershipErrorKind::UnexpectedStatus,
            Self::RetriesExhausted { .. } => MembershipErrorKind::RetriesExhausted,
            Self::Decode { .. } => MembershipErrorKind::Decode,
        }
    }
}
