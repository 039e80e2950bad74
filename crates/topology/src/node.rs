//! Node addresses as reported by the membership API.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Port the search service listens on unless configured otherwise.
pub const DEFAULT_SERVICE_PORT: u16 = 8983;

/// Suffix the membership API appends to every node name.
const NODE_NAME_SUFFIX: &str = "_solr";

/// Name of a node in the cluster, e.g. `10.0.0.1:8983_solr`.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeAddress(String);

impl NodeAddress {
    /// Wraps a node name exactly as the membership API reports it.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Builds the node name a provisioned host registers under.
    #[must_use]
    pub fn from_host(host: &str, port: u16) -> Self {
        Self(format!("{host}:{port}{NODE_NAME_SUFFIX}"))
    }

    /// Returns the host part of the node name.
    ///
    /// Names not following the `host:port_solr` form are returned unchanged.
    #[must_use]
    pub fn host(&self) -> &str {
        self.0
            .strip_suffix(NODE_NAME_SUFFIX)
            .and_then(|rest| rest.rsplit_once(':'))
            .map_or(self.0.as_str(), |(host, _)| host)
    }

    /// Returns the full node name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeAddress {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for NodeAddress {
    fn from(name: String) -> Self {
        Self(name)
    }
}
