use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use serde_yaml::Value;
use url::Url;

/// Errors raised while loading the settings file.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The file could not be read.
    #[error("configuration file [{path}] could not be read: {source}")]
    Read {
        /// File path.
        path: PathBuf,

        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid settings YAML.
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A stack parameter is neither a scalar nor null.
    #[error("stack parameter [{0}] must be a scalar value")]
    UnsupportedParameter(String),
}

#[derive(Deserialize)]
struct RawSettings {
    #[serde(rename = "SolrBaseUrl")]
    solr_base_url: Url,

    #[serde(rename = "ApplicationId")]
    application_id: String,

    #[serde(flatten)]
    parameters: IndexMap<String, Value>,
}

/// Deployment settings of one application.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Base URL of the search service.
    pub solr_base_url: Url,

    /// Application, and stack, name.
    pub application_id: String,

    /// Every other top-level key, forwarded to the provisioner.
    pub parameters: IndexMap<String, String>,
}

impl Settings {
    /// Reads settings from a YAML file.
    pub async fn load(path: &Path) -> Result<Self, Error> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| Error::Read {
                path: path.to_path_buf(),
                source,
            })?;

        Self::from_yaml(&contents)
    }

    /// Parses settings from YAML text.
    pub fn from_yaml(contents: &str) -> Result<Self, Error> {
        let raw: RawSettings = serde_yaml::from_str(contents)?;

        let parameters = raw
            .parameters
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(value) => value,
                    Value::Number(value) => value.to_string(),
                    Value::Bool(value) => value.to_string(),
                    Value::Null => String::new(),
                    _ => return Err(Error::UnsupportedParameter(key)),
                };
                Ok((key, value))
            })
            .collect::<Result<_, _>>()?;

        Ok(Self {
            solr_base_url: raw.solr_base_url,
            application_id: raw.application_id,
            parameters,
        })
    }
}
