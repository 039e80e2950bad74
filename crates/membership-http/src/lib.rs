//! Membership client speaking to the collections API over HTTP.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use async_trait::async_trait;
use bluegreen_membership::retry::run_mutation;
use bluegreen_membership::{MembershipClient, Mutation, MutationOutcome, RetryPolicy};
use bluegreen_topology::{ClusterSnapshot, ClusterStatus, NodeAddress};
use http::StatusCode;
use reqwest::{Client, RequestBuilder};
use tracing::{debug, info};
use url::Url;

/// Path of the collections API below the service base URL.
const COLLECTIONS_API_PATH: &str = "/admin/collections";

/// Configuration of the HTTP membership client.
#[derive(Clone, Debug)]
pub struct HttpMembershipConfig {
    /// Base URL of the search service, e.g. `http://solr.example.org/solr`.
    pub base_url: Url,

    /// Bearer token sent with every request, if any.
    pub token: Option<String>,

    /// Retry bounds when creating collections.
    pub create_collection_retry: RetryPolicy,

    /// Retry bounds when adding replicas.
    pub add_replica_retry: RetryPolicy,
}

impl HttpMembershipConfig {
    /// Creates a configuration with default retry bounds and no token.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            token: None,
            create_collection_retry: RetryPolicy::default(),
            add_replica_retry: RetryPolicy::default(),
        }
    }
}

/// Membership client backed by the collections HTTP API.
#[derive(Clone, Debug)]
pub struct HttpMembershipClient {
    add_replica_retry: RetryPolicy,
    api_url: Url,
    client: Client,
    create_collection_retry: RetryPolicy,
    token: Option<String>,
}

impl HttpMembershipClient {
    /// Creates a new client.
    #[must_use]
    pub fn new(config: HttpMembershipConfig) -> Self {
        let mut api_url = config.base_url.clone();
        api_url.set_path(&format!(
            "{}{}",
            config.base_url.path().trim_end_matches('/'),
            COLLECTIONS_API_PATH
        ));

        Self {
            add_replica_retry: config.add_replica_retry,
            api_url,
            client: Client::new(),
            create_collection_retry: config.create_collection_retry,
            token: config.token.filter(|token| !token.is_empty()),
        }
    }

    fn url_with(&self, params: &[(&str, &str)]) -> Url {
        let mut url = self.api_url.clone();
        url.query_pairs_mut().extend_pairs(params);
        url
    }

    fn request(&self, url: &Url) -> RequestBuilder {
        let request = self.client.get(url.clone());

        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn mutate(
        &self,
        mutation: Mutation,
        policy: RetryPolicy,
        target: &str,
        params: &[(&str, &str)],
    ) -> Result<MutationOutcome, Error> {
        let mut query = vec![("action", mutation.action())];
        query.extend_from_slice(params);
        let url = self.url_with(&query);
        debug!("sending {} request to [{}]", mutation.action(), url);

        run_mutation(mutation, policy, target, || {
            let request = self.request(&url);
            async move { request.send().await.map(|response| response.status()) }
        })
        .await
        .map_err(|e| Error::from_mutation(&url, e))
    }
}

#[async_trait]
impl MembershipClient for HttpMembershipClient {
    type Error = Error;

    async fn get_cluster_snapshot(&self) -> Result<ClusterSnapshot, Self::Error> {
        let url = self.url_with(&[("action", "CLUSTERSTATUS"), ("wt", "json")]);

        let response = self
            .request(&url)
            .send()
            .await
            .map_err(|source| Error::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::UnexpectedStatus {
                url: url.to_string(),
                status,
            });
        }

        let body = response.text().await.map_err(|source| Error::Request {
            url: url.to_string(),
            source,
        })?;

        let status: ClusterStatus = serde_json::from_str(&body).map_err(|source| Error::Decode {
            url: url.to_string(),
            source,
        })?;

        Ok(status.cluster)
    }

    async fn create_collection(
        &self,
        name: &str,
        shard_count: usize,
        replication_factor: usize,
    ) -> Result<MutationOutcome, Self::Error> {
        info!(
            "creating collection [{}] with {} shards and replication factor {}",
            name, shard_count, replication_factor
        );

        let shard_count = shard_count.to_string();
        let replication_factor = replication_factor.to_string();
        let config_name = name.replace('_', "");

        self.mutate(
            Mutation::CreateCollection,
            self.create_collection_retry,
            &format!("collection [{name}]"),
            &[
                ("name", name),
                ("numShards", shard_count.as_str()),
                ("replicationFactor", replication_factor.as_str()),
                ("maxShardsPerNode", "1"),
                ("collection.configName", config_name.as_str()),
            ],
        )
        .await
    }

    async fn delete_collection(&self, name: &str) -> Result<MutationOutcome, Self::Error> {
        info!("deleting collection [{}]", name);

        self.mutate(
            Mutation::DeleteCollection,
            RetryPolicy::once(),
            &format!("collection [{name}]"),
            &[("name", name)],
        )
        .await
    }

    async fn add_replica(
        &self,
        collection: &str,
        shard: &str,
        node: &NodeAddress,
    ) -> Result<MutationOutcome, Self::Error> {
        self.mutate(
            Mutation::AddReplica,
            self.add_replica_retry,
            &format!("on node [{node}] to shard [{shard}] of collection [{collection}]"),
            &[
                ("collection", collection),
                ("shard", shard),
                ("node", node.as_str()),
            ],
        )
        .await
    }

    async fn delete_replica(
        &self,
        collection: &str,
        shard: &str,
        replica: &str,
    ) -> Result<MutationOutcome, Self::Error> {
        self.mutate(
            Mutation::DeleteReplica,
            RetryPolicy::once(),
            &format!("[{replica}] of shard [{shard}] in collection [{collection}]"),
            &[
                ("collection", collection),
                ("shard", shard),
                ("replica", replica),
            ],
        )
        .await
    }
}
