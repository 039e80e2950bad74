use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::get;
use bluegreen_membership::{
    MembershipClient, MembershipError, MembershipErrorKind, MutationOutcome, RetryPolicy,
};
use bluegreen_membership_http::{HttpMembershipClient, HttpMembershipConfig};
use bluegreen_topology::NodeAddress;
use url::Url;

const CLUSTER_STATUS: &str = r#"{
    "responseHeader": {"status": 0, "QTime": 3},
    "cluster": {
        "collections": {
            "products": {
                "replicationFactor": "2",
                "shards": {
                    "shard1": {
                        "state": "active",
                        "replicas": {
                            "core_node1": {"node_name": "10.0.0.1:8983_solr", "state": "active", "leader": "true"},
                            "core_node2": {"node_name": "10.0.0.2:8983_solr", "state": "active"}
                        }
                    }
                }
            }
        },
        "live_nodes": ["10.0.0.1:8983_solr", "10.0.0.2:8983_solr"]
    }
}"#;

#[derive(Clone, Debug)]
struct Recorded {
    params: HashMap<String, String>,
    authorization: Option<String>,
}

#[derive(Default)]
struct FakeApi {
    statuses: Mutex<HashMap<String, VecDeque<u16>>>,
    requests: Mutex<Vec<Recorded>>,
}

impl FakeApi {
    fn script(&self, action: &str, statuses: &[u16]) {
        self.statuses
            .lock()
            .unwrap()
            .insert(action.to_string(), statuses.iter().copied().collect());
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn collections(
    State(api): State<Arc<FakeApi>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, String) {
    let action = params.get("action").cloned().unwrap_or_default();

    api.requests.lock().unwrap().push(Recorded {
        params,
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    });

    let status = api
        .statuses
        .lock()
        .unwrap()
        .get_mut(&action)
        .and_then(VecDeque::pop_front)
        .unwrap_or(200);

    let body = if action == "CLUSTERSTATUS" {
        CLUSTER_STATUS.to_string()
    } else {
        "{}".to_string()
    };

    (StatusCode::from_u16(status).unwrap(), body)
}

async fn start_api() -> (Arc<FakeApi>, Url) {
    let api = Arc::new(FakeApi::default());
    let router = Router::new()
        .route("/solr/admin/collections", get(collections))
        .with_state(api.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Should bind to port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("HTTP server should run");
    });

    let base_url = Url::parse(&format!("http://{addr}/solr/")).unwrap();
    (api, base_url)
}

fn client(base_url: Url, token: Option<&str>) -> HttpMembershipClient {
    let retry = RetryPolicy::new(3, Duration::from_millis(10));

    HttpMembershipClient::new(HttpMembershipConfig {
        base_url,
        token: token.map(str::to_string),
        create_collection_retry: retry,
        add_replica_retry: retry,
    })
}

#[tokio::test]
async fn test_cluster_snapshot() {
    let (api, base_url) = start_api().await;
    let client = client(base_url, None);

    let snapshot = client.get_cluster_snapshot().await.unwrap();

    assert_eq!(snapshot.collections.len(), 1);
    assert_eq!(snapshot.collections["products"].replication_factor, 2);
    assert_eq!(snapshot.live_nodes.len(), 2);

    let requests = api.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].params["action"], "CLUSTERSTATUS");
    assert_eq!(requests[0].params["wt"], "json");
}

#[tokio::test]
async fn test_cluster_snapshot_rejects_error_status() {
    let (api, base_url) = start_api().await;
    api.script("CLUSTERSTATUS", &[503]);

    let error = client(base_url, None)
        .get_cluster_snapshot()
        .await
        .unwrap_err();

    assert_eq!(error.kind(), MembershipErrorKind::UnexpectedStatus);
    assert!(error.to_string().contains("CLUSTERSTATUS"));
}

#[tokio::test]
async fn test_create_collection_retries_until_success() {
    let (api, base_url) = start_api().await;
    api.script("CREATE", &[500, 503, 200]);

    let outcome = client(base_url, None)
        .create_collection("product_catalog", 2, 3)
        .await
        .unwrap();

    assert_eq!(outcome, MutationOutcome::Applied);

    let requests = api.requests();
    assert_eq!(requests.len(), 3);

    let params = &requests[0].params;
    assert_eq!(params["action"], "CREATE");
    assert_eq!(params["name"], "product_catalog");
    assert_eq!(params["numShards"], "2");
    assert_eq!(params["replicationFactor"], "3");
    assert_eq!(params["maxShardsPerNode"], "1");
    assert_eq!(params["collection.configName"], "productcatalog");
}

#[tokio::test]
async fn test_create_collection_gives_up() {
    let (api, base_url) = start_api().await;
    api.script("CREATE", &[500, 500, 500, 500, 500]);

    let error = client(base_url, None)
        .create_collection("products", 1, 1)
        .await
        .unwrap_err();

    assert_eq!(error.kind(), MembershipErrorKind::RetriesExhausted);
    assert_eq!(api.requests().len(), 4);
}

#[tokio::test]
async fn test_create_collection_gateway_timeout() {
    let (api, base_url) = start_api().await;
    api.script("CREATE", &[504]);

    let outcome = client(base_url, None)
        .create_collection("products", 1, 1)
        .await
        .unwrap();

    assert_eq!(outcome, MutationOutcome::AssumedApplied);
    assert_eq!(api.requests().len(), 1);
}

#[tokio::test]
async fn test_add_replica_retries_on_bad_request() {
    let (api, base_url) = start_api().await;
    api.script("ADDREPLICA", &[400, 200]);

    let node = NodeAddress::from_host("10.0.0.3", 8983);
    let outcome = client(base_url, None)
        .add_replica("products", "shard1", &node)
        .await
        .unwrap();

    assert_eq!(outcome, MutationOutcome::Applied);

    let requests = api.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].params["collection"], "products");
    assert_eq!(requests[1].params["shard"], "shard1");
    assert_eq!(requests[1].params["node"], "10.0.0.3:8983_solr");
}

#[tokio::test]
async fn test_delete_collection_statuses() {
    let (api, base_url) = start_api().await;
    let client = client(base_url, None);

    api.script("DELETE", &[400]);
    assert_eq!(
        client.delete_collection("products").await.unwrap(),
        MutationOutcome::Ignored
    );

    api.script("DELETE", &[500]);
    let error = client.delete_collection("products").await.unwrap_err();
    assert_eq!(error.kind(), MembershipErrorKind::UnexpectedStatus);

    // Deletes are never retried.
    assert_eq!(api.requests().len(), 2);
}

#[tokio::test]
async fn test_delete_replica_statuses() {
    let (api, base_url) = start_api().await;
    let client = client(base_url, None);

    api.script("DELETEREPLICA", &[500]);
    assert_eq!(
        client
            .delete_replica("products", "shard1", "core_node1")
            .await
            .unwrap(),
        MutationOutcome::Ignored
    );

    api.script("DELETEREPLICA", &[404]);
    let error = client
        .delete_replica("products", "shard1", "core_node1")
        .await
        .unwrap_err();
    assert_eq!(error.kind(), MembershipErrorKind::UnexpectedStatus);

    let requests = api.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].params["replica"], "core_node1");
}

#[tokio::test]
async fn test_bearer_token() {
    let (api, base_url) = start_api().await;

    client(base_url.clone(), Some("secret"))
        .get_cluster_snapshot()
        .await
        .unwrap();
    client(base_url.clone(), Some(""))
        .get_cluster_snapshot()
        .await
        .unwrap();
    client(base_url, None).get_cluster_snapshot().await.unwrap();

    let requests = api.requests();
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer secret"));
    assert_eq!(requests[1].authorization, None);
    assert_eq!(requests[2].authorization, None);
}

#[tokio::test]
async fn test_unreachable_service() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let base_url = Url::parse(&format!("http://{addr}/solr")).unwrap();
    let error = client(base_url, None)
        .get_cluster_snapshot()
        .await
        .unwrap_err();

    assert_eq!(error.kind(), MembershipErrorKind::Transport);
}
