use std::path::PathBuf;
use std::time::Duration;

use bluegreen_fleet::{FleetController, FleetError, FleetErrorKind, ScriptedRunner};
use bluegreen_fleet_kubectl::{KubectlConfig, KubectlFleetController};

const DEPLOYMENTS: &str = r#"{"items": [
    {"metadata": {"name": "search-A", "labels": {"application": "search", "release": "A"}}},
    {"metadata": {"name": "stray", "labels": {"application": "search"}}}
]}"#;

const PODS: &str = r#"{"items": [
    {"status": {"podIP": "10.1.0.7"}},
    {"status": {"phase": "Pending"}},
    {"status": {"podIP": "10.1.0.3"}}
]}"#;

fn controller() -> (KubectlFleetController<ScriptedRunner>, ScriptedRunner) {
    let config = KubectlConfig {
        manifest_dir: PathBuf::from("/manifests"),
        rollout_timeout: Duration::from_secs(300),
        ..KubectlConfig::default()
    };

    let runner = ScriptedRunner::new();
    (
        KubectlFleetController::with_runner(config, runner.clone()),
        runner,
    )
}

#[tokio::test]
async fn test_create_waits_for_rollout() {
    let (fleet, runner) = controller();
    runner.push_status(0).await;
    runner.push_status(0).await;
    runner.push_status(0).await;

    fleet.create_node_set("search", "B", "2.0.0").await.unwrap();

    assert_eq!(
        runner.invocations().await,
        vec![
            "kubectl create --namespace=diamond -f /manifests/search-B-deployment.yaml --record",
            "kubectl label --namespace=diamond deployment search-B traffic-weight=0 --overwrite",
            "kubectl rollout --namespace=diamond status deployment/search-B --timeout=300s",
        ]
    );
}

#[tokio::test]
async fn test_create_failures() {
    let (fleet, runner) = controller();

    runner.push_status(1).await;
    let error = fleet
        .create_node_set("search", "B", "2.0.0")
        .await
        .unwrap_err();
    assert_eq!(error.kind(), FleetErrorKind::CreationFailed);

    runner.push_status(0).await;
    runner.push_status(0).await;
    runner.push_status(1).await;
    let error = fleet
        .create_node_set("search", "B", "2.0.0")
        .await
        .unwrap_err();
    assert_eq!(error.kind(), FleetErrorKind::CreationTimeout);

    runner.push_status(0).await;
    runner.push_status(1).await;
    let error = fleet
        .create_node_set("search", "B", "2.0.0")
        .await
        .unwrap_err();
    assert_eq!(error.kind(), FleetErrorKind::TrafficSwitchFailed);
}

#[tokio::test]
async fn test_node_sets_from_deployments_and_pods() {
    let (fleet, runner) = controller();
    runner.push_output(DEPLOYMENTS).await;
    runner.push_output(PODS).await;

    let node_sets = fleet.get_all_node_sets("search").await.unwrap();

    assert_eq!(node_sets.len(), 1);
    assert_eq!(node_sets[0].name, "A");
    assert_eq!(node_sets[0].weight_percent, 100);
    assert_eq!(node_sets[0].nodes, vec!["10.1.0.7", "10.1.0.3"]);

    assert_eq!(
        runner.invocations().await,
        vec![
            "kubectl get --namespace=diamond deployments --output json --selector application=search",
            "kubectl get --namespace=diamond pods --output json --selector application=search,release=A",
        ]
    );
}

#[tokio::test]
async fn test_members_are_sorted() {
    let (fleet, runner) = controller();
    runner.push_output(PODS).await;

    let members = fleet.get_node_set_members("search", "A").await.unwrap();

    assert_eq!(members, vec!["10.1.0.3", "10.1.0.7"]);
}

#[tokio::test(start_paused = true)]
async fn test_delete_polls_until_gone() {
    let (fleet, runner) = controller();
    runner.push_output("{}").await;
    runner.push_output(DEPLOYMENTS).await;
    runner.push_output(r#"{"items": []}"#).await;

    fleet.delete_node_set("search", "A").await.unwrap();

    let invocations = runner.invocations().await;
    assert_eq!(invocations.len(), 3);
    assert_eq!(
        invocations[0],
        "kubectl delete --namespace=diamond deployment search-A"
    );
}

const SLOTS_BEFORE_SWITCH: &str = r#"{"items": [
    {"metadata": {"labels": {"application": "search", "release": "A"}}},
    {"metadata": {"labels": {"application": "search", "release": "B", "traffic-weight": "0"}}}
]}"#;

const SLOTS_AFTER_SWITCH: &str = r#"{"items": [
    {"metadata": {"labels": {"application": "search", "release": "A", "traffic-weight": "0"}}},
    {"metadata": {"labels": {"application": "search", "release": "B", "traffic-weight": "100"}}}
]}"#;

#[tokio::test]
async fn test_unlabelled_deployment_is_active_and_new_one_passive() {
    let (fleet, runner) = controller();
    runner.push_output(SLOTS_BEFORE_SWITCH).await;
    runner.set_fallback_output(PODS).await;

    assert_eq!(
        fleet.get_passive_node_set("search").await.unwrap().as_deref(),
        Some("B")
    );
}

#[tokio::test]
async fn test_switch_drains_former_active_deployment() {
    let (fleet, runner) = controller();
    runner.push_status(0).await;
    runner.push_output(SLOTS_BEFORE_SWITCH).await;
    runner.push_status(0).await;

    fleet.switch_traffic("search", "B", 100).await.unwrap();

    assert_eq!(
        runner.invocations().await,
        vec![
            "kubectl label --namespace=diamond deployment search-B traffic-weight=100 --overwrite",
            "kubectl get --namespace=diamond deployments --output json --selector application=search",
            "kubectl label --namespace=diamond deployment search-A traffic-weight=0 --overwrite",
        ]
    );

    runner.push_output(SLOTS_AFTER_SWITCH).await;
    runner.set_fallback_output(PODS).await;
    assert_eq!(
        fleet.get_passive_node_set("search").await.unwrap().as_deref(),
        Some("A")
    );

    runner.push_output(SLOTS_AFTER_SWITCH).await;
    assert_eq!(
        fleet.get_active_node_set("search").await.unwrap().as_deref(),
        Some("B")
    );
}

#[tokio::test]
async fn test_rejected_label_fails_switch() {
    let (fleet, runner) = controller();
    runner.push_status(1).await;

    let error = fleet.switch_traffic("search", "B", 100).await.unwrap_err();

    assert_eq!(error.kind(), FleetErrorKind::TrafficSwitchFailed);
}

#[tokio::test]
async fn test_malformed_output() {
    let (fleet, runner) = controller();
    runner.push_output("not json").await;

    let error = fleet.get_all_node_sets("search").await.unwrap_err();

    assert_eq!(error.kind(), FleetErrorKind::Decode);
}
