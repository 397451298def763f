use std::time::Duration;

use shared::{
    domain::{ReplicasetUuid, ServerUuid},
    protocol::{
        ApplyTestConfigRequest, CreateReplicasetRequest, EditReplicasetRequest,
        ExpelServerRequest, ProbeServerRequest,
    },
};

use super::*;
use crate::test_support::{drain_for, lists_with, next_outcome, server, stat, Call, ScriptedApi};

const WAIT: Duration = Duration::from_secs(30);

fn settings() -> CoordinatorSettings {
    CoordinatorSettings {
        refresh_interval: Duration::from_secs(1),
        stat_request_period: 10,
        self_update_retry_delay: Duration::from_secs(2),
    }
}

fn start(api: &Arc<ScriptedApi>) -> Coordinator {
    let api: Arc<dyn ClusterApi> = api.clone();
    spawn_coordinator(api, settings())
}

/// Reads outcomes until the request of `kind` settles; returns everything read before it too.
async fn until_settled(
    outcomes: &mut mpsc::Receiver<Outcome>,
    kind: RequestKind,
) -> (Vec<Outcome>, Outcome) {
    let mut before = Vec::new();
    loop {
        let outcome = next_outcome(outcomes, WAIT).await;
        if outcome.settles() == Some(kind) {
            return (before, outcome);
        }
        before.push(outcome);
    }
}

fn progress_stages(outcomes: &[Outcome]) -> Vec<ProgressStage> {
    outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            Outcome::Progress(progress) => Some(progress.stage),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn simple_request_emits_success_with_request_payload() {
    let api = Arc::new(ScriptedApi::new());
    let mut coordinator = start(&api);

    let request = Request::ExpelServer(ExpelServerRequest {
        uuid: ServerUuid::new("s-9"),
    });
    coordinator
        .handle
        .dispatch(request.clone())
        .await
        .expect("dispatch");

    let (_, settled) = until_settled(&mut coordinator.outcomes, RequestKind::ExpelServer).await;
    let Outcome::Succeeded {
        request: echoed,
        response,
    } = settled
    else {
        panic!("expected success, got {settled:?}");
    };
    assert_eq!(echoed, request);
    assert_eq!(response, Response::ServerExpelled(true));

    coordinator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn simple_request_failure_carries_error_and_payload() {
    let api = Arc::new(ScriptedApi::new().failing(Call::ProbeServer));
    let mut coordinator = start(&api);

    let request = Request::ProbeServer(ProbeServerRequest {
        uri: "localhost:3310".into(),
    });
    coordinator
        .handle
        .dispatch(request.clone())
        .await
        .expect("dispatch");

    let (_, settled) = until_settled(&mut coordinator.outcomes, RequestKind::ProbeServer).await;
    let Outcome::Failed {
        request: echoed,
        error,
    } = settled
    else {
        panic!("expected failure, got {settled:?}");
    };
    assert_eq!(echoed, request);
    assert_eq!(error.operation(), "probe_server");
    assert!(error.cause().to_string().contains("scripted failure"));

    coordinator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn create_replicaset_merges_cluster_self_into_success() {
    let api = Arc::new(ScriptedApi::new());
    let mut coordinator = start(&api);

    coordinator
        .handle
        .dispatch(Request::CreateReplicaset(CreateReplicasetRequest {
            uri: "localhost:3302".into(),
            alias: Some("storage-1".into()),
            roles: vec!["vshard-storage".into()],
            ..CreateReplicasetRequest::default()
        }))
        .await
        .expect("dispatch");

    let (before, settled) =
        until_settled(&mut coordinator.outcomes, RequestKind::CreateReplicaset).await;
    assert_eq!(
        progress_stages(&before),
        vec![
            ProgressStage::Started,
            ProgressStage::Advanced,
            ProgressStage::Succeeded
        ]
    );
    let Outcome::Succeeded {
        response:
            Response::ReplicasetCreated {
                created,
                cluster_self,
            },
        ..
    } = settled
    else {
        panic!("expected create success, got {settled:?}");
    };
    assert!(created);
    assert_eq!(cluster_self.uuid, Some(ServerUuid::new("self")));
    assert_eq!(api.calls(), vec![Call::CreateReplicaset, Call::ClusterSelf]);

    coordinator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failed_create_never_fetches_cluster_self() {
    let api = Arc::new(ScriptedApi::new().failing(Call::CreateReplicaset));
    let mut coordinator = start(&api);

    coordinator
        .handle
        .dispatch(Request::CreateReplicaset(CreateReplicasetRequest {
            uri: "localhost:3302".into(),
            ..CreateReplicasetRequest::default()
        }))
        .await
        .expect("dispatch");

    let (before, settled) =
        until_settled(&mut coordinator.outcomes, RequestKind::CreateReplicaset).await;
    assert_eq!(progress_stages(&before), vec![ProgressStage::Started]);
    assert!(matches!(settled, Outcome::Failed { .. }));

    let rest = drain_for(&mut coordinator.outcomes, Duration::from_secs(5)).await;
    assert_eq!(progress_stages(&rest), vec![ProgressStage::Failed]);
    assert!(rest
        .iter()
        .all(|outcome| !matches!(outcome, Outcome::Failed { .. })));
    assert_eq!(api.count(Call::ClusterSelf), 0);

    coordinator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failed_cluster_self_after_create_emits_one_failure() {
    let api = Arc::new(ScriptedApi::new().failing(Call::ClusterSelf));
    let mut coordinator = start(&api);

    coordinator
        .handle
        .dispatch(Request::CreateReplicaset(CreateReplicasetRequest {
            uri: "localhost:3302".into(),
            ..CreateReplicasetRequest::default()
        }))
        .await
        .expect("dispatch");

    let (before, settled) =
        until_settled(&mut coordinator.outcomes, RequestKind::CreateReplicaset).await;
    assert_eq!(
        progress_stages(&before),
        vec![ProgressStage::Started, ProgressStage::Advanced]
    );
    let Outcome::Failed { error, .. } = settled else {
        panic!("expected failure, got {settled:?}");
    };
    assert_eq!(error.operation(), "get_cluster_self");

    let rest = drain_for(&mut coordinator.outcomes, Duration::from_secs(5)).await;
    assert_eq!(progress_stages(&rest), vec![ProgressStage::Failed]);
    assert!(rest
        .iter()
        .all(|outcome| !matches!(outcome, Outcome::Failed { .. } | Outcome::Succeeded { .. })));
    assert_eq!(api.calls(), vec![Call::CreateReplicaset, Call::ClusterSelf]);

    coordinator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failed_apply_after_join_emits_one_failure() {
    let api = Arc::new(ScriptedApi::new().failing(Call::ApplyTestConfig));
    let mut coordinator = start(&api);

    coordinator
        .handle
        .dispatch(Request::ApplyTestConfig(ApplyTestConfigRequest {
            uri: "localhost:3301".into(),
        }))
        .await
        .expect("dispatch");

    let (before, settled) =
        until_settled(&mut coordinator.outcomes, RequestKind::ApplyTestConfig).await;
    assert_eq!(
        progress_stages(&before),
        vec![ProgressStage::Started, ProgressStage::Advanced]
    );
    let Outcome::Failed { error, .. } = settled else {
        panic!("expected failure, got {settled:?}");
    };
    assert_eq!(error.operation(), "apply_test_config");

    let rest = drain_for(&mut coordinator.outcomes, Duration::from_secs(5)).await;
    assert_eq!(progress_stages(&rest), vec![ProgressStage::Failed]);
    assert!(rest
        .iter()
        .all(|outcome| !matches!(outcome, Outcome::Failed { .. } | Outcome::Succeeded { .. })));
    assert_eq!(
        api.calls(),
        vec![Call::JoinSingleServer, Call::ApplyTestConfig]
    );

    coordinator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn apply_test_config_stops_when_join_fails() {
    let api = Arc::new(ScriptedApi::new().failing(Call::JoinSingleServer));
    let mut coordinator = start(&api);

    coordinator
        .handle
        .dispatch(Request::ApplyTestConfig(ApplyTestConfigRequest {
            uri: "localhost:3301".into(),
        }))
        .await
        .expect("dispatch");

    let (_, settled) =
        until_settled(&mut coordinator.outcomes, RequestKind::ApplyTestConfig).await;
    let Outcome::Failed { error, .. } = settled else {
        panic!("expected failure, got {settled:?}");
    };
    assert_eq!(error.operation(), "join_single_server");
    assert_eq!(api.calls(), vec![Call::JoinSingleServer]);

    coordinator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn apply_test_config_runs_join_then_apply() {
    let api = Arc::new(ScriptedApi::new());
    let mut coordinator = start(&api);

    coordinator
        .handle
        .dispatch(Request::ApplyTestConfig(ApplyTestConfigRequest {
            uri: "localhost:3301".into(),
        }))
        .await
        .expect("dispatch");

    let (_, settled) =
        until_settled(&mut coordinator.outcomes, RequestKind::ApplyTestConfig).await;
    assert!(matches!(
        settled,
        Outcome::Succeeded {
            response: Response::TestConfigApplied(true),
            ..
        }
    ));
    assert_eq!(
        api.calls(),
        vec![Call::JoinSingleServer, Call::ApplyTestConfig]
    );

    coordinator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn bootstrap_success_retries_cluster_self_until_it_answers() {
    let api = Arc::new(
        ScriptedApi::new()
            .queue_cluster_self(Err("not ready".into()))
            .queue_cluster_self(Err("still not ready".into())),
    );
    let mut coordinator = start(&api);

    coordinator
        .handle
        .dispatch(Request::BootstrapVshard)
        .await
        .expect("dispatch");

    let (_, settled) =
        until_settled(&mut coordinator.outcomes, RequestKind::BootstrapVshard).await;
    assert!(matches!(
        settled,
        Outcome::Succeeded {
            response: Response::VshardBootstrapped(true),
            ..
        }
    ));

    let started = tokio::time::Instant::now();
    let updated = next_outcome(&mut coordinator.outcomes, WAIT).await;
    let Outcome::ClusterSelfUpdated(cluster_self) = updated else {
        panic!("expected cluster self update, got {updated:?}");
    };
    assert_eq!(cluster_self.uuid, Some(ServerUuid::new("self")));
    assert_eq!(api.count(Call::ClusterSelf), 3);
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(4) && waited < Duration::from_secs(5));

    let rest = drain_for(&mut coordinator.outcomes, Duration::from_secs(10)).await;
    assert!(rest.is_empty());
    assert_eq!(api.count(Call::ClusterSelf), 3);

    coordinator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failed_bootstrap_does_not_refresh_cluster_self() {
    let api = Arc::new(ScriptedApi::new().failing(Call::BootstrapVshard));
    let mut coordinator = start(&api);

    coordinator
        .handle
        .dispatch(Request::BootstrapVshard)
        .await
        .expect("dispatch");
    let (_, settled) =
        until_settled(&mut coordinator.outcomes, RequestKind::BootstrapVshard).await;
    assert!(matches!(settled, Outcome::Failed { .. }));

    assert!(drain_for(&mut coordinator.outcomes, Duration::from_secs(10))
        .await
        .is_empty());
    assert_eq!(api.count(Call::ClusterSelf), 0);

    coordinator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn newer_request_of_same_kind_supersedes_in_flight_one() {
    let api = Arc::new(ScriptedApi::new().with_call_delay(Duration::from_secs(5)));
    let mut coordinator = start(&api);
    let uuid = ReplicasetUuid::new("r-1");

    coordinator
        .handle
        .dispatch(Request::EditReplicaset(EditReplicasetRequest::rename(
            uuid.clone(),
            "first",
        )))
        .await
        .expect("dispatch first");
    tokio::time::sleep(Duration::from_secs(1)).await;
    let second = Request::EditReplicaset(EditReplicasetRequest::rename(uuid, "second"));
    coordinator
        .handle
        .dispatch(second.clone())
        .await
        .expect("dispatch second");

    let emitted = drain_for(&mut coordinator.outcomes, Duration::from_secs(20)).await;
    let settled: Vec<&Outcome> = emitted
        .iter()
        .filter(|outcome| outcome.settles() == Some(RequestKind::EditReplicaset))
        .collect();
    assert_eq!(settled.len(), 1);
    assert!(matches!(settled[0], Outcome::Succeeded { request, .. } if *request == second));
    assert_eq!(api.count(Call::EditReplicaset), 2);

    coordinator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn page_mount_starts_refresh_and_reset_stops_it() {
    let api = Arc::new(
        ScriptedApi::new().with_lists(lists_with(vec![server("s-1", Some("r-1"))])),
    );
    let mut coordinator = start(&api);
    coordinator
        .known_stats
        .publish(vec![stat(Some("s-1"))]);

    coordinator
        .handle
        .dispatch(Intent::PageMounted)
        .await
        .expect("dispatch mount");

    assert!(matches!(
        next_outcome(&mut coordinator.outcomes, WAIT).await,
        Outcome::PageDataRequested
    ));
    assert!(matches!(
        next_outcome(&mut coordinator.outcomes, WAIT).await,
        Outcome::PageDataLoaded(_)
    ));

    let refreshed = drain_for(&mut coordinator.outcomes, Duration::from_millis(2_500)).await;
    let labels: Vec<&str> = refreshed.iter().map(Outcome::label).collect();
    assert_eq!(
        labels,
        vec![
            "refresh_requested",
            "refresh_succeeded",
            "refresh_requested",
            "refresh_succeeded"
        ]
    );

    coordinator
        .handle
        .dispatch(Intent::StateReset)
        .await
        .expect("dispatch reset");
    let mut last = next_outcome(&mut coordinator.outcomes, WAIT).await;
    while !matches!(last, Outcome::PageStateReset) {
        last = next_outcome(&mut coordinator.outcomes, WAIT).await;
    }
    assert!(drain_for(&mut coordinator.outcomes, Duration::from_secs(10))
        .await
        .is_empty());

    coordinator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failed_page_load_does_not_start_refresh() {
    let api = Arc::new(ScriptedApi::new().failing(Call::PageData));
    let mut coordinator = start(&api);

    coordinator
        .handle
        .dispatch(Intent::PageMounted)
        .await
        .expect("dispatch mount");

    let emitted = drain_for(&mut coordinator.outcomes, Duration::from_secs(5)).await;
    let labels: Vec<&str> = emitted.iter().map(Outcome::label).collect();
    assert_eq!(labels, vec!["page_data_requested", "page_data_failed"]);
    assert_eq!(api.count(Call::RefreshLists { with_stat: false }), 0);

    coordinator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn remount_after_reset_restarts_refresh() {
    let api = Arc::new(ScriptedApi::new().with_lists(lists_with(Vec::new())));
    let mut coordinator = start(&api);

    for _ in 0..2 {
        coordinator
            .handle
            .dispatch(Intent::PageMounted)
            .await
            .expect("dispatch mount");
        let emitted = drain_for(&mut coordinator.outcomes, Duration::from_millis(1_500)).await;
        let refreshes = emitted
            .iter()
            .filter(|outcome| matches!(outcome, Outcome::RefreshRequested))
            .count();
        assert_eq!(refreshes, 1);

        coordinator
            .handle
            .dispatch(Intent::StateReset)
            .await
            .expect("dispatch reset");
        let emitted = drain_for(&mut coordinator.outcomes, Duration::from_secs(3)).await;
        assert_eq!(
            emitted.last().map(Outcome::label),
            Some("page_state_reset")
        );
    }

    coordinator.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_every_handle_clone() {
    let api = Arc::new(ScriptedApi::new());
    let coordinator = start(&api);
    let extra = coordinator.handle.clone();
    assert!(extra.is_running());

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(extra);
    });

    let started = tokio::time::Instant::now();
    coordinator.shutdown().await;
    assert!(started.elapsed() >= Duration::from_secs(5));
}
