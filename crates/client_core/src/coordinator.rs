//! Intent dispatcher: turns intents into remote calls and remote results into outcomes.

use std::{collections::HashMap, sync::Arc};

use tokio::{
    sync::mpsc,
    task::{JoinHandle, JoinSet},
};
use tracing::{debug, info, warn};

use crate::{
    api::ClusterApi,
    config::CoordinatorSettings,
    error::{DispatchError, RemoteCallError, RemoteResultExt},
    intent::{
        Intent, Outcome, PollSignal, ProgressStage, Request, RequestKind, RequestProgress,
        Response,
    },
    poll::{known_stats_channel, KnownStatsPublisher, PollCommand, PollSupervisor},
    retry::retry_until_ok,
};

const INTENT_QUEUE_CAPACITY: usize = 256;
const OUTCOME_QUEUE_CAPACITY: usize = 1024;
const POLL_QUEUE_CAPACITY: usize = 16;

/// Sending half of a running coordinator.
#[derive(Clone)]
pub struct CoordinatorHandle {
    intents: mpsc::Sender<Intent>,
}

impl CoordinatorHandle {
    pub async fn dispatch(&self, intent: impl Into<Intent>) -> Result<(), DispatchError> {
        let intent = intent.into();
        debug!(?intent, "dispatching intent");
        self.intents
            .send(intent)
            .await
            .map_err(|_| DispatchError::CoordinatorStopped)
    }

    pub fn is_running(&self) -> bool {
        !self.intents.is_closed()
    }
}

/// A spawned coordinator and the channels its caller consumes.
pub struct Coordinator {
    pub handle: CoordinatorHandle,
    pub outcomes: mpsc::Receiver<Outcome>,
    /// Feed the statistics reduced into view state back to the background refresh.
    pub known_stats: KnownStatsPublisher,
    task: JoinHandle<()>,
}

impl Coordinator {
    /// Stops accepting intents, aborts in-flight work and waits for the coordinator to exit.
    pub async fn shutdown(self) {
        let Coordinator { handle, task, .. } = self;
        drop(handle);
        if let Err(err) = task.await {
            if err.is_panic() {
                warn!("coordinator task panicked: {err}");
            }
        }
    }
}

/// Spawns the dispatcher and the background poll supervisor onto the current runtime.
///
/// The coordinator runs until every [`CoordinatorHandle`] clone has been dropped.
pub fn spawn_coordinator(api: Arc<dyn ClusterApi>, settings: CoordinatorSettings) -> Coordinator {
    let (intent_tx, intent_rx) = mpsc::channel(INTENT_QUEUE_CAPACITY);
    let (outcome_tx, outcome_rx) = mpsc::channel(OUTCOME_QUEUE_CAPACITY);
    let (poll_tx, poll_rx) = mpsc::channel(POLL_QUEUE_CAPACITY);
    let (followup_tx, followup_rx) = mpsc::channel(INTENT_QUEUE_CAPACITY);
    let (known_stats, known_stats_rx) = known_stats_channel();

    let supervisor = PollSupervisor::new(
        Arc::clone(&api),
        outcome_tx.clone(),
        known_stats_rx,
        settings,
    );
    let dispatcher = EffectCoordinator {
        api,
        outcomes: outcome_tx,
        poll: poll_tx,
        followups: followup_tx,
        settings,
        in_flight: HashMap::new(),
        page_task: None,
        page_generation: 0,
        self_updates: JoinSet::new(),
    };

    let task = tokio::spawn(async move {
        let poll = tokio::spawn(supervisor.run(poll_rx));
        dispatcher.run(intent_rx, followup_rx).await;
        if let Err(err) = poll.await {
            if err.is_panic() {
                warn!("poll supervisor panicked: {err}");
            }
        }
        info!("coordinator stopped");
    });

    Coordinator {
        handle: CoordinatorHandle { intents: intent_tx },
        outcomes: outcome_rx,
        known_stats,
        task,
    }
}

/// Work a request task hands back to the dispatcher once it has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FollowUp {
    /// Carries the page generation the load was started in.
    PageLoaded(u64),
    VshardBootstrapped,
}

struct EffectCoordinator {
    api: Arc<dyn ClusterApi>,
    outcomes: mpsc::Sender<Outcome>,
    poll: mpsc::Sender<PollCommand>,
    followups: mpsc::Sender<FollowUp>,
    settings: CoordinatorSettings,
    in_flight: HashMap<RequestKind, JoinHandle<()>>,
    page_task: Option<JoinHandle<()>>,
    page_generation: u64,
    self_updates: JoinSet<()>,
}

impl EffectCoordinator {
    async fn run(
        mut self,
        mut intents: mpsc::Receiver<Intent>,
        mut followups: mpsc::Receiver<FollowUp>,
    ) {
        info!("coordinator started");
        loop {
            tokio::select! {
                intent = intents.recv() => match intent {
                    Some(intent) => self.handle(intent).await,
                    None => break,
                },
                Some(followup) = followups.recv() => self.follow_up(followup).await,
                Some(joined) = self.self_updates.join_next(), if !self.self_updates.is_empty() => {
                    if let Err(err) = joined {
                        if err.is_panic() {
                            warn!("cluster self update task panicked: {err}");
                        }
                    }
                }
            }
        }
        self.abort_all();
    }

    async fn handle(&mut self, intent: Intent) {
        match intent {
            Intent::PageMounted => self.load_page(),
            Intent::StateReset => self.reset_page().await,
            Intent::Request(request) => self.start_request(request),
        }
    }

    async fn follow_up(&mut self, followup: FollowUp) {
        match followup {
            FollowUp::PageLoaded(generation) if generation == self.page_generation => {
                self.signal_poll(PollSignal::InitialFetchSucceeded).await;
            }
            FollowUp::PageLoaded(generation) => {
                debug!(generation, "ignoring page load from before a reset");
            }
            FollowUp::VshardBootstrapped => self.spawn_self_update(),
        }
    }

    fn load_page(&mut self) {
        if let Some(task) = self.page_task.take() {
            task.abort();
        }

        let api = Arc::clone(&self.api);
        let outcomes = self.outcomes.clone();
        let followups = self.followups.clone();
        let generation = self.page_generation;
        self.page_task = Some(tokio::spawn(async move {
            emit(&outcomes, Outcome::PageDataRequested).await;
            match api.get_page_data().await.remote("get_page_data") {
                Ok(page) => {
                    info!(
                        servers = page.lists.server_list.len(),
                        replicasets = page.lists.replicaset_list.len(),
                        "cluster page loaded"
                    );
                    emit(&outcomes, Outcome::PageDataLoaded(page)).await;
                    let _ = followups.send(FollowUp::PageLoaded(generation)).await;
                }
                Err(error) => {
                    warn!("cluster page load failed: {error}");
                    emit(&outcomes, Outcome::PageDataFailed(error)).await;
                }
            }
        }));
    }

    async fn reset_page(&mut self) {
        self.page_generation += 1;
        if let Some(task) = self.page_task.take() {
            task.abort();
        }

        let (command, applied) = PollCommand::acknowledged(PollSignal::StateReset);
        if self.poll.send(command).await.is_ok() {
            let _ = applied.await;
        }
        emit(&self.outcomes, Outcome::PageStateReset).await;
    }

    async fn signal_poll(&self, signal: PollSignal) {
        if self.poll.send(PollCommand::new(signal)).await.is_err() {
            warn!(?signal, "poll supervisor is gone");
        }
    }

    /// A newer request of the same kind supersedes the one in flight.
    fn start_request(&mut self, request: Request) {
        let kind = request.kind();
        if let Some(previous) = self.in_flight.remove(&kind) {
            if !previous.is_finished() {
                debug!(kind = kind.label(), "superseding in-flight request");
                previous.abort();
            }
        }

        let task = tokio::spawn(run_request(
            Arc::clone(&self.api),
            self.outcomes.clone(),
            self.followups.clone(),
            request,
        ));
        self.in_flight.insert(kind, task);
    }

    fn spawn_self_update(&mut self) {
        let api = Arc::clone(&self.api);
        let outcomes = self.outcomes.clone();
        let delay = self.settings.self_update_retry_delay;
        self.self_updates.spawn(async move {
            let api = api.as_ref();
            let cluster_self =
                retry_until_ok("get_cluster_self", delay, move || api.get_cluster_self()).await;
            info!("cluster self refreshed after vshard bootstrap");
            emit(&outcomes, Outcome::ClusterSelfUpdated(cluster_self)).await;
        });
    }

    fn abort_all(&mut self) {
        if let Some(task) = self.page_task.take() {
            task.abort();
        }
        for (_, task) in self.in_flight.drain() {
            task.abort();
        }
        self.self_updates.abort_all();
    }
}

async fn emit(outcomes: &mpsc::Sender<Outcome>, outcome: Outcome) {
    let label = outcome.label();
    if outcomes.send(outcome).await.is_err() {
        debug!(outcome = label, "outcome receiver dropped");
    }
}

fn is_chained(kind: RequestKind) -> bool {
    matches!(
        kind,
        RequestKind::CreateReplicaset | RequestKind::ApplyTestConfig
    )
}

struct Progress<'a> {
    kind: RequestKind,
    outcomes: &'a mpsc::Sender<Outcome>,
}

impl Progress<'_> {
    async fn report(&self, stage: ProgressStage) {
        emit(
            self.outcomes,
            Outcome::Progress(RequestProgress {
                kind: self.kind,
                stage,
            }),
        )
        .await;
    }
}

async fn run_request(
    api: Arc<dyn ClusterApi>,
    outcomes: mpsc::Sender<Outcome>,
    followups: mpsc::Sender<FollowUp>,
    request: Request,
) {
    let kind = request.kind();
    let chained = is_chained(kind);
    let progress = Progress {
        kind,
        outcomes: &outcomes,
    };

    if chained {
        progress.report(ProgressStage::Started).await;
    }

    match execute(api.as_ref(), &request, &progress).await {
        Ok(response) => {
            if chained {
                progress.report(ProgressStage::Succeeded).await;
            }
            info!(kind = kind.label(), "request succeeded");
            emit(&outcomes, Outcome::Succeeded { request, response }).await;
            if kind == RequestKind::BootstrapVshard {
                let _ = followups.send(FollowUp::VshardBootstrapped).await;
            }
        }
        Err(error) => {
            warn!(kind = kind.label(), "request failed: {error}");
            emit(&outcomes, Outcome::Failed { request, error }).await;
            if chained {
                progress.report(ProgressStage::Failed).await;
            }
        }
    }
}

async fn execute(
    api: &dyn ClusterApi,
    request: &Request,
    progress: &Progress<'_>,
) -> Result<Response, RemoteCallError> {
    match request {
        Request::BootstrapVshard => api
            .bootstrap_vshard()
            .await
            .remote("bootstrap_vshard")
            .map(Response::VshardBootstrapped),
        Request::ProbeServer(payload) => api
            .probe_server(payload)
            .await
            .remote("probe_server")
            .map(Response::ServerProbed),
        Request::JoinServer(payload) => api
            .join_server(payload)
            .await
            .remote("join_server")
            .map(Response::ServerJoined),
        Request::CreateReplicaset(payload) => {
            let created = api
                .create_replicaset(payload)
                .await
                .remote("create_replicaset")?;
            progress.report(ProgressStage::Advanced).await;
            let cluster_self = api.get_cluster_self().await.remote("get_cluster_self")?;
            Ok(Response::ReplicasetCreated {
                created,
                cluster_self,
            })
        }
        Request::ExpelServer(payload) => api
            .expel_server(payload)
            .await
            .remote("expel_server")
            .map(Response::ServerExpelled),
        Request::EditReplicaset(payload) => api
            .edit_replicaset(payload)
            .await
            .remote("edit_replicaset")
            .map(Response::ReplicasetEdited),
        Request::UploadConfig(payload) => api
            .upload_config(payload)
            .await
            .remote("upload_config")
            .map(Response::ConfigUploaded),
        Request::ApplyTestConfig(payload) => {
            api.join_single_server(payload)
                .await
                .remote("join_single_server")?;
            progress.report(ProgressStage::Advanced).await;
            api.apply_test_config()
                .await
                .remote("apply_test_config")
                .map(Response::TestConfigApplied)
        }
        Request::ChangeFailover(payload) => api
            .change_failover(payload)
            .await
            .remote("change_failover")
            .map(Response::FailoverChanged),
        Request::DisableServers(payload) => api
            .disable_servers(payload)
            .await
            .remote("disable_servers")
            .map(Response::ServersDisabled),
    }
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
