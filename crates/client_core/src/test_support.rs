//! Scripted in-memory `ClusterApi` shared by the coordinator tests.

use std::{
    collections::{HashSet, VecDeque},
    sync::Mutex,
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{ClusterSelf, FailoverMode, ReplicasetRef, ReplicasetUuid, Server, ServerStat, ServerUuid},
    protocol::{
        ApplyTestConfigRequest, ChangeFailoverRequest, ClusterLists, CreateReplicasetRequest,
        DisableServersRequest, EditReplicasetRequest, ExpelServerRequest, JoinServerRequest,
        PageData, ProbeServerRequest, UploadConfigRequest,
    },
};
use tokio::{sync::mpsc, time::Instant};

use crate::{api::ClusterApi, intent::Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Call {
    PageData,
    RefreshLists { with_stat: bool },
    ServerStat,
    ClusterSelf,
    BootstrapVshard,
    ProbeServer,
    JoinServer,
    CreateReplicaset,
    ExpelServer,
    EditReplicaset,
    JoinSingleServer,
    UploadConfig,
    ApplyTestConfig,
    ChangeFailover,
    DisableServers,
}

pub(crate) struct ScriptedApi {
    calls: Mutex<Vec<Call>>,
    lists: Mutex<ClusterLists>,
    queued_lists: Mutex<VecDeque<Result<ClusterLists, String>>>,
    stats: Mutex<Vec<ServerStat>>,
    queued_cluster_self: Mutex<VecDeque<Result<ClusterSelf, String>>>,
    failing: Mutex<HashSet<Call>>,
    call_delay: Mutex<Option<Duration>>,
}

impl ScriptedApi {
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            lists: Mutex::new(ClusterLists::default()),
            queued_lists: Mutex::new(VecDeque::new()),
            stats: Mutex::new(Vec::new()),
            queued_cluster_self: Mutex::new(VecDeque::new()),
            failing: Mutex::new(HashSet::new()),
            call_delay: Mutex::new(None),
        }
    }

    /// Lists returned by every `refresh_lists` call not covered by a queued result.
    pub(crate) fn with_lists(self, lists: ClusterLists) -> Self {
        *self.lists.lock().expect("lists lock") = lists;
        self
    }

    pub(crate) fn with_stats(self, stats: Vec<ServerStat>) -> Self {
        *self.stats.lock().expect("stats lock") = stats;
        self
    }

    pub(crate) fn queue_lists(self, result: Result<ClusterLists, String>) -> Self {
        self.queued_lists
            .lock()
            .expect("queue lock")
            .push_back(result);
        self
    }

    pub(crate) fn queue_cluster_self(self, result: Result<ClusterSelf, String>) -> Self {
        self.queued_cluster_self
            .lock()
            .expect("queue lock")
            .push_back(result);
        self
    }

    pub(crate) fn failing(self, call: Call) -> Self {
        self.failing.lock().expect("failing lock").insert(call);
        self
    }

    /// Every remote call sleeps this long before answering.
    pub(crate) fn with_call_delay(self, delay: Duration) -> Self {
        *self.call_delay.lock().expect("delay lock") = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub(crate) fn count(&self, call: Call) -> usize {
        self.calls().into_iter().filter(|c| *c == call).count()
    }

    async fn enter(&self, call: Call) -> Result<()> {
        self.calls.lock().expect("calls lock").push(call);
        let delay = *self.call_delay.lock().expect("delay lock");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().expect("failing lock").contains(&call) {
            return Err(anyhow!("scripted failure for {call:?}"));
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterApi for ScriptedApi {
    async fn get_page_data(&self) -> Result<PageData> {
        self.enter(Call::PageData).await?;
        Ok(PageData {
            cluster_self: ClusterSelf::default(),
            failover_mode: FailoverMode::Disabled,
            lists: self.lists.lock().expect("lists lock").clone(),
        })
    }

    async fn refresh_lists(&self, with_stat: bool) -> Result<ClusterLists> {
        self.enter(Call::RefreshLists { with_stat }).await?;
        let queued = self.queued_lists.lock().expect("queue lock").pop_front();
        let mut lists = match queued {
            Some(result) => result.map_err(|err| anyhow!(err))?,
            None => self.lists.lock().expect("lists lock").clone(),
        };
        if with_stat {
            lists.server_stat = Some(self.stats.lock().expect("stats lock").clone());
        }
        Ok(lists)
    }

    async fn get_server_stat(&self) -> Result<Vec<ServerStat>> {
        self.enter(Call::ServerStat).await?;
        Ok(self.stats.lock().expect("stats lock").clone())
    }

    async fn get_cluster_self(&self) -> Result<ClusterSelf> {
        self.enter(Call::ClusterSelf).await?;
        let queued = self.queued_cluster_self.lock().expect("queue lock").pop_front();
        match queued {
            Some(result) => result.map_err(|err| anyhow!(err)),
            None => Ok(ClusterSelf {
                uri: "localhost:3301".into(),
                uuid: Some(ServerUuid::new("self")),
                ..ClusterSelf::default()
            }),
        }
    }

    async fn bootstrap_vshard(&self) -> Result<bool> {
        self.enter(Call::BootstrapVshard).await?;
        Ok(true)
    }

    async fn probe_server(&self, _request: &ProbeServerRequest) -> Result<bool> {
        self.enter(Call::ProbeServer).await?;
        Ok(true)
    }

    async fn join_server(&self, _request: &JoinServerRequest) -> Result<bool> {
        self.enter(Call::JoinServer).await?;
        Ok(true)
    }

    async fn create_replicaset(&self, _request: &CreateReplicasetRequest) -> Result<bool> {
        self.enter(Call::CreateReplicaset).await?;
        Ok(true)
    }

    async fn expel_server(&self, _request: &ExpelServerRequest) -> Result<bool> {
        self.enter(Call::ExpelServer).await?;
        Ok(true)
    }

    async fn edit_replicaset(&self, _request: &EditReplicasetRequest) -> Result<bool> {
        self.enter(Call::EditReplicaset).await?;
        Ok(true)
    }

    async fn join_single_server(&self, _request: &ApplyTestConfigRequest) -> Result<bool> {
        self.enter(Call::JoinSingleServer).await?;
        Ok(true)
    }

    async fn upload_config(&self, _request: &UploadConfigRequest) -> Result<bool> {
        self.enter(Call::UploadConfig).await?;
        Ok(true)
    }

    async fn apply_test_config(&self) -> Result<bool> {
        self.enter(Call::ApplyTestConfig).await?;
        Ok(true)
    }

    async fn change_failover(&self, request: &ChangeFailoverRequest) -> Result<FailoverMode> {
        self.enter(Call::ChangeFailover).await?;
        Ok(request.mode)
    }

    async fn disable_servers(&self, request: &DisableServersRequest) -> Result<Vec<Server>> {
        self.enter(Call::DisableServers).await?;
        Ok(request
            .uuids
            .iter()
            .map(|uuid| Server {
                disabled: request.disable,
                ..server(uuid.as_str(), Some("r-1"))
            })
            .collect())
    }
}

pub(crate) fn server(uuid: &str, replicaset: Option<&str>) -> Server {
    Server {
        uuid: Some(ServerUuid::new(uuid)),
        uri: format!("{uuid}.local:3301"),
        alias: None,
        status: Default::default(),
        message: String::new(),
        disabled: false,
        replicaset: replicaset.map(|r| ReplicasetRef {
            uuid: ReplicasetUuid::new(r),
            alias: None,
        }),
    }
}

pub(crate) fn stat(uuid: Option<&str>) -> ServerStat {
    ServerStat {
        uuid: uuid.map(ServerUuid::new),
        uri: uuid.map(|u| format!("{u}.local:3301")).unwrap_or_default(),
        statistics: None,
    }
}

pub(crate) fn lists_with(servers: Vec<Server>) -> ClusterLists {
    ClusterLists {
        server_list: servers,
        replicaset_list: Vec::new(),
        server_stat: None,
    }
}

/// Receives the next outcome, failing the test if none arrives within `within` of virtual time.
pub(crate) async fn next_outcome(rx: &mut mpsc::Receiver<Outcome>, within: Duration) -> Outcome {
    tokio::time::timeout(within, rx.recv())
        .await
        .expect("outcome before timeout")
        .expect("outcome channel open")
}

/// Collects every outcome emitted until `duration` of virtual time has passed.
pub(crate) async fn drain_for(rx: &mut mpsc::Receiver<Outcome>, duration: Duration) -> Vec<Outcome> {
    let deadline = Instant::now() + duration;
    let mut outcomes = Vec::new();
    while let Ok(Some(outcome)) = tokio::time::timeout_at(deadline, rx.recv()).await {
        outcomes.push(outcome);
    }
    outcomes
}
