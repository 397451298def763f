//! Intents dispatched into the coordinator and the outcomes it emits.

use serde::Serialize;
use shared::{
    domain::{ClusterSelf, FailoverMode, Server},
    protocol::{
        ApplyTestConfigRequest, ChangeFailoverRequest, ClusterLists, CreateReplicasetRequest,
        DisableServersRequest, EditReplicasetRequest, ExpelServerRequest, JoinServerRequest,
        PageData, ProbeServerRequest, UploadConfigRequest,
    },
};

use crate::error::RemoteCallError;

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// The cluster page became visible; loads page data and, on success, starts background refresh.
    PageMounted,
    /// The cluster page went away; stops background refresh.
    StateReset,
    Request(Request),
}

impl From<Request> for Intent {
    fn from(request: Request) -> Self {
        Intent::Request(request)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Request {
    BootstrapVshard,
    ProbeServer(ProbeServerRequest),
    JoinServer(JoinServerRequest),
    CreateReplicaset(CreateReplicasetRequest),
    ExpelServer(ExpelServerRequest),
    EditReplicaset(EditReplicasetRequest),
    UploadConfig(UploadConfigRequest),
    ApplyTestConfig(ApplyTestConfigRequest),
    ChangeFailover(ChangeFailoverRequest),
    DisableServers(DisableServersRequest),
}

impl Request {
    pub fn kind(&self) -> RequestKind {
        match self {
            Request::BootstrapVshard => RequestKind::BootstrapVshard,
            Request::ProbeServer(_) => RequestKind::ProbeServer,
            Request::JoinServer(_) => RequestKind::JoinServer,
            Request::CreateReplicaset(_) => RequestKind::CreateReplicaset,
            Request::ExpelServer(_) => RequestKind::ExpelServer,
            Request::EditReplicaset(_) => RequestKind::EditReplicaset,
            Request::UploadConfig(_) => RequestKind::UploadConfig,
            Request::ApplyTestConfig(_) => RequestKind::ApplyTestConfig,
            Request::ChangeFailover(_) => RequestKind::ChangeFailover,
            Request::DisableServers(_) => RequestKind::DisableServers,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    BootstrapVshard,
    ProbeServer,
    JoinServer,
    CreateReplicaset,
    ExpelServer,
    EditReplicaset,
    UploadConfig,
    ApplyTestConfig,
    ChangeFailover,
    DisableServers,
}

impl RequestKind {
    pub fn label(self) -> &'static str {
        match self {
            RequestKind::BootstrapVshard => "bootstrap_vshard",
            RequestKind::ProbeServer => "probe_server",
            RequestKind::JoinServer => "join_server",
            RequestKind::CreateReplicaset => "create_replicaset",
            RequestKind::ExpelServer => "expel_server",
            RequestKind::EditReplicaset => "edit_replicaset",
            RequestKind::UploadConfig => "upload_config",
            RequestKind::ApplyTestConfig => "apply_test_config",
            RequestKind::ChangeFailover => "change_failover",
            RequestKind::DisableServers => "disable_servers",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Response {
    VshardBootstrapped(bool),
    ServerProbed(bool),
    ServerJoined(bool),
    ReplicasetCreated {
        created: bool,
        cluster_self: ClusterSelf,
    },
    ServerExpelled(bool),
    ReplicasetEdited(bool),
    ConfigUploaded(bool),
    TestConfigApplied(bool),
    FailoverChanged(FailoverMode),
    ServersDisabled(Vec<Server>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    Started,
    /// First call of a two-step chain finished, second one is running.
    Advanced,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequestProgress {
    pub kind: RequestKind,
    pub stage: ProgressStage,
}

#[derive(Debug, Clone)]
pub enum Outcome {
    PageDataRequested,
    PageDataLoaded(PageData),
    PageDataFailed(RemoteCallError),
    PageStateReset,
    RefreshRequested,
    RefreshSucceeded(ClusterLists),
    RefreshFailed(RemoteCallError),
    Succeeded {
        request: Request,
        response: Response,
    },
    Failed {
        request: Request,
        error: RemoteCallError,
    },
    Progress(RequestProgress),
    ClusterSelfUpdated(ClusterSelf),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::PageDataRequested => "page_data_requested",
            Outcome::PageDataLoaded(_) => "page_data_loaded",
            Outcome::PageDataFailed(_) => "page_data_failed",
            Outcome::PageStateReset => "page_state_reset",
            Outcome::RefreshRequested => "refresh_requested",
            Outcome::RefreshSucceeded(_) => "refresh_succeeded",
            Outcome::RefreshFailed(_) => "refresh_failed",
            Outcome::Succeeded { .. } => "request_succeeded",
            Outcome::Failed { .. } => "request_failed",
            Outcome::Progress(_) => "request_progress",
            Outcome::ClusterSelfUpdated(_) => "cluster_self_updated",
        }
    }

    /// Request kind this outcome settles, if it is the final outcome of a request.
    pub fn settles(&self) -> Option<RequestKind> {
        match self {
            Outcome::Succeeded { request, .. } | Outcome::Failed { request, .. } => {
                Some(request.kind())
            }
            _ => None,
        }
    }
}

/// Lifecycle signals seen by the background poll supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollSignal {
    InitialFetchSucceeded,
    StateReset,
}
