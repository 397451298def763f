use serde::{Deserialize, Serialize};

use crate::domain::{
    ClusterSelf, FailoverMode, Replicaset, ReplicasetUuid, Server, ServerStat, ServerUuid,
};

/// Server and replica set listing, optionally carrying per-server statistics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterLists {
    #[serde(default)]
    pub server_list: Vec<Server>,
    #[serde(default)]
    pub replicaset_list: Vec<Replicaset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_stat: Option<Vec<ServerStat>>,
}

impl ClusterLists {
    /// Drops statistics records that do not identify a server.
    pub fn retain_identified_stats(mut self) -> Self {
        if let Some(stats) = self.server_stat.as_mut() {
            stats.retain(ServerStat::has_identity);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageData {
    #[serde(default)]
    pub cluster_self: ClusterSelf,
    #[serde(default)]
    pub failover_mode: FailoverMode,
    #[serde(flatten)]
    pub lists: ClusterLists,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStatList {
    #[serde(default)]
    pub server_stat: Vec<ServerStat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshListsQuery {
    pub with_stat: bool,
}

/// Generic acknowledgement returned by mutating operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MutationAck {
    #[serde(default)]
    pub ok: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeServerRequest {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinServerRequest {
    pub uri: String,
    pub replicaset_uuid: ReplicasetUuid,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReplicasetRequest {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vshard_group: Option<String>,
    #[serde(default)]
    pub all_rw: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpelServerRequest {
    pub uuid: ServerUuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditReplicasetRequest {
    pub uuid: ReplicasetUuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// Failover priority, first entry is the leader.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master: Option<Vec<ServerUuid>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_rw: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vshard_group: Option<String>,
}

impl EditReplicasetRequest {
    pub fn rename(uuid: ReplicasetUuid, alias: impl Into<String>) -> Self {
        Self {
            uuid,
            alias: Some(alias.into()),
            roles: None,
            weight: None,
            master: None,
            all_rw: None,
            vshard_group: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfigRequest {
    pub filename: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyTestConfigRequest {
    pub uri: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeFailoverRequest {
    pub mode: FailoverMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisableServersRequest {
    pub uuids: Vec<ServerUuid>,
    pub disable: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisableServersResponse {
    #[serde(default)]
    pub server_list: Vec<Server>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailoverState {
    pub failover_mode: FailoverMode,
}
