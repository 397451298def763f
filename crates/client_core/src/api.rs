//! Remote operations the coordinator drives. The transport behind them is opaque.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{ClusterSelf, FailoverMode, Server, ServerStat},
    protocol::{
        ApplyTestConfigRequest, ChangeFailoverRequest, ClusterLists, CreateReplicasetRequest,
        DisableServersRequest, EditReplicasetRequest, ExpelServerRequest, JoinServerRequest,
        PageData, ProbeServerRequest, UploadConfigRequest,
    },
};

#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn get_page_data(&self) -> Result<PageData>;
    /// Lists servers and replica sets; statistics are included only when `with_stat` is set.
    async fn refresh_lists(&self, with_stat: bool) -> Result<ClusterLists>;
    async fn get_server_stat(&self) -> Result<Vec<ServerStat>>;
    async fn get_cluster_self(&self) -> Result<ClusterSelf>;
    async fn bootstrap_vshard(&self) -> Result<bool>;
    async fn probe_server(&self, request: &ProbeServerRequest) -> Result<bool>;
    async fn join_server(&self, request: &JoinServerRequest) -> Result<bool>;
    async fn create_replicaset(&self, request: &CreateReplicasetRequest) -> Result<bool>;
    async fn expel_server(&self, request: &ExpelServerRequest) -> Result<bool>;
    async fn edit_replicaset(&self, request: &EditReplicasetRequest) -> Result<bool>;
    /// Joins a lone unconfigured instance as a single-server replica set.
    async fn join_single_server(&self, request: &ApplyTestConfigRequest) -> Result<bool>;
    async fn upload_config(&self, request: &UploadConfigRequest) -> Result<bool>;
    async fn apply_test_config(&self) -> Result<bool>;
    async fn change_failover(&self, request: &ChangeFailoverRequest) -> Result<FailoverMode>;
    async fn disable_servers(&self, request: &DisableServersRequest) -> Result<Vec<Server>>;
}

/// Stand-in used until a server URL is configured. Every call fails.
pub struct MissingClusterApi;

fn unavailable<T>(operation: &str) -> Result<T> {
    Err(anyhow!("cluster api is unavailable ({operation})"))
}

#[async_trait]
impl ClusterApi for MissingClusterApi {
    async fn get_page_data(&self) -> Result<PageData> {
        unavailable("get_page_data")
    }

    async fn refresh_lists(&self, _with_stat: bool) -> Result<ClusterLists> {
        unavailable("refresh_lists")
    }

    async fn get_server_stat(&self) -> Result<Vec<ServerStat>> {
        unavailable("get_server_stat")
    }

    async fn get_cluster_self(&self) -> Result<ClusterSelf> {
        unavailable("get_cluster_self")
    }

    async fn bootstrap_vshard(&self) -> Result<bool> {
        unavailable("bootstrap_vshard")
    }

    async fn probe_server(&self, _request: &ProbeServerRequest) -> Result<bool> {
        unavailable("probe_server")
    }

    async fn join_server(&self, _request: &JoinServerRequest) -> Result<bool> {
        unavailable("join_server")
    }

    async fn create_replicaset(&self, _request: &CreateReplicasetRequest) -> Result<bool> {
        unavailable("create_replicaset")
    }

    async fn expel_server(&self, _request: &ExpelServerRequest) -> Result<bool> {
        unavailable("expel_server")
    }

    async fn edit_replicaset(&self, _request: &EditReplicasetRequest) -> Result<bool> {
        unavailable("edit_replicaset")
    }

    async fn join_single_server(&self, _request: &ApplyTestConfigRequest) -> Result<bool> {
        unavailable("join_single_server")
    }

    async fn upload_config(&self, _request: &UploadConfigRequest) -> Result<bool> {
        unavailable("upload_config")
    }

    async fn apply_test_config(&self) -> Result<bool> {
        unavailable("apply_test_config")
    }

    async fn change_failover(&self, _request: &ChangeFailoverRequest) -> Result<FailoverMode> {
        unavailable("change_failover")
    }

    async fn disable_servers(&self, _request: &DisableServersRequest) -> Result<Vec<Server>> {
        unavailable("disable_servers")
    }
}
