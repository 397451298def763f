//! reqwest-backed `ClusterApi` talking JSON to the cluster admin endpoint.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{ClusterSelf, FailoverMode, Server, ServerStat},
    error::{ApiError, ApiException},
    protocol::{
        ApplyTestConfigRequest, ChangeFailoverRequest, ClusterLists, CreateReplicasetRequest,
        DisableServersRequest, DisableServersResponse, EditReplicasetRequest, ExpelServerRequest,
        FailoverState, JoinServerRequest, MutationAck, PageData, ProbeServerRequest,
        RefreshListsQuery, ServerStatList, UploadConfigRequest,
    },
};
use tracing::debug;

use crate::api::ClusterApi;

const ADMIN_API_PREFIX: &str = "admin/api";

#[derive(Debug, Serialize)]
struct EmptyRequest {}

pub struct HttpClusterApi {
    http: Client,
    server_url: String,
}

impl HttpClusterApi {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), server_url)
    }

    pub fn with_timeout(server_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self::with_client(http, server_url))
    }

    fn with_client(http: Client, server_url: impl Into<String>) -> Self {
        let server_url = server_url.into().trim_end_matches('/').to_string();
        Self { http, server_url }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn endpoint(&self, operation: &str) -> String {
        format!("{}/{ADMIN_API_PREFIX}/{operation}", self.server_url)
    }

    async fn call<Req, Resp>(&self, operation: &str, body: &Req) -> Result<Resp>
    where
        Req: Serialize + ?Sized + Sync,
        Resp: DeserializeOwned,
    {
        debug!(operation, "cluster api call");
        let res = self
            .http
            .post(self.endpoint(operation))
            .json(body)
            .send()
            .await
            .with_context(|| format!("failed to reach cluster api for {operation}"))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            if let Ok(api_error) = serde_json::from_str::<ApiError>(&text) {
                return Err(ApiException::from(api_error).into());
            }
            return Err(anyhow!("{operation} returned {status}: {text}"));
        }

        res.json()
            .await
            .with_context(|| format!("failed to decode {operation} response"))
    }

    async fn mutate<Req>(&self, operation: &str, body: &Req) -> Result<bool>
    where
        Req: Serialize + ?Sized + Sync,
    {
        let ack: MutationAck = self.call(operation, body).await?;
        Ok(ack.ok)
    }
}

#[async_trait]
impl ClusterApi for HttpClusterApi {
    async fn get_page_data(&self) -> Result<PageData> {
        self.call("page_data", &EmptyRequest {}).await
    }

    async fn refresh_lists(&self, with_stat: bool) -> Result<ClusterLists> {
        self.call("refresh_lists", &RefreshListsQuery { with_stat })
            .await
    }

    async fn get_server_stat(&self) -> Result<Vec<ServerStat>> {
        let body: ServerStatList = self.call("server_stat", &EmptyRequest {}).await?;
        Ok(body.server_stat)
    }

    async fn get_cluster_self(&self) -> Result<ClusterSelf> {
        self.call("cluster_self", &EmptyRequest {}).await
    }

    async fn bootstrap_vshard(&self) -> Result<bool> {
        self.mutate("bootstrap_vshard", &EmptyRequest {}).await
    }

    async fn probe_server(&self, request: &ProbeServerRequest) -> Result<bool> {
        self.mutate("probe_server", request).await
    }

    async fn join_server(&self, request: &JoinServerRequest) -> Result<bool> {
        self.mutate("join_server", request).await
    }

    async fn create_replicaset(&self, request: &CreateReplicasetRequest) -> Result<bool> {
        self.mutate("create_replicaset", request).await
    }

    async fn expel_server(&self, request: &ExpelServerRequest) -> Result<bool> {
        self.mutate("expel_server", request).await
    }

    async fn edit_replicaset(&self, request: &EditReplicasetRequest) -> Result<bool> {
        self.mutate("edit_replicaset", request).await
    }

    async fn join_single_server(&self, request: &ApplyTestConfigRequest) -> Result<bool> {
        self.mutate("join_single_server", request).await
    }

    async fn upload_config(&self, request: &UploadConfigRequest) -> Result<bool> {
        self.mutate("upload_config", request).await
    }

    async fn apply_test_config(&self) -> Result<bool> {
        self.mutate("apply_test_config", &EmptyRequest {}).await
    }

    async fn change_failover(&self, request: &ChangeFailoverRequest) -> Result<FailoverMode> {
        let body: FailoverState = self.call("change_failover", request).await?;
        Ok(body.failover_mode)
    }

    async fn disable_servers(&self, request: &DisableServersRequest) -> Result<Vec<Server>> {
        let body: DisableServersResponse = self.call("disable_servers", request).await?;
        Ok(body.server_list)
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
