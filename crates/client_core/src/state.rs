//! View state of the cluster page, reduced from coordinator outcomes.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use shared::{
    domain::{ClusterSelf, FailoverMode, Replicaset, Server, ServerStat, ServerUuid},
    protocol::ClusterLists,
};

use crate::{
    intent::{Outcome, ProgressStage, RequestKind, RequestProgress, Response},
    poll::KnownStatsPublisher,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub level: MessageLevel,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl StatusMessage {
    fn new(level: MessageLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
            at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClusterPageState {
    pub page_loading: bool,
    pub page_loaded: bool,
    pub refreshing: bool,
    pub cluster_self: Option<ClusterSelf>,
    pub failover_mode: FailoverMode,
    pub server_list: Vec<Server>,
    pub replicaset_list: Vec<Replicaset>,
    pub server_stat: Vec<ServerStat>,
    pub pending: HashSet<RequestKind>,
    pub progress: Option<RequestProgress>,
    pub last_message: Option<StatusMessage>,
    pub last_refresh_error: Option<String>,
}

impl ClusterPageState {
    /// Records that a request was dispatched so the UI can show it as busy.
    pub fn mark_pending(&mut self, kind: RequestKind) {
        self.pending.insert(kind);
    }

    pub fn is_pending(&self, kind: RequestKind) -> bool {
        self.pending.contains(&kind)
    }

    pub fn unconfigured_servers(&self) -> impl Iterator<Item = &Server> {
        self.server_list.iter().filter(|server| !server.is_configured())
    }

    pub fn stat_for(&self, uuid: &ServerUuid) -> Option<&ServerStat> {
        self.server_stat
            .iter()
            .find(|stat| stat.uuid.as_ref() == Some(uuid))
    }

    /// Applies one outcome. Returns true when the known statistics changed.
    pub fn apply(&mut self, outcome: &Outcome) -> bool {
        if let Some(kind) = outcome.settles() {
            self.pending.remove(&kind);
        }
        match outcome {
            Outcome::PageDataRequested => {
                self.page_loading = true;
                false
            }
            Outcome::PageDataLoaded(page) => {
                self.page_loading = false;
                self.page_loaded = true;
                self.cluster_self = Some(page.cluster_self.clone());
                self.failover_mode = page.failover_mode;
                self.apply_lists(&page.lists)
            }
            Outcome::PageDataFailed(error) => {
                self.page_loading = false;
                self.last_message = Some(StatusMessage::new(
                    MessageLevel::Error,
                    format!("Failed to load cluster: {error}"),
                ));
                false
            }
            Outcome::PageStateReset => {
                let had_stats = !self.server_stat.is_empty();
                *self = Self::default();
                had_stats
            }
            Outcome::RefreshRequested => {
                self.refreshing = true;
                false
            }
            Outcome::RefreshSucceeded(lists) => {
                self.refreshing = false;
                self.last_refresh_error = None;
                self.apply_lists(lists)
            }
            Outcome::RefreshFailed(error) => {
                self.refreshing = false;
                self.last_refresh_error = Some(error.to_string());
                false
            }
            Outcome::Succeeded { response, .. } => {
                self.apply_response(response);
                self.last_message = Some(StatusMessage::new(
                    MessageLevel::Success,
                    success_text(response),
                ));
                false
            }
            Outcome::Failed { request, error } => {
                self.last_message = Some(StatusMessage::new(
                    MessageLevel::Error,
                    format!("{} failed: {error}", request.kind().label()),
                ));
                false
            }
            Outcome::Progress(progress) => {
                self.progress = match progress.stage {
                    ProgressStage::Started | ProgressStage::Advanced => Some(*progress),
                    ProgressStage::Succeeded | ProgressStage::Failed => None,
                };
                false
            }
            Outcome::ClusterSelfUpdated(cluster_self) => {
                self.cluster_self = Some(cluster_self.clone());
                false
            }
        }
    }

    fn apply_lists(&mut self, lists: &ClusterLists) -> bool {
        self.server_list = lists.server_list.clone();
        self.replicaset_list = lists.replicaset_list.clone();
        match &lists.server_stat {
            Some(stats) if *stats != self.server_stat => {
                self.server_stat = stats.clone();
                true
            }
            _ => false,
        }
    }

    fn apply_response(&mut self, response: &Response) {
        match response {
            Response::ReplicasetCreated { cluster_self, .. } => {
                self.cluster_self = Some(cluster_self.clone());
            }
            Response::FailoverChanged(mode) => self.failover_mode = *mode,
            Response::ServersDisabled(servers) => {
                for updated in servers {
                    if let Some(existing) = self
                        .server_list
                        .iter_mut()
                        .find(|server| server.uuid.is_some() && server.uuid == updated.uuid)
                    {
                        *existing = updated.clone();
                    }
                }
            }
            Response::VshardBootstrapped(_)
            | Response::ServerProbed(_)
            | Response::ServerJoined(_)
            | Response::ServerExpelled(_)
            | Response::ReplicasetEdited(_)
            | Response::ConfigUploaded(_)
            | Response::TestConfigApplied(_) => {}
        }
    }
}

fn success_text(response: &Response) -> String {
    match response {
        Response::VshardBootstrapped(_) => {
            "VShard bootstrap is OK. Please wait for list refresh...".into()
        }
        Response::ServerProbed(_) => "Probe is OK. Please wait for list refresh...".into(),
        Response::ServerJoined(_) => "Join is OK. Please wait for list refresh...".into(),
        Response::ReplicasetCreated { .. } => {
            "Create is OK. Please wait for list refresh...".into()
        }
        Response::ServerExpelled(_) => "Expel is OK. Please wait for list refresh...".into(),
        Response::ReplicasetEdited(_) => "Edit is OK. Please wait for list refresh...".into(),
        Response::ConfigUploaded(_) => "Configuration uploaded successfully".into(),
        Response::TestConfigApplied(_) => {
            "Test config applied. Please wait for list refresh...".into()
        }
        Response::FailoverChanged(mode) => format!("Failover mode changed to {mode}"),
        Response::ServersDisabled(servers) => format!("Updated {} server(s)", servers.len()),
    }
}

/// View state plus the publisher that hands its statistics to the background refresh.
pub struct ClusterPageStore {
    state: ClusterPageState,
    known_stats: KnownStatsPublisher,
}

impl ClusterPageStore {
    pub fn new(known_stats: KnownStatsPublisher) -> Self {
        Self {
            state: ClusterPageState::default(),
            known_stats,
        }
    }

    pub fn state(&self) -> &ClusterPageState {
        &self.state
    }

    pub fn mark_pending(&mut self, kind: RequestKind) {
        self.state.mark_pending(kind);
    }

    pub fn apply(&mut self, outcome: &Outcome) {
        if self.state.apply(outcome) {
            self.known_stats.publish(self.state.server_stat.clone());
        }
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
