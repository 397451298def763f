//! Coordination layer of the cluster admin client.
//!
//! Front ends dispatch [`Intent`]s into a coordinator spawned with
//! [`spawn_coordinator`]. The coordinator performs remote calls through a
//! [`ClusterApi`] and reports every result as an [`Outcome`]; outcomes are
//! reduced into [`ClusterPageState`] by a [`ClusterPageStore`].

pub mod api;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod http;
pub mod intent;
pub mod poll;
pub mod retry;
pub mod state;

#[cfg(test)]
mod test_support;

pub use api::{ClusterApi, MissingClusterApi};
pub use config::{load_settings, CoordinatorSettings, Settings};
pub use coordinator::{spawn_coordinator, Coordinator, CoordinatorHandle};
pub use error::{DispatchError, RemoteCallError, SettingsError};
pub use http::HttpClusterApi;
pub use intent::{
    Intent, Outcome, PollSignal, ProgressStage, Request, RequestKind, RequestProgress, Response,
};
pub use poll::{KnownStats, KnownStatsPublisher, PollState, PollSupervisor};
pub use state::{ClusterPageState, ClusterPageStore, MessageLevel, StatusMessage};
