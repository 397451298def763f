use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    config::normalize_server_url, load_settings, spawn_coordinator, ClusterPageStore, Coordinator,
    CoordinatorSettings, HttpClusterApi, Intent, Outcome, Request, RequestKind,
};
use shared::{
    domain::{FailoverMode, ReplicasetUuid, ServerUuid},
    protocol::{
        ApplyTestConfigRequest, ChangeFailoverRequest, CreateReplicasetRequest,
        DisableServersRequest, EditReplicasetRequest, ExpelServerRequest, JoinServerRequest,
        ProbeServerRequest, UploadConfigRequest,
    },
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Cluster administration from the terminal")]
struct Args {
    /// Overrides the server url from cluster-admin.toml and the environment.
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long)]
    timeout_secs: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Loads the cluster page and follows background refreshes.
    Watch {
        #[arg(long, default_value_t = 30)]
        seconds: u64,
    },
    BootstrapVshard,
    Probe {
        uri: String,
    },
    Join {
        uri: String,
        #[arg(long)]
        replicaset: String,
    },
    CreateReplicaset {
        uri: String,
        #[arg(long)]
        alias: Option<String>,
        #[arg(long = "role")]
        roles: Vec<String>,
        #[arg(long)]
        weight: Option<f64>,
        #[arg(long)]
        vshard_group: Option<String>,
        #[arg(long)]
        all_rw: bool,
    },
    Expel {
        uuid: String,
    },
    EditReplicaset {
        uuid: String,
        #[arg(long)]
        alias: Option<String>,
        #[arg(long = "role")]
        roles: Vec<String>,
        #[arg(long)]
        weight: Option<f64>,
        /// Failover priority; the first server is the leader.
        #[arg(long = "master")]
        masters: Vec<String>,
        #[arg(long)]
        all_rw: Option<bool>,
        #[arg(long)]
        vshard_group: Option<String>,
    },
    UploadConfig {
        path: PathBuf,
    },
    ApplyTestConfig {
        uri: String,
    },
    Failover {
        mode: FailoverMode,
    },
    Disable {
        #[arg(required = true)]
        uuids: Vec<String>,
        /// Enable the servers instead of disabling them.
        #[arg(long)]
        enable: bool,
    },
}

impl Command {
    fn into_request(self) -> Result<Request> {
        let request = match self {
            Command::Watch { .. } => return Err(anyhow!("watch is not a request")),
            Command::BootstrapVshard => Request::BootstrapVshard,
            Command::Probe { uri } => Request::ProbeServer(ProbeServerRequest { uri }),
            Command::Join { uri, replicaset } => Request::JoinServer(JoinServerRequest {
                uri,
                replicaset_uuid: ReplicasetUuid::new(replicaset),
            }),
            Command::CreateReplicaset {
                uri,
                alias,
                roles,
                weight,
                vshard_group,
                all_rw,
            } => Request::CreateReplicaset(CreateReplicasetRequest {
                uri,
                alias,
                roles,
                weight,
                vshard_group,
                all_rw,
            }),
            Command::Expel { uuid } => Request::ExpelServer(ExpelServerRequest {
                uuid: ServerUuid::new(uuid),
            }),
            Command::EditReplicaset {
                uuid,
                alias,
                roles,
                weight,
                masters,
                all_rw,
                vshard_group,
            } => Request::EditReplicaset(EditReplicasetRequest {
                uuid: ReplicasetUuid::new(uuid),
                alias,
                roles: (!roles.is_empty()).then_some(roles),
                weight,
                master: (!masters.is_empty())
                    .then(|| masters.into_iter().map(ServerUuid::new).collect()),
                all_rw,
                vshard_group,
            }),
            Command::UploadConfig { path } => {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                let filename = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                Request::UploadConfig(UploadConfigRequest { filename, content })
            }
            Command::ApplyTestConfig { uri } => {
                Request::ApplyTestConfig(ApplyTestConfigRequest { uri })
            }
            Command::Failover { mode } => Request::ChangeFailover(ChangeFailoverRequest { mode }),
            Command::Disable { uuids, enable } => Request::DisableServers(DisableServersRequest {
                uuids: uuids.into_iter().map(ServerUuid::new).collect(),
                disable: !enable,
            }),
        };
        Ok(request)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings()?;
    if let Some(server_url) = &args.server_url {
        settings.server_url = normalize_server_url(server_url)?;
    }
    if let Some(secs) = args.timeout_secs {
        settings.request_timeout = Duration::from_secs(secs);
    }
    info!(server_url = %settings.server_url, "using cluster admin endpoint");

    let api = HttpClusterApi::with_timeout(&settings.server_url, settings.request_timeout)?;
    let coordinator = spawn_coordinator(Arc::new(api), CoordinatorSettings::default());

    match args.command {
        Command::Watch { seconds } => watch(coordinator, Duration::from_secs(seconds)).await,
        command => {
            let request = command.into_request()?;
            run_request(coordinator, request, settings.request_timeout).await
        }
    }
}

async fn watch(mut coordinator: Coordinator, duration: Duration) -> Result<()> {
    let mut store = ClusterPageStore::new(coordinator.known_stats.clone());
    coordinator.handle.dispatch(Intent::PageMounted).await?;

    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            outcome = coordinator.outcomes.recv() => {
                let Some(outcome) = outcome else { break };
                store.apply(&outcome);
                report(&outcome, &store);
            }
        }
    }

    coordinator.handle.dispatch(Intent::StateReset).await?;
    while let Some(outcome) = coordinator.outcomes.recv().await {
        store.apply(&outcome);
        if matches!(outcome, Outcome::PageStateReset) {
            break;
        }
    }
    coordinator.shutdown().await;
    Ok(())
}

fn report(outcome: &Outcome, store: &ClusterPageStore) {
    let state = store.state();
    match outcome {
        Outcome::PageDataLoaded(page) => info!(
            cluster_self = %page.cluster_self.uri,
            failover = %page.failover_mode,
            servers = state.server_list.len(),
            unconfigured = state.unconfigured_servers().count(),
            "cluster page loaded"
        ),
        Outcome::PageDataFailed(error) => warn!("cluster page failed to load: {error}"),
        Outcome::RefreshSucceeded(lists) => info!(
            servers = lists.server_list.len(),
            replicasets = lists.replicaset_list.len(),
            with_stat = lists.server_stat.is_some(),
            known_stats = state.server_stat.len(),
            "lists refreshed"
        ),
        Outcome::RefreshFailed(error) => warn!("refresh failed: {error}"),
        other => debug!(outcome = other.label(), "outcome"),
    }
}

async fn run_request(mut coordinator: Coordinator, request: Request, wait: Duration) -> Result<()> {
    let kind = request.kind();
    coordinator.handle.dispatch(request).await?;

    let result = loop {
        let Some(outcome) = coordinator.outcomes.recv().await else {
            break Err(anyhow!("coordinator stopped before {} settled", kind.label()));
        };
        match outcome {
            Outcome::Progress(progress) => {
                info!(kind = kind.label(), stage = ?progress.stage, "progress");
            }
            Outcome::Succeeded { response, .. } => {
                println!("{}", serde_json::to_string_pretty(&response)?);
                break Ok(());
            }
            Outcome::Failed { error, .. } => break Err(error.into()),
            other => debug!(outcome = other.label(), "outcome"),
        }
    };

    if result.is_ok() && kind == RequestKind::BootstrapVshard {
        wait_for_cluster_self(&mut coordinator, wait).await?;
    }
    coordinator.shutdown().await;
    result
}

async fn wait_for_cluster_self(coordinator: &mut Coordinator, wait: Duration) -> Result<()> {
    let updated = tokio::time::timeout(wait, async {
        while let Some(outcome) = coordinator.outcomes.recv().await {
            if let Outcome::ClusterSelfUpdated(cluster_self) = outcome {
                return Some(cluster_self);
            }
        }
        None
    })
    .await;

    match updated {
        Ok(Some(cluster_self)) => {
            println!("{}", serde_json::to_string_pretty(&cluster_self)?);
        }
        Ok(None) => warn!("coordinator stopped before cluster self was refreshed"),
        Err(_) => warn!("cluster self was not refreshed within {}s", wait.as_secs()),
    }
    Ok(())
}
