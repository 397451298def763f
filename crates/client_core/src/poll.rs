//! Background refresh of the cluster page.
//!
//! A [`PollSupervisor`] owns at most one refresh task. The task is spawned when
//! the initial page fetch succeeds and cancelled when the page state is reset;
//! the supervisor then waits for the next successful page fetch.
//!
//! Every suspension point of the task (interval timer, remote call, outcome
//! send) races against its [`CancellationToken`], and the supervisor joins the
//! task before reporting itself idle, so nothing a cancelled task fetched is
//! ever emitted.

use std::{mem, sync::Arc, time::Duration};

use shared::{
    domain::{Server, ServerStat},
    protocol::ClusterLists,
};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    api::ClusterApi,
    config::CoordinatorSettings,
    error::{RemoteCallError, RemoteResultExt},
    intent::{Outcome, PollSignal},
};

/// Read side of the statistics the view layer currently knows about.
pub type KnownStats = watch::Receiver<Arc<Vec<ServerStat>>>;

/// Write side of [`KnownStats`], held by whoever reduces outcomes into view state.
#[derive(Debug, Clone)]
pub struct KnownStatsPublisher {
    tx: Arc<watch::Sender<Arc<Vec<ServerStat>>>>,
}

impl KnownStatsPublisher {
    pub fn publish(&self, stats: Vec<ServerStat>) {
        self.tx.send_replace(Arc::new(stats));
    }
}

pub fn known_stats_channel() -> (KnownStatsPublisher, KnownStats) {
    let (tx, rx) = watch::channel(Arc::new(Vec::new()));
    (KnownStatsPublisher { tx: Arc::new(tx) }, rx)
}

/// Whether refresh number `tick` (starting at 1) is a heavy fetch that includes statistics.
pub fn should_request_stat(tick: u64, stat_request_period: u64) -> bool {
    tick % stat_request_period.max(1) == 0
}

/// True when some server assigned to a replica set has no statistics record yet.
pub fn has_unknown_server(servers: &[Server], known: &[ServerStat]) -> bool {
    servers.iter().any(|server| {
        server.replicaset.is_some()
            && !known
                .iter()
                .any(|stat| stat.uuid.is_some() && stat.uuid == server.uuid)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Running,
}

#[derive(Debug)]
pub struct PollCommand {
    pub signal: PollSignal,
    /// Answered once the signal has been fully applied (a stopped task has exited).
    pub applied: Option<oneshot::Sender<PollState>>,
}

impl PollCommand {
    pub fn new(signal: PollSignal) -> Self {
        Self {
            signal,
            applied: None,
        }
    }

    pub fn acknowledged(signal: PollSignal) -> (Self, oneshot::Receiver<PollState>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                signal,
                applied: Some(tx),
            },
            rx,
        )
    }
}

enum Slot {
    Idle,
    Running {
        cancel: CancellationToken,
        task: JoinHandle<()>,
    },
}

pub struct PollSupervisor {
    api: Arc<dyn ClusterApi>,
    outcomes: mpsc::Sender<Outcome>,
    known_stats: KnownStats,
    settings: CoordinatorSettings,
    slot: Slot,
    generation: u64,
}

impl PollSupervisor {
    pub fn new(
        api: Arc<dyn ClusterApi>,
        outcomes: mpsc::Sender<Outcome>,
        known_stats: KnownStats,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            api,
            outcomes,
            known_stats,
            settings,
            slot: Slot::Idle,
            generation: 0,
        }
    }

    pub fn state(&self) -> PollState {
        match self.slot {
            Slot::Idle => PollState::Idle,
            Slot::Running { .. } => PollState::Running,
        }
    }

    /// Number of refresh tasks started so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn handle(&mut self, signal: PollSignal) -> PollState {
        match (signal, self.state()) {
            (PollSignal::InitialFetchSucceeded, PollState::Idle) => self.start(),
            (PollSignal::InitialFetchSucceeded, PollState::Running) => {
                debug!(
                    generation = self.generation,
                    "background refresh already running"
                );
            }
            (PollSignal::StateReset, PollState::Running) => self.stop().await,
            (PollSignal::StateReset, PollState::Idle) => {
                debug!("state reset while background refresh is idle");
            }
        }
        self.state()
    }

    pub async fn run(mut self, mut commands: mpsc::Receiver<PollCommand>) {
        while let Some(command) = commands.recv().await {
            let state = self.handle(command.signal).await;
            if let Some(applied) = command.applied {
                let _ = applied.send(state);
            }
        }
        self.stop().await;
    }

    fn start(&mut self) {
        self.generation += 1;
        let cancel = CancellationToken::new();
        let task = PollTask {
            api: Arc::clone(&self.api),
            outcomes: self.outcomes.clone(),
            known_stats: self.known_stats.clone(),
            interval: self.settings.refresh_interval,
            stat_request_period: self.settings.stat_request_period,
            tick: 0,
            generation: self.generation,
        };
        let task = tokio::spawn(task.run(cancel.clone()));
        info!(
            generation = self.generation,
            interval_ms = self.settings.refresh_interval.as_millis() as u64,
            "background refresh started"
        );
        self.slot = Slot::Running { cancel, task };
    }

    async fn stop(&mut self) {
        let Slot::Running { cancel, task } = mem::replace(&mut self.slot, Slot::Idle) else {
            return;
        };
        cancel.cancel();
        if let Err(err) = task.await {
            if err.is_panic() {
                warn!(
                    generation = self.generation,
                    "background refresh task panicked: {err}"
                );
            }
        }
        info!(generation = self.generation, "background refresh stopped");
    }
}

impl Drop for PollSupervisor {
    fn drop(&mut self) {
        if let Slot::Running { cancel, task } = &self.slot {
            cancel.cancel();
            task.abort();
        }
    }
}

struct PollTask {
    api: Arc<dyn ClusterApi>,
    outcomes: mpsc::Sender<Outcome>,
    known_stats: KnownStats,
    interval: Duration,
    stat_request_period: u64,
    tick: u64,
    generation: u64,
}

impl PollTask {
    async fn run(mut self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }

            if !self.emit(&cancel, Outcome::RefreshRequested).await {
                break;
            }

            self.tick += 1;
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                fetched = self.fetch() => fetched,
            };

            let outcome = match fetched {
                Ok(lists) => Outcome::RefreshSucceeded(lists.retain_identified_stats()),
                Err(error) => {
                    warn!(
                        generation = self.generation,
                        tick = self.tick,
                        "background refresh failed: {error}"
                    );
                    Outcome::RefreshFailed(error)
                }
            };

            if !self.emit(&cancel, outcome).await {
                break;
            }
        }
        debug!(
            generation = self.generation,
            ticks = self.tick,
            "background refresh task exited"
        );
    }

    async fn emit(&self, cancel: &CancellationToken, outcome: Outcome) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            sent = self.outcomes.send(outcome) => sent.is_ok(),
        }
    }

    async fn fetch(&self) -> Result<ClusterLists, RemoteCallError> {
        if should_request_stat(self.tick, self.stat_request_period) {
            debug!(tick = self.tick, "refreshing lists with statistics");
            return self.api.refresh_lists(true).await.remote("refresh_lists");
        }

        let mut lists = self.api.refresh_lists(false).await.remote("refresh_lists")?;

        let unknown_server = {
            let known = self.known_stats.borrow();
            has_unknown_server(&lists.server_list, &known)
        };
        if unknown_server {
            debug!(tick = self.tick, "new server without statistics, backfilling");
            let stats = self.api.get_server_stat().await.remote("get_server_stat")?;
            lists.server_stat = Some(stats);
        }

        Ok(lists)
    }
}

#[cfg(test)]
#[path = "tests/poll_tests.rs"]
mod tests;
