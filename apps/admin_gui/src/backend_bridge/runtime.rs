//! Backend worker: owns the tokio runtime, the coordinator and the cluster page store.

use std::{path::Path, sync::Arc, thread};

use client_core::{
    config::normalize_server_url, load_settings, spawn_coordinator, ClusterApi, ClusterPageStore,
    CoordinatorHandle, CoordinatorSettings, HttpClusterApi, Intent, MissingClusterApi, Outcome,
    Request, RequestKind, Settings, SettingsError,
};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use shared::protocol::UploadConfigRequest;
use tokio::sync::mpsc;

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{UiError, UiErrorContext, UiEvent};

const FORWARD_QUEUE_CAPACITY: usize = 64;

pub fn launch(cmd_rx: Receiver<BackendCommand>, ui_tx: Sender<UiEvent>, server_url: Option<String>) {
    thread::spawn(move || {
        let _ = ui_tx.try_send(UiEvent::Info("Backend worker starting...".to_string()));
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                tracing::error!("failed to build backend runtime: {err}");
                send_error(
                    &ui_tx,
                    UiError::from_message(
                        UiErrorContext::BackendStartup,
                        format!("failed to build backend runtime: {err}"),
                    ),
                );
                return;
            }
        };

        runtime.block_on(async move {
            let api = build_api(server_url, &ui_tx);
            run(api, cmd_rx, ui_tx).await;
        });
    });
}

fn resolve_settings(server_url: Option<String>) -> Result<Settings, SettingsError> {
    let mut settings = load_settings()?;
    if let Some(url) = server_url {
        settings.server_url = normalize_server_url(&url)?;
    }
    Ok(settings)
}

/// Falls back to [`MissingClusterApi`] so the page still renders and every action reports why it failed.
fn build_api(server_url: Option<String>, ui_tx: &Sender<UiEvent>) -> Arc<dyn ClusterApi> {
    let startup_error = |message: String| {
        tracing::error!("{message}");
        send_error(
            ui_tx,
            UiError::from_message(UiErrorContext::BackendStartup, message),
        );
    };

    let settings = match resolve_settings(server_url) {
        Ok(settings) => settings,
        Err(err) => {
            startup_error(err.to_string());
            return Arc::new(MissingClusterApi);
        }
    };
    match HttpClusterApi::with_timeout(&settings.server_url, settings.request_timeout) {
        Ok(api) => {
            tracing::info!(server_url = %settings.server_url, "cluster admin endpoint configured");
            let _ = ui_tx.try_send(UiEvent::Info(format!(
                "Connected to {}",
                settings.server_url
            )));
            Arc::new(api)
        }
        Err(err) => {
            startup_error(format!("{err:#}"));
            Arc::new(MissingClusterApi)
        }
    }
}

/// Runs until the UI drops its command sender.
pub async fn run(api: Arc<dyn ClusterApi>, cmd_rx: Receiver<BackendCommand>, ui_tx: Sender<UiEvent>) {
    let mut coordinator = spawn_coordinator(api, CoordinatorSettings::default());
    let mut store = ClusterPageStore::new(coordinator.known_stats.clone());

    let (forward_tx, mut commands) = mpsc::channel(FORWARD_QUEUE_CAPACITY);
    tokio::task::spawn_blocking(move || {
        while let Ok(cmd) = cmd_rx.recv() {
            if forward_tx.blocking_send(cmd).is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(cmd) => handle_command(&coordinator.handle, &mut store, cmd, &ui_tx).await,
                None => break,
            },
            Some(outcome) = coordinator.outcomes.recv() => {
                store.apply(&outcome);
                if let Some(error) = error_event(&outcome) {
                    send_error(&ui_tx, error);
                }
                publish_state(&store, &ui_tx);
            }
        }
    }

    tracing::info!("ui closed; stopping coordinator");
    let _ = coordinator.handle.dispatch(Intent::StateReset).await;
    coordinator.shutdown().await;
}

async fn handle_command(
    handle: &CoordinatorHandle,
    store: &mut ClusterPageStore,
    cmd: BackendCommand,
    ui_tx: &Sender<UiEvent>,
) {
    let intent = match cmd {
        BackendCommand::MountPage => Intent::PageMounted,
        BackendCommand::ResetPage => Intent::StateReset,
        BackendCommand::Submit(request) => {
            store.mark_pending(request.kind());
            publish_state(store, ui_tx);
            Intent::Request(request)
        }
        BackendCommand::UploadConfigFile(path) => match read_config_file(&path).await {
            Ok(upload) => {
                store.mark_pending(RequestKind::UploadConfig);
                publish_state(store, ui_tx);
                Intent::Request(Request::UploadConfig(upload))
            }
            Err(message) => {
                tracing::warn!(path = %path.display(), "{message}");
                send_error(
                    ui_tx,
                    UiError::from_message(UiErrorContext::Request(RequestKind::UploadConfig), message),
                );
                return;
            }
        },
    };
    if let Err(err) = handle.dispatch(intent).await {
        send_error(
            ui_tx,
            UiError::from_message(UiErrorContext::BackendStartup, err.to_string()),
        );
    }
}

async fn read_config_file(path: &Path) -> Result<UploadConfigRequest, String> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| format!("Failed to read {}: {err}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(UploadConfigRequest { filename, content })
}

/// Returns false when the UI queue could not take the error.
fn send_error(ui_tx: &Sender<UiEvent>, error: UiError) -> bool {
    let context = error.context();
    let message = error.message().to_string();
    match ui_tx.try_send(UiEvent::Error(error)) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::warn!(context = ?context, "ui event queue full; dropping error: {message}");
            false
        }
        Err(TrySendError::Disconnected(_)) => {
            tracing::debug!("ui closed; dropping error event");
            false
        }
    }
}

fn error_event(outcome: &Outcome) -> Option<UiError> {
    match outcome {
        Outcome::PageDataFailed(error) => {
            Some(UiError::from_remote(UiErrorContext::PageLoad, error))
        }
        Outcome::Failed { request, error } => Some(UiError::from_remote(
            UiErrorContext::Request(request.kind()),
            error,
        )),
        // Refresh failures surface through `last_refresh_error`.
        _ => None,
    }
}

fn publish_state(store: &ClusterPageStore, ui_tx: &Sender<UiEvent>) {
    if ui_tx
        .try_send(UiEvent::StateChanged(Box::new(store.state().clone())))
        .is_err()
    {
        tracing::debug!("ui event queue full; dropping state snapshot");
    }
}
