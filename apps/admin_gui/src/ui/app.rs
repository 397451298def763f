use std::{path::PathBuf, time::Duration};

use client_core::{ClusterPageState, MessageLevel, Request, RequestKind};
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use shared::{
    domain::{FailoverMode, Replicaset, ReplicasetUuid, Server, ServerStatus},
    protocol::{
        ApplyTestConfigRequest, ChangeFailoverRequest, CreateReplicasetRequest,
        DisableServersRequest, EditReplicasetRequest, ExpelServerRequest, ProbeServerRequest,
    },
};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{UiError, UiErrorCategory, UiEvent};
use crate::controller::orchestration::dispatch_backend_command;
use crate::ui::input_modal::{InputModal, InputModalProps, ModalResponse};

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// What a confirmed dialog turns into.
#[derive(Debug, Clone, PartialEq)]
pub enum DialogPurpose {
    RenameReplicaset(ReplicasetUuid),
    ProbeServer,
    CreateReplicaset { uri: String },
    UploadConfig,
}

impl DialogPurpose {
    pub fn props(&self) -> InputModalProps<'_> {
        match self {
            DialogPurpose::RenameReplicaset(_) => InputModalProps {
                title: "Edit replica set",
                text: "Replica set alias",
                sub_text: None,
                placeholder: "alias",
                confirm_label: "Save",
            },
            DialogPurpose::ProbeServer => InputModalProps {
                title: "Probe server",
                text: "Server URI",
                sub_text: Some("The server is probed and shows up in the list once it answers."),
                placeholder: "localhost:3301",
                confirm_label: "Probe",
            },
            DialogPurpose::CreateReplicaset { uri } => InputModalProps {
                title: "Create replica set",
                text: "Alias for the new replica set",
                sub_text: Some(uri.as_str()),
                placeholder: "storage-1",
                confirm_label: "Create",
            },
            DialogPurpose::UploadConfig => InputModalProps {
                title: "Upload configuration",
                text: "Path to the configuration file",
                sub_text: None,
                placeholder: "config.yml",
                confirm_label: "Upload",
            },
        }
    }

    /// Default value for the dialog, derived from the latest page state.
    pub fn default_value(&self, state: &ClusterPageState) -> String {
        match self {
            DialogPurpose::RenameReplicaset(uuid) => state
                .replicaset_list
                .iter()
                .find(|replicaset| &replicaset.uuid == uuid)
                .map(|replicaset| replicaset.alias.clone())
                .unwrap_or_default(),
            DialogPurpose::CreateReplicaset { uri } => state
                .server_list
                .iter()
                .find(|server| &server.uri == uri)
                .and_then(|server| server.alias.clone())
                .unwrap_or_default(),
            DialogPurpose::ProbeServer | DialogPurpose::UploadConfig => String::new(),
        }
    }

    /// Turns a confirmed value into the backend command to queue.
    pub fn command(&self, value: String) -> Result<BackendCommand, String> {
        let value = value.trim().to_string();
        let command = match self {
            DialogPurpose::RenameReplicaset(uuid) => {
                if value.is_empty() {
                    return Err("Replica set alias must not be empty".into());
                }
                BackendCommand::Submit(Request::EditReplicaset(EditReplicasetRequest::rename(
                    uuid.clone(),
                    value,
                )))
            }
            DialogPurpose::ProbeServer => {
                if value.is_empty() {
                    return Err("Server URI must not be empty".into());
                }
                BackendCommand::Submit(Request::ProbeServer(ProbeServerRequest { uri: value }))
            }
            DialogPurpose::CreateReplicaset { uri } => {
                BackendCommand::Submit(Request::CreateReplicaset(CreateReplicasetRequest {
                    uri: uri.clone(),
                    alias: (!value.is_empty()).then_some(value),
                    ..CreateReplicasetRequest::default()
                }))
            }
            DialogPurpose::UploadConfig => {
                if value.is_empty() {
                    return Err("Configuration file path must not be empty".into());
                }
                BackendCommand::UploadConfigFile(PathBuf::from(value))
            }
        };
        Ok(command)
    }
}

struct Dialog {
    purpose: DialogPurpose,
    modal: InputModal,
}

pub struct AdminApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    state: ClusterPageState,
    status: String,
    error_banner: Option<UiError>,
    dialog: Option<Dialog>,
    page_mounted: bool,
}

impl AdminApp {
    pub fn new(cmd_tx: Sender<BackendCommand>, ui_rx: Receiver<UiEvent>) -> Self {
        Self {
            cmd_tx,
            ui_rx,
            state: ClusterPageState::default(),
            status: String::new(),
            error_banner: None,
            dialog: None,
            page_mounted: false,
        }
    }

    fn send(&mut self, cmd: BackendCommand) {
        dispatch_backend_command(&self.cmd_tx, cmd, &mut self.status);
    }

    fn submit(&mut self, request: Request) {
        self.send(BackendCommand::Submit(request));
    }

    fn open_dialog(&mut self, purpose: DialogPurpose) {
        let modal = InputModal::new(purpose.default_value(&self.state));
        self.dialog = Some(Dialog { purpose, modal });
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::Info(message) => self.status = message,
                UiEvent::StateChanged(state) => self.state = *state,
                UiEvent::Error(error) => {
                    tracing::warn!(context = ?error.context(), "{}", error.message());
                    self.error_banner = Some(error);
                }
            }
        }
    }

    fn show_top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("cluster_top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Cluster");
                if let Some(cluster_self) = &self.state.cluster_self {
                    let name = cluster_self.alias.as_deref().unwrap_or(&cluster_self.uri);
                    ui.label(format!("connected via {name}"));
                }
                if self.state.page_loading || self.state.refreshing {
                    ui.spinner();
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("Reload").clicked() {
                        self.send(BackendCommand::ResetPage);
                        self.send(BackendCommand::MountPage);
                    }
                    if ui.button("Upload config").clicked() {
                        self.open_dialog(DialogPurpose::UploadConfig);
                    }
                    if ui.button("Probe server").clicked() {
                        self.open_dialog(DialogPurpose::ProbeServer);
                    }
                    self.show_bootstrap_action(ui);
                    self.show_failover_selector(ui);
                });
            });
        });
    }

    fn show_bootstrap_action(&mut self, ui: &mut egui::Ui) {
        let Some(cluster_self) = &self.state.cluster_self else {
            return;
        };
        if !cluster_self.can_bootstrap_vshard || cluster_self.vshard_bootstrapped {
            return;
        }
        let idle = !self.state.is_pending(RequestKind::BootstrapVshard);
        if ui
            .add_enabled(idle, egui::Button::new("Bootstrap vshard"))
            .clicked()
        {
            self.submit(Request::BootstrapVshard);
        }
    }

    fn show_failover_selector(&mut self, ui: &mut egui::Ui) {
        let current = self.state.failover_mode;
        let mut selected = current;
        egui::ComboBox::from_id_salt("failover_mode")
            .selected_text(format!("Failover: {current}"))
            .show_ui(ui, |ui| {
                for mode in [
                    FailoverMode::Disabled,
                    FailoverMode::Eventual,
                    FailoverMode::Stateful,
                ] {
                    ui.selectable_value(&mut selected, mode, mode.label());
                }
            });
        if selected != current {
            self.submit(Request::ChangeFailover(ChangeFailoverRequest { mode: selected }));
        }
    }

    fn show_status_banner(&mut self, ui: &mut egui::Ui) {
        if let Some(banner) = self.error_banner.clone() {
            egui::Frame::NONE
                .fill(egui::Color32::from_rgb(111, 53, 53))
                .stroke(egui::Stroke::new(1.0, egui::Color32::from_rgb(175, 96, 96)))
                .corner_radius(8.0)
                .inner_margin(egui::Margin::symmetric(10, 8))
                .show(ui, |ui| {
                    ui.horizontal_wrapped(|ui| {
                        ui.label(
                            egui::RichText::new(banner.headline())
                                .strong()
                                .color(egui::Color32::WHITE),
                        );
                        ui.label(egui::RichText::new(banner.message()).color(egui::Color32::WHITE));
                        if banner.category() == UiErrorCategory::Transport {
                            ui.small("Check the server URL in cluster-admin.toml.");
                        }
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if ui.button("Dismiss").clicked() {
                                self.error_banner = None;
                            }
                        });
                    });
                });
        }

        if let Some(message) = &self.state.last_message {
            let color = match message.level {
                MessageLevel::Info => ui.visuals().text_color(),
                MessageLevel::Success => egui::Color32::from_rgb(90, 170, 110),
                MessageLevel::Error => egui::Color32::from_rgb(200, 90, 90),
            };
            ui.colored_label(
                color,
                format!("{} {}", message.at.format("%H:%M:%S"), message.text),
            );
        }
        if let Some(progress) = self.state.progress {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label(format!("{}: {:?}", progress.kind.label(), progress.stage));
            });
        }
        if let Some(error) = &self.state.last_refresh_error {
            ui.small(format!("Last refresh failed: {error}"));
        }
        if !self.status.is_empty() {
            ui.small(&self.status);
        }
    }

    fn show_unconfigured_servers(&mut self, ui: &mut egui::Ui) {
        let servers: Vec<Server> = self.state.unconfigured_servers().cloned().collect();
        if servers.is_empty() {
            return;
        }
        let lone_server = servers.len() == 1 && self.state.replicaset_list.is_empty();

        ui.heading("Unconfigured servers");
        egui::Grid::new("unconfigured_servers")
            .striped(true)
            .show(ui, |ui| {
                for server in &servers {
                    ui.label(&server.uri);
                    ui.label(server.alias.as_deref().unwrap_or("-"));
                    ui.label(status_text(server.status));
                    if ui.button("Configure").clicked() {
                        self.open_dialog(DialogPurpose::CreateReplicaset {
                            uri: server.uri.clone(),
                        });
                    }
                    if lone_server {
                        let idle = !self.state.is_pending(RequestKind::ApplyTestConfig);
                        if ui
                            .add_enabled(idle, egui::Button::new("Apply test config"))
                            .clicked()
                        {
                            self.submit(Request::ApplyTestConfig(ApplyTestConfigRequest {
                                uri: server.uri.clone(),
                            }));
                        }
                    }
                    ui.end_row();
                }
            });
        ui.add_space(12.0);
    }

    fn show_replicasets(&mut self, ui: &mut egui::Ui) {
        let replicasets = self.state.replicaset_list.clone();
        ui.heading("Replica sets");
        if replicasets.is_empty() {
            ui.label("No replica sets yet.");
            return;
        }
        for replicaset in &replicasets {
            self.show_replicaset(ui, replicaset);
        }
    }

    fn show_replicaset(&mut self, ui: &mut egui::Ui, replicaset: &Replicaset) {
        let title = if replicaset.roles.is_empty() {
            replicaset.alias.clone()
        } else {
            format!("{} ({})", replicaset.alias, replicaset.roles.join(", "))
        };
        egui::CollapsingHeader::new(title)
            .id_salt(replicaset.uuid.as_str())
            .default_open(true)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(status_text(replicaset.status));
                    if ui.small_button("Edit").clicked() {
                        self.open_dialog(DialogPurpose::RenameReplicaset(replicaset.uuid.clone()));
                    }
                });
                egui::Grid::new(("replicaset_servers", replicaset.uuid.as_str()))
                    .striped(true)
                    .show(ui, |ui| {
                        for server in &replicaset.servers {
                            self.show_server_row(ui, server);
                            ui.end_row();
                        }
                    });
            });
    }

    fn show_server_row(&mut self, ui: &mut egui::Ui, server: &Server) {
        ui.label(server.display_name());
        ui.label(&server.uri);
        ui.label(status_text(server.status));
        let memory = server
            .uuid
            .as_ref()
            .and_then(|uuid| self.state.stat_for(uuid))
            .and_then(|stat| stat.statistics)
            .map(|stats| {
                format!(
                    "{:.1} / {:.1} MiB",
                    stats.arena_used as f64 / BYTES_PER_MIB,
                    stats.quota_size as f64 / BYTES_PER_MIB
                )
            })
            .unwrap_or_else(|| "-".into());
        ui.label(memory);

        let Some(uuid) = server.uuid.clone() else {
            return;
        };
        let toggle = if server.disabled { "Enable" } else { "Disable" };
        if ui.small_button(toggle).clicked() {
            self.submit(Request::DisableServers(DisableServersRequest {
                uuids: vec![uuid.clone()],
                disable: !server.disabled,
            }));
        }
        let idle = !self.state.is_pending(RequestKind::ExpelServer);
        if ui
            .add_enabled(idle, egui::Button::new("Expel").small())
            .clicked()
        {
            self.submit(Request::ExpelServer(ExpelServerRequest { uuid }));
        }
    }

    fn show_dialog(&mut self, ctx: &egui::Context) {
        let Some(dialog) = self.dialog.as_mut() else {
            return;
        };
        let default = dialog.purpose.default_value(&self.state);
        let props = dialog.purpose.props();
        let Some(response) = dialog.modal.show(ctx, &props, &default) else {
            return;
        };

        let command = match response {
            ModalResponse::Confirmed(value) => Some(dialog.purpose.command(value)),
            ModalResponse::Closed => None,
        };
        match command {
            Some(Ok(command)) => {
                self.dialog = None;
                self.send(command);
            }
            Some(Err(reason)) => self.status = reason,
            None => self.dialog = None,
        }
    }
}

fn status_text(status: ServerStatus) -> &'static str {
    match status {
        ServerStatus::Healthy => "healthy",
        ServerStatus::Unhealthy => "unhealthy",
        ServerStatus::Unconfigured => "unconfigured",
        ServerStatus::Unknown => "unknown",
    }
}

impl eframe::App for AdminApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();
        if !self.page_mounted {
            self.page_mounted = true;
            self.send(BackendCommand::MountPage);
        }

        self.show_top_bar(ctx);
        egui::CentralPanel::default().show(ctx, |ui| {
            self.show_status_banner(ui);
            ui.separator();
            egui::ScrollArea::vertical().show(ui, |ui| {
                if !self.state.page_loaded && !self.state.page_loading {
                    ui.label("Cluster page is not loaded.");
                    return;
                }
                self.show_unconfigured_servers(ui);
                self.show_replicasets(ui);
            });
        });
        self.show_dialog(ctx);

        ctx.request_repaint_after(Duration::from_millis(100));
    }
}

#[cfg(test)]
#[path = "tests/app_tests.rs"]
mod tests;
