//! Backend commands queued from UI to backend worker.

use std::path::PathBuf;

use client_core::Request;

#[derive(Debug, Clone, PartialEq)]
pub enum BackendCommand {
    MountPage,
    ResetPage,
    Submit(Request),
    /// Read on the backend worker, then submitted as an upload request.
    UploadConfigFile(PathBuf),
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BackendCommand::MountPage => "mount_page",
            BackendCommand::ResetPage => "reset_page",
            BackendCommand::Submit(request) => request.kind().label(),
            BackendCommand::UploadConfigFile(_) => "upload_config_file",
        }
    }
}
