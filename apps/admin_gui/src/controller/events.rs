//! UI/backend events and error modeling for the admin GUI controller.

use client_core::{ClusterPageState, RemoteCallError, RequestKind};
use shared::error::{ApiException, ErrorCode};

pub enum UiEvent {
    Info(String),
    StateChanged(Box<ClusterPageState>),
    Error(UiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Auth,
    Transport,
    Validation,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    PageLoad,
    Refresh,
    Request(RequestKind),
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let category = classify_message(&message);
        Self {
            category,
            context,
            message,
        }
    }

    /// Prefers the error code the cluster answered with over guessing from the text.
    pub fn from_remote(context: UiErrorContext, error: &RemoteCallError) -> Self {
        let category = match error.cause().downcast_ref::<ApiException>() {
            Some(exception) => match exception.code {
                ErrorCode::Unauthorized => UiErrorCategory::Auth,
                ErrorCode::NotFound | ErrorCode::Validation | ErrorCode::Conflict => {
                    UiErrorCategory::Validation
                }
                ErrorCode::Unavailable => UiErrorCategory::Transport,
                ErrorCode::Internal => UiErrorCategory::Unknown,
            },
            None => classify_message(&error.to_string()),
        };
        Self {
            category,
            context,
            message: error.to_string(),
        }
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Short headline shown above the message in the error banner.
    pub fn headline(&self) -> String {
        let what = match self.context {
            UiErrorContext::BackendStartup => "Backend startup failed".to_string(),
            UiErrorContext::PageLoad => "Cluster page failed to load".to_string(),
            UiErrorContext::Refresh => "Background refresh failed".to_string(),
            UiErrorContext::Request(kind) => format!("{} failed", kind.label()),
        };
        match self.category {
            UiErrorCategory::Auth => format!("{what} (not authorized)"),
            UiErrorCategory::Transport => format!("{what} (server unreachable)"),
            UiErrorCategory::Validation => format!("{what} (rejected by cluster)"),
            UiErrorCategory::Unknown => what,
        }
    }
}

fn classify_message(message: &str) -> UiErrorCategory {
    let lower = message.to_ascii_lowercase();
    if lower.contains("401")
        || lower.contains("403")
        || lower.contains("unauthorized")
        || lower.contains("forbidden")
    {
        UiErrorCategory::Auth
    } else if lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("connection")
        || lower.contains("failed to reach")
        || lower.contains("unavailable")
    {
        UiErrorCategory::Transport
    } else if lower.contains("invalid")
        || lower.contains("missing")
        || lower.contains("malformed")
        || lower.contains("already")
    {
        UiErrorCategory::Validation
    } else {
        UiErrorCategory::Unknown
    }
}
