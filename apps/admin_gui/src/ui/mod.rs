//! UI layer for the admin GUI: cluster page and the confirmation dialog.

pub mod app;
pub mod input_modal;

pub use app::AdminApp;
