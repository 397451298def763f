//! Bridge between the egui thread and the coordinator running on a tokio runtime.

pub mod commands;
pub mod runtime;
