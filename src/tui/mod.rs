//! Inbox TUI
//!
//! Terminal user interface using Ratatui: grouped conversations with live
//! presence on the left, the selected thread on the right.

mod app;
mod backend;
mod input;
mod log_capture;
mod ui;

pub use app::run;
pub use log_capture::LogBuffer;
