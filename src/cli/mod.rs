//! CLI module for rpaflow
//!
//! This module provides:
//! - Command implementations (run, validate, new, kinds, workflows)
//! - Output handlers (console, JSON, quiet)
//! - Signal handling that cancels runs between steps
//!
//! # Example
//!
//! ```ignore
//! use rpa_flow::cli::{commands, output, signals};
//!
//! let handler = output::create_handler(output::OutputMode::Console, false);
//! let token = signals::CancellationToken::new();
//! let exit_code = commands::run_workflows(&names, None, &config, token, &*handler).await?;
//! ```

pub mod commands;
pub mod output;
pub mod signals;

pub use commands::{
    list_kinds, list_workflow_files, new_workflow, run_workflows, validate_workflow,
};
pub use output::{OutputEvent, OutputMode, create_handler};
pub use signals::{CancellationToken, setup_signal_handlers};
