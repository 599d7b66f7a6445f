//! Workflow execution engine for rpaflow
//!
//! This module handles:
//! - Dispatching each step kind to its handler
//! - Sequential execution with fail-fast abort
//! - Per-step timing and the aggregate run report
//! - Execution history for callers that run several workflows
//!
//! # Example
//!
//! ```ignore
//! use rpa_flow::config::{AppConfig, load_workflow};
//! use rpa_flow::workflow::{StepDispatcher, WorkflowEngine};
//!
//! let config = AppConfig::load(None, None)?;
//! let engine = WorkflowEngine::new(StepDispatcher::from_config(&config)?);
//!
//! let workflow = load_workflow("invoices", None)?;
//! let report = engine.execute(&workflow).await;
//!
//! if !report.is_success() {
//!     eprintln!("{}", report.describe());
//! }
//! ```

mod dispatch;
mod engine;
mod history;
mod report;

pub use dispatch::StepDispatcher;
pub use engine::WorkflowEngine;
pub use history::{ExecutionHistory, HistoryStats};
pub use report::RunReport;

#[cfg(test)]
pub use report::StepResult;
