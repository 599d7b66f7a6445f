//! CLI command implementations

use super::output::{OutputEvent, OutputHandler};
use super::signals::CancellationToken;
use crate::config::{
    AppConfig, DEFAULT_WAIT_SECS, StepKind, StepParams, Workflow, find_workflow, list_workflows,
    load_workflow, read_workflow_file, save_workflow,
};
use crate::logbook::{LogBook, LogLevel};
use crate::workflow::{ExecutionHistory, StepDispatcher, WorkflowEngine};
use std::path::Path;
use std::sync::Arc;

/// Run workflows one after another
///
/// Returns the process exit code: 0 only when every workflow succeeded.
pub async fn run_workflows(
    names: &[String],
    project_dir: Option<&Path>,
    config: &AppConfig,
    cancel: CancellationToken,
    handler: &dyn OutputHandler,
) -> Result<i32, String> {
    let dispatcher = StepDispatcher::from_config(config)
        .map_err(|e| format!("Failed to set up step handlers: {}", e))?;

    let workflows = names
        .iter()
        .map(|name| {
            load_workflow(name, project_dir)
                .map_err(|e| format!("Failed to load workflow '{}': {:#}", name, e))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let logbook = Arc::new(LogBook::new(config.logbook.capacity));
    let engine = WorkflowEngine::new(dispatcher)
        .with_logger(logbook.clone())
        .with_cancellation(cancel.clone());

    let mut history = ExecutionHistory::new(config.history.capacity);
    let ran = execute_all(&engine, &workflows, &cancel, &mut history, &logbook, handler).await;

    if ran > 1 {
        for entry in history.entries() {
            handler.emit(OutputEvent::Info {
                message: format!(
                    "  {} {:<24} {}",
                    entry.id, entry.workflow_name, entry.details
                ),
            });
        }
        handler.emit(history.stats().into());
    }

    let stats = history.stats();
    Ok(if ran == workflows.len() && stats.failures == 0 {
        0
    } else {
        1
    })
}

/// Execute loaded workflows in order, recording each report; returns how many ran
///
/// The log book is drained after every run so warnings stay attached to
/// the workflow that raised them.
async fn execute_all(
    engine: &WorkflowEngine,
    workflows: &[Workflow],
    cancel: &CancellationToken,
    history: &mut ExecutionHistory,
    logbook: &LogBook,
    handler: &dyn OutputHandler,
) -> usize {
    let mut ran = 0;

    for workflow in workflows {
        if cancel.is_cancelled() {
            handler.emit(OutputEvent::WorkflowError {
                error: format!("cancelled before workflow '{}'", workflow.name),
            });
            break;
        }

        handler.emit(OutputEvent::WorkflowStart {
            name: workflow.name.clone(),
            steps: workflow.steps.len(),
        });

        let report = engine.execute(workflow).await;
        history.record(&report);
        handler.report(&report);
        ran += 1;

        for entry in logbook.entries(None, usize::MAX).into_iter().rev() {
            if matches!(entry.level, LogLevel::Warn | LogLevel::Error) {
                handler.emit(OutputEvent::Debug {
                    message: format!(
                        "{} {} {}",
                        entry.timestamp.format("%H:%M:%S"),
                        entry.level,
                        entry.message
                    ),
                });
            }
        }
        logbook.clear();

        if report.cancelled() {
            break;
        }
    }

    ran
}

/// Validate a workflow, reporting errors and warnings
pub fn validate_workflow(
    workflow_name: &str,
    project_dir: Option<&Path>,
    handler: &dyn OutputHandler,
) -> i32 {
    let workflow = match find_workflow(workflow_name, project_dir)
        .and_then(|path| read_workflow_file(&path))
    {
        Ok(wf) => wf,
        Err(e) => {
            handler.emit(OutputEvent::WorkflowError {
                error: format!("Failed to load workflow: {:#}", e),
            });
            return 1;
        }
    };

    for step in &workflow.steps {
        handler.emit(OutputEvent::Info {
            message: format!("  {}. [{}] {}", step.id, step.kind, step.label()),
        });
    }

    let validation = workflow.validate();
    for warning in &validation.warnings {
        handler.emit(OutputEvent::Info {
            message: format!("  warning: {}", warning),
        });
    }

    if validation.is_ok() {
        handler.emit(OutputEvent::Info {
            message: format!(
                "✓ Workflow '{}' is valid ({} steps)",
                workflow.name,
                workflow.steps.len()
            ),
        });
        return 0;
    }

    handler.emit(OutputEvent::Info {
        message: format!(
            "✗ Workflow '{}' has {} error(s):",
            workflow.name,
            validation.errors.len()
        ),
    });
    for err in &validation.errors {
        handler.emit(OutputEvent::Info {
            message: format!("  - {}", err),
        });
    }
    1
}

/// Placeholder parameters for a freshly scaffolded step
fn placeholder_params(kind: &StepKind) -> StepParams {
    let mut params = StepParams::new();
    for name in kind.required_parameters() {
        let value = match *name {
            "url" => "https://example.com".to_string(),
            other => format!("~/rpaflow/{}", other),
        };
        params = params.with(*name, value);
    }
    if *kind == StepKind::Wait {
        params = params.with("seconds", DEFAULT_WAIT_SECS);
    }
    params
}

/// Write a new workflow file with one placeholder step per requested kind
pub fn new_workflow(
    name: &str,
    kinds: &[String],
    project_dir: Option<&Path>,
    force: bool,
    handler: &dyn OutputHandler,
) -> i32 {
    let mut workflow = Workflow::new(name);
    for raw in kinds {
        let kind = StepKind::parse(raw);
        let params = placeholder_params(&kind);
        workflow = workflow.with_step(kind, "", params);
    }

    let validation = workflow.validate();
    for warning in &validation.warnings {
        handler.emit(OutputEvent::Info {
            message: format!("  warning: {}", warning),
        });
    }

    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();

    match save_workflow(&workflow, &stem, project_dir, force) {
        Ok(path) => {
            handler.emit(OutputEvent::Info {
                message: format!(
                    "✓ Created workflow '{}' ({} steps) at {}",
                    workflow.name,
                    workflow.steps.len(),
                    path.display()
                ),
            });
            0
        }
        Err(e) => {
            handler.emit(OutputEvent::WorkflowError {
                error: format!("Failed to create workflow: {:#}", e),
            });
            1
        }
    }
}

/// List the step kinds the engine knows about
pub fn list_kinds(handler: &dyn OutputHandler) {
    for kind in StepKind::known() {
        let mode = if kind.is_executed() { "runs" } else { "simulated" };
        let mut params: Vec<String> = kind
            .required_parameters()
            .iter()
            .map(|p| p.to_string())
            .collect();
        params.extend(kind.optional_parameters().iter().map(|p| format!("[{}]", p)));

        let message = if params.is_empty() {
            format!("{:<20} {}", kind.as_str(), mode)
        } else {
            format!("{:<20} {:<10} {}", kind.as_str(), mode, params.join(" "))
        };
        handler.emit(OutputEvent::Info { message });
    }
}

/// List workflow files in the lookup directories
pub fn list_workflow_files(project_dir: Option<&Path>, handler: &dyn OutputHandler) {
    let found = list_workflows(project_dir);
    if found.is_empty() {
        handler.emit(OutputEvent::Info {
            message: "(no workflows found)".into(),
        });
        return;
    }

    for (name, path) in found {
        handler.emit(OutputEvent::Info {
            message: format!("{:<24} {}", name, path.display()),
        });
    }
}
