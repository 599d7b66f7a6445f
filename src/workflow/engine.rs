//! Workflow engine - runs steps in order with fail-fast abort

use super::dispatch::StepDispatcher;
use super::report::{RunReport, StepOutcome, StepResult};
use crate::cli::CancellationToken;
use crate::config::{Step, Workflow};
use crate::logbook::{LogLevel, RunLogger, TracingLogger};
use chrono::Local;
use std::any::Any;
use std::sync::Arc;
use tokio::task::JoinError;
use tokio::time::Instant;

/// Executes workflows against a step dispatcher
///
/// The engine keeps no state between runs; each `execute` call builds its
/// own result list.
pub struct WorkflowEngine {
    dispatcher: Arc<StepDispatcher>,
    logger: Arc<dyn RunLogger>,
    cancel: Option<CancellationToken>,
}

impl WorkflowEngine {
    pub fn new(dispatcher: StepDispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            logger: Arc::new(TracingLogger),
            cancel: None,
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn RunLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Stop between steps once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Run every step of `workflow` in order
    ///
    /// Stops at the first failed step. Never returns an error: failures are
    /// reported through the run report.
    pub async fn execute(&self, workflow: &Workflow) -> RunReport {
        let started = Instant::now();
        let executed_at = Local::now();
        let mut results = Vec::with_capacity(workflow.steps.len());
        let mut cancelled = false;

        tracing::debug!(
            workflow = %workflow.name,
            steps = workflow.steps.len(),
            "starting workflow"
        );

        for step in &workflow.steps {
            if self.is_cancelled() {
                cancelled = true;
                self.logger.log(
                    &format!("workflow '{}' cancelled before step {}", workflow.name, step.id),
                    LogLevel::Warn,
                );
                break;
            }

            let result = self.run_step(step).await;
            match &result.outcome {
                StepOutcome::Completed { .. } => self.logger.log(
                    &format!(
                        "step {} ({}) completed in {:.1}s",
                        step.id,
                        step.kind,
                        result.duration.as_secs_f64()
                    ),
                    LogLevel::Info,
                ),
                StepOutcome::Failed { error } => self
                    .logger
                    .log(&format!("error in step {}: {}", step.id, error), LogLevel::Error),
            }

            let failed = !result.is_success();
            results.push(result);
            if failed {
                break;
            }
        }

        let report = RunReport::new(
            workflow.name.clone(),
            workflow.steps.len(),
            started.elapsed(),
            results,
            executed_at,
        )
        .with_cancelled(cancelled);

        if report.is_success() {
            self.logger.log(
                &format!(
                    "workflow '{}' completed in {:.1}s",
                    workflow.name,
                    report.total_duration().as_secs_f64()
                ),
                LogLevel::Success,
            );
        } else {
            tracing::debug!(workflow = %workflow.name, summary = %report.describe(), "workflow failed");
        }

        report
    }

    /// Dispatch one step on its own task so a panicking handler only fails
    /// that step
    async fn run_step(&self, step: &Step) -> StepResult {
        let start = Instant::now();
        let dispatcher = Arc::clone(&self.dispatcher);
        let owned = step.clone();

        let joined = tokio::spawn(async move { dispatcher.dispatch(&owned).await }).await;
        let duration = start.elapsed();

        match joined {
            Ok(Ok(summary)) => StepResult::completed(step, duration, summary),
            Ok(Err(e)) => StepResult::failed(step, duration, e.to_string()),
            Err(e) => StepResult::failed(step, duration, describe_join_error(e)),
        }
    }
}

fn describe_join_error(error: JoinError) -> String {
    if !error.is_panic() {
        return "step task was cancelled".to_string();
    }
    let payload: Box<dyn Any + Send> = error.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("handler panicked: {message}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MAX_WAIT_SECS, StepKind, StepParams};
    use crate::handlers::{
        FileOperations, HandlerResult, LocalFileOperations, Outcome, TransferMode,
    };
    use crate::logbook::LogBook;
    use crate::logging::LogOptions;
    use crate::logging::tests::{Capture, capturing_subscriber};
    use crate::workflow::dispatch::tests::{EchoScripts, MockWeb, mock_dispatcher};
    use crate::workflow::report::{RunStatus, StepStatus};
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;

    fn engine_with_log(dispatcher: StepDispatcher) -> (WorkflowEngine, Arc<LogBook>) {
        let book = Arc::new(LogBook::new(100));
        let engine = WorkflowEngine::new(dispatcher).with_logger(book.clone());
        (engine, book)
    }

    fn simulated(count: usize) -> Workflow {
        let mut workflow = Workflow::new("simulated");
        for i in 0..count {
            workflow.push_step(
                StepKind::SendEmail,
                format!("email {i}"),
                StepParams::new(),
            );
        }
        workflow
    }

    /// Logger that cancels the run once the first step has completed
    struct CancelAfterFirstStep {
        token: CancellationToken,
        book: LogBook,
    }

    impl RunLogger for CancelAfterFirstStep {
        fn log(&self, message: &str, level: LogLevel) {
            if level == LogLevel::Info {
                self.token.cancel();
            }
            self.book.log(message, level);
        }
    }

    /// File handler that panics
    struct PanickingFiles;

    #[async_trait]
    impl FileOperations for PanickingFiles {
        async fn copy_or_move(
            &self,
            _source_dir: &str,
            _dest_dir: &str,
            _extension: Option<&str>,
            _mode: TransferMode,
        ) -> HandlerResult<String> {
            panic!("disk exploded");
        }
    }

    #[tokio::test]
    async fn test_empty_workflow_succeeds() {
        let (engine, book) = engine_with_log(mock_dispatcher());
        let report = engine.execute(&Workflow::new("empty")).await;

        assert_eq!(report.status(), RunStatus::Success);
        assert!(report.steps_results().is_empty());
        assert!(report.total_duration() < Duration::from_secs(1));
        assert_eq!(book.entries(Some(LogLevel::Success), 10).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequential_simulated_steps() {
        let (engine, book) = engine_with_log(mock_dispatcher());
        let report = engine.execute(&simulated(3)).await;

        assert_eq!(report.status(), RunStatus::Success);
        let ids: Vec<u32> = report.steps_results().iter().map(|r| r.step_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        for result in report.steps_results() {
            assert_eq!(result.status(), StepStatus::Success);
            assert!(result.duration >= Duration::from_millis(10));
            assert_eq!(result.result(), Some("step 'send_email' executed (simulated)"));
        }
        assert!(report.total_duration() >= Duration::from_millis(30));

        let info = book.entries(Some(LogLevel::Info), 10);
        assert_eq!(info.len(), 3);
        assert_eq!(info[2].message, "step 1 (send_email) completed in 0.0s");
    }

    #[tokio::test]
    async fn test_fail_fast_on_missing_source() {
        let out = TempDir::new().unwrap();
        let dispatcher = StepDispatcher::new(
            Arc::new(LocalFileOperations::new()),
            Arc::new(MockWeb::replying(Outcome::Success(String::new()))),
            Arc::new(EchoScripts),
        )
        .with_simulation_delay(Duration::ZERO);
        let (engine, book) = engine_with_log(dispatcher);

        let mut workflow = Workflow::new("pipeline");
        workflow.push_step(StepKind::RenameFiles, "prepare", StepParams::new());
        workflow.push_step(
            StepKind::CopyFiles,
            "copy invoices",
            StepParams::new()
                .with("source", "/nonexistent/rpaflow/invoices")
                .with("destination", out.path().to_str().unwrap()),
        );
        workflow.push_step(StepKind::Wait, "pause", StepParams::new().with("seconds", 1));
        workflow.push_step(StepKind::SendEmail, "notify", StepParams::new());

        let report = engine.execute(&workflow).await;

        assert_eq!(report.status(), RunStatus::Failure);
        assert_eq!(report.steps_results().len(), 2);
        assert_eq!(report.steps_results()[0].status(), StepStatus::Success);
        assert_eq!(report.steps_results()[1].status(), StepStatus::Failure);
        assert_eq!(
            report.steps_results()[1].error(),
            Some("source folder not found: /nonexistent/rpaflow/invoices")
        );
        assert_eq!(
            report.describe(),
            "step 2 of 4 failed: source folder not found: /nonexistent/rpaflow/invoices"
        );

        let errors = book.entries(Some(LogLevel::Error), 10);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.starts_with("error in step 2: "));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_is_clamped() {
        let (engine, _book) = engine_with_log(mock_dispatcher());
        let mut workflow = Workflow::new("long wait");
        workflow.push_step(StepKind::Wait, "", StepParams::new().with("seconds", 9999));

        let start = Instant::now();
        let report = engine.execute(&workflow).await;

        assert!(report.is_success());
        assert!(start.elapsed() <= Duration::from_secs_f64(MAX_WAIT_SECS + 1.0));
        assert_eq!(report.steps_results()[0].result(), Some("waited 9999s"));
    }

    #[tokio::test]
    async fn test_unknown_kind_is_simulated() {
        let (engine, _book) = engine_with_log(mock_dispatcher());
        let mut workflow = Workflow::new("future");
        workflow.push_step(StepKind::parse("teleport_files"), "", StepParams::new());

        let report = engine.execute(&workflow).await;

        assert!(report.is_success());
        assert_eq!(
            report.steps_results()[0].result(),
            Some("step 'teleport_files' executed (simulated)")
        );
    }

    #[tokio::test]
    async fn test_panicking_handler_becomes_failure() {
        let dispatcher = StepDispatcher::new(
            Arc::new(PanickingFiles),
            Arc::new(MockWeb::replying(Outcome::Success(String::new()))),
            Arc::new(EchoScripts),
        )
        .with_simulation_delay(Duration::ZERO);
        let (engine, _book) = engine_with_log(dispatcher);

        let mut workflow = Workflow::new("fragile");
        workflow.push_step(
            StepKind::MoveFiles,
            "",
            StepParams::new().with("source", "/a").with("destination", "/b"),
        );
        workflow.push_step(StepKind::SendEmail, "", StepParams::new());

        let report = engine.execute(&workflow).await;

        assert_eq!(report.status(), RunStatus::Failure);
        assert_eq!(report.steps_results().len(), 1);
        assert_eq!(
            report.steps_results()[0].error(),
            Some("handler panicked: disk exploded")
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let (engine, book) = engine_with_log(mock_dispatcher());
        let engine = engine.with_cancellation(token);

        let report = engine.execute(&simulated(2)).await;

        assert!(report.cancelled());
        assert!(report.steps_results().is_empty());
        assert_eq!(report.status(), RunStatus::Failure);
        assert_eq!(report.describe(), "cancelled after 0 of 2 steps");
        assert_eq!(book.entries(Some(LogLevel::Warn), 10).len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_between_steps() {
        let token = CancellationToken::new();
        let logger = Arc::new(CancelAfterFirstStep {
            token: token.clone(),
            book: LogBook::new(10),
        });
        let engine = WorkflowEngine::new(mock_dispatcher())
            .with_logger(logger.clone())
            .with_cancellation(token);

        let report = engine.execute(&simulated(3)).await;

        assert!(report.cancelled());
        assert_eq!(report.steps_results().len(), 1);
        assert_eq!(report.steps_results()[0].step_id, 1);
        assert_eq!(report.status(), RunStatus::Failure);
        assert_eq!(report.describe(), "cancelled after 1 of 3 steps");

        let warnings = logger.book.entries(Some(LogLevel::Warn), 10);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].message, "workflow 'simulated' cancelled before step 2");
    }

    #[tokio::test]
    async fn test_tracing_logger_passes_crate_filter() {
        let capture = Capture::default();
        let _guard = tracing::subscriber::set_default(capturing_subscriber(
            &LogOptions::default(),
            &capture,
        ));

        let engine = WorkflowEngine::new(mock_dispatcher());
        let mut workflow = simulated(1);
        workflow.push_step(StepKind::MoveFiles, "no source", StepParams::new());

        let report = engine.execute(&workflow).await;
        assert!(!report.is_success());

        let output = capture.contents();
        assert!(output.contains("step 1 (send_email) completed"), "{output}");
        assert!(output.contains("error in step 2: "), "{output}");
    }

    #[tokio::test]
    async fn test_engine_does_not_mutate_workflow() {
        let (engine, _book) = engine_with_log(mock_dispatcher());
        let workflow = simulated(2);
        let before = workflow.steps.clone();

        let first = engine.execute(&workflow).await;
        let second = engine.execute(&workflow).await;

        assert_eq!(workflow.steps, before);
        assert_eq!(first.steps_results().len(), second.steps_results().len());
    }
}
