//! Per-step results and the aggregate run report

use crate::config::{Step, StepKind};
use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use std::fmt;
use std::time::Duration;

fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Success or failure of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failure,
}

/// What an attempted step produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status")]
pub enum StepOutcome {
    #[serde(rename = "success")]
    Completed { result: String },

    #[serde(rename = "failure")]
    Failed { error: String },
}

/// Result of one attempted step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    pub step_id: u32,
    pub kind: StepKind,

    /// Wall-clock time spent in the step (seconds when serialized)
    #[serde(serialize_with = "as_secs")]
    pub duration: Duration,

    #[serde(flatten)]
    pub outcome: StepOutcome,
}

impl StepResult {
    pub fn completed(step: &Step, duration: Duration, result: impl Into<String>) -> Self {
        Self {
            step_id: step.id,
            kind: step.kind.clone(),
            duration,
            outcome: StepOutcome::Completed {
                result: result.into(),
            },
        }
    }

    pub fn failed(step: &Step, duration: Duration, error: impl Into<String>) -> Self {
        Self {
            step_id: step.id,
            kind: step.kind.clone(),
            duration,
            outcome: StepOutcome::Failed {
                error: error.into(),
            },
        }
    }

    pub fn status(&self) -> StepStatus {
        match self.outcome {
            StepOutcome::Completed { .. } => StepStatus::Success,
            StepOutcome::Failed { .. } => StepStatus::Failure,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == StepStatus::Success
    }

    /// Success summary, if the step completed
    pub fn result(&self) -> Option<&str> {
        match &self.outcome {
            StepOutcome::Completed { result } => Some(result),
            StepOutcome::Failed { .. } => None,
        }
    }

    /// Failure description, if the step failed
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            StepOutcome::Completed { .. } => None,
            StepOutcome::Failed { error } => Some(error),
        }
    }
}

/// Overall outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failure,
}

impl RunStatus {
    /// Success iff every attempted step succeeded and every step was attempted
    pub fn derive(results: &[StepResult], step_count: usize) -> Self {
        if results.len() == step_count && results.iter().all(StepResult::is_success) {
            RunStatus::Success
        } else {
            RunStatus::Failure
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Success)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => f.write_str("success"),
            RunStatus::Failure => f.write_str("failure"),
        }
    }
}

/// Aggregate record of one workflow execution
///
/// The status is always derived from the step results; there is no way to
/// set it directly.
#[derive(Debug, Clone)]
pub struct RunReport {
    workflow_name: String,
    step_count: usize,
    total_duration: Duration,
    steps_results: Vec<StepResult>,
    executed_at: DateTime<Local>,
    cancelled: bool,
}

impl RunReport {
    pub fn new(
        workflow_name: impl Into<String>,
        step_count: usize,
        total_duration: Duration,
        steps_results: Vec<StepResult>,
        executed_at: DateTime<Local>,
    ) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            step_count,
            total_duration,
            steps_results,
            executed_at,
            cancelled: false,
        }
    }

    /// Mark the run as stopped by a cancellation request
    pub fn with_cancelled(mut self, cancelled: bool) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn total_duration(&self) -> Duration {
        self.total_duration
    }

    pub fn steps_results(&self) -> &[StepResult] {
        &self.steps_results
    }

    pub fn executed_at(&self) -> DateTime<Local> {
        self.executed_at
    }

    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn status(&self) -> RunStatus {
        RunStatus::derive(&self.steps_results, self.step_count)
    }

    pub fn is_success(&self) -> bool {
        self.status().is_success()
    }

    /// The step that aborted the run, if any
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps_results.iter().find(|r| !r.is_success())
    }

    /// Number of steps that completed successfully
    pub fn completed_steps(&self) -> usize {
        self.steps_results.iter().filter(|r| r.is_success()).count()
    }

    /// One-line summary, e.g. "step 3 of 5 failed: <reason>"
    pub fn describe(&self) -> String {
        if let Some(failed) = self.failed_step() {
            let position = self.steps_results.len();
            return format!(
                "step {} of {} failed: {}",
                position,
                self.step_count,
                failed.error().unwrap_or_default()
            );
        }

        if self.steps_results.len() < self.step_count {
            let reason = if self.cancelled { "cancelled" } else { "stopped" };
            return format!(
                "{} after {} of {} steps",
                reason,
                self.steps_results.len(),
                self.step_count
            );
        }

        format!("all {} steps completed", self.step_count)
    }
}

#[derive(Serialize)]
struct ReportView<'a> {
    workflow_name: &'a str,
    status: RunStatus,
    step_count: usize,
    completed_steps: usize,
    #[serde(serialize_with = "as_secs")]
    total_duration: Duration,
    executed_at: DateTime<Local>,
    cancelled: bool,
    steps_results: &'a [StepResult],
}

impl Serialize for RunReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        ReportView {
            workflow_name: &self.workflow_name,
            status: self.status(),
            step_count: self.step_count,
            completed_steps: self.completed_steps(),
            total_duration: self.total_duration,
            executed_at: self.executed_at,
            cancelled: self.cancelled,
            steps_results: &self.steps_results,
        }
        .serialize(serializer)
    }
}
