//! Output handlers for CLI commands
//!
//! Supports console (pretty), JSON, and quiet output modes.

use crate::workflow::{HistoryStats, RunReport};
use serde::Serialize;

/// Output mode for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Console,
    Json,
    Quiet,
}

impl OutputMode {
    /// Parse from string
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "quiet" => Self::Quiet,
            _ => Self::Console,
        }
    }
}

/// Events emitted by CLI commands
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum OutputEvent {
    WorkflowStart {
        name: String,
        steps: usize,
    },
    StepComplete {
        step_id: u32,
        kind: String,
        duration_ms: u64,
        success: bool,
        detail: String,
    },
    WorkflowComplete {
        name: String,
        success: bool,
        duration_ms: u64,
        steps_completed: usize,
        steps_total: usize,
        summary: String,
    },
    HistoryStats {
        total: usize,
        successes: usize,
        failures: usize,
        success_rate: f64,
    },
    WorkflowError {
        error: String,
    },
    Info {
        message: String,
    },
    Debug {
        message: String,
    },
}

/// Events describing a finished run, one per attempted step plus a summary
pub fn report_events(report: &RunReport) -> Vec<OutputEvent> {
    let mut events: Vec<OutputEvent> = report
        .steps_results()
        .iter()
        .map(|r| OutputEvent::StepComplete {
            step_id: r.step_id,
            kind: r.kind.to_string(),
            duration_ms: r.duration.as_millis() as u64,
            success: r.is_success(),
            detail: r.result().or(r.error()).unwrap_or_default().to_string(),
        })
        .collect();

    events.push(OutputEvent::WorkflowComplete {
        name: report.workflow_name().to_string(),
        success: report.is_success(),
        duration_ms: report.total_duration().as_millis() as u64,
        steps_completed: report.completed_steps(),
        steps_total: report.step_count(),
        summary: report.describe(),
    });

    events
}

impl From<HistoryStats> for OutputEvent {
    fn from(stats: HistoryStats) -> Self {
        OutputEvent::HistoryStats {
            total: stats.total,
            successes: stats.successes,
            failures: stats.failures,
            success_rate: stats.success_rate(),
        }
    }
}

/// Output handler trait
pub trait OutputHandler: Send + Sync {
    /// Emit an event
    fn emit(&self, event: OutputEvent);

    /// Render a finished run
    fn report(&self, report: &RunReport) {
        for event in report_events(report) {
            self.emit(event);
        }
    }
}

/// Console output handler
pub struct ConsoleHandler {
    debug: bool,
}

impl ConsoleHandler {
    /// Create a new console handler
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    fn format_duration(ms: u64) -> String {
        if ms < 1000 {
            format!("{}ms", ms)
        } else {
            format!("{:.1}s", ms as f64 / 1000.0)
        }
    }

    /// Render an event as console lines
    fn render(&self, event: OutputEvent) -> Option<String> {
        let line = match event {
            OutputEvent::WorkflowStart { name, steps } => {
                format!("Running workflow '{}' ({} steps)", name, steps)
            }
            OutputEvent::StepComplete {
                step_id,
                kind,
                duration_ms,
                success,
                detail,
            } => {
                let mark = if success { "✓" } else { "✗" };
                format!(
                    "  {} [{}] {} ({}) {}",
                    mark,
                    step_id,
                    kind,
                    Self::format_duration(duration_ms),
                    detail
                )
            }
            OutputEvent::WorkflowComplete {
                name,
                success,
                duration_ms,
                summary,
                ..
            } => {
                let mark = if success { "✓" } else { "✗" };
                format!(
                    "{} Workflow '{}': {} ({})\n",
                    mark,
                    name,
                    summary,
                    Self::format_duration(duration_ms)
                )
            }
            OutputEvent::HistoryStats {
                total,
                successes,
                failures,
                success_rate,
            } => format!(
                "{} run(s): {} succeeded, {} failed ({:.0}%)",
                total, successes, failures, success_rate
            ),
            OutputEvent::WorkflowError { error } => format!("Error: {}", error),
            OutputEvent::Info { message } => message,
            OutputEvent::Debug { message } => {
                if !self.debug {
                    return None;
                }
                format!("[debug] {}", message)
            }
        };
        Some(line)
    }
}

impl OutputHandler for ConsoleHandler {
    fn emit(&self, event: OutputEvent) {
        if let Some(line) = self.render(event) {
            eprintln!("{}", line);
        }
    }
}

/// JSON output handler
pub struct JsonHandler {
    pretty: bool,
}

impl JsonHandler {
    /// Create a new JSON handler
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn print_json<T: Serialize>(&self, value: &T) {
        let json = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };

        if let Ok(s) = json {
            println!("{}", s);
        }
    }
}

impl OutputHandler for JsonHandler {
    fn emit(&self, event: OutputEvent) {
        self.print_json(&event);
    }

    fn report(&self, report: &RunReport) {
        self.print_json(report);
    }
}

/// Quiet handler that only reports errors
pub struct QuietHandler;

impl OutputHandler for QuietHandler {
    fn emit(&self, event: OutputEvent) {
        if let OutputEvent::WorkflowError { error } = event {
            eprintln!("Error: {}", error);
        }
    }

    fn report(&self, _report: &RunReport) {}
}

/// Create an output handler based on mode
pub fn create_handler(mode: OutputMode, debug: bool) -> Box<dyn OutputHandler> {
    match mode {
        OutputMode::Console => Box::new(ConsoleHandler::new(debug)),
        OutputMode::Json => Box::new(JsonHandler::new(true)),
        OutputMode::Quiet => Box::new(QuietHandler),
    }
}
