//! Execution history kept by the caller of the engine

use super::report::{RunReport, RunStatus};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// One recorded run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub id: String,
    pub workflow_name: String,
    pub status: RunStatus,
    pub duration: Duration,
    pub executed_at: DateTime<Local>,
    pub details: String,
}

/// Counts over the recorded runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    pub total: usize,
    pub successes: usize,
    pub failures: usize,
}

impl HistoryStats {
    /// Percentage of successful runs, 0 when nothing ran
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.successes as f64 * 100.0 / self.total as f64
        }
    }
}

/// Bounded list of past runs, newest first
#[derive(Debug, Clone)]
pub struct ExecutionHistory {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl ExecutionHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    /// Record a finished run, dropping the oldest entry when full
    pub fn record(&mut self, report: &RunReport) -> &HistoryEntry {
        let mut id = uuid::Uuid::new_v4().simple().to_string();
        id.truncate(8);

        self.entries.push_front(HistoryEntry {
            id,
            workflow_name: report.workflow_name().to_string(),
            status: report.status(),
            duration: report.total_duration(),
            executed_at: report.executed_at(),
            details: report.describe(),
        });
        self.entries.truncate(self.capacity.max(1));

        &self.entries[0]
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn stats(&self) -> HistoryStats {
        let successes = self
            .entries
            .iter()
            .filter(|e| e.status.is_success())
            .count();
        HistoryStats {
            total: self.entries.len(),
            successes,
            failures: self.entries.len() - successes,
        }
    }
}

impl Default for ExecutionHistory {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Step, StepKind, StepParams};
    use crate::workflow::report::StepResult;

    fn report(name: &str, ok: bool) -> RunReport {
        let step = Step::new(1, StepKind::Wait, "", StepParams::new());
        let result = if ok {
            StepResult::completed(&step, Duration::from_millis(20), "waited 0s")
        } else {
            StepResult::failed(&step, Duration::from_millis(20), "boom")
        };
        RunReport::new(name, 1, Duration::from_millis(20), vec![result], Local::now())
    }

    #[test]
    fn test_record_newest_first() {
        let mut history = ExecutionHistory::default();
        history.record(&report("first", true));
        let entry = history.record(&report("second", false));

        assert_eq!(entry.workflow_name, "second");
        assert_eq!(entry.status, RunStatus::Failure);
        assert_eq!(entry.details, "step 1 of 1 failed: boom");
        assert_eq!(entry.id.len(), 8);

        let names: Vec<_> = history.entries().map(|e| e.workflow_name.as_str()).collect();
        assert_eq!(names, vec!["second", "first"]);
    }

    #[test]
    fn test_capacity() {
        let mut history = ExecutionHistory::new(2);
        for name in ["a", "b", "c"] {
            history.record(&report(name, true));
        }

        let names: Vec<_> = history.entries().map(|e| e.workflow_name.as_str()).collect();
        assert_eq!(names, vec!["c", "b"]);
    }

    #[test]
    fn test_stats() {
        let mut history = ExecutionHistory::default();
        assert_eq!(history.stats(), HistoryStats::default());
        assert_eq!(history.stats().success_rate(), 0.0);

        history.record(&report("a", true));
        history.record(&report("b", true));
        history.record(&report("c", false));
        history.record(&report("d", true));

        let stats = history.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.successes, 3);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.success_rate(), 75.0);
    }
}
