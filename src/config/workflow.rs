//! Workflow and step definitions

use chrono::{DateTime, Local};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

/// Upper bound for a wait step, whatever the workflow asks for
pub const MAX_WAIT_SECS: f64 = 10.0;

/// Wait used when a wait step has no `seconds` parameter
pub const DEFAULT_WAIT_SECS: f64 = 5.0;

/// Accept a requested wait only if it is finite and not negative
pub fn check_wait_secs(secs: f64) -> Result<f64, String> {
    if secs.is_finite() && secs >= 0.0 {
        Ok(secs)
    } else {
        Err(format!("{secs} is not a finite, non-negative number of seconds"))
    }
}

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("static regex is valid"));

/// Step kind - a closed set of tags plus a fallback for anything unrecognised
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum StepKind {
    /// Copy files between folders
    CopyFiles,
    /// Move files between folders
    MoveFiles,
    /// Batch rename files
    RenameFiles,
    /// Extract text from a web page
    ExtractWeb,
    /// Read or transform a spreadsheet
    ProcessSpreadsheet,
    /// Merge several CSV files
    ConsolidateCsv,
    /// Send an email
    SendEmail,
    /// Extract text from a PDF
    ExtractPdfText,
    /// Merge PDFs
    MergePdfs,
    /// Sleep for a bounded number of seconds
    Wait,
    /// Evaluate a user supplied script in the sandbox
    CustomScript,
    /// Anything else; kept verbatim and run as a simulation
    Other(String),
}

impl StepKind {
    /// All recognised kinds, in display order
    pub fn known() -> [StepKind; 11] {
        [
            StepKind::CopyFiles,
            StepKind::MoveFiles,
            StepKind::RenameFiles,
            StepKind::ExtractWeb,
            StepKind::ProcessSpreadsheet,
            StepKind::ConsolidateCsv,
            StepKind::SendEmail,
            StepKind::ExtractPdfText,
            StepKind::MergePdfs,
            StepKind::Wait,
            StepKind::CustomScript,
        ]
    }

    /// Parse a kind tag. Never fails: unknown tags become `Other`.
    pub fn parse(raw: &str) -> Self {
        let lowered = raw.trim().to_lowercase();
        let normalized = NON_ALNUM.replace_all(&lowered, "_");
        match normalized.trim_matches('_') {
            "copy_files" | "copy" => StepKind::CopyFiles,
            "move_files" | "move" => StepKind::MoveFiles,
            "rename_files" | "rename" => StepKind::RenameFiles,
            "extract_web" | "web" | "scrape" => StepKind::ExtractWeb,
            "process_spreadsheet" | "spreadsheet" => StepKind::ProcessSpreadsheet,
            "consolidate_csv" => StepKind::ConsolidateCsv,
            "send_email" | "email" => StepKind::SendEmail,
            "extract_pdf_text" => StepKind::ExtractPdfText,
            "merge_pdfs" => StepKind::MergePdfs,
            "wait" | "delay" => StepKind::Wait,
            "custom_script" | "script" => StepKind::CustomScript,
            _ => StepKind::Other(raw.to_string()),
        }
    }

    /// Canonical tag
    pub fn as_str(&self) -> &str {
        match self {
            StepKind::CopyFiles => "copy_files",
            StepKind::MoveFiles => "move_files",
            StepKind::RenameFiles => "rename_files",
            StepKind::ExtractWeb => "extract_web",
            StepKind::ProcessSpreadsheet => "process_spreadsheet",
            StepKind::ConsolidateCsv => "consolidate_csv",
            StepKind::SendEmail => "send_email",
            StepKind::ExtractPdfText => "extract_pdf_text",
            StepKind::MergePdfs => "merge_pdfs",
            StepKind::Wait => "wait",
            StepKind::CustomScript => "custom_script",
            StepKind::Other(raw) => raw,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, StepKind::Other(_))
    }

    /// Whether the engine runs a real handler for this kind (the rest are simulated)
    pub fn is_executed(&self) -> bool {
        matches!(
            self,
            StepKind::CopyFiles
                | StepKind::MoveFiles
                | StepKind::ExtractWeb
                | StepKind::Wait
                | StepKind::CustomScript
        )
    }

    /// Parameters that must be present for the step to do anything useful
    pub fn required_parameters(&self) -> &'static [&'static str] {
        match self {
            StepKind::CopyFiles | StepKind::MoveFiles => &["source", "destination"],
            StepKind::ExtractWeb => &["url"],
            _ => &[],
        }
    }

    pub fn optional_parameters(&self) -> &'static [&'static str] {
        match self {
            StepKind::CopyFiles | StepKind::MoveFiles => &["extension"],
            StepKind::ExtractWeb => &["selector"],
            StepKind::Wait => &["seconds"],
            StepKind::CustomScript => &["code"],
            _ => &[],
        }
    }
}

impl From<String> for StepKind {
    fn from(raw: String) -> Self {
        StepKind::parse(&raw)
    }
}

impl From<StepKind> for String {
    fn from(kind: StepKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named step parameters
///
/// Values keep their JSON shape; blank strings read as absent, matching what
/// an empty form field means to the person building the workflow.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct StepParams(Map<String, Value>);

impl StepParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Non-blank string parameter
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    /// Numeric parameter
    ///
    /// `None` when absent or blank, `Some(Err(_))` when present but not a number.
    pub fn number(&self, name: &str) -> Option<Result<f64, String>> {
        match self.0.get(name)? {
            Value::Null => None,
            Value::Number(n) => Some(
                n.as_f64()
                    .ok_or_else(|| format!("'{}' is out of range", n)),
            ),
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(
                s.trim()
                    .parse::<f64>()
                    .map_err(|_| format!("'{}' is not a number", s)),
            ),
            other => Some(Err(format!("expected a number, got {}", other))),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One unit of work inside a workflow
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    /// 1-based ordinal position; 0 in a file means "assign by position"
    #[serde(default)]
    pub id: u32,

    /// Which handler runs this step
    pub kind: StepKind,

    /// Display text
    #[serde(default)]
    pub description: String,

    /// Handler parameters
    #[serde(default, skip_serializing_if = "StepParams::is_empty")]
    pub parameters: StepParams,
}

impl Step {
    pub fn new(
        id: u32,
        kind: StepKind,
        description: impl Into<String>,
        parameters: StepParams,
    ) -> Self {
        Self {
            id,
            kind,
            description: description.into(),
            parameters,
        }
    }

    /// Description, or the kind tag when the description is blank
    pub fn label(&self) -> &str {
        if self.description.trim().is_empty() {
            self.kind.as_str()
        } else {
            &self.description
        }
    }
}

fn new_workflow_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// An ordered, named sequence of steps
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Workflow {
    /// Opaque identifier
    #[serde(default = "new_workflow_id")]
    pub id: String,

    /// Display name
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Creation time (RFC 3339 string in files)
    #[serde(default = "Local::now")]
    pub created_at: DateTime<Local>,

    /// Steps in execution order
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Workflow {
    /// Create an empty workflow
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_workflow_id(),
            name: name.into(),
            description: String::new(),
            created_at: Local::now(),
            steps: Vec::new(),
        }
    }

    /// Append a step, giving it the next ordinal id
    pub fn push_step(
        &mut self,
        kind: StepKind,
        description: impl Into<String>,
        parameters: StepParams,
    ) -> u32 {
        let id = self.steps.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        self.steps.push(Step::new(id, kind, description, parameters));
        id
    }

    /// Builder-style `push_step`
    pub fn with_step(
        mut self,
        kind: StepKind,
        description: impl Into<String>,
        parameters: StepParams,
    ) -> Self {
        self.push_step(kind, description, parameters);
        self
    }

    /// Give every step without an id its 1-based position
    pub fn assign_step_ids(&mut self) {
        for (idx, step) in self.steps.iter_mut().enumerate() {
            if step.id == 0 {
                step.id = idx as u32 + 1;
            }
        }
    }

    /// Check the workflow before it is saved or run
    ///
    /// The engine itself accepts anything; this is for the people building
    /// workflows, so unknown kinds only produce warnings.
    pub fn validate(&self) -> Validation {
        let mut validation = Validation::default();

        let mut seen_ids = HashSet::new();
        for step in &self.steps {
            if !seen_ids.insert(step.id) {
                validation.errors.push(format!("duplicate step id: {}", step.id));
            }
        }

        for step in &self.steps {
            for name in step.kind.required_parameters() {
                if step.parameters.text(name).is_none() {
                    validation.errors.push(format!(
                        "step {} ({}) missing '{}' parameter",
                        step.id, step.kind, name
                    ));
                }
            }

            match &step.kind {
                StepKind::Wait => match step
                    .parameters
                    .number("seconds")
                    .map(|secs| secs.and_then(check_wait_secs))
                {
                    Some(Err(reason)) => validation
                        .errors
                        .push(format!("step {}: invalid 'seconds': {}", step.id, reason)),
                    Some(Ok(secs)) if secs > MAX_WAIT_SECS => validation.warnings.push(format!(
                        "step {}: wait of {}s will be clamped to {}s",
                        step.id, secs, MAX_WAIT_SECS
                    )),
                    _ => {}
                },
                StepKind::Other(raw) => validation.warnings.push(format!(
                    "step {}: unrecognised kind '{}' will run as a simulation",
                    step.id, raw
                )),
                kind if !kind.is_executed() => validation.warnings.push(format!(
                    "step {}: '{}' steps are simulated",
                    step.id, kind
                )),
                _ => {}
            }
        }

        validation
    }
}

/// Outcome of `Workflow::validate`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Validation {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}
