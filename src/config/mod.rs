//! Configuration types and loading for rpaflow

mod loader;
mod workflow;

pub use loader::{
    AppConfig, ScriptSettings, WebSettings, find_workflow, list_workflows,
    load_workflow, read_workflow_file, save_workflow,
};
pub use workflow::{
    DEFAULT_WAIT_SECS, MAX_WAIT_SECS, Step, StepKind, StepParams, Workflow, check_wait_secs,
};
