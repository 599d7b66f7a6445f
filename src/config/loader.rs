//! Configuration loading with multi-layer merge

use super::Workflow;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory name used for project and user configuration
const APP_DIR: &str = "rpaflow";

/// Project-local configuration directory
const PROJECT_DIR: &str = ".rpaflow";

/// Top-level rpaflow configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub web: WebSettings,

    #[serde(default)]
    pub scripts: ScriptSettings,

    #[serde(default)]
    pub history: HistorySettings,

    #[serde(default)]
    pub logbook: LogbookSettings,
}

/// Engine behaviour
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineSettings {
    /// Pause for simulated steps, in milliseconds
    #[serde(default = "default_simulation_delay")]
    pub simulation_delay_ms: u64,
}

fn default_simulation_delay() -> u64 {
    300
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            simulation_delay_ms: default_simulation_delay(),
        }
    }
}

/// Web extraction settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WebSettings {
    /// Request timeout in seconds
    #[serde(default = "default_web_timeout")]
    pub timeout_secs: u64,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_web_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("rpaflow/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_web_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Custom script sandbox settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptSettings {
    /// Whether custom script steps may run at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Evaluation budget for a single script
    #[serde(default = "default_fuel")]
    pub fuel: u64,
}

fn default_true() -> bool {
    true
}

fn default_fuel() -> u64 {
    50_000
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            fuel: default_fuel(),
        }
    }
}

/// Execution history settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HistorySettings {
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
}

fn default_history_capacity() -> usize {
    100
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            capacity: default_history_capacity(),
        }
    }
}

/// In-memory log settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogbookSettings {
    #[serde(default = "default_logbook_capacity")]
    pub capacity: usize,
}

fn default_logbook_capacity() -> usize {
    500
}

impl Default for LogbookSettings {
    fn default() -> Self {
        Self {
            capacity: default_logbook_capacity(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the standard hierarchy
    ///
    /// Load order (later overrides earlier):
    /// 1. Built-in defaults
    /// 2. ~/.config/rpaflow/config.toml
    /// 3. .rpaflow/config.toml (project)
    /// 4. An explicit file, if given
    pub fn load(project_dir: Option<&Path>, explicit: Option<&Path>) -> Result<Self> {
        let mut layers = Vec::new();
        if let Some(user_config_path) = Self::user_config_path() {
            if user_config_path.exists() {
                layers.push(user_config_path);
            }
        }

        let project_config_path = project_root(project_dir).join("config.toml");
        if project_config_path.exists() {
            layers.push(project_config_path);
        }

        if let Some(path) = explicit {
            layers.push(path.to_path_buf());
        }

        let mut merged = toml::Table::new();
        for path in &layers {
            let layer =
                read_layer(path).with_context(|| format!("loading {}", path.display()))?;
            merge_tables(&mut merged, layer);
        }

        toml::Value::Table(merged)
            .try_into()
            .context("combining configuration layers")
    }

    /// Get the user config path (~/.config/rpaflow/config.toml)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR).join("config.toml"))
    }
}

/// Read one config layer as a raw table
///
/// The layer is also checked against `AppConfig` on its own, so typos are
/// reported against the file that contains them.
fn read_layer(path: &Path) -> Result<toml::Table> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let table: toml::Table =
        toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;

    toml::Value::Table(table.clone())
        .try_into::<AppConfig>()
        .with_context(|| format!("invalid settings in {}", path.display()))?;

    Ok(table)
}

/// Merge `layer` over `base`: keys present in the layer win, sections merge key by key
fn merge_tables(base: &mut toml::Table, layer: toml::Table) {
    for (key, value) in layer {
        match value {
            toml::Value::Table(section) => {
                if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                    merge_tables(existing, section);
                } else {
                    base.insert(key, toml::Value::Table(section));
                }
            }
            other => {
                base.insert(key, other);
            }
        }
    }
}

fn project_root(project_dir: Option<&Path>) -> PathBuf {
    project_dir
        .map(|p| p.join(PROJECT_DIR))
        .unwrap_or_else(|| PathBuf::from(PROJECT_DIR))
}

/// Directories searched for workflow files, in priority order
pub fn workflow_dirs(project_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut search = vec![project_root(project_dir).join("workflows")];
    if let Some(user_dir) = dirs::config_dir() {
        search.push(user_dir.join(APP_DIR).join("workflows"));
    }
    search
}

/// Locate a workflow file by path or by name
///
/// Search order (first match wins):
/// 1. `name` itself, if it is an existing file
/// 2. .rpaflow/workflows/{name}.toml (project)
/// 3. ~/.config/rpaflow/workflows/{name}.toml (user)
pub fn find_workflow(name: &str, project_dir: Option<&Path>) -> Result<PathBuf> {
    let direct = PathBuf::from(name);
    if direct.is_file() {
        return Ok(direct);
    }

    let filename = format!("{}.toml", name);
    workflow_dirs(project_dir)
        .into_iter()
        .map(|dir| dir.join(&filename))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| anyhow::anyhow!("workflow '{}' not found", name))
}

/// Load and validate a workflow by path or by name
pub fn load_workflow(name: &str, project_dir: Option<&Path>) -> Result<Workflow> {
    let path = find_workflow(name, project_dir)?;
    load_workflow_file(&path)
}

/// Parse a workflow file and number its steps, without validating it
pub fn read_workflow_file(path: &Path) -> Result<Workflow> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let mut workflow: Workflow =
        toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;

    workflow.assign_step_ids();
    Ok(workflow)
}

/// Read and validate a workflow file
///
/// Warnings are logged; errors fail the load.
pub fn load_workflow_file(path: &Path) -> Result<Workflow> {
    let workflow = read_workflow_file(path)?;

    let validation = workflow.validate();
    for warning in &validation.warnings {
        tracing::warn!(workflow = %workflow.name, "{}", warning);
    }
    if !validation.is_ok() {
        anyhow::bail!(
            "workflow validation failed:\n  {}",
            validation.errors.join("\n  ")
        );
    }

    Ok(workflow)
}

/// Write a workflow into the project's workflow directory as `{stem}.toml`
///
/// An existing file is only replaced when `force` is set.
pub fn save_workflow(
    workflow: &Workflow,
    stem: &str,
    project_dir: Option<&Path>,
    force: bool,
) -> Result<PathBuf> {
    let dir = project_root(project_dir).join("workflows");
    let path = dir.join(format!("{}.toml", stem));
    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to replace it)", path.display());
    }

    let contents = toml::to_string_pretty(workflow)
        .with_context(|| format!("serializing workflow '{}'", workflow.name))?;
    std::fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    std::fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;

    Ok(path)
}

/// Workflow names available in the lookup directories, with their files
pub fn list_workflows(project_dir: Option<&Path>) -> Vec<(String, PathBuf)> {
    let mut found: Vec<(String, PathBuf)> = Vec::new();

    for dir in workflow_dirs(project_dir) {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        let mut in_dir: Vec<(String, PathBuf)> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
            .filter_map(|path| {
                let stem = path.file_stem()?.to_str()?.to_string();
                Some((stem, path))
            })
            .filter(|(name, _)| !found.iter().any(|(seen, _)| seen == name))
            .collect();
        in_dir.sort();
        found.extend(in_dir);
    }

    found
}
