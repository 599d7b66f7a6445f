use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Logging options collected from the command line
#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub debug: bool,
    pub quiet: bool,
    /// Emit stderr logs as JSON lines, to match `--output json`
    pub json: bool,
    pub file: Option<PathBuf>,
}

impl LogOptions {
    /// Level filter for this crate's events; other crates stay silent
    pub(crate) fn filter(&self) -> EnvFilter {
        let level = if self.debug {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        };
        EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), level))
    }
}

/// Install the global subscriber
///
/// The returned guard flushes the log file on drop and must live as long as
/// the process.
pub fn init_logging(options: LogOptions) -> anyhow::Result<Option<WorkerGuard>> {
    let stderr_layer = if options.json {
        fmt::layer()
            .json()
            .with_current_span(false)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_line_number(options.debug)
            .with_file(options.debug)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let (file_layer, guard) = match &options.file {
        Some(log_path) => {
            if let Some(parent) = log_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);

            let layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_line_number(true)
                .with_file(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(options.filter())
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Default log file for a run of `workflow_name`
pub fn default_log_path(workflow_name: &str) -> anyhow::Result<PathBuf> {
    let log_dir = dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
        .join("rpaflow")
        .join("logs");

    let slug: String = workflow_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let timestamp = chrono::Local::now().format("%Y%m%d-%H%M%S");

    Ok(log_dir.join(format!("{}-{}.log", slug, timestamp)))
}
