mod cli;
mod config;
mod handlers;
mod logbook;
mod logging;
mod workflow;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rpaflow")]
#[command(about = "Run RPA workflows - ordered file, web and script steps", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project directory (defaults to current)
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Extra configuration file, applied last
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,

    /// Suppress normal output
    #[arg(long, global = true)]
    quiet: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Write logs to a timestamped file under the config directory
    #[arg(long, global = true, conflicts_with = "log_file")]
    log: bool,

    /// Output format: console, json or quiet
    #[arg(long, global = true, default_value = "console")]
    output: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one or more workflows in order
    Run {
        /// Workflow names or paths
        #[arg(required = true)]
        workflows: Vec<String>,
    },

    /// Validate a workflow without running it
    Validate {
        /// Workflow name or path
        workflow: String,
    },

    /// Create a workflow file with placeholder steps
    New {
        /// Workflow display name; the file name is derived from it
        name: String,

        /// Step kind to add, repeatable and kept in order
        #[arg(long = "step", value_name = "KIND")]
        steps: Vec<String>,

        /// Replace an existing workflow file
        #[arg(long)]
        force: bool,
    },

    /// List step kinds and their parameters
    Kinds,

    /// List available workflows
    Workflows,
}

impl Cli {
    fn log_target(&self) -> Result<Option<PathBuf>> {
        if !self.log {
            return Ok(self.log_file.clone());
        }
        let name = match &self.command {
            Commands::Run { workflows } if workflows.len() == 1 => workflows[0].as_str(),
            _ => "rpaflow",
        };
        logging::default_log_path(name).map(Some)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mode = if cli.quiet {
        cli::OutputMode::Quiet
    } else {
        cli::OutputMode::from_str(&cli.output)
    };

    let log_guard = logging::init_logging(logging::LogOptions {
        debug: cli.debug,
        quiet: cli.quiet,
        json: mode == cli::OutputMode::Json,
        file: cli.log_target()?,
    })?;
    let handler = cli::create_handler(mode, cli.debug);

    let project_dir = cli.dir.as_deref();

    let exit_code = match &cli.command {
        Commands::Run { workflows } => {
            let config = config::AppConfig::load(project_dir, cli.config.as_deref())?;

            let token = cli::CancellationToken::new();
            tokio::spawn(cli::setup_signal_handlers(token.clone()));

            match cli::run_workflows(workflows, project_dir, &config, token, &*handler).await {
                Ok(code) => code,
                Err(e) => {
                    handler.emit(cli::OutputEvent::WorkflowError { error: e });
                    1
                }
            }
        }

        Commands::Validate { workflow } => cli::validate_workflow(workflow, project_dir, &*handler),

        Commands::New { name, steps, force } => {
            cli::new_workflow(name, steps, project_dir, *force, &*handler)
        }

        Commands::Kinds => {
            cli::list_kinds(&*handler);
            0
        }

        Commands::Workflows => {
            cli::list_workflow_files(project_dir, &*handler);
            0
        }
    };

    if exit_code != 0 {
        // Flush the file writer before exiting
        drop(log_guard);
        std::process::exit(exit_code);
    }

    Ok(())
}
