//! Binary entry point for agentlog.
//!
//! This binary provides the CLI interface for the agentlog activity journal.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use agentlog::cli::{self, RecordTarget};
use agentlog::config::AgentlogConfig;
use agentlog::detector::{FixedProbe, ProcessProbe, SystemProcessProbe};
use agentlog::observability::{self, ObservabilityConfig};
use agentlog::services::MonitorService;
use agentlog::watcher::StopSignal;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// agentlog - journals what coding agents do in your repositories.
#[derive(Parser)]
#[command(name = "agentlog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "AGENTLOG_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by the pipeline commands.
#[derive(Args)]
struct PipelineArgs {
    /// Directory to watch (repeatable); overrides the configured roots.
    #[arg(short, long = "watch-path")]
    watch_paths: Vec<PathBuf>,

    /// Ignore running processes and score on churn alone.
    #[arg(long)]
    no_process_probe: bool,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run the capture pipeline in the foreground until Ctrl-C.
    Run {
        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Serve JSON-RPC requests on stdio.
    Serve {
        /// Also run the capture pipeline in the background.
        #[arg(long)]
        watch: bool,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Show the latest activity score.
    Status,

    /// List known repositories.
    Repos,

    /// Print everything recorded for a repository.
    Show {
        /// Repository id (see `agentlog repos`).
        repo_id: String,
    },

    /// Append a memory entry by hand.
    Record {
        /// Entry kind: attempt, failure or decision.
        kind: String,

        /// Entry text.
        text: String,

        /// Repository id.
        #[arg(long, conflicts_with = "path", required_unless_present = "path")]
        repo_id: Option<String>,

        /// Path inside the repository.
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Print the repository id enclosing a path.
    Resolve {
        /// Path to resolve.
        path: PathBuf,
    },

    /// Print the effective configuration.
    Config,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let mut observability_config = ObservabilityConfig::from_config(&config, cli.verbose);
    observability_config.metrics_expose =
        matches!(cli.command, Commands::Run { .. } | Commands::Serve { .. });
    let _observability = match observability::init(observability_config) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(cli: Cli, mut config: AgentlogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Commands::Run { pipeline } => {
            let service = pipeline_service(&mut config, &pipeline)?;
            let shutdown = StopSignal::new();
            let handler_signal = shutdown.clone();
            ctrlc::set_handler(move || handler_signal.trigger())?;
            cli::cmd_run(&service, &shutdown)?;
        },
        Commands::Serve { watch, pipeline } => {
            let service = if watch {
                pipeline_service(&mut config, &pipeline)?
            } else {
                apply_watch_paths(&mut config, &pipeline);
                let probe = probe_for(&config, pipeline.no_process_probe);
                MonitorService::with_probe(config, probe)?
            };
            drop(stdout);
            cli::cmd_serve(Arc::new(service), watch)?;
        },
        Commands::Status => cli::cmd_status(&MonitorService::new(config)?, &mut stdout)?,
        Commands::Repos => cli::cmd_repos(&MonitorService::new(config)?, &mut stdout)?,
        Commands::Show { repo_id } => {
            cli::cmd_show(&MonitorService::new(config)?, &repo_id, &mut stdout)?;
        },
        Commands::Record {
            kind,
            text,
            repo_id,
            path,
        } => {
            let target = match (repo_id, path) {
                (Some(id), _) => RecordTarget::RepoId(id),
                (None, Some(path)) => RecordTarget::Path(path),
                (None, None) => return Err("either --repo-id or --path is required".into()),
            };
            cli::cmd_record(&MonitorService::new(config)?, &kind, &text, target, &mut stdout)?;
        },
        Commands::Resolve { path } => {
            cli::cmd_resolve(&MonitorService::new(config)?, &path, &mut stdout)?;
        },
        Commands::Config => cli::cmd_config(&config, &mut stdout)?,
    }

    Ok(())
}

/// Builds a validated service for the pipeline commands.
fn pipeline_service(
    config: &mut AgentlogConfig,
    args: &PipelineArgs,
) -> Result<MonitorService, Box<dyn std::error::Error>> {
    apply_watch_paths(config, args);
    config.validate()?;
    let probe = probe_for(config, args.no_process_probe);
    Ok(MonitorService::with_probe(config.clone(), probe)?)
}

fn apply_watch_paths(config: &mut AgentlogConfig, args: &PipelineArgs) {
    if !args.watch_paths.is_empty() {
        config.watch_paths.clone_from(&args.watch_paths);
    }
}

fn probe_for(config: &AgentlogConfig, disabled: bool) -> Arc<dyn ProcessProbe> {
    if disabled {
        Arc::new(FixedProbe(0.0))
    } else {
        Arc::new(SystemProcessProbe::new(
            &config.detection.process_indicators,
            config.detection.process_confidence,
        ))
    }
}

/// Loads configuration from an explicit file or the default locations.
fn load_config(path: Option<&Path>) -> Result<AgentlogConfig, Box<dyn std::error::Error>> {
    if let Some(config_path) = path {
        return AgentlogConfig::load_from_file(config_path).map_err(Into::into);
    }
    AgentlogConfig::load_default().map_err(Into::into)
}
