//! anno CLI
//!
//! Command-line interface for inspecting anno projects: load checks,
//! progress statistics, page traversal and transcription search.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use anno_core::{Config, Project, QueryPayload, QueryRequest, StoreError};

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "anno")]
#[command(about = "anno - concurrent annotation page store")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.config/anno/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Colon-separated sub-project directories (overrides config)
    #[arg(long, global = true)]
    projects: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load all sub-projects and report problems
    Check,
    /// Page progress per sub-project
    Stats,
    /// Page and chunk counters per audio file
    AudioStats {
        /// Sub-project directory
        sub_project: String,
    },
    /// Editor names found in annotations
    Sources,
    /// Audio files referenced by a sub-project
    AudioFiles {
        /// Sub-project directory
        sub_project: String,
    },
    /// Show the page a next-page request would return (never locks)
    Next {
        /// Sub-project directory
        sub_project: String,
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Find chunks by status and/or transcription regex
    Search {
        /// Sub-project directory
        sub_project: String,
        /// Chunk status to match (repeatable)
        #[arg(short, long)]
        status: Vec<String>,
        /// Transcription regex
        #[arg(short, long)]
        trans: Option<String>,
    },
    /// Show configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
}

#[derive(Args, Debug, Clone)]
struct QueryArgs {
    /// Annotation-level status
    #[arg(long, default_value = "any")]
    page_status: String,
    /// Chunk status, or "checked" for any reviewed chunk
    #[arg(long, default_value = "any")]
    status: String,
    /// Audio file prefix
    #[arg(long, default_value = "any")]
    audio: String,
    /// Editor who set a chunk status
    #[arg(long, default_value = "any")]
    source: String,
    /// Transcription regex
    #[arg(long, default_value = "")]
    trans: String,
    /// Only pages with validation issues
    #[arg(long)]
    has_issue: bool,
    /// Matching pages to move; negative walks backwards
    #[arg(long, default_value_t = 1, allow_hyphen_values = true)]
    step: i64,
    /// Page id to walk from
    #[arg(long, default_value = "")]
    from: String,
    /// Jump to first, last or a 0-based position instead of walking
    #[arg(long)]
    index: Option<String>,
}

impl QueryArgs {
    fn into_payload(self) -> QueryPayload {
        let mut request = QueryRequest {
            page_status: self.page_status,
            status: self.status,
            audio_file: self.audio,
            source: self.source,
            trans_re: self.trans,
            ..QueryRequest::default()
        };
        request.validation_issue.has_issue = self.has_issue;

        QueryPayload {
            request,
            step_size: self.step,
            request_index: self.index.unwrap_or_default(),
            curr_id: self.from,
            context: 0,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    let mut config = Config::load_with_cli_override(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(projects) = cli.projects {
        config.project_dirs = projects;
    }
    init_logging(&config, cli.verbose);

    // Commands that don't need the project
    if let Commands::Config { command } = &cli.command {
        return match command {
            Some(ConfigCommands::Show) | None => {
                commands::config::show(&config, cli.config.as_ref(), &output)
            }
        };
    }

    let project = open_project(&config)?;
    let diagnostics = project.load_data();
    debug!("Loaded {} sub project(s)", project.list_sub_projects().len());

    if let Commands::Check = cli.command {
        return commands::check::run(&project, &diagnostics, &output);
    }
    for diagnostic in &diagnostics {
        warn!("{}", diagnostic);
    }

    match cli.command {
        Commands::Check | Commands::Config { .. } => unreachable!(), // Handled above
        Commands::Stats => commands::stats::show(&project, &output),
        Commands::AudioStats { sub_project } => {
            commands::stats::audio(&project, &sub_project, &output)
        }
        Commands::Sources => commands::list::sources(&project, &output),
        Commands::AudioFiles { sub_project } => {
            commands::list::audio_files(&project, &sub_project, &output)
        }
        Commands::Next { sub_project, query } => {
            commands::page::next(&project, &sub_project, query.into_payload(), &output)
        }
        Commands::Search {
            sub_project,
            status,
            trans,
        } => commands::page::search(&project, &sub_project, status, trans, &output),
    }
}

/// Build the registry from the configured sub-project directories
fn open_project(config: &Config) -> Result<Project> {
    if config.sub_projects().is_empty() {
        bail!(
            "No sub-projects configured.\n\
             Set project_dirs in {}, ANNO_PROJECT_DIRS, or pass --projects",
            Config::config_file_path().display()
        );
    }
    Project::new(&config.project_dirs, config.store_options(), None)
        .map_err(|e| with_suggestion(e).context("Failed to open project"))
}

/// Attach the recovery hint of a store error, if it has one
fn with_suggestion(error: StoreError) -> anyhow::Error {
    match error.recovery_suggestion() {
        Some(hint) => anyhow::anyhow!("{}\nHint: {}", error, hint),
        None => error.into(),
    }
}

/// Log to stderr at the configured level, or debug with --verbose
fn init_logging(config: &Config, verbose: bool) {
    let log_level = if verbose {
        "debug"
    } else {
        config.log_level.as_str()
    };
    let env_filter = EnvFilter::new(format!("anno_core={},anno_cli={}", log_level, log_level));

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
