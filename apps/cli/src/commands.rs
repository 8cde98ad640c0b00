//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use draftsmith_core::{ArticleRun, CancellationToken, Pipeline, ProgressReporter, Step};
use draftsmith_shared::{
    AppConfig, DraftsmithError, init_config, load_config, validate_api_keys,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Draftsmith: research a topic and write a reviewed article about it.
#[derive(Parser)]
#[command(
    name = "draftsmith",
    version,
    about = "Research a topic on the web and write a critiqued, revised article about it.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Write an article about a topic.
    Write {
        /// Topic or query to write about.
        topic: String,

        /// Maximum number of revise passes before giving up.
        #[arg(long)]
        max_revisions: Option<usize>,

        /// Generation model id (overrides the config file).
        #[arg(long)]
        model: Option<String>,

        /// Write the article to this file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Manage the config file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Create a default config file.
    Init,
    /// Print the effective config.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "draftsmith=info",
        1 => "draftsmith=debug",
        _ => "draftsmith=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Write {
            topic,
            max_revisions,
            model,
            out,
        } => cmd_write(&topic, max_revisions, model, out.as_deref()).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

/// Flags override file values.
fn apply_overrides(config: &mut AppConfig, max_revisions: Option<usize>, model: Option<String>) {
    if let Some(max) = max_revisions {
        config.pipeline.max_revisions = max;
    }
    if let Some(model) = model {
        config.generation.model = model;
    }
}

async fn cmd_write(
    topic: &str,
    max_revisions: Option<usize>,
    model: Option<String>,
    out: Option<&Path>,
) -> Result<()> {
    let mut config = load_config()?;
    apply_overrides(&mut config, max_revisions, model);
    validate_api_keys(&config)?;

    let pipeline = Pipeline::from_config(&config)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current stage");
            on_interrupt.cancel();
        }
    });

    info!(topic, model = %config.generation.model, "writing article");

    let reporter = CliProgress::new();
    let outcome = pipeline.run(topic, &cancel, &reporter).await;
    reporter.spinner.finish_and_clear();

    match outcome {
        Ok(result) => {
            emit(&result.article, out)?;
            eprintln!();
            eprintln!("  Run:       {}", result.run_id);
            eprintln!("  Sources:   {}", result.sources.len());
            eprintln!("  Revisions: {}", result.revisions);
            eprintln!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
            Ok(())
        }
        Err(DraftsmithError::RevisionLimitExceeded {
            revisions,
            article,
            critique,
        }) => {
            warn!(revisions, %critique, "critic never accepted the article; emitting last revision");
            emit(&article, out)
        }
        Err(e) => Err(e.into()),
    }
}

fn emit(article: &str, out: Option<&Path>) -> Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, format!("{article}\n"))
                .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "article written");
        }
        None => println!("{article}"),
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, step: Step) {
        let message = match step {
            Step::Search => "Searching for sources",
            Step::Curate => "Picking the most relevant sources",
            Step::Write => "Writing first draft",
            Step::Critique => "Waiting for the critic",
            Step::Revise => "Revising",
            Step::Done => "Done",
        };
        self.spinner.set_message(message);
    }

    fn critique(&self, round: usize, critique: Option<&str>) {
        match critique {
            None => self.spinner.println(format!("  critique {round}: accepted")),
            Some(text) => self.spinner.println(format!("  critique {round}: {text}")),
        }
    }

    fn done(&self, _result: &ArticleRun) {
        self.spinner.finish_and_clear();
    }
}
