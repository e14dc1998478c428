use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sitecraft::config::{CONFIG_DIR, SessionConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

#[derive(Parser)]
#[command(name = "sitecraft")]
#[command(version, about = "Turn generated action logs into a runnable site preview")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Decode an action log and print its steps as JSON
    Decode {
        /// Action log file, or `-` for stdin
        log: PathBuf,
    },
    /// Apply action logs in order and print the resulting file tree
    Tree {
        #[arg(required = true)]
        logs: Vec<PathBuf>,
        /// Print the mount descriptor JSON instead of the tree
        #[arg(long)]
        mount: bool,
    },
    /// Apply action logs, install and serve the site locally
    Preview {
        #[arg(required = true)]
        logs: Vec<PathBuf>,
        /// Directory the project is written to (defaults to .sitecraft/preview)
        #[arg(long)]
        workdir: Option<PathBuf>,
        /// Override sandbox.max_retries
        #[arg(long)]
        max_retries: Option<u32>,
    },
    /// Send a prompt to the generation backend and print the decoded steps
    Chat {
        prompt: String,
        /// Override backend.api_url
        #[arg(long)]
        api_url: Option<String>,
    },
    /// Print the effective configuration
    Config,
}

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays machine-readable.
fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "sitecraft=debug" } else { "sitecraft=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    match &cli.command {
        Commands::Decode { log } => cmd::cmd_decode(log)?,
        Commands::Tree { logs, mount } => cmd::cmd_tree(logs, *mount).await?,
        Commands::Preview {
            logs,
            workdir,
            max_retries,
        } => {
            let mut config = SessionConfig::load(&project_dir)?;
            if let Some(max_retries) = max_retries {
                config.sandbox.max_retries = *max_retries;
            }
            let workdir = workdir
                .clone()
                .unwrap_or_else(|| project_dir.join(CONFIG_DIR).join("preview"));
            cmd::cmd_preview(&config, logs, &workdir).await?;
        }
        Commands::Chat { prompt, api_url } => {
            let mut config = SessionConfig::load(&project_dir)?;
            if let Some(api_url) = api_url {
                config.backend.api_url = api_url.clone();
            }
            cmd::cmd_chat(&config, prompt).await?;
        }
        Commands::Config => cmd::cmd_config(&project_dir)?,
    }

    Ok(())
}
