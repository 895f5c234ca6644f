//! Deployer - git deployment webhook server
//!
//! Usage:
//!   deployer serve                  # Run the HTTP server
//!   deployer deploy <repo> [branch] # Run one manual deploy
//!   deployer check-config           # Validate the configuration

mod auth;
mod http_api;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deployer_core::config::ConfigStore;
use deployer_core::context::AppContext;
use deployer_core::deploy::{DeployRequest, OverrideFlags};

#[derive(Parser)]
#[command(name = "deployer")]
#[command(about = "Git deployment webhook server", long_about = None)]
struct Cli {
    /// Configuration file (default: <config dir>/deployer/deployer.toml)
    #[arg(long, short, global = true, env = "DEPLOYER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Listen address, overrides `server.listen`
        #[arg(long)]
        listen: Option<String>,
    },

    /// Run one manual deploy and print the transcript
    Deploy {
        /// Repository name
        repo: String,
        /// Branch to deploy
        #[arg(default_value = "master")]
        branch: String,
        /// Tag to check out, `latest` or `latestRelease`
        tag: Option<String>,
        /// Deploy even if the branch is disabled
        #[arg(long)]
        force: bool,
        /// Deploy a tag that is not the latest release
        #[arg(long)]
        ignore_release: bool,
        /// Deploy a tag that is not the newest one
        #[arg(long)]
        ignore_tag_date: bool,
        /// Deploy a tags-only branch without a tag
        #[arg(long)]
        ignore_tag: bool,
        /// Host handed to the lifecycle script
        #[arg(long, default_value = "localhost")]
        host: String,
    },

    /// Load and validate the configuration
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deployer=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => AppContext::default_config_path()
            .context("Could not determine the config directory, pass --config")?,
    };

    match cli.command {
        Commands::Serve { listen } => run_serve(config_path, listen).await,
        Commands::Deploy {
            repo,
            branch,
            tag,
            force,
            ignore_release,
            ignore_tag_date,
            ignore_tag,
            host,
        } => {
            let request = DeployRequest::manual(repo, branch)
                .with_tag(tag)
                .with_flags(OverrideFlags {
                    force,
                    ignore_release,
                    ignore_tag_date,
                    ignore_tag,
                })
                .with_host(host);
            run_deploy(config_path, request).await
        }
        Commands::CheckConfig => run_check_config(config_path),
    }
}

async fn run_serve(config_path: PathBuf, listen: Option<String>) -> Result<()> {
    let ctx = AppContext::load(&config_path)
        .with_context(|| format!("Failed to start with {}", config_path.display()))?;
    let listen = listen.unwrap_or_else(|| ctx.config().server.listen.clone());
    http_api::serve(ctx, &listen).await
}

async fn run_deploy(config_path: PathBuf, request: DeployRequest) -> Result<()> {
    let ctx = AppContext::load(&config_path)?;
    let outcome = ctx.manual_deploy(&request).await;

    println!("{}", outcome.body);
    println!();
    let status = format!("{} ({})", outcome.status, outcome.status_code());
    if outcome.status.is_failure() {
        println!("{}", style(status).red().bold());
        std::process::exit(1);
    }
    println!("{}", style(status).green().bold());
    Ok(())
}

fn run_check_config(config_path: PathBuf) -> Result<()> {
    let store = ConfigStore::load(&config_path)?;
    let config = store.current();

    println!("Config: {}", config_path.display());
    println!();

    println!("{}", style("Providers").bold());
    for kind in config.configured_providers() {
        let marker = if config.default_api == Some(kind) {
            " (default)"
        } else {
            ""
        };
        println!("  {} {}{}", style("✓").green(), kind, marker);
    }
    println!();

    if config.repos.is_empty() {
        println!("No repository configurations, every branch deploys.");
    } else {
        println!("{}", style("Repositories").bold());
        for name in config.repos.keys() {
            let api = config
                .api_for(name)
                .map(|kind| kind.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!("  {} (api: {})", name, api);
        }
    }
    println!();
    println!("{}", style("Configuration is valid").green());
    Ok(())
}
