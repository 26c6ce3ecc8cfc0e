//! # jjz-alert
//!
//! Command-line entry point: one-shot runs, the daily scheduler and a
//! configuration check.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jjz_alert::bootstrap::AlertBootstrap;
use jjz_alert::config::{ConfigManager, LogConfig};
use jjz_alert::logging::init_structured_logging;
use jjz_alert::workflow::WorkflowRequest;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "jjz-alert")]
#[command(about = "Beijing entry permit status alerts")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "JJZ_CONFIG", default_value = "config.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the workflow once and print the report
    Run {
        /// Only process these plates (repeatable)
        #[arg(short, long = "plate")]
        plates: Vec<String>,

        /// Ignore cached statuses
        #[arg(long)]
        force_refresh: bool,

        /// Push results to the downstream sync
        #[arg(long)]
        sync: bool,
    },

    /// Run at each `remind.times` entry until interrupted
    Schedule,

    /// Validate the configuration and exit
    CheckConfig {
        /// Print the sanitized configuration
        #[arg(long)]
        show: bool,
    },
}

fn load_config(path: &PathBuf) -> Result<ConfigManager> {
    match ConfigManager::load_from_path(path) {
        Ok(manager) => {
            init_structured_logging(&manager.config().global.log);
            for warning in manager.warnings() {
                warn!(warning = %warning, "⚠️ Configuration warning");
            }
            Ok(manager)
        }
        Err(e) => {
            init_structured_logging(&LogConfig::default());
            error!(path = %path.display(), error = %e, "❌ Failed to load configuration");
            Err(e).with_context(|| format!("loading {}", path.display()))
        }
    }
}

async fn run_once(
    manager: &ConfigManager,
    plates: Vec<String>,
    force_refresh: bool,
    sync: bool,
) -> Result<bool> {
    let system = AlertBootstrap::from_manager(manager).await?;
    let request = WorkflowRequest {
        plates: (!plates.is_empty()).then_some(plates),
        force_refresh,
        include_sync: sync,
    };

    let report = system.run(request).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("serializing workflow report")?
    );
    Ok(report.success)
}

async fn run_schedule(manager: &ConfigManager) -> Result<()> {
    let system = AlertBootstrap::from_manager(manager).await?;
    info!(times = ?system.schedule(), "🚀 Scheduler starting");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            futures::future::pending::<()>().await;
        }
    };
    system.run_scheduled(shutdown).await?;
    Ok(())
}

fn check_config(manager: &ConfigManager, show: bool) -> Result<()> {
    let config = manager.config();
    println!("✅ {} is valid", manager.path().map(|p| p.display().to_string()).unwrap_or_default());
    println!(
        "   accounts: {}, plates: {}, admin channels: {}",
        config.jjz_accounts.len(),
        config.plates.len(),
        config.global.admin.notifications.len()
    );
    for warning in manager.warnings() {
        println!("   ⚠️  {warning}");
    }
    if show {
        println!(
            "{}",
            serde_json::to_string_pretty(&manager.debug_config())
                .context("serializing configuration")?
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let manager = match load_config(&cli.config) {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!("❌ {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Run {
            plates,
            force_refresh,
            sync,
        } => run_once(&manager, plates, force_refresh, sync)
            .await
            .map(|success| if success { ExitCode::SUCCESS } else { ExitCode::FAILURE }),
        Commands::Schedule => run_schedule(&manager).await.map(|()| ExitCode::SUCCESS),
        Commands::CheckConfig { show } => check_config(&manager, show).map(|()| ExitCode::SUCCESS),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{e:#}"), "❌ Command failed");
            eprintln!("❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}
