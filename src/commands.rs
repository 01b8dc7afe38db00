//! Command implementation for the merger CLI
//!
//! Sets up logging, loads or bootstraps the settings, assembles the bridge
//! and runs it until the process is interrupted.

use crate::cli::Args;
use crate::config::{self, MergerConfig, SettingsLoad};
use crate::correlator::Correlator;
use crate::correlator::runner::{Bridge, BridgeStats};
use crate::registers::{FileRegisterSource, HttpRegisterSource, RegisterSource};
use crate::sink::ResultsLog;
use crate::station::DirectoryProbe;
use anyhow::{Context, Result};
use colored::*;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// How a run ended without error
#[derive(Debug)]
pub enum RunOutcome {
    /// A settings template was created; nothing was polled
    Bootstrapped(PathBuf),
    /// The poll loop was cancelled
    Stopped(BridgeStats),
}

/// Main command runner
///
/// 1. Set up logging
/// 2. Load settings, or create a template and stop
/// 3. Poll the stations until `cancel` fires
pub async fn run(args: Args, cancel: CancellationToken) -> Result<RunOutcome> {
    setup_logging(&args)?;
    debug!("Command line arguments: {:?}", args);

    let settings_path = args.settings_path();
    let loaded = config::load_or_bootstrap(&settings_path)
        .with_context(|| format!("Invalid settings in {}", settings_path.display()))?;

    let config = match loaded {
        SettingsLoad::Loaded(config) => config,
        SettingsLoad::Bootstrapped(path) => {
            announce_bootstrap(&path)?;
            return Ok(RunOutcome::Bootstrapped(path));
        }
    };

    print_banner(&config);

    let bridge = build_bridge(&config);
    let stats = bridge
        .run(config.poll_interval, cancel)
        .await
        .context("Result merging stopped")?;

    Ok(RunOutcome::Stopped(stats))
}

/// Wire the configured register source, station directories and results log
fn build_bridge(config: &MergerConfig) -> Bridge<Box<dyn RegisterSource>, DirectoryProbe> {
    let source: Box<dyn RegisterSource> = match &config.register_dump {
        Some(dump) => {
            info!("Reading registers from static dump {}", dump.display());
            Box::new(FileRegisterSource::new(dump.clone()))
        }
        None => Box::new(HttpRegisterSource::new(
            &config.controller_url,
            config.http_timeout,
        )),
    };

    let probe = DirectoryProbe::new(
        config.marposs_dir.clone(),
        config.kogame_dir.clone(),
        config.extension.clone(),
    );

    Bridge::new(
        source,
        probe,
        config.register_layout(),
        Correlator::new().with_max_pending_age(config.max_pending_age),
        ResultsLog::new(config.results_path.clone()),
    )
}

/// Set up structured logging based on CLI arguments
fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("measurement_merger={}", log_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_timer(fmt::time::uptime())
                .with_writer(std::io::stderr),
        )
        .try_init()
        .context("Failed to initialise logging")?;

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Tell the operator where the template went, then wait for Enter on a console
fn announce_bootstrap(path: &Path) -> Result<()> {
    println!(
        "{} {}",
        ">>> Created settings file".bright_green().bold(),
        path.display().to_string().bright_white()
    );
    println!(
        "{}",
        ">>> Fill in the station folders (marposs, kogame) and the controller ip, then start again"
            .bright_yellow()
    );

    if io::stdin().is_terminal() {
        print!("{}", ">>> Press Enter to exit ".bright_white());
        io::stdout().flush().context("Failed to flush stdout")?;
        let mut input = String::new();
        io::stdin()
            .read_line(&mut input)
            .context("Failed to read user input")?;
    }

    Ok(())
}

fn print_banner(config: &MergerConfig) {
    println!("{}", "Measurement merger".bright_green().bold());
    println!(
        "  {} {}",
        "Marposs:".bright_cyan(),
        config.marposs_dir.display()
    );
    println!("  {} {}", "Kogame:".bright_cyan(), config.kogame_dir.display());
    println!(
        "  {} {}",
        "Results:".bright_cyan(),
        config.results_path.display()
    );
    println!("\n{}", ">>> Starting to gather results >>>".bright_yellow());
}
