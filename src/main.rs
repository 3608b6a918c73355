mod config;
mod launcher;

use clap::Parser;
use launcher::{LaunchOutcome, Launcher};
use std::path::PathBuf;
use std::time::Duration;

/// Start the sibling daemon as a detached background process, wait a fixed
/// time, then exit. The daemon's outcome is never observed.
#[derive(Parser, Debug)]
#[command(name = "daemon-launcher", version, about)]
pub struct Cli {
    /// Config file path (missing file means defaults)
    #[arg(short, long, default_value = "launcher.toml")]
    config: PathBuf,

    /// Program to launch (overrides config)
    #[arg(long)]
    program: Option<PathBuf>,

    /// Seconds to wait after launching (overrides config)
    #[arg(long)]
    wait: Option<u64>,

    /// Print resolved settings, don't launch
    #[arg(long)]
    dry_run: bool,

    /// Extra logging on stderr (dispatch details)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "daemon_launcher=debug"
    } else {
        "daemon_launcher=warn"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    let mut cfg = match config::load_config(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    if let Some(program) = cli.program {
        cfg.launch.program = program;
    }
    if let Some(secs) = cli.wait {
        cfg.wait.secs = secs;
    }

    if cli.dry_run {
        println!("daemon-launcher v{}", env!("CARGO_PKG_VERSION"));
        println!("Config file: {}", cli.config.display());
        println!("Program: {}", cfg.launch.program.display());
        println!("Args: {:?}", cfg.launch.args);
        println!("Wait: {}s", cfg.wait.secs);
        return;
    }

    if let Err(e) = run(cfg).await {
        // Only reachable if stdout itself is gone.
        tracing::error!(error = %e, "failed to write status output");
    }
}

async fn run(cfg: config::LauncherConfig) -> std::io::Result<()> {
    let wait = Duration::from_secs(cfg.wait.secs);
    let mut launcher = Launcher::new(cfg.launch, wait, std::io::stdout())?;
    if let LaunchOutcome::Dispatched { pid } = launcher.start()? {
        tracing::debug!(pid, "daemon left running detached");
    }
    launcher.wait().await
}
