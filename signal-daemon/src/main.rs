use chrono::{Local, SecondsFormat};
use clap::Parser;
use nix::sys::signal::Signal;
use signal_daemon::signals::{HandlerError, SignalHandler};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

/// Log to a file and block until SIGINT, SIGTERM or SIGHUP arrives, then
/// linger for a grace period and exit.
#[derive(Parser, Debug)]
#[command(name = "signal", version, about)]
pub struct Cli {
    /// Log file, created or truncated on start
    #[arg(long, default_value = "testlogfile")]
    log_file: PathBuf,

    /// Seconds to linger after the kill signal before exiting
    #[arg(long, default_value_t = 10)]
    grace: u64,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_file = match OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&cli.log_file)
    {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error opening file {}: {}", cli.log_file.display(), e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .with_target(false)
        .init();

    tracing::info!("This is a test log entry");
    tracing::info!("Catch kill signal");

    let mut handler = SignalHandler::new();
    handler.set_handle(
        |sig| {
            tracing::info!("get kill signal: {}", now());
            tracing::info!("get signal: {}", sig);
            Err(HandlerError::Stop)
        },
        &[Signal::SIGINT, Signal::SIGTERM, Signal::SIGHUP],
    );

    let installed = match handler.install() {
        Ok(installed) => installed,
        Err(e) => {
            tracing::error!(error = %e, "failed to install signal handlers");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    println!("Wait a kill signal");

    if let Err(e) = installed.serve().await {
        tracing::error!(error = %e, "signal serving failed");
        std::process::exit(1);
    }

    tokio::time::sleep(Duration::from_secs(cli.grace)).await;
    tracing::info!("stop time: {}", now());
}

fn now() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
