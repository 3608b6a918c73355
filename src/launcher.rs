/// Launcher lifecycle: announce, dispatch the sibling daemon detached, wait, exit.
///
/// The sequence is strictly linear (`Init → Launching → Waiting → Done`).
/// The child is never monitored: its handle is dropped right after spawn and
/// the tokio runtime reaps it in the background, so its exit status is never
/// observed and no zombie is left behind while the launcher is alive.
use crate::config::LaunchConfig;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

/// Where the launcher is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LauncherState {
    Init,
    Launching,
    Waiting,
    Done,
}

/// What happened when the daemon was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// The OS accepted the spawn. The child now runs on its own.
    Dispatched { pid: u32 },
    /// The spawn itself failed; the error was reported to the output.
    Failed,
}

/// Writes the status lines to `out` and owns the launch settings.
pub struct Launcher<W: Write> {
    out: W,
    program: PathBuf,
    args: Vec<String>,
    wait: Duration,
    state: LauncherState,
}

impl<W: Write> Launcher<W> {
    /// Create the launcher and announce it.
    pub fn new(launch: LaunchConfig, wait: Duration, mut out: W) -> std::io::Result<Self> {
        writeln!(out, "Parent init")?;
        out.flush()?;
        Ok(Self {
            out,
            program: launch.program,
            args: launch.args,
            wait,
            state: LauncherState::Init,
        })
    }

    fn enter(&mut self, next: LauncherState) {
        tracing::debug!(from = ?self.state, to = ?next, "launcher state");
        self.state = next;
    }

    /// Dispatch the daemon without waiting on it.
    ///
    /// A spawn error is printed and swallowed; only a failure to write the
    /// status lines is returned as `Err`. Must be called from within a tokio
    /// runtime.
    pub fn start(&mut self) -> std::io::Result<LaunchOutcome> {
        self.enter(LauncherState::Launching);
        writeln!(self.out, "Ready to start command daemon")?;
        self.out.flush()?;

        tracing::info!(
            program = %self.program.display(),
            args = ?self.args,
            "dispatching daemon"
        );

        let spawned = Command::new(&self.program)
            .args(&self.args)
            .process_group(0) // Own group: terminal signals to the launcher skip the daemon
            .spawn();

        match spawned {
            Ok(child) => {
                let pid = child.id().unwrap_or(0);
                tracing::info!(pid, "daemon dispatched");
                drop(child);
                Ok(LaunchOutcome::Dispatched { pid })
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    program = %self.program.display(),
                    "failed to dispatch daemon"
                );
                writeln!(self.out, "Run command daemon error: {}", e)?;
                self.out.flush()?;
                Ok(LaunchOutcome::Failed)
            }
        }
    }

    /// Block for the configured duration, then announce completion.
    pub async fn wait(&mut self) -> std::io::Result<()> {
        self.enter(LauncherState::Waiting);
        writeln!(self.out, "Waiting to die")?;
        self.out.flush()?;

        tracing::debug!(wait = ?self.wait, "sleeping");
        tokio::time::sleep(self.wait).await;

        writeln!(self.out, "Main process died")?;
        self.out.flush()?;
        self.enter(LauncherState::Done);
        Ok(())
    }

}
