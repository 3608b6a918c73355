/// Signal handler registry.
///
/// Handlers are registered per signal, then `install()` arms an OS listener
/// for every registered signal and `serve()` dispatches deliveries until a
/// handler asks to stop or fails:
/// - `Ok(())` from a handler: keep serving.
/// - `Err(HandlerError::Stop)`: stop, `serve` returns `Ok(())`.
/// - any other `Err`: stop, `serve` returns it as `SignalError::Handler`.
use nix::sys::signal::Signal;
use std::collections::BTreeMap;
use std::future::poll_fn;
use std::sync::Arc;
use std::task::Poll;
use tokio::signal::unix::{signal, SignalKind};

type HandleFn = Arc<dyn Fn(Signal) -> Result<(), HandlerError> + Send + Sync>;

/// Returned by a handler to end serving.
#[derive(Debug)]
pub enum HandlerError {
    /// Stop serving without reporting an error.
    Stop,
    /// Stop serving and surface this error from `serve`.
    Failed(Box<dyn std::error::Error + Send + Sync>),
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerError::Stop => write!(f, "stop serving signals"),
            HandlerError::Failed(source) => write!(f, "{}", source),
        }
    }
}

impl std::error::Error for HandlerError {}

/// Errors returned from installing or serving signal handlers.
#[derive(Debug)]
pub enum SignalError {
    /// `serve` was called with nothing registered.
    NoHandlers,
    /// The OS listener for a signal could not be installed.
    Install {
        signal: Signal,
        source: std::io::Error,
    },
    /// A handler returned an error other than `HandlerError::Stop`.
    Handler {
        signal: Signal,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl std::fmt::Display for SignalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalError::NoHandlers => write!(f, "no signal handlers registered"),
            SignalError::Install { signal, source } => {
                write!(f, "failed to listen for {}: {}", signal, source)
            }
            SignalError::Handler { signal, source } => {
                write!(f, "handler for {} failed: {}", signal, source)
            }
        }
    }
}

impl std::error::Error for SignalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SignalError::NoHandlers => None,
            SignalError::Install { source, .. } => Some(source),
            SignalError::Handler { source, .. } => Some(source.as_ref()),
        }
    }
}

/// Registered handlers, keyed by signal.
#[derive(Default)]
pub struct SignalHandler {
    handles: BTreeMap<Signal, HandleFn>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` for each of `signals`. A later registration for the
    /// same signal replaces the earlier one.
    pub fn set_handle<F>(&mut self, handle: F, signals: &[Signal])
    where
        F: Fn(Signal) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let handle: HandleFn = Arc::new(handle);
        for &sig in signals {
            self.handles.insert(sig, Arc::clone(&handle));
        }
    }

    /// Drop every registration.
    pub fn reset(&mut self) {
        self.handles.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Arm OS listeners for every registered signal.
    ///
    /// Deliveries that arrive after this returns are queued for `serve`, so
    /// callers can announce readiness between the two steps.
    pub fn install(self) -> Result<InstalledSignals, SignalError> {
        if self.handles.is_empty() {
            return Err(SignalError::NoHandlers);
        }

        let mut listeners = Vec::with_capacity(self.handles.len());
        for (sig, handle) in self.handles {
            let stream = signal(SignalKind::from_raw(sig as i32))
                .map_err(|e| SignalError::Install { signal: sig, source: e })?;
            tracing::debug!(signal = %sig, "signal listener installed");
            listeners.push(Listener {
                signal: sig,
                stream,
                handle,
            });
        }

        Ok(InstalledSignals {
            listeners,
            next_start: 0,
        })
    }

    /// Install listeners and serve in one step.
    pub async fn serve(self) -> Result<(), SignalError> {
        self.install()?.serve().await
    }
}

struct Listener {
    signal: Signal,
    stream: tokio::signal::unix::Signal,
    handle: HandleFn,
}

/// Armed listeners, ready to serve.
pub struct InstalledSignals {
    listeners: Vec<Listener>,
    // Scan origin for the next poll, one past the last delivery.
    next_start: usize,
}

impl InstalledSignals {
    /// Dispatch deliveries to their handlers until one stops or fails.
    pub async fn serve(mut self) -> Result<(), SignalError> {
        loop {
            let Some(idx) = self.next_delivery().await else {
                tracing::debug!("signal listener closed, stop serving");
                return Ok(());
            };
            let listener = &self.listeners[idx];
            tracing::info!(signal = %listener.signal, "signal received");

            match (listener.handle)(listener.signal) {
                Ok(()) => continue,
                Err(HandlerError::Stop) => {
                    tracing::debug!(signal = %listener.signal, "handler stopped serving");
                    return Ok(());
                }
                Err(HandlerError::Failed(source)) => {
                    return Err(SignalError::Handler {
                        signal: listener.signal,
                        source,
                    });
                }
            }
        }
    }

    /// Index of the next listener with a pending delivery, or `None` once a
    /// listener stream has closed.
    ///
    /// The scan starts after the previous delivery so a signal that keeps
    /// firing cannot starve the others.
    async fn next_delivery(&mut self) -> Option<usize> {
        let len = self.listeners.len();
        let start = self.next_start;
        let found = poll_fn(|cx| {
            for offset in 0..len {
                let idx = (start + offset) % len;
                match self.listeners[idx].stream.poll_recv(cx) {
                    Poll::Ready(Some(())) => return Poll::Ready(Some(idx)),
                    Poll::Ready(None) => return Poll::Ready(None),
                    Poll::Pending => {}
                }
            }
            Poll::Pending
        })
        .await;

        if let Some(idx) = found {
            self.next_start = (idx + 1) % len;
        }
        found
    }
}
