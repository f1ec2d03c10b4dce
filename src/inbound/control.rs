//! Lifecycle control for the inbound listener.

use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;

use tracing::info;

use super::error::InboundError;
use super::server::{ListenerEvent, accept_loop};

/// Lifecycle of the receiving endpoint. Owned exclusively by the
/// [`Listener`]; callers read snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Start/stop control for the inbound SMTP endpoint.
///
/// The accept loop runs on a background thread so starting never blocks the
/// caller; only one listener may be active per instance at a time. A start
/// failure always lands back in [`ListenerState::Stopped`], never anywhere
/// ambiguous.
#[derive(Debug)]
pub struct Listener {
    state: ListenerState,
    active: Option<Active>,
}

#[derive(Debug)]
struct Active {
    bound_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Listener {
    pub fn new() -> Self {
        Self {
            state: ListenerState::Stopped,
            active: None,
        }
    }

    /// Binds `host:port` and spawns the accept loop. A bind failure reports
    /// the underlying error and leaves the listener stopped; starting while
    /// already running is a caller error.
    pub fn start(
        &mut self,
        host: &str,
        port: u16,
        events: mpsc::Sender<ListenerEvent>,
    ) -> Result<SocketAddr, InboundError> {
        if self.active.is_some() {
            return Err(InboundError::AlreadyRunning);
        }
        self.state = ListenerState::Starting;

        let addr = format!("{host}:{port}");
        let listener = match TcpListener::bind(&addr) {
            Ok(listener) => listener,
            Err(source) => {
                self.state = ListenerState::Stopped;
                return Err(InboundError::Bind { addr, source });
            }
        };
        let bound_addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(source) => {
                self.state = ListenerState::Stopped;
                return Err(InboundError::Io { source });
            }
        };

        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();
        let handle = match std::thread::Builder::new()
            .name("maildesk-listener".to_string())
            .spawn(move || accept_loop(listener, flag, events))
        {
            Ok(handle) => handle,
            Err(source) => {
                self.state = ListenerState::Stopped;
                return Err(InboundError::Io { source });
            }
        };

        info!("listener started on {bound_addr}");
        self.active = Some(Active {
            bound_addr,
            shutdown,
            handle,
        });
        self.state = ListenerState::Running;
        Ok(bound_addr)
    }

    /// Signals shutdown and joins the accept thread. Stopping a listener
    /// that never ran is a no-op.
    pub fn stop(&mut self) -> String {
        match self.active.take() {
            None => "listener already stopped".to_string(),
            Some(active) => {
                self.state = ListenerState::Stopping;
                active.shutdown.store(true, Ordering::SeqCst);
                let _ = active.handle.join();
                self.state = ListenerState::Stopped;
                info!("listener on {} stopped", active.bound_addr);
                format!("listener on {} stopped", active.bound_addr)
            }
        }
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ListenerState::Running
    }

    /// The bound address while running.
    pub fn bound_addr(&self) -> Option<SocketAddr> {
        self.active.as_ref().map(|active| active.bound_addr)
    }
}

impl Default for Listener {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if self.active.is_some() {
            self.stop();
        }
    }
}
