//! TCP Server
//!
//! Accepts connections and dispatches each to its own worker thread.

use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::error::{Result, WireError};
use crate::store::Store;

use super::Connection;

/// Poll interval for the non-blocking accept loop
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Signals the accept loop to stop
#[derive(Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Request a graceful shutdown
    pub fn signal(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Check whether shutdown has been requested
    pub fn is_signaled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// TCP server for wirekv
pub struct Server {
    /// Server configuration
    config: Config,

    /// Shared key-value backend, one instance across all connections
    store: Arc<dyn Store>,

    /// Bound listener (non-blocking so shutdown can interleave with accept)
    listener: TcpListener,

    /// Shutdown flag checked between accepts
    shutdown: Arc<AtomicBool>,

    /// Live connection count, enforced against max_connections
    active: Arc<AtomicUsize>,
}

impl Server {
    /// Bind the listener with the given config and store
    pub fn bind(config: Config, store: Arc<dyn Store>) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen_addr)?;
        listener.set_nonblocking(true)?;

        tracing::info!("Listening on {}", config.listen_addr);

        Ok(Self {
            config,
            store,
            listener,
            shutdown: Arc::new(AtomicBool::new(false)),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Get the bound address (useful when binding port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Get a handle for signaling shutdown from another thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            flag: Arc::clone(&self.shutdown),
        }
    }

    /// Run the accept loop (blocking until shutdown is signaled)
    pub fn run(&self) -> Result<()> {
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                tracing::info!("Shutdown requested, stopping accept loop");
                return Ok(());
            }

            let (stream, addr) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                    continue;
                }
                Err(e) => {
                    tracing::warn!("Accept error: {}", e);
                    continue;
                }
            };

            if self.active.load(Ordering::Relaxed) >= self.config.max_connections {
                tracing::warn!(
                    "Connection limit ({}) reached, dropping {}",
                    self.config.max_connections,
                    addr
                );
                drop(stream);
                continue;
            }

            // Hand the accepted stream to its own worker thread. The worker
            // switches the stream back to blocking mode; non-blocking only
            // applies to the accept loop.
            self.active.fetch_add(1, Ordering::Relaxed);
            let store = Arc::clone(&self.store);
            let config = self.config.clone();
            let active = Arc::clone(&self.active);

            thread::spawn(move || {
                let result = match stream.set_nonblocking(false) {
                    Ok(()) => Connection::new(stream, store, &config)
                        .and_then(|mut conn| conn.handle()),
                    Err(e) => Err(WireError::from(e)),
                };

                match result {
                    Ok(()) => {}
                    Err(WireError::ConnectionClosed) => {
                        tracing::debug!("Client {} went away mid-reply", addr);
                    }
                    Err(e) => {
                        tracing::warn!("Connection {} ended with error: {}", addr, e);
                    }
                }

                active.fetch_sub(1, Ordering::Relaxed);
            });
        }
    }
}
