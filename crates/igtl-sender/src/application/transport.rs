//! Transport Server seam.
//!
//! The sender service never touches sockets.  It asks a [`TransportFactory`]
//! for a fresh [`TransportServer`] on every start, binds it, drives its accept
//! pump between commands and drops it on stop.  Infrastructure implementations
//! use TCP; test implementations record calls.

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use igtl_core::{DataObject, DeviceName};
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

/// The requested port could not be acquired.
#[derive(Debug, Error)]
#[error("failed to bind port {port}: {source}")]
pub struct BindError {
    /// The port that was requested.
    pub port: u16,
    /// The underlying socket error.
    #[source]
    pub source: io::Error,
}

/// A listening endpoint that pushes objects to every accepted client.
///
/// All methods are called from the sender's worker lane, one at a time.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TransportServer: Send {
    /// Starts listening on `port`.
    async fn bind(&mut self, port: u16) -> Result<(), BindError>;

    /// Closes the listener and disconnects every client.
    ///
    /// Calling this on an unbound server does nothing.
    async fn unbind(&mut self);

    /// Writes `object`, tagged with `device_name`, to every connected client.
    ///
    /// Best-effort: clients that fail are dropped, and having no clients is
    /// not an error.
    async fn push_to_all(&mut self, object: &DataObject, device_name: &DeviceName);

    /// Returns `true` between a successful [`bind`](Self::bind) and the next
    /// [`unbind`](Self::unbind).
    fn is_bound(&self) -> bool;

    /// Waits for the next client and adds it to the client set.
    ///
    /// Must be cancel-safe: the lane drops this future whenever a command
    /// arrives first.  Pends forever while unbound.
    async fn accept_next(&mut self) -> SocketAddr;

    /// Number of currently connected clients.
    fn client_count(&self) -> usize;
}

/// Creates a fresh, unbound [`TransportServer`] for each start.
#[cfg_attr(test, automock)]
pub trait TransportFactory: Send + Sync {
    fn create(&self) -> Box<dyn TransportServer>;
}
