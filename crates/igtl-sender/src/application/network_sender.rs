//! Capability trait for anything that sends objects over the network, plus
//! the acknowledgment handle its lifecycle commands return.

use igtl_core::DataObject;
use tokio::sync::oneshot;

use super::sender_service::SenderError;

/// Start, stop, reconfigure and send.
///
/// Every method only enqueues work and returns immediately; lifecycle
/// commands hand back a [`Completion`] the caller may await, block on, or
/// drop.
pub trait NetworkSender: Send + Sync {
    /// Changes the listening port.  Rejected while sending.
    fn update_configuration(&self, port: u16) -> Result<Completion<()>, SenderError>;

    /// Binds the configured port and starts accepting clients.
    fn start_sending(&self) -> Result<Completion<()>, SenderError>;

    /// Unbinds and disconnects every client.
    fn stop_sending(&self) -> Result<Completion<()>, SenderError>;

    /// Queues `object` for every connected client.  A no-op while stopped.
    fn send_object(&self, object: DataObject) -> Result<(), SenderError>;

    /// Last observed sending state.  May lag behind queued commands.
    fn is_sending(&self) -> bool;
}

/// Outcome of a command, delivered once the worker lane has run it.
#[must_use = "a Completion does nothing unless awaited; drop it to fire and forget"]
#[derive(Debug)]
pub struct Completion<T> {
    rx: oneshot::Receiver<Result<T, SenderError>>,
}

impl<T> Completion<T> {
    pub(crate) fn new(rx: oneshot::Receiver<Result<T, SenderError>>) -> Self {
        Self { rx }
    }

    /// Waits for the command to run.
    ///
    /// Resolves to [`SenderError::WorkerUnavailable`] if the lane shut down
    /// before reaching the command.
    pub async fn wait(self) -> Result<T, SenderError> {
        self.rx.await.unwrap_or(Err(SenderError::WorkerUnavailable))
    }

    /// Blocking variant of [`wait`](Self::wait) for synchronous callers.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context.
    pub fn blocking_wait(self) -> Result<T, SenderError> {
        self.rx
            .blocking_recv()
            .unwrap_or(Err(SenderError::WorkerUnavailable))
    }
}
