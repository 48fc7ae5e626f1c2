//! SenderService: the reconfigurable network sender.
//!
//! The service owns a [`Worker`] lane for its whole lifetime.  Every public
//! operation becomes one [`SenderCommand`] posted onto that lane, so start,
//! stop, reconfigure and send never interleave and always run in the order
//! they were issued.  Callers are never blocked.
//!
//! # State machine
//!
//! ```text
//!          start_sending()                bind ok
//!   Idle ─────────────────► Starting ───────────────► Running
//!    ▲                         │ bind failed             │ stop_sending()
//!    │◄────────────────────────┘                         ▼
//!    └───────────────────────────────────────────── Stopping
//!                           unbind (bounded by shutdown_timeout)
//! ```
//!
//! Between commands the lane drives the transport's accept pump.  Commands
//! are always polled first, so a queued stop interrupts the pump.
//!
//! # Status reads
//!
//! The lane is the only writer of port, state and server handle.  Callers
//! read a snapshot from atomics, which may lag behind commands still in the
//! queue.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use igtl_core::{DataObject, DeviceName};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time;
use tracing::{debug, info, trace, warn};

use super::network_sender::{Completion, NetworkSender};
use super::transport::{BindError, TransportFactory, TransportServer};
use super::worker::{Worker, WorkerError};

/// Default listening port.
pub const DEFAULT_PORT: u16 = 18944;

/// Default upper bound on a graceful unbind.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

const EVENT_CAPACITY: usize = 64;

/// Errors reported by the sender service.
#[derive(Debug, Error)]
pub enum SenderError {
    /// The configured port could not be bound; the service is idle again.
    #[error(transparent)]
    Bind(#[from] BindError),

    /// A port change was requested while the service was sending.
    #[error("cannot change port to {requested_port} while sending on port {bound_port}")]
    ConfigurationLocked { bound_port: u16, requested_port: u16 },

    /// The command was issued after the service was torn down.
    #[error("sender worker is no longer available")]
    WorkerUnavailable,

    /// The worker lane could not be created.
    #[error("failed to start sender worker: {0}")]
    WorkerStart(#[source] WorkerError),
}

impl From<WorkerError> for SenderError {
    fn from(e: WorkerError) -> Self {
        match e {
            WorkerError::Unavailable => SenderError::WorkerUnavailable,
            other => SenderError::WorkerStart(other),
        }
    }
}

/// Configuration fixed when the service is built.
#[derive(Debug, Clone, PartialEq)]
pub struct SenderSettings {
    /// Initial listening port.  Changeable later while idle.
    pub port: u16,
    /// Tag attached to every outgoing object.
    pub device_name: DeviceName,
    /// Upper bound on a graceful unbind before the server is dropped anyway.
    pub shutdown_timeout: Duration,
}

impl Default for SenderSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            device_name: DeviceName::default(),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

/// Lifecycle state as last published by the lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServiceState {
    Idle = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl ServiceState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ServiceState::Starting,
            2 => ServiceState::Running,
            3 => ServiceState::Stopping,
            _ => ServiceState::Idle,
        }
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ServiceState::Idle => "idle",
            ServiceState::Starting => "starting",
            ServiceState::Running => "running",
            ServiceState::Stopping => "stopping",
        })
    }
}

/// Lifecycle notifications broadcast to every subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SenderEvent {
    /// The transport is bound and accepting clients.
    Started { port: u16 },
    /// Binding failed; the service is idle.
    StartFailed { port: u16, reason: String },
    /// The transport was unbound and released.
    Stopped { port: u16 },
    /// The configured port changed.
    ConfigurationUpdated { port: u16 },
    /// A client connected to the running transport.
    ClientConnected { peer: SocketAddr },
}

type Responder = oneshot::Sender<Result<(), SenderError>>;

/// Commands carried by the worker lane.
enum SenderCommand {
    Configure { port: u16, respond: Responder },
    Start { respond: Responder },
    Stop { respond: Responder },
    Send(DataObject),
    Shutdown,
}

/// Status snapshot shared between the lane (writer) and callers (readers).
struct StatusCell {
    state: AtomicU8,
    port: AtomicU16,
}

impl StatusCell {
    fn new(port: u16) -> Self {
        Self {
            state: AtomicU8::new(ServiceState::Idle as u8),
            port: AtomicU16::new(port),
        }
    }

    fn state(&self) -> ServiceState {
        ServiceState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: ServiceState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

// ── Public service ────────────────────────────────────────────────────────────

/// A network sender whose lifecycle runs on its own worker lane.
///
/// Dropping the service shuts the lane down, forcing a stop if needed.
pub struct SenderService {
    worker: Worker<SenderCommand>,
    status: Arc<StatusCell>,
    device_name: DeviceName,
    events: broadcast::Sender<SenderEvent>,
}

impl SenderService {
    /// Creates the service and its worker lane.  The service starts idle.
    ///
    /// # Errors
    ///
    /// Returns [`SenderError::WorkerStart`] if the lane cannot be spawned.
    pub fn new(
        settings: SenderSettings,
        factory: Arc<dyn TransportFactory>,
    ) -> Result<Self, SenderError> {
        let status = Arc::new(StatusCell::new(settings.port));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let lane = SenderLane {
            port: settings.port,
            device_name: settings.device_name.clone(),
            shutdown_timeout: settings.shutdown_timeout,
            server: None,
            factory,
            status: Arc::clone(&status),
            events: events.clone(),
        };
        let worker = Worker::spawn(format!("igtl-{}", settings.device_name), move |rx| {
            lane.run(rx)
        })?;

        info!(
            "sender for device {} created on port {}",
            settings.device_name, settings.port
        );
        Ok(Self {
            worker,
            status,
            device_name: settings.device_name,
            events,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServiceState {
        self.status.state()
    }

    /// Configured (or bound) port.
    pub fn port(&self) -> u16 {
        self.status.port.load(Ordering::Acquire)
    }

    /// Device name attached to every outgoing object.
    pub fn device_name(&self) -> &DeviceName {
        &self.device_name
    }

    /// Subscribes to lifecycle events issued from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SenderEvent> {
        self.events.subscribe()
    }

    /// Stops sending if needed and tears down the worker lane.
    ///
    /// Commands queued before this call still run; commands queued behind
    /// it resolve to [`SenderError::WorkerUnavailable`].  Blocks until the
    /// lane thread exits.  Safe to call more than once.
    pub fn shutdown(&self) {
        if self.worker.close_with(SenderCommand::Shutdown).is_ok() {
            debug!("shutting down sender for device {}", self.device_name);
        }
        self.worker.join();
    }

    fn request(
        &self,
        command: impl FnOnce(Responder) -> SenderCommand,
    ) -> Result<Completion<()>, SenderError> {
        let (tx, rx) = oneshot::channel();
        self.worker.post(command(tx))?;
        Ok(Completion::new(rx))
    }
}

impl NetworkSender for SenderService {
    fn update_configuration(&self, port: u16) -> Result<Completion<()>, SenderError> {
        self.request(|respond| SenderCommand::Configure { port, respond })
    }

    fn start_sending(&self) -> Result<Completion<()>, SenderError> {
        self.request(|respond| SenderCommand::Start { respond })
    }

    fn stop_sending(&self) -> Result<Completion<()>, SenderError> {
        self.request(|respond| SenderCommand::Stop { respond })
    }

    fn send_object(&self, object: DataObject) -> Result<(), SenderError> {
        self.worker.post(SenderCommand::Send(object))?;
        Ok(())
    }

    fn is_sending(&self) -> bool {
        self.state() == ServiceState::Running
    }
}

impl Drop for SenderService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ── Worker lane ───────────────────────────────────────────────────────────────

/// State owned exclusively by the worker lane.
struct SenderLane {
    port: u16,
    device_name: DeviceName,
    shutdown_timeout: Duration,
    server: Option<Box<dyn TransportServer>>,
    factory: Arc<dyn TransportFactory>,
    status: Arc<StatusCell>,
    events: broadcast::Sender<SenderEvent>,
}

/// What woke the lane.
enum Wake {
    Command(Option<SenderCommand>),
    Accepted(SocketAddr),
}

impl SenderLane {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SenderCommand>) {
        loop {
            let wake = match self.server.as_mut() {
                Some(server) => tokio::select! {
                    biased;
                    cmd = rx.recv() => Wake::Command(cmd),
                    peer = server.accept_next() => Wake::Accepted(peer),
                },
                None => Wake::Command(rx.recv().await),
            };

            match wake {
                Wake::Command(Some(SenderCommand::Configure { port, respond })) => {
                    let _ = respond.send(self.configure(port));
                }
                Wake::Command(Some(SenderCommand::Start { respond })) => {
                    let _ = respond.send(self.start().await);
                }
                Wake::Command(Some(SenderCommand::Stop { respond })) => {
                    self.stop().await;
                    let _ = respond.send(Ok(()));
                }
                Wake::Command(Some(SenderCommand::Send(object))) => self.send(object).await,
                Wake::Command(Some(SenderCommand::Shutdown)) | Wake::Command(None) => break,
                Wake::Accepted(peer) => {
                    let clients = self.server.as_ref().map_or(0, |s| s.client_count());
                    debug!(
                        "client {peer} connected to {} ({clients} connected)",
                        self.device_name
                    );
                    let _ = self.events.send(SenderEvent::ClientConnected { peer });
                }
            }
        }

        if self.server.is_some() {
            info!("sender torn down while running; forcing stop");
            self.stop().await;
        }
    }

    fn configure(&mut self, port: u16) -> Result<(), SenderError> {
        if self.server.is_some() {
            warn!(
                "rejected port change to {port}: sending on port {}",
                self.port
            );
            return Err(SenderError::ConfigurationLocked {
                bound_port: self.port,
                requested_port: port,
            });
        }
        self.port = port;
        self.status.port.store(port, Ordering::Release);
        info!("sender port set to {port}");
        let _ = self.events.send(SenderEvent::ConfigurationUpdated { port });
        Ok(())
    }

    async fn start(&mut self) -> Result<(), SenderError> {
        if self.server.is_some() {
            debug!("start ignored: already sending on port {}", self.port);
            return Ok(());
        }

        self.status.set_state(ServiceState::Starting);
        let mut server = self.factory.create();
        match server.bind(self.port).await {
            Ok(()) => {
                debug_assert!(server.is_bound());
                self.server = Some(server);
                self.status.set_state(ServiceState::Running);
                info!("sending {} on port {}", self.device_name, self.port);
                let _ = self.events.send(SenderEvent::Started { port: self.port });
                Ok(())
            }
            Err(e) => {
                drop(server);
                self.status.set_state(ServiceState::Idle);
                warn!("{e}");
                let _ = self.events.send(SenderEvent::StartFailed {
                    port: self.port,
                    reason: e.source.to_string(),
                });
                Err(e.into())
            }
        }
    }

    async fn stop(&mut self) {
        let Some(mut server) = self.server.take() else {
            debug!("stop ignored: not sending");
            return;
        };

        self.status.set_state(ServiceState::Stopping);
        if time::timeout(self.shutdown_timeout, server.unbind())
            .await
            .is_err()
        {
            warn!(
                "unbinding port {} took longer than {:?}; releasing it anyway",
                self.port, self.shutdown_timeout
            );
        }
        drop(server);

        self.status.set_state(ServiceState::Idle);
        info!("stopped sending on port {}", self.port);
        let _ = self.events.send(SenderEvent::Stopped { port: self.port });
    }

    async fn send(&mut self, object: DataObject) {
        match self.server.as_mut() {
            Some(server) => {
                trace!("pushing {} object", object.label());
                server.push_to_all(&object, &self.device_name).await;
            }
            None => trace!("dropped {} object: not sending", object.label()),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
