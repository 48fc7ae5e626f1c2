//! Recording transport for unit and integration tests.
//!
//! Every [`RecordingTransport`] created by one [`RecordingTransportFactory`]
//! appends to the same call log, so a test can assert the exact sequence of
//! bind, push and unbind calls the sender issued across restarts.  The
//! factory also tracks how many transport instances are alive.

use std::collections::HashSet;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use igtl_core::{DataObject, DeviceName};

use crate::application::transport::{BindError, TransportFactory, TransportServer};

/// One call observed by a recording transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    Bind(u16),
    Push {
        object: DataObject,
        device_name: String,
    },
    Unbind,
}

#[derive(Default)]
struct Shared {
    calls: Mutex<Vec<TransportCall>>,
    created: AtomicUsize,
    live: AtomicUsize,
}

#[derive(Clone, Default)]
struct Behaviour {
    failing_ports: HashSet<u16>,
    bind_delay: Duration,
    unbind_delay: Duration,
}

/// Factory producing [`RecordingTransport`]s that share one call log.
///
/// Cloning the factory shares the log, so a test can keep a clone after
/// handing the original to the service.
#[derive(Clone, Default)]
pub struct RecordingTransportFactory {
    shared: Arc<Shared>,
    behaviour: Behaviour,
}

impl RecordingTransportFactory {
    /// Creates a factory whose transports bind every port instantly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `bind(port)` fail with `AddrInUse`.
    pub fn failing_on(mut self, port: u16) -> Self {
        self.behaviour.failing_ports.insert(port);
        self
    }

    /// Delays every bind by `delay`.
    pub fn with_bind_delay(mut self, delay: Duration) -> Self {
        self.behaviour.bind_delay = delay;
        self
    }

    /// Delays every unbind by `delay`.
    pub fn with_unbind_delay(mut self, delay: Duration) -> Self {
        self.behaviour.unbind_delay = delay;
        self
    }

    /// Snapshot of every call recorded so far.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.shared.calls.lock().expect("lock poisoned").clone()
    }

    /// Number of transports created so far.
    pub fn created(&self) -> usize {
        self.shared.created.load(Ordering::SeqCst)
    }

    /// Number of transports currently alive.
    pub fn live_instances(&self) -> usize {
        self.shared.live.load(Ordering::SeqCst)
    }
}

impl TransportFactory for RecordingTransportFactory {
    fn create(&self) -> Box<dyn TransportServer> {
        self.shared.created.fetch_add(1, Ordering::SeqCst);
        self.shared.live.fetch_add(1, Ordering::SeqCst);
        Box::new(RecordingTransport {
            shared: Arc::clone(&self.shared),
            behaviour: self.behaviour.clone(),
            bound: None,
        })
    }
}

/// A [`TransportServer`] that records calls instead of touching sockets.
///
/// It never accepts a client: [`accept_next`](TransportServer::accept_next)
/// pends forever.
pub struct RecordingTransport {
    shared: Arc<Shared>,
    behaviour: Behaviour,
    bound: Option<u16>,
}

impl RecordingTransport {
    fn record(&self, call: TransportCall) {
        self.shared.calls.lock().expect("lock poisoned").push(call);
    }
}

#[async_trait]
impl TransportServer for RecordingTransport {
    async fn bind(&mut self, port: u16) -> Result<(), BindError> {
        self.record(TransportCall::Bind(port));
        if !self.behaviour.bind_delay.is_zero() {
            tokio::time::sleep(self.behaviour.bind_delay).await;
        }
        if self.behaviour.failing_ports.contains(&port) {
            return Err(BindError {
                port,
                source: io::Error::new(io::ErrorKind::AddrInUse, "port reserved by test"),
            });
        }
        self.bound = Some(port);
        Ok(())
    }

    async fn unbind(&mut self) {
        if self.bound.take().is_none() {
            return;
        }
        if !self.behaviour.unbind_delay.is_zero() {
            tokio::time::sleep(self.behaviour.unbind_delay).await;
        }
        self.record(TransportCall::Unbind);
    }

    async fn push_to_all(&mut self, object: &DataObject, device_name: &DeviceName) {
        self.record(TransportCall::Push {
            object: object.clone(),
            device_name: device_name.to_string(),
        });
    }

    fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    async fn accept_next(&mut self) -> SocketAddr {
        std::future::pending().await
    }

    fn client_count(&self) -> usize {
        0
    }
}

impl Drop for RecordingTransport {
    fn drop(&mut self) {
        self.shared.live.fetch_sub(1, Ordering::SeqCst);
    }
}
