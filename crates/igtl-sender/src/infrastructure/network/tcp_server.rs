//! TCP Transport Server.
//!
//! Listens on `bind_address:port` and keeps every accepted stream in a client
//! list.  Each pushed object is encoded once into a frame (see
//! [`igtl_core::protocol::codec`]) and written to every client in turn.
//!
//! # Slow and dead clients
//!
//! A write that fails, or that does not finish within `write_timeout`, drops
//! that client.  The remaining clients still receive the frame, and the lane
//! is never held up by one stalled reader for longer than the timeout.
//!
//! # Sequence numbers
//!
//! Frames carry a per-bind sequence number starting at 0.  A client that
//! joins later sees its first frame numbered wherever the counter is.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use igtl_core::{encode_frame_now, DataObject, DeviceName, SequenceCounter};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time;
use tracing::{debug, info, trace, warn};

use crate::application::transport::{BindError, TransportFactory, TransportServer};

/// Default write timeout for one push, shared by all clients.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(500);

/// Pause after a failed `accept()` before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

struct Client {
    peer: SocketAddr,
    stream: TcpStream,
}

impl Client {
    /// Returns `false` once the peer has closed its end or the socket failed.
    ///
    /// Clients are not expected to send anything; stray bytes are discarded.
    fn is_open(&self) -> bool {
        let mut buf = [0u8; 64];
        loop {
            match self.stream.try_read(&mut buf) {
                Ok(0) => return false,
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return true,
                Err(e) => {
                    debug!("client {}: {e}", self.peer);
                    return false;
                }
            }
        }
    }
}

/// A [`TransportServer`] backed by a Tokio `TcpListener`.
pub struct TcpTransportServer {
    bind_address: IpAddr,
    write_timeout: Duration,
    listener: Option<TcpListener>,
    clients: Vec<Client>,
    sequence: SequenceCounter,
}

impl TcpTransportServer {
    /// Creates an unbound server.
    pub fn new(bind_address: IpAddr, write_timeout: Duration) -> Self {
        Self {
            bind_address,
            write_timeout,
            listener: None,
            clients: Vec::new(),
            sequence: SequenceCounter::new(),
        }
    }

    /// Address the listener is bound to, if any.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    fn prune_closed(&mut self) {
        self.clients.retain(|client| {
            let open = client.is_open();
            if !open {
                info!("client {} disconnected", client.peer);
            }
            open
        });
    }
}

#[async_trait]
impl TransportServer for TcpTransportServer {
    async fn bind(&mut self, port: u16) -> Result<(), BindError> {
        let listener = TcpListener::bind((self.bind_address, port))
            .await
            .map_err(|source| BindError { port, source })?;
        info!("listening on {}:{port}", self.bind_address);
        self.listener = Some(listener);
        self.sequence.reset();
        Ok(())
    }

    async fn unbind(&mut self) {
        if self.listener.take().is_none() {
            return;
        }
        for mut client in self.clients.drain(..) {
            if let Err(e) = client.stream.shutdown().await {
                debug!("client {}: shutdown error: {e}", client.peer);
            }
        }
        info!("listener on {} closed", self.bind_address);
    }

    async fn push_to_all(&mut self, object: &DataObject, device_name: &DeviceName) {
        self.prune_closed();
        if self.clients.is_empty() {
            trace!("no clients for {} object", object.label());
            return;
        }

        let frame = match encode_frame_now(object, device_name, self.sequence.next()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("dropping {} object: {e}", object.label());
                return;
            }
        };

        let write_timeout = self.write_timeout;
        let frame = &frame;
        let writes = self.clients.drain(..).map(move |mut client| async move {
            let result = time::timeout(write_timeout, client.stream.write_all(frame)).await;
            (client, result)
        });

        let mut kept = Vec::new();
        for (client, result) in join_all(writes).await {
            match result {
                Ok(Ok(())) => kept.push(client),
                Ok(Err(e)) => warn!("dropping client {}: write failed: {e}", client.peer),
                Err(_) => warn!(
                    "dropping client {}: write timed out after {write_timeout:?}",
                    client.peer
                ),
            }
        }
        self.clients = kept;
        trace!(
            "pushed {} object to {} client(s)",
            object.label(),
            self.clients.len()
        );
    }

    fn is_bound(&self) -> bool {
        self.listener.is_some()
    }

    async fn accept_next(&mut self) -> SocketAddr {
        loop {
            let Some(listener) = self.listener.as_ref() else {
                return std::future::pending().await;
            };
            match listener.accept().await {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("client {peer}: could not disable Nagle: {e}");
                    }
                    info!("client {peer} connected");
                    self.prune_closed();
                    self.clients.push(Client { peer, stream });
                    return peer;
                }
                Err(e) => {
                    // Transient accept error (e.g. too many open file descriptors).
                    warn!("accept error: {e}");
                    time::sleep(ACCEPT_BACKOFF).await;
                }
            }
        }
    }

    fn client_count(&self) -> usize {
        self.clients.len()
    }
}

/// Builds a fresh [`TcpTransportServer`] for every start.
#[derive(Debug, Clone)]
pub struct TcpTransportFactory {
    bind_address: IpAddr,
    write_timeout: Duration,
}

impl TcpTransportFactory {
    pub fn new(bind_address: IpAddr, write_timeout: Duration) -> Self {
        Self {
            bind_address,
            write_timeout,
        }
    }
}

impl Default for TcpTransportFactory {
    fn default() -> Self {
        Self::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_WRITE_TIMEOUT)
    }
}

impl TransportFactory for TcpTransportFactory {
    fn create(&self) -> Box<dyn TransportServer> {
        Box::new(TcpTransportServer::new(
            self.bind_address,
            self.write_timeout,
        ))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use igtl_core::{decode_frame, frame_len, HEADER_SIZE};
    use tokio::io::AsyncReadExt;

    fn loopback() -> TcpTransportServer {
        TcpTransportServer::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_WRITE_TIMEOUT)
    }

    async fn read_frame(stream: &mut TcpStream) -> igtl_core::Frame {
        let mut header = [0u8; HEADER_SIZE];
        stream.read_exact(&mut header).await.unwrap();
        let mut frame = header.to_vec();
        frame.resize(frame_len(&header).unwrap(), 0);
        stream.read_exact(&mut frame[HEADER_SIZE..]).await.unwrap();
        decode_frame(&frame).unwrap().0
    }

    #[tokio::test]
    async fn test_bind_port_zero_reports_local_addr() {
        // Arrange
        let mut server = loopback();

        // Act
        server.bind(0).await.unwrap();

        // Assert
        assert!(server.is_bound());
        assert_ne!(server.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_to_taken_port_returns_bind_error() {
        // Arrange
        let mut first = loopback();
        first.bind(0).await.unwrap();
        let port = first.local_addr().unwrap().port();
        let mut second = loopback();

        // Act
        let err = second.bind(port).await.unwrap_err();

        // Assert
        assert_eq!(err.port, port);
        assert!(!second.is_bound());
    }

    #[tokio::test]
    async fn test_accepted_client_receives_pushed_frame() {
        // Arrange
        let mut server = loopback();
        server.bind(0).await.unwrap();
        let addr = server.local_addr().unwrap();
        let mut client = TcpStream::connect(addr).await.unwrap();
        server.accept_next().await;
        let name = DeviceName::new("Probe").unwrap();

        // Act
        server
            .push_to_all(&DataObject::Text("hello".into()), &name)
            .await;
        let frame = read_frame(&mut client).await;

        // Assert
        assert_eq!(server.client_count(), 1);
        assert_eq!(frame.object, DataObject::Text("hello".into()));
        assert_eq!(frame.device_name, name);
        assert_eq!(frame.sequence_number, 0);
    }

    #[tokio::test]
    async fn test_unbind_disconnects_clients_and_is_idempotent() {
        // Arrange
        let mut server = loopback();
        server.bind(0).await.unwrap();
        let mut client = TcpStream::connect(server.local_addr().unwrap())
            .await
            .unwrap();
        server.accept_next().await;

        // Act
        server.unbind().await;
        server.unbind().await;
        let mut buf = [0u8; 1];
        let n = client.read(&mut buf).await.unwrap();

        // Assert
        assert_eq!(n, 0, "client must see EOF after unbind");
        assert!(!server.is_bound());
        assert_eq!(server.client_count(), 0);
    }

    #[tokio::test]
    async fn test_disconnected_clients_are_pruned_on_accept() {
        // Arrange
        let mut server = loopback();
        server.bind(0).await.unwrap();
        let addr = server.local_addr().unwrap();
        for _ in 0..20 {
            let client = TcpStream::connect(addr).await.unwrap();
            server.accept_next().await;
            drop(client);
        }
        time::sleep(Duration::from_millis(200)).await;

        // Act
        let _live = TcpStream::connect(addr).await.unwrap();
        server.accept_next().await;

        // Assert
        assert_eq!(server.client_count(), 1);
    }

    #[tokio::test]
    async fn test_push_skips_disconnected_clients() {
        // Arrange
        let mut server = loopback();
        server.bind(0).await.unwrap();
        let addr = server.local_addr().unwrap();
        let gone = TcpStream::connect(addr).await.unwrap();
        server.accept_next().await;
        let mut live = TcpStream::connect(addr).await.unwrap();
        server.accept_next().await;
        drop(gone);
        time::sleep(Duration::from_millis(200)).await;

        // Act
        server
            .push_to_all(&DataObject::Text("still here".into()), &DeviceName::default())
            .await;

        // Assert
        assert_eq!(server.client_count(), 1);
        let frame = read_frame(&mut live).await;
        assert_eq!(frame.sequence_number, 0);
    }

    #[tokio::test]
    async fn test_stalled_clients_share_one_write_deadline() {
        // Arrange: two clients that never read, and a frame far larger than
        // the socket buffers.
        let write_timeout = Duration::from_millis(300);
        let mut server = TcpTransportServer::new(IpAddr::V4(Ipv4Addr::LOCALHOST), write_timeout);
        server.bind(0).await.unwrap();
        let addr = server.local_addr().unwrap();
        let _a = TcpStream::connect(addr).await.unwrap();
        server.accept_next().await;
        let _b = TcpStream::connect(addr).await.unwrap();
        server.accept_next().await;
        let bulk = DataObject::Raw {
            type_name: "BULK".into(),
            bytes: vec![0u8; 32 * 1024 * 1024],
        };

        // Act
        let started = time::Instant::now();
        server.push_to_all(&bulk, &DeviceName::default()).await;
        let elapsed = started.elapsed();

        // Assert
        assert_eq!(server.client_count(), 0);
        assert!(
            elapsed < write_timeout * 2,
            "push took {elapsed:?}, expected about one write timeout"
        );
    }

    #[tokio::test]
    async fn test_push_without_clients_does_not_consume_sequence() {
        // Arrange
        let mut server = loopback();
        server.bind(0).await.unwrap();
        let name = DeviceName::default();

        // Act
        server.push_to_all(&DataObject::Text("nobody".into()), &name).await;
        let mut client = TcpStream::connect(server.local_addr().unwrap())
            .await
            .unwrap();
        server.accept_next().await;
        server.push_to_all(&DataObject::Text("first".into()), &name).await;

        // Assert
        assert_eq!(read_frame(&mut client).await.sequence_number, 0);
    }
}
