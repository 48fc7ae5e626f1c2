//! Transport Server implementations.
//!
//! - [`tcp_server`] – the production transport: a Tokio `TcpListener` that
//!   pushes sequence-numbered frames to every client.
//! - [`mock`] – a recording transport for tests.

pub mod mock;
pub mod tcp_server;

pub use tcp_server::{TcpTransportFactory, TcpTransportServer};
