//! Application layer: the worker lane, the sender state machine and the
//! trigger surface callers use to drive it.
//!
//! Everything here depends only on the [`transport::TransportServer`] trait;
//! concrete transports live in `infrastructure::network`.

pub mod network_sender;
pub mod sender_service;
pub mod transport;
pub mod trigger;
pub mod worker;

pub use network_sender::{Completion, NetworkSender};
pub use sender_service::{SenderError, SenderEvent, SenderService, SenderSettings, ServiceState};
pub use transport::{BindError, TransportFactory, TransportServer};
pub use trigger::{Trigger, TriggerParseError};
pub use worker::{Worker, WorkerError};
