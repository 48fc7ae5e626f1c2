//! # igtl-core
//!
//! Shared library for the IGTL sender containing the data objects that get
//! streamed to clients, the validated device name attached to every payload,
//! and the frame envelope used by the bundled TCP transport.
//!
//! This crate has zero dependencies on sockets, threads or async runtimes.
//!
//! - **`domain`** – What gets sent.  A [`DataObject`] is one unit the hosting
//!   pipeline makes available (a tracked transform, a status report, a text
//!   message or an opaque typed blob).  A [`DeviceName`] identifies the
//!   logical source the object came from.
//!
//! - **`protocol`** – How a data object travels over a byte stream.  Each
//!   object is wrapped in a 24-byte header followed by the device name and the
//!   object payload.  The envelope is deliberately small: it is the carrier of
//!   the bundled transport, not an OpenIGTLink implementation.

pub mod domain;
pub mod protocol;

pub use domain::device::{DeviceName, DeviceNameError, DEFAULT_DEVICE_NAME, MAX_DEVICE_NAME_LEN};
pub use domain::object::{DataObject, ObjectKind, Transform};
pub use protocol::codec::{
    decode_frame, encode_frame, encode_frame_now, frame_len, Frame, ProtocolError, HEADER_SIZE,
};
pub use protocol::sequence::SequenceCounter;
