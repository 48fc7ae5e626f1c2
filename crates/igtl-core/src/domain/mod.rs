//! Domain layer: the objects a sender streams and the name it streams them under.
//!
//! Nothing in here performs I/O.  Both types are plain values that the
//! application layer moves onto the worker lane and hands to a transport.

pub mod device;
pub mod object;

pub use device::{DeviceName, DeviceNameError};
pub use object::{DataObject, ObjectKind, Transform};
