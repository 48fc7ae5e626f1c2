//! Infrastructure layer: concrete transports, configuration storage and the
//! stdin control console.

pub mod console;
pub mod network;
pub mod storage;
