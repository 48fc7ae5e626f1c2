//! Frame envelope and sequence numbering for outgoing objects.

pub mod codec;
pub mod sequence;

pub use codec::{
    decode_frame, encode_frame, encode_frame_now, frame_len, Frame, ProtocolError, FRAME_VERSION,
    HEADER_SIZE,
};
pub use sequence::SequenceCounter;
