//! Frame envelope for streaming [`DataObject`]s over a byte stream.
//!
//! Wire format:
//! ```text
//! [version:1][kind:1][name_len:1][reserved:1][payload_len:4][seq:8][timestamp_us:8]
//! [device_name:name_len][payload:payload_len]
//! ```
//! Header size: 24 bytes. All multi-byte integers are big-endian.
//!
//! Payload layout per kind:
//!
//! | Kind        | Payload                                   |
//! |-------------|-------------------------------------------|
//! | `Transform` | 16 × f32, row-major                       |
//! | `Status`    | code:u16, then UTF-8 message to the end   |
//! | `Text`      | UTF-8 text                                |
//! | `Raw`       | type_len:u8, type name, then opaque bytes |

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::domain::device::DeviceName;
use crate::domain::object::{DataObject, ObjectKind, Transform};

/// Version byte written into every frame header.
pub const FRAME_VERSION: u8 = 0x01;

/// Fixed header length in bytes.
pub const HEADER_SIZE: usize = 24;

const TRANSFORM_PAYLOAD_LEN: usize = 16 * 4;

/// Errors that can occur while encoding or decoding a frame.
#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    /// The byte slice is shorter than the minimum required length.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The kind byte in the header is not a recognized value.
    #[error("unknown object kind: 0x{0:02X}")]
    UnknownObjectKind(u8),

    /// The frame version in the header is not supported.
    #[error("unsupported frame version: {0}")]
    UnsupportedVersion(u8),

    /// The payload or device name could not be parsed.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A field is too long to be represented in its length prefix.
    #[error("{field} is {len} bytes long; the limit is {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub device_name: DeviceName,
    pub sequence_number: u64,
    pub timestamp_us: u64,
    pub object: DataObject,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes `object` under `device_name` into a complete frame.
///
/// # Errors
///
/// Returns [`ProtocolError::FieldTooLong`] if the payload exceeds `u32::MAX`
/// bytes or a raw object's type name exceeds 255 bytes.
///
/// # Examples
///
/// ```rust
/// use igtl_core::{decode_frame, encode_frame, DataObject, DeviceName};
///
/// let name = DeviceName::new("Probe").unwrap();
/// let bytes = encode_frame(&DataObject::Text("hi".into()), &name, 7, 0).unwrap();
/// let (frame, consumed) = decode_frame(&bytes).unwrap();
/// assert_eq!(frame.sequence_number, 7);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_frame(
    object: &DataObject,
    device_name: &DeviceName,
    sequence_number: u64,
    timestamp_us: u64,
) -> Result<Vec<u8>, ProtocolError> {
    let payload = encode_payload(object)?;
    let payload_len = u32::try_from(payload.len()).map_err(|_| ProtocolError::FieldTooLong {
        field: "payload",
        len: payload.len(),
        max: u32::MAX as usize,
    })?;

    // DeviceName guarantees at most 20 bytes, so the length fits a u8.
    let name = device_name.as_bytes();

    let mut buf = Vec::with_capacity(HEADER_SIZE + name.len() + payload.len());
    buf.push(FRAME_VERSION);
    buf.push(object.kind() as u8);
    buf.push(name.len() as u8);
    buf.push(0x00); // reserved
    buf.extend_from_slice(&payload_len.to_be_bytes());
    buf.extend_from_slice(&sequence_number.to_be_bytes());
    buf.extend_from_slice(&timestamp_us.to_be_bytes());
    buf.extend_from_slice(name);
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Encodes a frame stamped with the current system time.
///
/// # Errors
///
/// Same as [`encode_frame`].
pub fn encode_frame_now(
    object: &DataObject,
    device_name: &DeviceName,
    sequence_number: u64,
) -> Result<Vec<u8>, ProtocolError> {
    let timestamp_us = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64;
    encode_frame(object, device_name, sequence_number, timestamp_us)
}

/// Returns the full length of the frame whose header starts `bytes`.
///
/// Stream readers use this after reading [`HEADER_SIZE`] bytes to learn how
/// many more bytes belong to the same frame.
///
/// # Errors
///
/// Returns [`ProtocolError::InsufficientData`] if fewer than [`HEADER_SIZE`]
/// bytes are available, or [`ProtocolError::UnsupportedVersion`] for a
/// foreign version byte.
pub fn frame_len(bytes: &[u8]) -> Result<usize, ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }
    if bytes[0] != FRAME_VERSION {
        return Err(ProtocolError::UnsupportedVersion(bytes[0]));
    }
    let name_len = bytes[2] as usize;
    let payload_len = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    Ok(HEADER_SIZE + name_len + payload_len)
}

/// Decodes one frame from the beginning of `bytes`.
///
/// Returns the frame and the number of bytes consumed.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the bytes are truncated or malformed.
pub fn decode_frame(bytes: &[u8]) -> Result<(Frame, usize), ProtocolError> {
    let total = frame_len(bytes)?;
    if bytes.len() < total {
        return Err(ProtocolError::InsufficientData {
            needed: total,
            available: bytes.len(),
        });
    }

    let kind = ObjectKind::try_from(bytes[1]).map_err(ProtocolError::UnknownObjectKind)?;
    let name_len = bytes[2] as usize;
    let sequence_number = read_u64(bytes, 8)?;
    let timestamp_us = read_u64(bytes, 16)?;

    let name_end = HEADER_SIZE + name_len;
    let name = std::str::from_utf8(&bytes[HEADER_SIZE..name_end])
        .map_err(|e| ProtocolError::MalformedPayload(format!("device name is not UTF-8: {e}")))?;
    let device_name = DeviceName::new(name)
        .map_err(|e| ProtocolError::MalformedPayload(format!("invalid device name: {e}")))?;

    let object = decode_payload(kind, &bytes[name_end..total])?;
    Ok((
        Frame {
            device_name,
            sequence_number,
            timestamp_us,
            object,
        },
        total,
    ))
}

// ── Payload encoding ──────────────────────────────────────────────────────────

fn encode_payload(object: &DataObject) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::new();
    match object {
        DataObject::Transform(t) => {
            for value in t.matrix {
                buf.extend_from_slice(&value.to_be_bytes());
            }
        }
        DataObject::Status { code, message } => {
            buf.extend_from_slice(&code.to_be_bytes());
            buf.extend_from_slice(message.as_bytes());
        }
        DataObject::Text(text) => buf.extend_from_slice(text.as_bytes()),
        DataObject::Raw { type_name, bytes } => {
            let name = type_name.as_bytes();
            let name_len = u8::try_from(name.len()).map_err(|_| ProtocolError::FieldTooLong {
                field: "raw type name",
                len: name.len(),
                max: u8::MAX as usize,
            })?;
            buf.push(name_len);
            buf.extend_from_slice(name);
            buf.extend_from_slice(bytes);
        }
    }
    Ok(buf)
}

// ── Payload decoding ──────────────────────────────────────────────────────────

fn decode_payload(kind: ObjectKind, p: &[u8]) -> Result<DataObject, ProtocolError> {
    match kind {
        ObjectKind::Transform => {
            if p.len() != TRANSFORM_PAYLOAD_LEN {
                return Err(ProtocolError::MalformedPayload(format!(
                    "Transform: need {TRANSFORM_PAYLOAD_LEN} bytes, got {}",
                    p.len()
                )));
            }
            let mut matrix = [0f32; 16];
            for (i, chunk) in p.chunks_exact(4).enumerate() {
                matrix[i] = f32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            }
            Ok(DataObject::Transform(Transform { matrix }))
        }
        ObjectKind::Status => {
            if p.len() < 2 {
                return Err(ProtocolError::MalformedPayload(format!(
                    "Status: need 2 bytes, got {}",
                    p.len()
                )));
            }
            let code = u16::from_be_bytes([p[0], p[1]]);
            let message = read_utf8(&p[2..], "Status.message")?;
            Ok(DataObject::Status { code, message })
        }
        ObjectKind::Text => Ok(DataObject::Text(read_utf8(p, "Text")?)),
        ObjectKind::Raw => {
            let Some((&name_len, rest)) = p.split_first() else {
                return Err(ProtocolError::MalformedPayload(
                    "Raw: missing type name length".to_string(),
                ));
            };
            let name_len = name_len as usize;
            if rest.len() < name_len {
                return Err(ProtocolError::MalformedPayload(format!(
                    "Raw: type name of length {name_len} exceeds payload"
                )));
            }
            let type_name = read_utf8(&rest[..name_len], "Raw.type_name")?;
            Ok(DataObject::Raw {
                type_name,
                bytes: rest[name_len..].to_vec(),
            })
        }
    }
}

// ── Low-level helpers ─────────────────────────────────────────────────────────

fn read_u64(buf: &[u8], offset: usize) -> Result<u64, ProtocolError> {
    let Some(slice) = buf.get(offset..offset + 8) else {
        return Err(ProtocolError::InsufficientData {
            needed: offset + 8,
            available: buf.len(),
        });
    };
    let mut raw = [0u8; 8];
    raw.copy_from_slice(slice);
    Ok(u64::from_be_bytes(raw))
}

fn read_utf8(buf: &[u8], context: &str) -> Result<String, ProtocolError> {
    std::str::from_utf8(buf)
        .map(str::to_string)
        .map_err(|e| ProtocolError::MalformedPayload(format!("{context}: invalid UTF-8: {e}")))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn probe() -> DeviceName {
        DeviceName::new("Probe").unwrap()
    }

    fn round_trip(object: &DataObject) -> Frame {
        let encoded = encode_frame(object, &probe(), 3, 99).expect("encode failed");
        let (frame, consumed) = decode_frame(&encoded).expect("decode failed");
        assert_eq!(consumed, encoded.len(), "consumed bytes must equal frame size");
        frame
    }

    #[test]
    fn test_transform_round_trip_preserves_matrix() {
        let t = Transform::from_translation(10.0, -4.5, 0.25);
        let frame = round_trip(&DataObject::Transform(t));
        assert_eq!(frame.object, DataObject::Transform(t));
    }

    #[test]
    fn test_status_with_empty_message_round_trip() {
        let obj = DataObject::Status {
            code: 13,
            message: String::new(),
        };
        assert_eq!(round_trip(&obj).object, obj);
    }

    #[test]
    fn test_raw_round_trip_keeps_type_name_and_bytes() {
        let obj = DataObject::Raw {
            type_name: "POINT".to_string(),
            bytes: vec![0, 1, 2, 254, 255],
        };
        assert_eq!(round_trip(&obj).object, obj);
    }

    #[test]
    fn test_frame_carries_device_name_sequence_and_timestamp() {
        let frame = round_trip(&DataObject::Text("x".into()));
        assert_eq!(frame.device_name.as_str(), "Probe");
        assert_eq!(frame.sequence_number, 3);
        assert_eq!(frame.timestamp_us, 99);
    }

    // ── Header layout ────────────────────────────────────────────────────────

    #[test]
    fn test_header_layout() {
        // Arrange
        let bytes = encode_frame(&DataObject::Text("abc".into()), &probe(), 0x0102, 0x0304).unwrap();

        // Assert
        assert_eq!(bytes[0], FRAME_VERSION);
        assert_eq!(bytes[1], ObjectKind::Text as u8);
        assert_eq!(bytes[2], 5, "name_len must be the byte length of 'Probe'");
        assert_eq!(u32::from_be_bytes(bytes[4..8].try_into().unwrap()), 3);
        assert_eq!(u64::from_be_bytes(bytes[8..16].try_into().unwrap()), 0x0102);
        assert_eq!(u64::from_be_bytes(bytes[16..24].try_into().unwrap()), 0x0304);
        assert_eq!(&bytes[24..29], b"Probe");
        assert_eq!(&bytes[29..], b"abc");
    }

    #[test]
    fn test_frame_len_reads_total_from_header() {
        let bytes = encode_frame(&DataObject::Text("abcd".into()), &probe(), 0, 0).unwrap();
        assert_eq!(frame_len(&bytes[..HEADER_SIZE]), Ok(bytes.len()));
    }

    #[test]
    fn test_decode_two_frames_back_to_back() {
        // Arrange
        let mut stream = encode_frame(&DataObject::Text("one".into()), &probe(), 1, 0).unwrap();
        stream.extend(encode_frame(&DataObject::Text("two".into()), &probe(), 2, 0).unwrap());

        // Act
        let (first, n) = decode_frame(&stream).unwrap();
        let (second, _) = decode_frame(&stream[n..]).unwrap();

        // Assert
        assert_eq!(first.object, DataObject::Text("one".into()));
        assert_eq!(second.object, DataObject::Text("two".into()));
    }

    // ── Error conditions ─────────────────────────────────────────────────────

    #[test]
    fn test_decode_empty_bytes_returns_insufficient_data() {
        assert!(matches!(
            decode_frame(&[]),
            Err(ProtocolError::InsufficientData { .. })
        ));
    }

    #[test]
    fn test_decode_truncated_body_returns_insufficient_data() {
        let bytes = encode_frame(&DataObject::Text("hello".into()), &probe(), 0, 0).unwrap();
        let result = decode_frame(&bytes[..bytes.len() - 1]);
        assert!(matches!(result, Err(ProtocolError::InsufficientData { .. })));
    }

    #[test]
    fn test_decode_wrong_version_returns_error() {
        let mut bytes = encode_frame(&DataObject::Text("v".into()), &probe(), 0, 0).unwrap();
        bytes[0] = 0x99;
        assert_eq!(
            decode_frame(&bytes).unwrap_err(),
            ProtocolError::UnsupportedVersion(0x99)
        );
    }

    #[test]
    fn test_decode_unknown_kind_returns_error() {
        let mut bytes = encode_frame(&DataObject::Text("k".into()), &probe(), 0, 0).unwrap();
        bytes[1] = 0x55;
        assert_eq!(
            decode_frame(&bytes).unwrap_err(),
            ProtocolError::UnknownObjectKind(0x55)
        );
    }

    #[test]
    fn test_decode_short_transform_payload_is_malformed() {
        // Arrange: a Text frame relabelled as Transform has the wrong payload size.
        let mut bytes = encode_frame(&DataObject::Text("abc".into()), &probe(), 0, 0).unwrap();
        bytes[1] = ObjectKind::Transform as u8;

        // Act / Assert
        assert!(matches!(
            decode_frame(&bytes),
            Err(ProtocolError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_encode_rejects_oversized_raw_type_name() {
        let obj = DataObject::Raw {
            type_name: "T".repeat(256),
            bytes: Vec::new(),
        };
        assert!(matches!(
            encode_frame(&obj, &probe(), 0, 0),
            Err(ProtocolError::FieldTooLong { len: 256, .. })
        ));
    }
}
