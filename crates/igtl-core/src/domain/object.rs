//! Data objects streamed to connected clients.

use serde::{Deserialize, Serialize};

/// A homogeneous 4×4 transform stored in row-major order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Matrix elements, row by row.
    pub matrix: [f32; 16],
}

impl Transform {
    /// The identity transform.
    pub const IDENTITY: Self = Self {
        matrix: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    /// Builds a pure translation.
    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        let mut t = Self::IDENTITY;
        t.matrix[3] = x;
        t.matrix[7] = y;
        t.matrix[11] = z;
        t
    }

    /// Returns the translation column `(x, y, z)`.
    pub fn translation(&self) -> (f32, f32, f32) {
        (self.matrix[3], self.matrix[7], self.matrix[11])
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Discriminant of a [`DataObject`], as carried in the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ObjectKind {
    Transform = 0x01,
    Status = 0x02,
    Text = 0x03,
    Raw = 0x7F,
}

impl TryFrom<u8> for ObjectKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Transform),
            0x02 => Ok(Self::Status),
            0x03 => Ok(Self::Text),
            0x7F => Ok(Self::Raw),
            other => Err(other),
        }
    }
}

/// One object made available by the hosting pipeline.
///
/// Objects are immutable once handed to the sender; each `send_object` call
/// moves one of these onto the worker lane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataObject {
    /// A tracked pose or calibration matrix.
    Transform(Transform),
    /// A device status report.
    Status { code: u16, message: String },
    /// Free-form text.
    Text(String),
    /// An opaque payload tagged with its own type name.
    Raw { type_name: String, bytes: Vec<u8> },
}

impl DataObject {
    /// Returns the kind tag used on the wire.
    pub fn kind(&self) -> ObjectKind {
        match self {
            DataObject::Transform(_) => ObjectKind::Transform,
            DataObject::Status { .. } => ObjectKind::Status,
            DataObject::Text(_) => ObjectKind::Text,
            DataObject::Raw { .. } => ObjectKind::Raw,
        }
    }

    /// Short, value-free label for log lines.
    pub fn label(&self) -> &str {
        match self {
            DataObject::Transform(_) => "TRANSFORM",
            DataObject::Status { .. } => "STATUS",
            DataObject::Text(_) => "STRING",
            DataObject::Raw { type_name, .. } => type_name,
        }
    }
}

impl From<Transform> for DataObject {
    fn from(t: Transform) -> Self {
        DataObject::Transform(t)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
