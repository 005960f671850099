//! Protocol-level errors for wire frame processing
//!
//! Each variant carries enough context to diagnose a malformed frame
//! without re-reading the buffer: what was expected, what arrived, and
//! which operation was being decoded.

use thiserror::Error;

/// Frame encode/decode errors with diagnostic context.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    /// Frame shape does not match the operation being decoded.
    #[error("invalid message for {route}: {reason} (frame: {frame_len} bytes)")]
    InvalidMessage {
        route: &'static str,
        reason: String,
        frame_len: usize,
    },

    /// Buffer ended before a declared field could be read.
    #[error("message too small: need {need} bytes, got {got} (context: {context})")]
    MessageTooSmall {
        need: usize,
        got: usize,
        context: &'static str,
    },

    /// Declared size field disagrees with the bytes actually present.
    #[error("size mismatch: declared {declared} bytes, frame carries {actual}")]
    SizeMismatch { declared: usize, actual: usize },

    /// Declared size exceeds the configured frame ceiling.
    #[error("message too large: {size} bytes exceeds maximum {max}")]
    MessageTooLarge { size: usize, max: usize },

    /// Target list exceeds the u16 count prefix.
    #[error("too many targets: {count} exceeds limit {max}")]
    TooManyTargets { count: usize, max: usize },

    /// Route byte is not recognized by this decoder.
    #[error("unknown route byte {route}")]
    UnknownRoute { route: u8 },

    /// A fixed-vocabulary field (kind, event, state, code) carried an
    /// out-of-range value.
    #[error("invalid {field} value {value} in {route} frame")]
    InvalidField {
        route: &'static str,
        field: &'static str,
        value: u64,
    },

    /// Transport-level read/write failure during framing.
    #[error("framing I/O error: {message}")]
    Io { message: String },
}

impl ProtocolError {
    /// An "invalid message" error for a frame whose shape does not match
    /// its operation.
    pub fn invalid_message(
        route: &'static str,
        reason: impl Into<String>,
        frame_len: usize,
    ) -> Self {
        Self::InvalidMessage {
            route,
            reason: reason.into(),
            frame_len,
        }
    }

    pub fn message_too_small(need: usize, got: usize, context: &'static str) -> Self {
        Self::MessageTooSmall { need, got, context }
    }

    pub fn size_mismatch(declared: usize, actual: usize) -> Self {
        Self::SizeMismatch { declared, actual }
    }

    pub fn invalid_field(route: &'static str, field: &'static str, value: u64) -> Self {
        Self::InvalidField {
            route,
            field,
            value,
        }
    }
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;
