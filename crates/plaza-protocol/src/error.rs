//! Error types for the protocol layer.
//!
//! Each crate in Plaza defines its own error enum. A `ProtocolError` always
//! means the bytes were the problem, never the network or the room.

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust value).
    ///
    /// Malformed JSON, an unknown `type` tag, a missing field, and a
    /// non-integer coordinate all land here. The session drops such frames.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame is not usable even though it decoded, e.g. an encoder
    /// produced bytes that are not valid UTF-8 for a text frame.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
