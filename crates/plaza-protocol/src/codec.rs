//! Codec trait and implementations for serializing/deserializing frames.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes. The
//! server never calls `serde_json` directly; it goes through [`Codec`], so
//! the wire format can change without touching session or room code.

use serde::{Serialize, de::DeserializeOwned};

use crate::{ClientMessage, ProtocolError};

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;

    /// Returns `true` if [`encode`](Self::encode) always yields UTF-8 text,
    /// so the transport can send text frames instead of binary ones.
    fn is_textual(&self) -> bool {
        false
    }

    /// Parses one inbound frame into a [`ClientMessage`].
    fn decode_command(&self, data: &[u8]) -> Result<ClientMessage, ProtocolError> {
        self.decode(data)
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// JSON is the native format of the browser clients that connect to a
/// space, and it's readable in DevTools. Behind the `json` feature flag
/// (enabled by default).
///
/// ## Example
///
/// ```rust
/// use plaza_protocol::{ClientMessage, Codec, JsonCodec, ServerEvent};
///
/// let codec = JsonCodec;
///
/// let cmd = codec
///     .decode_command(br#"{"type":"move","payload":{"x":1,"y":0}}"#)
///     .unwrap();
/// assert_eq!(cmd, ClientMessage::Move { x: 1, y: 0 });
///
/// let bytes = codec.encode(&ServerEvent::Movement { x: 1, y: 0 }).unwrap();
/// assert!(std::str::from_utf8(&bytes).is_ok());
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }

    fn is_textual(&self) -> bool {
        true
    }
}
