//! Unified error type for the Plaza server.

use plaza_protocol::ProtocolError;
use plaza_session::SessionError;
use plaza_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `plaza` meta-crate, you deal with this single error type
/// instead of importing errors from each sub-crate. The `#[from]` attribute
/// on each variant auto-generates `From` impls, so the `?` operator converts
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum PlazaError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (rejected credential, unknown space).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Missing or invalid server configuration.
    #[error("configuration error: {0}")]
    Config(String),
}
