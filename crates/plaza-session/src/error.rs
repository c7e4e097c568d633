//! Error types for the session layer.

use plaza_protocol::SpaceId;

/// Errors that end a session's join attempt.
///
/// Every variant is fatal to the connection: when [`Session::join`]
/// returns one, the session is already `Closed` and the caller closes the
/// transport. Nothing is broadcast.
///
/// [`Session::join`]: crate::Session::join
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The credential was invalid, expired, or rejected by the
    /// [`IdentityVerifier`](crate::IdentityVerifier).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested space does not exist.
    #[error("space {0} not found")]
    SpaceNotFound(SpaceId),

    /// The space store could not answer.
    #[error("space lookup failed: {0}")]
    Lookup(String),

    /// A width/height pair was zero or could not be parsed.
    #[error("invalid space dimensions: {0}")]
    InvalidDimensions(String),
}
