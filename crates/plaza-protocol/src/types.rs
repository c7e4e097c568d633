//! Identity and coordinate types shared by every layer.
//!
//! All identifiers are opaque strings on the wire. Wrapping each one in its
//! own newtype means a `SpaceId` can never be passed where a `SessionId` is
//! expected, even though both are `String` underneath.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Process-local identifier of one live connection's session.
///
/// Generated when the connection is accepted and never reused while the
/// process runs. This is the id the room registry uses to tell "self" apart
/// from the other members, and the id listed in `space-joined.users`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps an already-generated session id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable account identifier yielded by the identity verifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a space (a room). Opaque to this layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpaceId(String);

impl SpaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A cell on a space's integer grid.
///
/// Serializes as `{"x": .., "y": ..}`. Coordinates are signed so a client
/// asking for `-1` gets a normal rejection rather than a decode failure.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

impl Position {
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Returns `true` if `target` is exactly one cell away along a single
    /// axis. Zero, diagonal, and multi-cell displacements all return `false`.
    ///
    /// `abs_diff` yields a `u64`, so even `i64::MIN` → `i64::MAX` cannot
    /// overflow.
    pub fn is_unit_step_to(&self, target: Position) -> bool {
        let dx = self.x.abs_diff(target.x);
        let dy = self.y.abs_diff(target.y);
        matches!((dx, dy), (1, 0) | (0, 1))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
