//! Inbound commands and outbound events.
//!
//! Every frame on the wire is a kind-tagged JSON object:
//!
//! ```text
//! { "type": "move", "payload": { "x": 6, "y": 5 } }
//! ```
//!
//! `#[serde(tag = "type", content = "payload")]` gives us that "adjacently
//! tagged" layout, and `rename_all = "kebab-case"` turns `SpaceJoined` into
//! `"space-joined"`. Field names stay camelCase (`spaceId`, `userId`) via
//! explicit renames, which is what browser clients expect.

use serde::{Deserialize, Serialize};

use crate::{AccountId, Position, SessionId, SpaceId};

/// A command a client sends to the server.
///
/// Anything that does not decode into one of these variants (bad JSON, an
/// unknown `type`, a missing field) is a malformed frame and is dropped by
/// the session without a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Bind this connection to a space.
    Join {
        #[serde(rename = "spaceId")]
        space_id: SpaceId,
        /// Opaque credential for the identity verifier. Older clients send
        /// it as `token`.
        #[serde(alias = "token")]
        credential: String,
    },

    /// Step to an adjacent cell.
    Move { x: i64, y: i64 },
}

/// One entry of the `users` list in [`ServerEvent::SpaceJoined`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: SessionId,
}

/// An event the server sends to one or more clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Sent only to the joiner: its spawn cell and everyone already there.
    SpaceJoined { spawn: Position, users: Vec<UserRef> },

    /// Sent to existing members when someone joins.
    UserJoined {
        #[serde(rename = "userId")]
        user_id: AccountId,
        x: i64,
        y: i64,
    },

    /// Sent to the other members after an accepted move.
    Movement { x: i64, y: i64 },

    /// Sent only to the mover, carrying the unchanged authoritative cell.
    MovementRejected { x: i64, y: i64 },

    /// Sent to the remaining members when someone disconnects.
    UserLeft {
        #[serde(rename = "userId")]
        user_id: AccountId,
    },
}

impl ServerEvent {
    /// Returns the wire `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SpaceJoined { .. } => "space-joined",
            Self::UserJoined { .. } => "user-joined",
            Self::Movement { .. } => "movement",
            Self::MovementRejected { .. } => "movement-rejected",
            Self::UserLeft { .. } => "user-left",
        }
    }
}
