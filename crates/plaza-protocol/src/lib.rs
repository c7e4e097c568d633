//! Wire protocol for Plaza.
//!
//! This crate defines the "language" that clients and the presence server
//! speak:
//!
//! - **Types** ([`SessionId`], [`AccountId`], [`SpaceId`], [`Position`]) —
//!   identifiers and grid coordinates.
//! - **Messages** ([`ClientMessage`], [`ServerEvent`]) — the kind-tagged
//!   frames that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while doing so.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw frames) and session
//! (per-connection state). It doesn't know about connections or rooms.
//!
//! ```text
//! Transport (bytes) → Protocol (ClientMessage) → Session → Room Registry
//! ```

mod codec;
mod error;
mod messages;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use messages::{ClientMessage, ServerEvent, UserRef};
pub use types::{AccountId, Position, SessionId, SpaceId};
