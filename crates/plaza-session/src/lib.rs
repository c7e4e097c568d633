//! Per-connection sessions for Plaza.
//!
//! This crate owns everything that happens between "a frame arrived" and
//! "events were queued":
//!
//! 1. **Identity** ([`IdentityVerifier`], [`JwtVerifier`]) turns a
//!    client's credential into an account id
//! 2. **Space lookup** ([`SpaceDirectory`], [`StaticSpaces`]) answers
//!    "does this space exist, and how big is it?"
//! 3. **The session state machine** ([`Session`]) handles join, move and
//!    disconnect, keeping each connection's authoritative position
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)         ← owns sockets, feeds frames into sessions
//!     ↕
//! Session Layer (this crate)  ← validates commands, produces events
//!     ↕
//! Room Layer (below)     ← membership and fan-out
//!     ↕
//! Protocol Layer         ← ids, positions, wire messages
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod id;
mod session;
mod spaces;

pub use auth::{IdentityVerifier, JwtVerifier};
pub use error::SessionError;
pub use id::{SESSION_ID_LEN, generate_session_id};
pub use session::{Session, SessionContext, SessionState};
pub use spaces::{Dimensions, SpaceDirectory, StaticSpaces};
