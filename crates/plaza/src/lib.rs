//! # Plaza
//!
//! Real-time presence and movement server for shared 2D spaces.
//!
//! Clients connect over WebSocket, `join` a space with a credential, and
//! then `move` one cell at a time. The server keeps every user's
//! authoritative position and tells everyone else in the space who
//! arrived, who moved, and who left.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use plaza::prelude::*;
//!
//! # async fn run() -> Result<(), PlazaError> {
//! let spaces = StaticSpaces::new()
//!     .with_space(SpaceId::new("lobby"), "100x200".parse()?);
//!
//! let server = PlazaServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(JwtVerifier::hs256(b"secret"), spaces)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{
    BIND_ADDR_VAR, DEFAULT_BIND_ADDR, JWT_SECRET_VAR, SPACES_FILE_VAR, ServerConfig,
};
pub use error::PlazaError;
pub use server::{PlazaServer, PlazaServerBuilder};

/// Everything needed to run or embed a presence server.
pub mod prelude {
    pub use crate::{PlazaError, PlazaServer, PlazaServerBuilder, ServerConfig};

    pub use plaza_protocol::{
        AccountId, ClientMessage, Codec, JsonCodec, Position, ServerEvent, SessionId, SpaceId,
        UserRef,
    };
    pub use plaza_room::RoomRegistry;
    pub use plaza_session::{
        Dimensions, IdentityVerifier, JwtVerifier, SessionError, SpaceDirectory, StaticSpaces,
    };
}
