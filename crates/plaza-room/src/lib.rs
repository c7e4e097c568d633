//! Room membership and broadcast for Plaza.
//!
//! A "room" is the live set of sessions joined to one space. This crate
//! keeps that set and fans events out to it. It knows nothing about
//! credentials, positions, or sockets: members are reached through their
//! outbound event queues.
//!
//! # Key types
//!
//! - [`RoomRegistry`] — process-wide `space → members` map
//! - [`Member`] — a session id plus its event queue handle
//! - [`EventSender`] / [`EventReceiver`] — a session's outbound queue

mod registry;

pub use registry::{EventReceiver, EventSender, Member, RoomRegistry, event_channel};
