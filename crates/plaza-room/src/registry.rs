//! The room registry: which sessions are in which space, and fan-out.
//!
//! # Concurrency
//!
//! Rooms live in a [`DashMap`], a hash map split into independently locked
//! shards. Every operation on a room runs while holding that room's shard
//! lock, so a broadcast always iterates a complete member list: a
//! concurrent join is either fully in it or fully absent. Rooms in
//! different shards never contend.
//!
//! Delivery is a non-blocking push onto each member's unbounded event
//! queue, so holding the shard lock during a broadcast never waits on a
//! slow socket. The member's own writer task drains its queue.

use std::sync::Arc;

use dashmap::DashMap;
use plaza_protocol::{ServerEvent, SessionId, SpaceId};
use tokio::sync::mpsc;

/// Sending half of a session's outbound event queue.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Receiving half of a session's outbound event queue.
pub type EventReceiver = mpsc::UnboundedReceiver<ServerEvent>;

/// Creates a fresh outbound event queue for one session.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// A registry entry: a session's id plus the handle used to reach it.
///
/// The registry tracks membership by reference. It holds a clone of the
/// session's queue sender but does not own the session itself.
#[derive(Debug, Clone)]
pub struct Member {
    session_id: SessionId,
    sender: EventSender,
}

impl Member {
    pub fn new(session_id: SessionId, sender: EventSender) -> Self {
        Self { session_id, sender }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Pushes an event onto this member's queue.
    ///
    /// Returns `false` if the member's receiver is gone (its connection is
    /// tearing down). Never blocks.
    fn deliver(&self, event: &ServerEvent) -> bool {
        self.sender.send(event.clone()).is_ok()
    }
}

/// Process-wide map from space id to the sessions currently joined to it.
///
/// Construct one at startup and hand clones to every session. Cloning is
/// cheap (an `Arc` bump) and all clones see the same rooms. Separate
/// `RoomRegistry::new()` calls are fully isolated, which keeps tests
/// independent of each other.
#[derive(Debug, Clone, Default)]
pub struct RoomRegistry {
    /// Members per room, in join order.
    rooms: Arc<DashMap<SpaceId, Vec<Member>>>,
}

impl RoomRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `member` to the room, creating the room if needed.
    ///
    /// Returns the ids of the members that were already present, captured
    /// in the same critical section as the insert. That snapshot is exactly
    /// the `users` list the joiner should be told about. If the session is
    /// already a member, its handle is refreshed rather than duplicated.
    ///
    /// `welcome` is called with that snapshot while the room is locked, and
    /// whatever it returns is delivered to `member` before it becomes
    /// visible to broadcasts. The welcome is therefore always the first
    /// event the joiner sees from this room, even if another session
    /// broadcasts at the same moment.
    pub fn add<F>(&self, space_id: &SpaceId, member: Member, welcome: F) -> Vec<SessionId>
    where
        F: FnOnce(&[SessionId]) -> Option<ServerEvent>,
    {
        let mut room = self.rooms.entry(space_id.clone()).or_default();

        let others: Vec<SessionId> = room
            .iter()
            .filter(|m| m.session_id != member.session_id)
            .map(|m| m.session_id.clone())
            .collect();

        if let Some(event) = welcome(&others) {
            if !member.deliver(&event) {
                tracing::debug!(
                    session_id = %member.session_id,
                    %space_id,
                    kind = event.kind(),
                    "welcome skipped, member queue closed"
                );
            }
        }

        match room.iter_mut().find(|m| m.session_id == member.session_id) {
            Some(existing) => {
                tracing::debug!(
                    session_id = %member.session_id,
                    %space_id,
                    "session already in room, refreshing handle"
                );
                *existing = member;
            }
            None => room.push(member),
        }

        others
    }

    /// Removes a session from a room. Empty rooms are pruned.
    ///
    /// Returns `true` if the session was a member.
    pub fn remove(&self, session_id: &SessionId, space_id: &SpaceId) -> bool {
        let removed = match self.rooms.get_mut(space_id) {
            Some(mut room) => {
                let before = room.len();
                room.retain(|m| &m.session_id != session_id);
                room.len() != before
            }
            None => false,
        };

        // The guard above is released before this takes the shard lock
        // again. `remove_if` re-checks emptiness, so a join that slipped in
        // between keeps the room alive.
        self.rooms.remove_if(space_id, |_, members| members.is_empty());

        removed
    }

    /// Delivers `event` to every member of the room except `exclude`.
    ///
    /// Fire-and-forget: a member whose queue is closed is skipped and the
    /// rest still get the event. Returns how many members it reached.
    pub fn broadcast(
        &self,
        event: &ServerEvent,
        space_id: &SpaceId,
        exclude: Option<&SessionId>,
    ) -> usize {
        let Some(room) = self.rooms.get(space_id) else {
            return 0;
        };

        let mut delivered = 0;
        for member in room.iter() {
            if Some(&member.session_id) == exclude {
                continue;
            }
            if member.deliver(event) {
                delivered += 1;
            } else {
                tracing::debug!(
                    session_id = %member.session_id,
                    %space_id,
                    kind = event.kind(),
                    "delivery skipped, member queue closed"
                );
            }
        }
        delivered
    }

    /// Returns the ids of the room's current members, in join order.
    pub fn members_of(&self, space_id: &SpaceId) -> Vec<SessionId> {
        self.rooms
            .get(space_id)
            .map(|room| room.iter().map(|m| m.session_id.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns `true` if the session is currently in the room.
    pub fn is_member(&self, space_id: &SpaceId, session_id: &SessionId) -> bool {
        self.rooms
            .get(space_id)
            .is_some_and(|room| room.iter().any(|m| &m.session_id == session_id))
    }

    /// Returns the number of non-empty rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
