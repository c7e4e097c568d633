//! The per-connection session state machine.
//!
//! ```text
//!   Connected ──(join ok)──→ Joined ──(disconnect)──→ Closed
//!       │                                               ↑
//!       ├──(join fails: bad credential / unknown space)─┤
//!       └──────────────────(disconnect)─────────────────┘
//! ```
//!
//! A session translates decoded client commands into registry operations
//! and events. It never touches a socket. Everything it sends, including
//! events addressed only to itself, goes through its outbound queue, the
//! same queue the registry uses to reach it. That keeps per-connection
//! event order identical to the order events were produced in.

use std::sync::Arc;

use plaza_protocol::{
    AccountId, ClientMessage, Codec, Position, ServerEvent, SessionId, SpaceId, UserRef,
};
use plaza_room::{EventSender, Member, RoomRegistry};

use crate::{IdentityVerifier, SessionError, SpaceDirectory, generate_session_id};

// ---------------------------------------------------------------------------
// SessionContext
// ---------------------------------------------------------------------------

/// The collaborators every session needs, built once per server.
///
/// Sessions receive this through their constructor (wrapped in an `Arc`)
/// instead of reaching for process globals, so two servers, or two tests,
/// can each have their own registry.
pub struct SessionContext<V, D> {
    registry: RoomRegistry,
    verifier: V,
    spaces: D,
}

impl<V: IdentityVerifier, D: SpaceDirectory> SessionContext<V, D> {
    pub fn new(registry: RoomRegistry, verifier: V, spaces: D) -> Self {
        Self {
            registry,
            verifier,
            spaces,
        }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The externally visible lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport open, not in any space yet.
    Connected,
    /// Bound to a space with an authoritative position.
    Joined,
    /// Terminal. No further commands are processed.
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => write!(f, "Connected"),
            Self::Joined => write!(f, "Joined"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// What a joined session knows about itself. Only exists in `Joined`, so
/// "has a position" and "is in a room" can never disagree.
#[derive(Debug, Clone)]
struct Presence {
    account_id: AccountId,
    space_id: SpaceId,
    position: Position,
}

#[derive(Debug)]
enum Phase {
    Connected,
    Joined(Presence),
    Closed,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Server-side state for one live connection.
///
/// Commands for one session are handled strictly one at a time (`&mut
/// self`), but `join` may suspend while the identity verifier and space
/// lookup answer; other sessions keep running meanwhile.
///
/// Dropping a session disconnects it, so a connection task that ends for
/// any reason, panics included, still leaves the room cleanly.
pub struct Session<V: IdentityVerifier, D: SpaceDirectory> {
    id: SessionId,
    phase: Phase,
    outbox: EventSender,
    context: Arc<SessionContext<V, D>>,
}

impl<V: IdentityVerifier, D: SpaceDirectory> Session<V, D> {
    /// Creates a session in the `Connected` state with a fresh id.
    ///
    /// `outbox` is the sending half of this connection's event queue.
    pub fn new(context: Arc<SessionContext<V, D>>, outbox: EventSender) -> Self {
        Self {
            id: generate_session_id(),
            phase: Phase::Connected,
            outbox,
            context,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        match self.phase {
            Phase::Connected => SessionState::Connected,
            Phase::Joined(_) => SessionState::Joined,
            Phase::Closed => SessionState::Closed,
        }
    }

    /// The authoritative position, while joined.
    pub fn position(&self) -> Option<Position> {
        match &self.phase {
            Phase::Joined(presence) => Some(presence.position),
            _ => None,
        }
    }

    pub fn account_id(&self) -> Option<&AccountId> {
        match &self.phase {
            Phase::Joined(presence) => Some(&presence.account_id),
            _ => None,
        }
    }

    pub fn space_id(&self) -> Option<&SpaceId> {
        match &self.phase {
            Phase::Joined(presence) => Some(&presence.space_id),
            _ => None,
        }
    }

    /// Decodes one inbound frame and handles it.
    ///
    /// Frames that don't decode into a [`ClientMessage`] are dropped: no
    /// reply, no close.
    ///
    /// # Errors
    /// Only a failed `join` returns an error. The session is `Closed` by
    /// then and the caller must close the transport.
    pub async fn handle_frame<C: Codec>(
        &mut self,
        codec: &C,
        frame: &[u8],
    ) -> Result<(), SessionError> {
        match codec.decode_command(frame) {
            Ok(cmd) => self.handle(cmd).await,
            Err(e) => {
                tracing::debug!(session_id = %self.id, error = %e, "dropping malformed frame");
                Ok(())
            }
        }
    }

    /// Dispatches a decoded command.
    pub async fn handle(&mut self, cmd: ClientMessage) -> Result<(), SessionError> {
        match cmd {
            ClientMessage::Join {
                space_id,
                credential,
            } => self.join(space_id, &credential).await,
            ClientMessage::Move { x, y } => {
                self.move_to(Position::new(x, y));
                Ok(())
            }
        }
    }

    /// Joins a space. Only valid in `Connected`; ignored otherwise.
    ///
    /// On success the joiner gets `space-joined` (spawn cell plus the ids of
    /// everyone already there) and then the others get `user-joined`.
    ///
    /// # Errors
    /// [`SessionError::AuthFailed`], [`SessionError::SpaceNotFound`], or
    /// [`SessionError::Lookup`]. The session is `Closed` and nothing was
    /// broadcast.
    pub async fn join(&mut self, space_id: SpaceId, credential: &str) -> Result<(), SessionError> {
        if !matches!(self.phase, Phase::Connected) {
            tracing::debug!(session_id = %self.id, state = %self.state(), "ignoring join");
            return Ok(());
        }

        let account_id = match self.context.verifier.verify(credential).await {
            Ok(account_id) => account_id,
            Err(e) => return Err(self.fail_join(e)),
        };

        let dimensions = match self.context.spaces.lookup(&space_id).await {
            Ok(dimensions) => dimensions,
            Err(e) => return Err(self.fail_join(e)),
        };

        let spawn = dimensions.random_cell(&mut rand::rng());
        debug_assert!(dimensions.contains(spawn), "{spawn} outside {dimensions}");

        let member = Member::new(self.id.clone(), self.outbox.clone());
        let others = self.context.registry.add(&space_id, member, |others| {
            Some(ServerEvent::SpaceJoined {
                spawn,
                users: others.iter().cloned().map(|id| UserRef { id }).collect(),
            })
        });

        self.context.registry.broadcast(
            &ServerEvent::UserJoined {
                user_id: account_id.clone(),
                x: spawn.x,
                y: spawn.y,
            },
            &space_id,
            Some(&self.id),
        );

        tracing::info!(
            session_id = %self.id,
            %account_id,
            %space_id,
            %spawn,
            peers = others.len(),
            "session joined space"
        );

        self.phase = Phase::Joined(Presence {
            account_id,
            space_id,
            position: spawn,
        });
        Ok(())
    }

    /// Requests a one-cell step. Only valid in `Joined`; ignored otherwise.
    ///
    /// Accepted steps update the authoritative position and are broadcast
    /// to everyone else as `movement`; the mover gets nothing back.
    /// Anything else is answered, to the mover only, with
    /// `movement-rejected` carrying the unchanged position.
    pub fn move_to(&mut self, target: Position) {
        let Phase::Joined(presence) = &mut self.phase else {
            tracing::debug!(session_id = %self.id, "ignoring move outside a space");
            return;
        };
        debug_assert!(
            self.context.registry.is_member(&presence.space_id, &self.id),
            "joined session missing from its room"
        );

        if presence.position.is_unit_step_to(target) {
            presence.position = target;
            self.context.registry.broadcast(
                &ServerEvent::Movement {
                    x: target.x,
                    y: target.y,
                },
                &presence.space_id,
                Some(&self.id),
            );
        } else {
            let current = presence.position;
            tracing::debug!(
                session_id = %self.id,
                from = %current,
                to = %target,
                "movement rejected"
            );
            // A closed queue means the writer is gone; disconnect follows.
            let _ = self.outbox.send(ServerEvent::MovementRejected {
                x: current.x,
                y: current.y,
            });
        }
    }

    /// Leaves the space (if joined) and moves to `Closed`. Idempotent.
    ///
    /// Peers are told `user-left` before the session is removed from the
    /// registry, exactly once per departure.
    pub fn disconnect(&mut self) {
        match std::mem::replace(&mut self.phase, Phase::Closed) {
            Phase::Joined(presence) => {
                self.context.registry.broadcast(
                    &ServerEvent::UserLeft {
                        user_id: presence.account_id.clone(),
                    },
                    &presence.space_id,
                    Some(&self.id),
                );
                self.context.registry.remove(&self.id, &presence.space_id);
                tracing::info!(
                    session_id = %self.id,
                    account_id = %presence.account_id,
                    space_id = %presence.space_id,
                    "session left space"
                );
            }
            Phase::Connected => {
                tracing::debug!(session_id = %self.id, "session closed before joining");
            }
            Phase::Closed => {}
        }
    }

    /// Moves to `Closed` after a failed join and hands the error back.
    fn fail_join(&mut self, error: SessionError) -> SessionError {
        tracing::warn!(session_id = %self.id, %error, "join rejected, closing");
        self.phase = Phase::Closed;
        error
    }
}

impl<V: IdentityVerifier, D: SpaceDirectory> Drop for Session<V, D> {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! State machine tests with in-process test doubles.
    //!
    //! Spaces of size 1×1 pin the spawn cell to (0, 0), which makes the
    //! movement assertions deterministic without seeding an RNG.

    use plaza_room::{EventReceiver, event_channel};

    use super::*;
    use crate::{Dimensions, StaticSpaces};

    /// Accepts `valid-<name>` and yields account `<name>`.
    struct PrefixVerifier;

    impl IdentityVerifier for PrefixVerifier {
        async fn verify(&self, credential: &str) -> Result<AccountId, SessionError> {
            credential
                .strip_prefix("valid-")
                .map(AccountId::new)
                .ok_or_else(|| SessionError::AuthFailed("bad prefix".into()))
        }
    }

    /// A space store that is always down.
    struct BrokenSpaces;

    impl SpaceDirectory for BrokenSpaces {
        async fn lookup(&self, _space_id: &SpaceId) -> Result<Dimensions, SessionError> {
            Err(SessionError::Lookup("connection refused".into()))
        }
    }

    type TestSession = Session<PrefixVerifier, StaticSpaces>;

    fn context() -> Arc<SessionContext<PrefixVerifier, StaticSpaces>> {
        let spaces = StaticSpaces::new()
            .with_space(SpaceId::new("R1"), Dimensions::new(10, 10).unwrap())
            .with_space(SpaceId::new("tiny"), Dimensions::new(1, 1).unwrap());
        Arc::new(SessionContext::new(RoomRegistry::new(), PrefixVerifier, spaces))
    }

    fn session(
        ctx: &Arc<SessionContext<PrefixVerifier, StaticSpaces>>,
    ) -> (TestSession, EventReceiver) {
        let (tx, rx) = event_channel();
        (Session::new(Arc::clone(ctx), tx), rx)
    }

    fn drain(rx: &mut EventReceiver) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn joined(
        ctx: &Arc<SessionContext<PrefixVerifier, StaticSpaces>>,
        space: &str,
        account: &str,
    ) -> (TestSession, EventReceiver) {
        let (mut s, mut rx) = session(ctx);
        s.join(SpaceId::new(space), &format!("valid-{account}"))
            .await
            .expect("join should succeed");
        drain(&mut rx);
        (s, rx)
    }

    // =====================================================================
    // join()
    // =====================================================================

    #[tokio::test]
    async fn test_join_success_sends_space_joined_with_spawn_in_bounds() {
        let ctx = context();
        let (mut a, mut rx) = session(&ctx);

        a.join(SpaceId::new("R1"), "valid-alice").await.unwrap();

        assert_eq!(a.state(), SessionState::Joined);
        assert_eq!(a.account_id(), Some(&AccountId::new("alice")));
        assert_eq!(a.space_id(), Some(&SpaceId::new("R1")));

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            ServerEvent::SpaceJoined { spawn, users } => {
                assert!((0..10).contains(&spawn.x) && (0..10).contains(&spawn.y));
                assert_eq!(Some(*spawn), a.position());
                assert!(users.is_empty());
            }
            other => panic!("expected SpaceJoined, got {other:?}"),
        }
        assert_eq!(ctx.registry().members_of(&SpaceId::new("R1")), vec![a.id().clone()]);
    }

    #[tokio::test]
    async fn test_second_joiner_sees_first_and_first_gets_user_joined() {
        let ctx = context();
        let (a, mut rx_a) = joined(&ctx, "R1", "alice").await;
        let (mut b, mut rx_b) = session(&ctx);

        b.join(SpaceId::new("R1"), "valid-bob").await.unwrap();

        let b_events = drain(&mut rx_b);
        match &b_events[..] {
            [ServerEvent::SpaceJoined { users, .. }] => {
                assert_eq!(users, &vec![UserRef { id: a.id().clone() }]);
                assert!(!users.iter().any(|u| &u.id == b.id()));
            }
            other => panic!("expected one SpaceJoined, got {other:?}"),
        }

        let b_pos = b.position().unwrap();
        assert_eq!(
            drain(&mut rx_a),
            vec![ServerEvent::UserJoined {
                user_id: AccountId::new("bob"),
                x: b_pos.x,
                y: b_pos.y,
            }]
        );
    }

    #[tokio::test]
    async fn test_join_bad_credential_closes_without_broadcast() {
        let ctx = context();
        let (_a, mut rx_a) = joined(&ctx, "R1", "alice").await;
        let (mut b, mut rx_b) = session(&ctx);

        let result = b.join(SpaceId::new("R1"), "forged").await;

        assert!(matches!(result, Err(SessionError::AuthFailed(_))));
        assert_eq!(b.state(), SessionState::Closed);
        assert!(drain(&mut rx_a).is_empty());
        assert!(drain(&mut rx_b).is_empty());
        assert_eq!(ctx.registry().members_of(&SpaceId::new("R1")).len(), 1);
    }

    #[tokio::test]
    async fn test_join_unknown_space_closes() {
        let ctx = context();
        let (mut a, mut rx) = session(&ctx);

        let result = a.join(SpaceId::new("nowhere"), "valid-alice").await;

        assert!(matches!(result, Err(SessionError::SpaceNotFound(_))));
        assert_eq!(a.state(), SessionState::Closed);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(ctx.registry().room_count(), 0);
    }

    #[tokio::test]
    async fn test_join_lookup_failure_closes() {
        let ctx = Arc::new(SessionContext::new(RoomRegistry::new(), PrefixVerifier, BrokenSpaces));
        let (tx, _rx) = event_channel();
        let mut a = Session::new(ctx, tx);

        let result = a.join(SpaceId::new("R1"), "valid-alice").await;
        assert!(matches!(result, Err(SessionError::Lookup(_))));
        assert_eq!(a.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_second_join_is_ignored() {
        let ctx = context();
        let (mut a, mut rx) = joined(&ctx, "R1", "alice").await;
        let before = a.position();

        a.join(SpaceId::new("tiny"), "valid-alice").await.unwrap();

        assert_eq!(a.space_id(), Some(&SpaceId::new("R1")));
        assert_eq!(a.position(), before);
        assert!(drain(&mut rx).is_empty());
        assert!(ctx.registry().members_of(&SpaceId::new("tiny")).is_empty());
    }

    #[tokio::test]
    async fn test_join_after_close_is_ignored() {
        let ctx = context();
        let (mut a, mut rx) = session(&ctx);
        a.disconnect();

        a.join(SpaceId::new("R1"), "valid-alice").await.unwrap();

        assert_eq!(a.state(), SessionState::Closed);
        assert!(drain(&mut rx).is_empty());
        assert_eq!(ctx.registry().room_count(), 0);
    }

    // =====================================================================
    // move_to()
    // =====================================================================

    #[tokio::test]
    async fn test_accepted_move_broadcasts_to_others_only() {
        let ctx = context();
        let (mut a, mut rx_a) = joined(&ctx, "tiny", "alice").await;
        let (_b, mut rx_b) = joined(&ctx, "tiny", "bob").await;
        drain(&mut rx_a); // user-joined for bob

        a.move_to(Position::new(1, 0));

        assert_eq!(a.position(), Some(Position::new(1, 0)));
        assert!(drain(&mut rx_a).is_empty(), "mover gets nothing back");
        assert_eq!(drain(&mut rx_b), vec![ServerEvent::Movement { x: 1, y: 0 }]);
    }

    #[tokio::test]
    async fn test_rejected_move_echoes_current_position_to_mover_only() {
        let ctx = context();
        let (mut a, mut rx_a) = joined(&ctx, "tiny", "alice").await;
        let (_b, mut rx_b) = joined(&ctx, "tiny", "bob").await;
        drain(&mut rx_a);

        a.move_to(Position::new(1, 0));
        drain(&mut rx_b);

        a.move_to(Position::new(1, 2));

        assert_eq!(a.position(), Some(Position::new(1, 0)));
        assert_eq!(drain(&mut rx_a), vec![ServerEvent::MovementRejected { x: 1, y: 0 }]);
        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn test_zero_diagonal_and_long_moves_rejected() {
        let ctx = context();
        let (mut a, mut rx) = joined(&ctx, "tiny", "alice").await;

        for target in [(0, 0), (1, 1), (-1, 1), (2, 0), (0, -3)] {
            a.move_to(Position::new(target.0, target.1));
            assert_eq!(
                drain(&mut rx),
                vec![ServerEvent::MovementRejected { x: 0, y: 0 }],
                "target {target:?}"
            );
        }
        assert_eq!(a.position(), Some(Position::new(0, 0)));
    }

    #[tokio::test]
    async fn test_walk_validates_against_latest_position() {
        let ctx = context();
        let (mut a, mut rx) = joined(&ctx, "tiny", "alice").await;

        for (x, y) in [(1, 0), (2, 0), (2, 1), (1, 1), (1, 2)] {
            a.move_to(Position::new(x, y));
        }
        assert!(drain(&mut rx).is_empty());
        assert_eq!(a.position(), Some(Position::new(1, 2)));
    }

    #[tokio::test]
    async fn test_move_before_join_is_ignored() {
        let ctx = context();
        let (mut a, mut rx) = session(&ctx);

        a.move_to(Position::new(1, 0));

        assert_eq!(a.state(), SessionState::Connected);
        assert!(drain(&mut rx).is_empty());
    }

    // =====================================================================
    // handle_frame()
    // =====================================================================

    #[tokio::test]
    async fn test_malformed_frames_are_dropped_silently() {
        let ctx = context();
        let (mut a, mut rx) = joined(&ctx, "tiny", "alice").await;
        let codec = plaza_protocol::JsonCodec;

        for frame in [
            "not json",
            r#"{"type":"fly","payload":{}}"#,
            r#"{"type":"move","payload":{"x":1}}"#,
            r#"{"type":"move"}"#,
        ] {
            assert!(a.handle_frame(&codec, frame.as_bytes()).await.is_ok());
        }

        assert_eq!(a.state(), SessionState::Joined);
        assert!(drain(&mut rx).is_empty());

        a.handle_frame(&codec, br#"{"type":"move","payload":{"x":0,"y":1}}"#)
            .await
            .unwrap();
        assert_eq!(a.position(), Some(Position::new(0, 1)));
    }

    #[tokio::test]
    async fn test_handle_frame_join_with_token_alias() {
        let ctx = context();
        let (mut a, _rx) = session(&ctx);

        a.handle_frame(
            &plaza_protocol::JsonCodec,
            br#"{"type":"join","payload":{"spaceId":"R1","token":"valid-alice"}}"#,
        )
        .await
        .unwrap();

        assert_eq!(a.state(), SessionState::Joined);
    }

    // =====================================================================
    // disconnect()
    // =====================================================================

    #[tokio::test]
    async fn test_disconnect_notifies_peers_once_and_removes_member() {
        let ctx = context();
        let (mut a, _rx_a) = joined(&ctx, "R1", "alice").await;
        let (b, mut rx_b) = joined(&ctx, "R1", "bob").await;

        a.disconnect();
        a.disconnect();

        assert_eq!(a.state(), SessionState::Closed);
        assert_eq!(
            drain(&mut rx_b),
            vec![ServerEvent::UserLeft { user_id: AccountId::new("alice") }]
        );
        assert_eq!(ctx.registry().members_of(&SpaceId::new("R1")), vec![b.id().clone()]);
    }

    #[tokio::test]
    async fn test_drop_disconnects() {
        let ctx = context();
        let (a, _rx_a) = joined(&ctx, "R1", "alice").await;
        let (_b, mut rx_b) = joined(&ctx, "R1", "bob").await;

        drop(a);

        assert_eq!(
            drain(&mut rx_b),
            vec![ServerEvent::UserLeft { user_id: AccountId::new("alice") }]
        );
        assert_eq!(ctx.registry().members_of(&SpaceId::new("R1")).len(), 1);
    }

    #[tokio::test]
    async fn test_n_join_m_disconnect_membership() {
        let ctx = context();
        let mut sessions = Vec::new();
        for i in 0..6 {
            sessions.push(joined(&ctx, "R1", &format!("user{i}")).await);
        }

        let leaving: Vec<_> = sessions.drain(..2).collect();
        drop(leaving);

        let members = ctx.registry().members_of(&SpaceId::new("R1"));
        assert_eq!(members.len(), 4);
        for (s, _) in &sessions {
            assert!(members.contains(s.id()));
        }
    }

    #[tokio::test]
    async fn test_session_ids_are_unique() {
        let ctx = context();
        let (a, _ra) = session(&ctx);
        let (b, _rb) = session(&ctx);
        assert_ne!(a.id(), b.id());
    }
}
