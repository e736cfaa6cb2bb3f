//! Room Coordinator
//!
//! Owns per-discussion room state: live membership, moderation, progress
//! and broadcast ordering. Every inbound event dispatches to a handler
//! that validates against the discussion registry and presence store and
//! returns an ordered list of outbound broadcast instructions, which keeps
//! ordering and scope contracts testable without a live transport.
//!
//! There is no lock around cross-step state. Handlers may interleave at
//! their await points; the in-memory set mutations themselves contain no
//! suspension point, and the ordering guarantees below are broadcast
//! ordering within one handler, not atomicity across handlers.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::domain::{DiscussionRepository, MessageRepository, Participant};
use crate::infrastructure::cache::PresenceStore;
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

use super::events::{
    ClientEvent, HistoryPayload, JoinPayload, MessagePayload, ModerationPayload, ProgressPayload,
    ServerEvent, StatusPayload, StatusRequestPayload,
};
use super::session::{ConnectionHandle, ConnectionId};

/// Room event errors. All of these are non-fatal: they surface as a scoped
/// error frame to the originating connection and leave room state alone.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("Discussion does not exist")]
    DiscussionNotFound,

    #[error("You are banned from this discussion")]
    Banned,

    #[error("Not the author of this discussion")]
    NotAuthor,

    #[error("Join the discussion before sending messages")]
    NotJoined,

    #[error("Sign in to send messages")]
    Unauthenticated,

    #[error("No user with nickname '{0}'")]
    TargetNotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChatError {
    /// The message surfaced to the client. Internal details stay in logs.
    fn client_message(&self) -> String {
        match self {
            ChatError::Internal(_) => "Something went wrong, please retry".to_string(),
            other => other.to_string(),
        }
    }

    fn internal(e: AppError) -> Self {
        ChatError::Internal(e.to_string())
    }
}

/// One outbound broadcast instruction produced by an event handler.
///
/// Instructions are delivered in order; `ToRoom` reaches the connections
/// that are members of the room at delivery time.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Scoped to a single connection
    ToConnection(ConnectionId, ServerEvent),
    /// Broadcast to every live member of the room
    ToRoom(i64, ServerEvent),
}

/// Per-discussion room coordination.
///
/// Live membership is process-local and rebuilt from nothing on restart;
/// the registry holds everything durable (known members, bans, progress).
pub struct RoomCoordinator {
    /// All live connections, keyed by connection ID
    connections: DashMap<ConnectionId, ConnectionHandle>,

    /// Live membership per discussion
    rooms: DashMap<i64, HashSet<ConnectionId>>,

    registry: Arc<dyn DiscussionRepository>,
    presence: Arc<dyn PresenceStore>,
    messages: Arc<dyn MessageRepository>,
}

impl RoomCoordinator {
    pub fn new(
        registry: Arc<dyn DiscussionRepository>,
        presence: Arc<dyn PresenceStore>,
        messages: Arc<dyn MessageRepository>,
    ) -> Self {
        Self {
            connections: DashMap::new(),
            rooms: DashMap::new(),
            registry,
            presence,
            messages,
        }
    }

    /// Register a newly connected socket.
    pub fn register(
        &self,
        conn_id: ConnectionId,
        identity: Option<Participant>,
        sender: mpsc::UnboundedSender<ServerEvent>,
    ) {
        tracing::info!(
            connection_id = %conn_id,
            nickname = identity.as_ref().map(|i| i.nickname.as_str()).unwrap_or("<anonymous>"),
            "Connection registered"
        );
        self.connections
            .insert(conn_id, ConnectionHandle::new(identity, sender));
        self.update_connection_metrics();
    }

    /// Tear down a connection: drop its room memberships and release its
    /// presence entry, but only if that entry still addresses this exact
    /// connection. A newer connection under the same nickname must keep
    /// its entry even when an older connection's cleanup runs late.
    pub async fn disconnect(&self, conn_id: ConnectionId) {
        let Some((_, handle)) = self.connections.remove(&conn_id) else {
            return;
        };

        for discussion_id in &handle.joined {
            if let Some(mut members) = self.rooms.get_mut(discussion_id) {
                members.remove(&conn_id);
            }
        }
        self.rooms.retain(|_, members| !members.is_empty());

        if let Some(identity) = &handle.identity {
            match self.presence.release(&identity.nickname, conn_id).await {
                Ok(removed) => {
                    tracing::debug!(
                        connection_id = %conn_id,
                        nickname = %identity.nickname,
                        removed,
                        "Presence cleanup"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        connection_id = %conn_id,
                        nickname = %identity.nickname,
                        error = %e,
                        "Presence cleanup failed"
                    );
                }
            }
        }

        tracing::info!(connection_id = %conn_id, "Connection closed");
        self.update_connection_metrics();
    }

    /// Dispatch one inbound event. Validation failures become scoped error
    /// frames to the originating connection; nothing here may take down
    /// the coordinator or touch unrelated connections.
    pub async fn dispatch(&self, conn_id: ConnectionId, event: ClientEvent) {
        let name = event.name();
        let discussion_id = event.discussion_id();

        let result = match event {
            ClientEvent::Join(p) => self.handle_join(conn_id, p).await,
            ClientEvent::Message(p) => self.handle_message(conn_id, p).await,
            ClientEvent::DiscussionProgress(p) => self.handle_progress(conn_id, p).await,
            ClientEvent::Status(p) => self.handle_status(conn_id, p).await,
            ClientEvent::Ban(p) => self.handle_ban(conn_id, p).await,
            ClientEvent::Unban(p) => self.handle_unban(conn_id, p).await,
        };

        match result {
            Ok(outbound) => {
                metrics::record_chat_event(name, "ok");
                self.deliver(outbound);
            }
            Err(ChatError::Internal(detail)) => {
                metrics::record_chat_event(name, "error");
                tracing::error!(
                    connection_id = %conn_id,
                    discussion_id,
                    event = name,
                    detail = %detail,
                    "Event handler failed"
                );
                self.send_to(
                    conn_id,
                    ServerEvent::error(ChatError::Internal(String::new()).client_message()),
                );
            }
            Err(err) => {
                metrics::record_chat_event(name, "rejected");
                tracing::debug!(
                    connection_id = %conn_id,
                    discussion_id,
                    event = name,
                    error = %err,
                    "Event rejected"
                );
                self.send_to(conn_id, ServerEvent::error(err.client_message()));
            }
        }
    }

    /// Deliver outbound instructions in order.
    pub fn deliver(&self, outbound: Vec<Outbound>) {
        for instruction in outbound {
            match instruction {
                Outbound::ToConnection(conn_id, event) => self.send_to(conn_id, event),
                Outbound::ToRoom(discussion_id, event) => {
                    let members: Vec<ConnectionId> = self
                        .rooms
                        .get(&discussion_id)
                        .map(|m| m.iter().copied().collect())
                        .unwrap_or_default();
                    for conn_id in members {
                        self.send_to(conn_id, event.clone());
                    }
                }
            }
        }
    }

    /// Whether the connection is currently joined to the room.
    pub fn is_joined(&self, conn_id: ConnectionId, discussion_id: i64) -> bool {
        self.rooms
            .get(&discussion_id)
            .map(|m| m.contains(&conn_id))
            .unwrap_or(false)
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    // --- Event handlers ---

    /// join: validate, record membership, then broadcast in contract
    /// order: (a) status snapshot to the room, (b) history placeholder to
    /// the joiner, (c) join announcement to the room for authenticated
    /// joiners. The snapshot must precede the announcement so nobody sees
    /// an announcement for a user missing from their snapshot.
    async fn handle_join(
        &self,
        conn_id: ConnectionId,
        payload: JoinPayload,
    ) -> Result<Vec<Outbound>, ChatError> {
        let discussion_id = payload.discussion_id;

        if !self
            .registry
            .exists(discussion_id)
            .await
            .map_err(ChatError::internal)?
        {
            return Err(ChatError::DiscussionNotFound);
        }

        let identity = self.identity_of(conn_id);

        if let Some(identity) = &identity {
            // Join-time enforcement of the persisted ban list; the live
            // eviction path in handle_ban is the other half.
            if self
                .registry
                .is_banned(discussion_id, identity.user_id)
                .await
                .map_err(ChatError::internal)?
            {
                return Err(ChatError::Banned);
            }

            self.registry
                .add_member(discussion_id, identity.user_id)
                .await
                .map_err(ChatError::internal)?;
        }

        self.rooms
            .entry(discussion_id)
            .or_default()
            .insert(conn_id);
        if let Some(mut handle) = self.connections.get_mut(&conn_id) {
            handle.joined.insert(discussion_id);
        }

        let snapshot = self.status_snapshot(discussion_id).await?;

        let mut out = vec![
            Outbound::ToRoom(discussion_id, ServerEvent::Status(snapshot)),
            Outbound::ToConnection(
                conn_id,
                ServerEvent::History(HistoryPayload {
                    messages: Vec::new(),
                }),
            ),
        ];

        if let Some(identity) = identity {
            out.push(Outbound::ToRoom(
                discussion_id,
                ServerEvent::info(format!("{} joined the discussion", identity.nickname)),
            ));
        }

        Ok(out)
    }

    /// message: persist through the message store, then broadcast the
    /// stored message (real ID and timestamp) to the room. Anonymous and
    /// unjoined senders are rejected.
    async fn handle_message(
        &self,
        conn_id: ConnectionId,
        payload: MessagePayload,
    ) -> Result<Vec<Outbound>, ChatError> {
        let discussion_id = payload.discussion_id;

        let identity = self
            .identity_of(conn_id)
            .ok_or(ChatError::Unauthenticated)?;

        let joined = self
            .connections
            .get(&conn_id)
            .map(|h| h.joined.contains(&discussion_id))
            .unwrap_or(false);
        if !joined {
            return Err(ChatError::NotJoined);
        }

        let message = self
            .messages
            .persist(discussion_id, &identity, &payload.message)
            .await
            .map_err(ChatError::internal)?;

        Ok(vec![Outbound::ToRoom(
            discussion_id,
            ServerEvent::Message(message.into()),
        )])
    }

    /// discussionProgress: author-only. Persist first, then broadcast.
    /// Last writer wins; concurrent updates race freely.
    async fn handle_progress(
        &self,
        conn_id: ConnectionId,
        payload: ProgressPayload,
    ) -> Result<Vec<Outbound>, ChatError> {
        let discussion_id = payload.discussion_id;

        if !self
            .registry
            .exists(discussion_id)
            .await
            .map_err(ChatError::internal)?
        {
            return Err(ChatError::DiscussionNotFound);
        }

        self.require_author(conn_id, discussion_id).await?;

        self.registry
            .set_progress(discussion_id, &payload.progress)
            .await
            .map_err(ChatError::internal)?;

        Ok(vec![Outbound::ToRoom(
            discussion_id,
            ServerEvent::DiscussionProgress(payload),
        )])
    }

    /// status: read-only snapshot to the requesting connection.
    async fn handle_status(
        &self,
        conn_id: ConnectionId,
        payload: StatusRequestPayload,
    ) -> Result<Vec<Outbound>, ChatError> {
        let snapshot = self.status_snapshot(payload.discussion_id).await?;

        Ok(vec![Outbound::ToConnection(
            conn_id,
            ServerEvent::Status(snapshot),
        )])
    }

    /// ban: author-only. In order: persist the ban, evict the live target
    /// if presence still addresses one, acknowledge the author, broadcast
    /// the updated snapshot. An offline target is non-fatal; the ban is
    /// recorded and join-time checks take over when they return.
    async fn handle_ban(
        &self,
        conn_id: ConnectionId,
        payload: ModerationPayload,
    ) -> Result<Vec<Outbound>, ChatError> {
        let discussion_id = payload.discussion_id;
        let nickname = payload.nickname;

        if !self
            .registry
            .exists(discussion_id)
            .await
            .map_err(ChatError::internal)?
        {
            return Err(ChatError::DiscussionNotFound);
        }

        self.require_author(conn_id, discussion_id).await?;

        self.registry
            .add_ban(discussion_id, &nickname)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => ChatError::TargetNotFound(nickname.clone()),
                e => ChatError::internal(e),
            })?;

        let mut out = Vec::new();

        match self
            .presence
            .lookup(&nickname)
            .await
            .map_err(ChatError::internal)?
        {
            Some(target) => {
                out.push(Outbound::ToConnection(
                    target,
                    ServerEvent::error("You have been banned from this discussion"),
                ));
                self.evict(discussion_id, target);
            }
            None => {
                // Target offline; the persisted ban rejects them at their
                // next join regardless of presence state.
                tracing::debug!(
                    discussion_id,
                    nickname = %nickname,
                    "Ban target has no live connection"
                );
            }
        }

        out.push(Outbound::ToConnection(
            conn_id,
            ServerEvent::info(format!("Banned [{}] from the discussion", nickname)),
        ));

        let snapshot = self.status_snapshot(discussion_id).await?;
        out.push(Outbound::ToRoom(discussion_id, ServerEvent::Status(snapshot)));

        Ok(out)
    }

    /// unban: author-only, symmetric to ban. Membership is not restored;
    /// the unbanned user joins again explicitly.
    async fn handle_unban(
        &self,
        conn_id: ConnectionId,
        payload: ModerationPayload,
    ) -> Result<Vec<Outbound>, ChatError> {
        let discussion_id = payload.discussion_id;
        let nickname = payload.nickname;

        if !self
            .registry
            .exists(discussion_id)
            .await
            .map_err(ChatError::internal)?
        {
            return Err(ChatError::DiscussionNotFound);
        }

        self.require_author(conn_id, discussion_id).await?;

        self.registry
            .remove_ban(discussion_id, &nickname)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => ChatError::TargetNotFound(nickname.clone()),
                e => ChatError::internal(e),
            })?;

        let snapshot = self.status_snapshot(discussion_id).await?;

        Ok(vec![
            Outbound::ToConnection(
                conn_id,
                ServerEvent::info(format!("Lifted the ban on [{}]", nickname)),
            ),
            Outbound::ToRoom(discussion_id, ServerEvent::Status(snapshot)),
        ])
    }

    // --- Helpers ---

    /// The connection's identity, if authenticated.
    fn identity_of(&self, conn_id: ConnectionId) -> Option<Participant> {
        self.connections
            .get(&conn_id)
            .and_then(|h| h.identity.clone())
    }

    /// Fail unless the connection's identity authored the discussion.
    async fn require_author(
        &self,
        conn_id: ConnectionId,
        discussion_id: i64,
    ) -> Result<Participant, ChatError> {
        let identity = self.identity_of(conn_id).ok_or(ChatError::NotAuthor)?;

        let is_author = self
            .registry
            .verify_author(discussion_id, identity.user_id)
            .await
            .map_err(ChatError::internal)?;

        if !is_author {
            return Err(ChatError::NotAuthor);
        }

        Ok(identity)
    }

    /// Build the membership/ban snapshot from the registry.
    async fn status_snapshot(&self, discussion_id: i64) -> Result<StatusPayload, ChatError> {
        let members = self
            .registry
            .list_known_members(discussion_id)
            .await
            .map_err(ChatError::internal)?;
        let banned = self
            .registry
            .get_ban_list(discussion_id)
            .await
            .map_err(ChatError::internal)?;

        Ok(StatusPayload {
            discussion_id,
            members,
            banned,
        })
    }

    /// Forcibly drop a connection from a room's live membership.
    fn evict(&self, discussion_id: i64, target: ConnectionId) {
        if let Some(mut members) = self.rooms.get_mut(&discussion_id) {
            members.remove(&target);
        }
        if let Some(mut handle) = self.connections.get_mut(&target) {
            handle.joined.remove(&discussion_id);
        }
    }

    /// Send a frame to one connection, ignoring closed channels; the
    /// disconnect path cleans the connection up.
    fn send_to(&self, conn_id: ConnectionId, event: ServerEvent) {
        if let Some(handle) = self.connections.get(&conn_id) {
            if handle.sender.send(event).is_err() {
                tracing::debug!(connection_id = %conn_id, "Dropped frame for closing connection");
            }
        }
    }

    fn update_connection_metrics(&self) {
        let connected = self.connections.len() as i64;
        let authenticated = self
            .connections
            .iter()
            .filter(|entry| entry.is_authenticated())
            .count() as i64;
        metrics::set_websocket_connections(connected, authenticated);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc::UnboundedReceiver;
    use uuid::Uuid;

    use super::*;
    use crate::domain::{
        ChatMessage, MockDiscussionRepository, MockMessageRepository, Participant,
    };
    use crate::infrastructure::cache::MockPresenceStore;
    use crate::presentation::websocket::events::{ErrorPayload, InfoPayload};

    fn alice() -> Participant {
        Participant {
            user_id: 1,
            nickname: "alice".into(),
        }
    }

    fn bob() -> Participant {
        Participant {
            user_id: 2,
            nickname: "bob".into(),
        }
    }

    /// Registry mock for a single discussion authored by alice, with no
    /// bans and no failures.
    fn happy_registry(discussion_id: i64) -> MockDiscussionRepository {
        let mut registry = MockDiscussionRepository::new();
        registry
            .expect_exists()
            .returning(move |id| Ok(id == discussion_id));
        registry.expect_is_banned().returning(|_, _| Ok(false));
        registry.expect_add_member().returning(|_, _| Ok(()));
        registry
            .expect_verify_author()
            .returning(|_, user_id| Ok(user_id == 1));
        registry
            .expect_list_known_members()
            .returning(|_| Ok(vec![]));
        registry.expect_get_ban_list().returning(|_| Ok(vec![]));
        registry
    }

    fn no_messages() -> MockMessageRepository {
        MockMessageRepository::new()
    }

    fn no_presence() -> MockPresenceStore {
        MockPresenceStore::new()
    }

    fn coordinator(
        registry: MockDiscussionRepository,
        presence: MockPresenceStore,
        messages: MockMessageRepository,
    ) -> RoomCoordinator {
        RoomCoordinator::new(Arc::new(registry), Arc::new(presence), Arc::new(messages))
    }

    fn connect(
        coordinator: &RoomCoordinator,
        identity: Option<Participant>,
    ) -> (ConnectionId, UnboundedReceiver<ServerEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        coordinator.register(conn_id, identity, tx);
        (conn_id, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    // --- join ---

    #[tokio::test]
    async fn test_join_broadcast_order_snapshot_before_announcement() {
        let coordinator = coordinator(happy_registry(7), no_presence(), no_messages());
        let (conn, _rx) = connect(&coordinator, Some(alice()));

        let out = coordinator
            .handle_join(conn, JoinPayload { discussion_id: 7 })
            .await
            .unwrap();

        assert_eq!(out.len(), 3);
        assert!(matches!(out[0], Outbound::ToRoom(7, ServerEvent::Status(_))));
        assert!(matches!(
            out[1],
            Outbound::ToConnection(id, ServerEvent::History(_)) if id == conn
        ));
        assert!(matches!(out[2], Outbound::ToRoom(7, ServerEvent::Info(_))));
    }

    #[tokio::test]
    async fn test_join_unknown_discussion_is_rejected_without_state_change() {
        let coordinator = coordinator(happy_registry(7), no_presence(), no_messages());
        let (conn, _rx) = connect(&coordinator, Some(alice()));

        let result = coordinator
            .handle_join(conn, JoinPayload { discussion_id: 99 })
            .await;

        assert_eq!(result.unwrap_err(), ChatError::DiscussionNotFound);
        assert!(!coordinator.is_joined(conn, 99));
    }

    #[tokio::test]
    async fn test_banned_identity_never_joins() {
        let mut registry = happy_registry(7);
        registry.checkpoint();
        registry.expect_exists().returning(|_| Ok(true));
        registry.expect_is_banned().returning(|_, _| Ok(true));

        let coordinator = coordinator(registry, no_presence(), no_messages());
        let (conn, _rx) = connect(&coordinator, Some(bob()));

        let result = coordinator
            .handle_join(conn, JoinPayload { discussion_id: 7 })
            .await;

        assert_eq!(result.unwrap_err(), ChatError::Banned);
        assert!(!coordinator.is_joined(conn, 7));
    }

    #[tokio::test]
    async fn test_banned_joiner_error_is_scoped_to_them() {
        // A member already in the room must see nothing when a banned
        // user's join attempt is rejected.
        let mut registry = happy_registry(7);
        registry.checkpoint();
        registry.expect_exists().returning(|_| Ok(true));
        registry.expect_is_banned().returning(|_, user_id| Ok(user_id == 2));
        registry.expect_add_member().returning(|_, _| Ok(()));
        registry
            .expect_list_known_members()
            .returning(|_| Ok(vec![]));
        registry.expect_get_ban_list().returning(|_| Ok(vec![]));

        let coordinator = coordinator(registry, no_presence(), no_messages());
        let (member, mut member_rx) = connect(&coordinator, Some(alice()));
        coordinator
            .dispatch(member, ClientEvent::Join(JoinPayload { discussion_id: 7 }))
            .await;
        drain(&mut member_rx);

        let (banned, mut banned_rx) = connect(&coordinator, Some(bob()));
        coordinator
            .dispatch(banned, ClientEvent::Join(JoinPayload { discussion_id: 7 }))
            .await;

        let banned_frames = drain(&mut banned_rx);
        assert_eq!(
            banned_frames,
            vec![ServerEvent::Error(ErrorPayload {
                message: "You are banned from this discussion".into()
            })]
        );
        assert!(drain(&mut member_rx).is_empty());
    }

    #[tokio::test]
    async fn test_anonymous_join_gets_no_announcement() {
        let coordinator = coordinator(happy_registry(7), no_presence(), no_messages());
        let (conn, _rx) = connect(&coordinator, None);

        let out = coordinator
            .handle_join(conn, JoinPayload { discussion_id: 7 })
            .await
            .unwrap();

        assert_eq!(out.len(), 2);
        assert!(matches!(out[0], Outbound::ToRoom(7, ServerEvent::Status(_))));
        assert!(matches!(
            out[1],
            Outbound::ToConnection(_, ServerEvent::History(_))
        ));
        assert!(coordinator.is_joined(conn, 7));
    }

    // --- message ---

    #[tokio::test]
    async fn test_message_from_unjoined_sender_is_rejected() {
        let coordinator = coordinator(happy_registry(7), no_presence(), no_messages());
        let (conn, _rx) = connect(&coordinator, Some(alice()));

        let result = coordinator
            .handle_message(
                conn,
                MessagePayload {
                    discussion_id: 7,
                    jwt: None,
                    message: "hello".into(),
                },
            )
            .await;

        assert_eq!(result.unwrap_err(), ChatError::NotJoined);
    }

    #[tokio::test]
    async fn test_message_from_anonymous_sender_is_rejected() {
        let coordinator = coordinator(happy_registry(7), no_presence(), no_messages());
        let (conn, _rx) = connect(&coordinator, None);

        let result = coordinator
            .handle_message(
                conn,
                MessagePayload {
                    discussion_id: 7,
                    jwt: None,
                    message: "hello".into(),
                },
            )
            .await;

        assert_eq!(result.unwrap_err(), ChatError::Unauthenticated);
    }

    #[tokio::test]
    async fn test_message_is_persisted_then_broadcast_with_stored_fields() {
        let mut messages = no_messages();
        messages
            .expect_persist()
            .withf(|discussion_id, sender, content| {
                *discussion_id == 7 && sender.nickname == "alice" && content == "hello"
            })
            .returning(|discussion_id, sender, content| {
                Ok(ChatMessage {
                    id: 424242,
                    discussion_id,
                    user_id: sender.user_id,
                    nickname: sender.nickname.clone(),
                    content: content.to_string(),
                    created_at: Utc::now(),
                })
            });

        let coordinator = coordinator(happy_registry(7), no_presence(), messages);
        let (sender, mut sender_rx) = connect(&coordinator, Some(alice()));
        coordinator
            .dispatch(sender, ClientEvent::Join(JoinPayload { discussion_id: 7 }))
            .await;
        drain(&mut sender_rx);

        coordinator
            .dispatch(
                sender,
                ClientEvent::Message(MessagePayload {
                    discussion_id: 7,
                    jwt: None,
                    message: "hello".into(),
                }),
            )
            .await;

        let frames = drain(&mut sender_rx);
        assert_eq!(frames.len(), 1);
        match &frames[0] {
            ServerEvent::Message(payload) => {
                assert_eq!(payload.message_id, "424242");
                assert_eq!(payload.nickname, "alice");
                assert_eq!(payload.message, "hello");
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    // --- discussionProgress ---

    #[tokio::test]
    async fn test_progress_by_non_author_is_rejected_without_mutation() {
        let mut registry = happy_registry(7);
        registry.expect_set_progress().times(0);

        let coordinator = coordinator(registry, no_presence(), no_messages());
        let (author, mut author_rx) = connect(&coordinator, Some(alice()));
        coordinator
            .dispatch(author, ClientEvent::Join(JoinPayload { discussion_id: 7 }))
            .await;
        drain(&mut author_rx);

        let (outsider, mut outsider_rx) = connect(&coordinator, Some(bob()));
        coordinator
            .dispatch(
                outsider,
                ClientEvent::DiscussionProgress(ProgressPayload {
                    discussion_id: 7,
                    progress: serde_json::json!({"stage": 2}),
                }),
            )
            .await;

        // Scoped error to the outsider, nothing broadcast to the room
        let outsider_frames = drain(&mut outsider_rx);
        assert_eq!(
            outsider_frames,
            vec![ServerEvent::Error(ErrorPayload {
                message: "Not the author of this discussion".into()
            })]
        );
        assert!(drain(&mut author_rx).is_empty());
    }

    #[tokio::test]
    async fn test_progress_by_author_persists_then_broadcasts() {
        let mut registry = happy_registry(7);
        registry
            .expect_set_progress()
            .withf(|id, progress| *id == 7 && progress["stage"] == 2)
            .times(1)
            .returning(|_, _| Ok(()));

        let coordinator = coordinator(registry, no_presence(), no_messages());
        let (author, _author_rx) = connect(&coordinator, Some(alice()));

        let out = coordinator
            .handle_progress(
                author,
                ProgressPayload {
                    discussion_id: 7,
                    progress: serde_json::json!({"stage": 2}),
                },
            )
            .await
            .unwrap();

        assert_eq!(
            out,
            vec![Outbound::ToRoom(
                7,
                ServerEvent::DiscussionProgress(ProgressPayload {
                    discussion_id: 7,
                    progress: serde_json::json!({"stage": 2}),
                })
            )]
        );
    }

    // --- status ---

    #[tokio::test]
    async fn test_status_goes_to_requester_only() {
        let mut registry = happy_registry(7);
        registry.checkpoint();
        registry
            .expect_list_known_members()
            .returning(|_| Ok(vec![alice()]));
        registry
            .expect_get_ban_list()
            .returning(|_| Ok(vec![bob()]));

        let coordinator = coordinator(registry, no_presence(), no_messages());
        let (conn, _rx) = connect(&coordinator, None);

        let out = coordinator
            .handle_status(conn, StatusRequestPayload { discussion_id: 7 })
            .await
            .unwrap();

        assert_eq!(
            out,
            vec![Outbound::ToConnection(
                conn,
                ServerEvent::Status(StatusPayload {
                    discussion_id: 7,
                    members: vec![alice()],
                    banned: vec![bob()],
                })
            )]
        );
    }

    // --- ban / unban ---

    #[tokio::test]
    async fn test_ban_evicts_live_target_and_updates_room() {
        let mut registry = happy_registry(7);
        registry
            .expect_add_ban()
            .withf(|id, nickname| *id == 7 && nickname == "bob")
            .times(1)
            .returning(|_, _| Ok(()));

        let coordinator_holder: Arc<std::sync::OnceLock<ConnectionId>> =
            Arc::new(std::sync::OnceLock::new());

        let mut presence = no_presence();
        let target_cell = coordinator_holder.clone();
        presence
            .expect_lookup()
            .returning(move |_| Ok(target_cell.get().copied()));

        let coordinator = coordinator(registry, presence, no_messages());

        let (author, mut author_rx) = connect(&coordinator, Some(alice()));
        coordinator
            .dispatch(author, ClientEvent::Join(JoinPayload { discussion_id: 7 }))
            .await;

        let (target, mut target_rx) = connect(&coordinator, Some(bob()));
        coordinator
            .dispatch(target, ClientEvent::Join(JoinPayload { discussion_id: 7 }))
            .await;
        coordinator_holder.set(target).unwrap();

        drain(&mut author_rx);
        drain(&mut target_rx);

        coordinator
            .dispatch(
                author,
                ClientEvent::Ban(ModerationPayload {
                    discussion_id: 7,
                    nickname: "bob".into(),
                }),
            )
            .await;

        // Target: scoped error, dropped from live membership, and no
        // longer part of the room-wide status broadcast.
        let target_frames = drain(&mut target_rx);
        assert_eq!(
            target_frames,
            vec![ServerEvent::Error(ErrorPayload {
                message: "You have been banned from this discussion".into()
            })]
        );
        assert!(!coordinator.is_joined(target, 7));

        // Author: ack first, then the updated snapshot.
        let author_frames = drain(&mut author_rx);
        assert_eq!(author_frames.len(), 2);
        assert_eq!(
            author_frames[0],
            ServerEvent::Info(InfoPayload {
                message: "Banned [bob] from the discussion".into()
            })
        );
        assert!(matches!(author_frames[1], ServerEvent::Status(_)));
    }

    #[tokio::test]
    async fn test_ban_with_offline_target_still_records_ban() {
        let mut registry = happy_registry(7);
        registry.expect_add_ban().times(1).returning(|_, _| Ok(()));

        let mut presence = no_presence();
        presence.expect_lookup().returning(|_| Ok(None));

        let coordinator = coordinator(registry, presence, no_messages());
        let (author, _rx) = connect(&coordinator, Some(alice()));

        let out = coordinator
            .handle_ban(
                author,
                ModerationPayload {
                    discussion_id: 7,
                    nickname: "bob".into(),
                },
            )
            .await
            .unwrap();

        // No scoped error to any target; ack and snapshot still go out.
        assert_eq!(out.len(), 2);
        assert!(matches!(
            out[0],
            Outbound::ToConnection(id, ServerEvent::Info(_)) if id == author
        ));
        assert!(matches!(out[1], Outbound::ToRoom(7, ServerEvent::Status(_))));
    }

    #[tokio::test]
    async fn test_ban_by_non_author_is_rejected() {
        let mut registry = happy_registry(7);
        registry.expect_add_ban().times(0);

        let coordinator = coordinator(registry, no_presence(), no_messages());
        let (outsider, _rx) = connect(&coordinator, Some(bob()));

        let result = coordinator
            .handle_ban(
                outsider,
                ModerationPayload {
                    discussion_id: 7,
                    nickname: "alice".into(),
                },
            )
            .await;

        assert_eq!(result.unwrap_err(), ChatError::NotAuthor);
    }

    #[tokio::test]
    async fn test_ban_then_rejoin_is_rejected_and_unban_restores_access() {
        // Shared ban flag wires add_ban/remove_ban to is_banned the way
        // the persisted list would.
        let banned = Arc::new(AtomicBool::new(false));

        let mut registry = MockDiscussionRepository::new();
        registry.expect_exists().returning(|_| Ok(true));
        registry.expect_verify_author().returning(|_, id| Ok(id == 1));
        registry.expect_add_member().returning(|_, _| Ok(()));
        registry
            .expect_list_known_members()
            .returning(|_| Ok(vec![]));
        registry.expect_get_ban_list().returning(|_| Ok(vec![]));
        {
            let banned = banned.clone();
            registry
                .expect_is_banned()
                .returning(move |_, user_id| Ok(user_id == 2 && banned.load(Ordering::SeqCst)));
        }
        {
            let banned = banned.clone();
            registry.expect_add_ban().returning(move |_, _| {
                banned.store(true, Ordering::SeqCst);
                Ok(())
            });
        }
        {
            let banned = banned.clone();
            registry.expect_remove_ban().returning(move |_, _| {
                banned.store(false, Ordering::SeqCst);
                Ok(())
            });
        }

        // Presence is empty throughout: the rejection must come from the
        // persisted ban list alone.
        let mut presence = no_presence();
        presence.expect_lookup().returning(|_| Ok(None));

        let coordinator = coordinator(registry, presence, no_messages());
        let (author, _author_rx) = connect(&coordinator, Some(alice()));

        coordinator
            .handle_ban(
                author,
                ModerationPayload {
                    discussion_id: 7,
                    nickname: "bob".into(),
                },
            )
            .await
            .unwrap();

        // Fresh connection, same identity: join must fail.
        let (rejoin, _rx) = connect(&coordinator, Some(bob()));
        let result = coordinator
            .handle_join(rejoin, JoinPayload { discussion_id: 7 })
            .await;
        assert_eq!(result.unwrap_err(), ChatError::Banned);

        // After unban the same identity joins fine.
        coordinator
            .handle_unban(
                author,
                ModerationPayload {
                    discussion_id: 7,
                    nickname: "bob".into(),
                },
            )
            .await
            .unwrap();

        let (back, _rx2) = connect(&coordinator, Some(bob()));
        assert!(coordinator
            .handle_join(back, JoinPayload { discussion_id: 7 })
            .await
            .is_ok());
        assert!(coordinator.is_joined(back, 7));
    }

    // --- disconnect & presence guard ---

    #[tokio::test]
    async fn test_disconnect_releases_presence_with_own_connection_id() {
        let mut presence = no_presence();
        let (conn_probe_tx, conn_probe_rx) = std::sync::mpsc::channel::<(String, ConnectionId)>();
        presence.expect_release().returning(move |nickname, conn| {
            conn_probe_tx.send((nickname.to_string(), conn)).unwrap();
            Ok(true)
        });

        let coordinator = coordinator(happy_registry(7), presence, no_messages());
        let (conn, _rx) = connect(&coordinator, Some(alice()));
        coordinator
            .dispatch(conn, ClientEvent::Join(JoinPayload { discussion_id: 7 }))
            .await;

        coordinator.disconnect(conn).await;

        let (nickname, released_conn) = conn_probe_rx.try_recv().unwrap();
        assert_eq!(nickname, "alice");
        assert_eq!(released_conn, conn);
        assert!(!coordinator.is_joined(conn, 7));
        assert_eq!(coordinator.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_disconnect_does_not_clear_newer_connection() {
        // The old connection's cleanup runs after a reconnect under the
        // same nickname. The store-side guard reports the entry as
        // superseded and the newer connection keeps working.
        let mut presence = no_presence();
        presence
            .expect_release()
            .returning(|_, _| Ok(false)); // entry no longer addresses this connection

        let coordinator = coordinator(happy_registry(7), presence, no_messages());

        let (old_conn, _old_rx) = connect(&coordinator, Some(alice()));
        let (new_conn, mut new_rx) = connect(&coordinator, Some(alice()));
        coordinator
            .dispatch(new_conn, ClientEvent::Join(JoinPayload { discussion_id: 7 }))
            .await;
        drain(&mut new_rx);

        coordinator.disconnect(old_conn).await;

        // The newer connection is untouched: still registered, still in
        // the room, still receiving broadcasts.
        assert!(coordinator.is_joined(new_conn, 7));
        coordinator.deliver(vec![Outbound::ToRoom(7, ServerEvent::info("ping"))]);
        assert_eq!(
            drain(&mut new_rx),
            vec![ServerEvent::Info(InfoPayload {
                message: "ping".into()
            })]
        );
    }

    #[tokio::test]
    async fn test_disconnect_cleans_every_joined_room() {
        let mut registry = MockDiscussionRepository::new();
        registry.expect_exists().returning(|_| Ok(true));
        registry.expect_is_banned().returning(|_, _| Ok(false));
        registry.expect_add_member().returning(|_, _| Ok(()));
        registry
            .expect_list_known_members()
            .returning(|_| Ok(vec![]));
        registry.expect_get_ban_list().returning(|_| Ok(vec![]));

        let mut presence = no_presence();
        presence.expect_release().returning(|_, _| Ok(true));

        let coordinator = coordinator(registry, presence, no_messages());
        let (conn, _rx) = connect(&coordinator, Some(alice()));

        for discussion_id in [1, 2, 3] {
            coordinator
                .dispatch(conn, ClientEvent::Join(JoinPayload { discussion_id }))
                .await;
        }
        assert!(coordinator.is_joined(conn, 2));

        coordinator.disconnect(conn).await;

        for discussion_id in [1, 2, 3] {
            assert!(!coordinator.is_joined(conn, discussion_id));
        }
    }

    // --- failure containment ---

    #[tokio::test]
    async fn test_registry_failure_is_contained_to_origin() {
        let mut registry = MockDiscussionRepository::new();
        registry
            .expect_exists()
            .returning(|_| Err(AppError::Internal("registry down".into())));

        let coordinator = coordinator(registry, no_presence(), no_messages());
        let (conn, mut rx) = connect(&coordinator, Some(alice()));

        coordinator
            .dispatch(conn, ClientEvent::Join(JoinPayload { discussion_id: 7 }))
            .await;

        // Origin gets a generic scoped error without internal detail; the
        // coordinator keeps serving.
        let frames = drain(&mut rx);
        assert_eq!(
            frames,
            vec![ServerEvent::Error(ErrorPayload {
                message: "Something went wrong, please retry".into()
            })]
        );
        assert_eq!(coordinator.connection_count(), 1);
    }
}
