//! WebSocket Connection State

use std::collections::HashSet;

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::Participant;

use super::events::ServerEvent;

/// Identifier of a live connection. Fresh per connection; never reused.
pub type ConnectionId = Uuid;

/// State held for one live connection.
///
/// The identity is resolved once at connect time and is immutable for the
/// connection's lifetime. The joined set tracks every room this connection
/// is a member of, so disconnect can clean all of them up.
pub struct ConnectionHandle {
    /// Resolved identity; None for anonymous connections
    pub identity: Option<Participant>,

    /// Outbound frame channel, drained by the socket write task
    pub sender: mpsc::UnboundedSender<ServerEvent>,

    /// Rooms this connection has joined
    pub joined: HashSet<i64>,
}

impl ConnectionHandle {
    pub fn new(identity: Option<Participant>, sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            identity,
            sender,
            joined: HashSet::new(),
        }
    }

    /// Whether the connection carries an authenticated identity.
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_handle_has_no_rooms() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = ConnectionHandle::new(None, tx);

        assert!(handle.joined.is_empty());
        assert!(!handle.is_authenticated());
    }

    #[test]
    fn test_authenticated_handle() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let handle = ConnectionHandle::new(
            Some(Participant {
                user_id: 1,
                nickname: "alice".into(),
            }),
            tx,
        );

        assert!(handle.is_authenticated());
    }
}
