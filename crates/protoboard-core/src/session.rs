//! Collaboration session: room membership and remote intent replay.
//!
//! The session is an explicit value threaded through the dispatcher and the
//! apply loop; there is no ambient "current room" global. While no room is
//! joined, nothing is ever queued for relay and local edits stay private.

use crate::intent::MutationIntent;
use crate::sync::{ClientMessage, ServerMessage};
use crate::tree::ProjectTree;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a collaborative editing session shared by multiple clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What happened while handling a server message.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The server confirmed a room join.
    JoinedRoom {
        room: RoomCode,
        peer_count: usize,
        /// Whether the join replaced the local tree with a room snapshot.
        synced: bool,
    },
    /// A peer joined the room.
    PeerJoined { peer_id: String },
    /// A peer left the room.
    PeerLeft { peer_id: String },
    /// A relayed intent was applied to the local tree.
    IntentApplied {
        from: String,
        intent: MutationIntent,
    },
    /// A relayed intent did not apply cleanly; the tree is unchanged.
    IntentRejected { from: String, reason: String },
    /// The local tree was replaced by a peer's snapshot.
    SnapshotApplied { from: String },
    /// Error reported by the server.
    Error { message: String },
}

/// Manages room membership and the outgoing relay queue.
///
/// Incoming intents are replayed through [`ProjectTree::apply`], the same
/// function local dispatch uses, and are never re-queued for relay, so a
/// relayed intent cannot loop back through the room.
pub struct CollabSession {
    /// This client's peer identifier.
    peer_id: String,
    /// Current room, set once the server confirms a join.
    room: Option<RoomCode>,
    /// Pending outgoing messages (JSON strings).
    outgoing: Vec<String>,
}

impl CollabSession {
    /// Create a session with a fresh peer id, outside any room.
    pub fn new() -> Self {
        Self {
            peer_id: Uuid::new_v4().to_string(),
            room: None,
            outgoing: Vec::new(),
        }
    }

    /// This client's peer identifier.
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    /// Get the current room, if joined.
    pub fn current_room(&self) -> Option<&RoomCode> {
        self.room.as_ref()
    }

    /// Check if a room is joined.
    pub fn is_in_room(&self) -> bool {
        self.room.is_some()
    }

    /// Request to join a room. Queues the join message; the room becomes
    /// current when the server confirms.
    pub fn join_room(&mut self, room: RoomCode) {
        self.queue(&ClientMessage::Join { room });
    }

    /// Leave the current room.
    pub fn leave_room(&mut self) {
        if self.room.take().is_some() {
            self.queue(&ClientMessage::Leave);
        }
    }

    /// Queue a locally originated intent for relay.
    ///
    /// Does nothing while no room is joined.
    pub fn queue_intent(&mut self, intent: &MutationIntent) {
        if self.room.is_some() {
            self.queue(&ClientMessage::Intent {
                payload: intent.clone(),
            });
        }
    }

    /// Queue a full-tree snapshot for the room (late-joiner state and
    /// drift reconciliation). Does nothing while no room is joined.
    pub fn queue_snapshot(&mut self, tree: &ProjectTree) {
        if self.room.is_some() {
            self.queue(&ClientMessage::Snapshot { tree: tree.clone() });
        }
    }

    /// Take pending outgoing messages (drains the queue).
    pub fn take_outgoing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outgoing)
    }

    /// Check if there are pending outgoing messages.
    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    fn queue(&mut self, msg: &ClientMessage) {
        match serde_json::to_string(msg) {
            Ok(json) => self.outgoing.push(json),
            Err(e) => log::error!("failed to encode client message: {}", e),
        }
    }

    /// Handle an incoming server message, applying intents and snapshots
    /// to the given tree.
    pub fn handle_message(
        &mut self,
        msg: ServerMessage,
        tree: &mut ProjectTree,
    ) -> SessionEvent {
        match msg {
            ServerMessage::Joined {
                room,
                peer_count,
                snapshot,
            } => {
                self.room = Some(room.clone());
                let synced = match snapshot {
                    Some(remote) => {
                        *tree = remote;
                        true
                    }
                    None => false,
                };
                SessionEvent::JoinedRoom {
                    room,
                    peer_count,
                    synced,
                }
            }
            ServerMessage::PeerJoined { peer_id } => SessionEvent::PeerJoined { peer_id },
            ServerMessage::PeerLeft { peer_id } => SessionEvent::PeerLeft { peer_id },
            ServerMessage::Intent { from, payload } => match tree.apply(&payload) {
                Ok(()) => SessionEvent::IntentApplied {
                    from,
                    intent: payload,
                },
                Err(e) => {
                    log::warn!("dropping intent from {}: {}", from, e);
                    SessionEvent::IntentRejected {
                        from,
                        reason: e.to_string(),
                    }
                }
            },
            ServerMessage::Snapshot { from, tree: remote } => {
                *tree = remote;
                SessionEvent::SnapshotApplied { from }
            }
            ServerMessage::Error { message } => SessionEvent::Error { message },
        }
    }

    /// Parse and handle a raw JSON server message.
    pub fn handle_json(&mut self, json: &str, tree: &mut ProjectTree) -> Option<SessionEvent> {
        match serde_json::from_str::<ServerMessage>(json) {
            Ok(msg) => Some(self.handle_message(msg, tree)),
            Err(e) => {
                log::warn!("unparseable server message: {}", e);
                None
            }
        }
    }
}

impl Default for CollabSession {
    fn default() -> Self {
        Self::new()
    }
}
