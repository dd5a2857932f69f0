//! Room-based WebSocket relay.
//!
//! Clients join a room and every mutation intent they send is rebroadcast,
//! in receipt order, to every other peer in the same room. The relay also
//! keeps each room's latest full-tree snapshot so late joiners start from
//! the current state instead of an empty tree.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use protoboard_core::{ClientMessage, ProjectTree, ServerMessage};
use std::{collections::HashSet, sync::Arc};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::ServerState;

const CHANNEL_CAPACITY: usize = 256;

/// Per-room broadcast state.
pub struct Room {
    /// Broadcast channel for this room.
    tx: broadcast::Sender<(String, ServerMessage)>,
    /// Connected peer IDs.
    peers: HashSet<String>,
    /// Latest full-tree snapshot (for new joiners).
    snapshot: Option<ProjectTree>,
}

impl Room {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            peers: HashSet::new(),
            snapshot: None,
        }
    }
}

/// All active rooms.
#[derive(Default)]
pub struct RelayState {
    rooms: DashMap<String, Room>,
}

impl RelayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer to a room, creating the room if needed.
    ///
    /// Returns the peer's receiver, the room's current snapshot, and the
    /// peer count after joining.
    fn join_room(
        &self,
        room_id: &str,
        peer_id: &str,
    ) -> (
        broadcast::Receiver<(String, ServerMessage)>,
        Option<ProjectTree>,
        usize,
    ) {
        let mut room = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(Room::new);
        room.peers.insert(peer_id.to_string());
        let rx = room.tx.subscribe();
        let snapshot = room.snapshot.clone();
        let peer_count = room.peers.len();
        (rx, snapshot, peer_count)
    }

    /// Remove a peer from a room, dropping the room once it empties.
    fn leave_room(&self, room_id: &str, peer_id: &str) {
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            room.peers.remove(peer_id);
            if room.peers.is_empty() {
                drop(room);
                self.rooms.remove(room_id);
            }
        }
    }

    /// Update a room's snapshot.
    fn update_snapshot(&self, room_id: &str, tree: ProjectTree) {
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            room.snapshot = Some(tree);
        }
    }

    /// Broadcast a message to a room, tagged with the sending peer.
    fn broadcast(&self, room_id: &str, from: &str, msg: ServerMessage) {
        if let Some(room) = self.rooms.get(room_id) {
            let _ = room.tx.send((from.to_string(), msg));
        }
    }

    #[cfg(test)]
    fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    let peer_id = Uuid::new_v4().to_string();
    info!("new connection: {}", peer_id);

    let (mut sender, mut receiver) = socket.split();
    let mut current_room: Option<String> = None;
    let mut room_rx: Option<broadcast::Receiver<(String, ServerMessage)>> = None;

    loop {
        tokio::select! {
            // Messages from this client.
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => match client_msg {
                                ClientMessage::Join { room } => {
                                    if let Some(ref old_room) = current_room {
                                        state.relay.leave_room(old_room, &peer_id);
                                        state.relay.broadcast(old_room, &peer_id, ServerMessage::PeerLeft {
                                            peer_id: peer_id.clone(),
                                        });
                                    }

                                    let (rx, snapshot, peer_count) =
                                        state.relay.join_room(room.as_str(), &peer_id);
                                    room_rx = Some(rx);
                                    current_room = Some(room.as_str().to_string());

                                    let joined = ServerMessage::Joined {
                                        room: room.clone(),
                                        peer_count,
                                        snapshot,
                                    };
                                    if sender.send(Message::Text(serde_json::to_string(&joined).unwrap().into())).await.is_err() {
                                        break;
                                    }

                                    state.relay.broadcast(room.as_str(), &peer_id, ServerMessage::PeerJoined {
                                        peer_id: peer_id.clone(),
                                    });

                                    info!("peer {} joined room {}", peer_id, room);
                                }
                                ClientMessage::Leave => {
                                    if let Some(ref room) = current_room {
                                        state.relay.leave_room(room, &peer_id);
                                        state.relay.broadcast(room, &peer_id, ServerMessage::PeerLeft {
                                            peer_id: peer_id.clone(),
                                        });
                                        info!("peer {} left room {}", peer_id, room);
                                    }
                                    current_room = None;
                                    room_rx = None;
                                }
                                ClientMessage::Intent { payload } => {
                                    if let Some(ref room) = current_room {
                                        state.relay.broadcast(room, &peer_id, ServerMessage::Intent {
                                            from: peer_id.clone(),
                                            payload,
                                        });
                                    }
                                }
                                ClientMessage::Snapshot { tree } => {
                                    if let Some(ref room) = current_room {
                                        state.relay.update_snapshot(room, tree.clone());
                                        state.relay.broadcast(room, &peer_id, ServerMessage::Snapshot {
                                            from: peer_id.clone(),
                                            tree,
                                        });
                                    }
                                }
                            },
                            Err(e) => {
                                warn!("invalid message from {}: {}", peer_id, e);
                                let err = ServerMessage::Error {
                                    message: format!("Invalid message: {}", e),
                                };
                                let _ = sender.send(Message::Text(serde_json::to_string(&err).unwrap().into())).await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(_)) => {} // Ignore binary/ping/pong.
                    Some(Err(e)) => {
                        warn!("websocket error for {}: {}", peer_id, e);
                        break;
                    }
                }
            }

            // Messages rebroadcast within the room.
            msg = async {
                match &mut room_rx {
                    Some(rx) => rx.recv().await.ok(),
                    None => {
                        // No room joined, just wait forever.
                        std::future::pending::<Option<(String, ServerMessage)>>().await
                    }
                }
            } => {
                if let Some((from, server_msg)) = msg {
                    // Don't echo back to the sender.
                    if from != peer_id {
                        let json = serde_json::to_string(&server_msg).unwrap();
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }

    // Cleanup on disconnect.
    if let Some(ref room) = current_room {
        state.relay.leave_room(room, &peer_id);
        state.relay.broadcast(room, &peer_id, ServerMessage::PeerLeft {
            peer_id: peer_id.clone(),
        });
    }
    info!("connection closed: {}", peer_id);
}
