//! Room registry.
//!
//! ```text
//! RoomRegistry
//!   rooms: RwLock<HashMap<RoomCode, Arc<Mutex<Room>>>>
//!                                        │
//!                                        └─ Room { members: IndexMap<PeerId, RelayConnection>, closed }
//! ```
//!
//! The outer map lock is held only to find, create or remove a room, so
//! rooms never wait on each other. Everything that reads or mutates one
//! room's membership (join, leave, routing, announcements) happens under
//! that room's mutex, which keeps the `joined` snapshot and the
//! `peer_joined`/`peer_left` announcements in one consistent order.
//!
//! A room marked `closed` has already been unlinked from the map; a join
//! that raced with the removal retries against a fresh room.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use mc_core::{PeerId, RoomCode, SignalMessage};

use crate::connection::{ConnectionId, RelayConnection};

#[derive(Debug, Default)]
struct Room {
    members: IndexMap<PeerId, RelayConnection>,
    closed: bool,
}

impl Room {
    fn broadcast_except(&self, sender: &PeerId, frame: &str) -> usize {
        self.members
            .iter()
            .filter(|(peer_id, _)| *peer_id != sender)
            .filter(|(_, conn)| conn.enqueue(frame.to_string()))
            .count()
    }
}

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomCode, Arc<Mutex<Room>>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `peer_id` in `code` and return the members that were
    /// already there, in join order. A repeated join by the same id replaces
    /// its connection in place.
    pub async fn join(
        &self,
        code: &RoomCode,
        peer_id: &PeerId,
        connection: RelayConnection,
    ) -> Vec<PeerId> {
        self.join_inner(code, peer_id, connection, false).await
    }

    /// [`join`](Self::join), then reply `joined` to the new member and
    /// announce `peer_joined` to the others, all under the room lock.
    pub async fn join_and_announce(
        &self,
        code: &RoomCode,
        peer_id: &PeerId,
        connection: RelayConnection,
    ) -> Vec<PeerId> {
        self.join_inner(code, peer_id, connection, true).await
    }

    async fn join_inner(
        &self,
        code: &RoomCode,
        peer_id: &PeerId,
        connection: RelayConnection,
        announce: bool,
    ) -> Vec<PeerId> {
        loop {
            let room = self.room_for_join(code).await;
            let mut room = room.lock().await;
            if room.closed {
                continue;
            }

            let existing: Vec<PeerId> = room
                .members
                .keys()
                .filter(|id| *id != peer_id)
                .cloned()
                .collect();

            if let Some(previous) = room.members.insert(peer_id.clone(), connection.clone()) {
                debug!(
                    room = %code,
                    peer_id = %peer_id,
                    replaced = %previous.id(),
                    "Duplicate join replaced existing registry entry"
                );
            }

            info!(
                room = %code,
                peer_id = %peer_id,
                members = room.members.len(),
                "Peer joined room"
            );

            if announce {
                let joined = SignalMessage::Joined {
                    code: code.clone(),
                    my_id: peer_id.clone(),
                    peers: existing.clone(),
                    peer_count: room.members.len(),
                };
                if let Some(frame) = encode(&joined) {
                    connection.enqueue(frame);
                }
                let peer_joined = SignalMessage::PeerJoined {
                    peer_id: peer_id.clone(),
                };
                if let Some(frame) = encode(&peer_joined) {
                    room.broadcast_except(peer_id, &frame);
                }
            }

            return existing;
        }
    }

    async fn room_for_join(&self, code: &RoomCode) -> Arc<Mutex<Room>> {
        if let Some(room) = self.rooms.read().await.get(code) {
            return room.clone();
        }
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(code.clone())
            .or_insert_with(|| {
                debug!(room = %code, "Creating room");
                Arc::new(Mutex::new(Room::default()))
            })
            .clone()
    }

    async fn existing_room(&self, code: &RoomCode) -> Option<Arc<Mutex<Room>>> {
        self.rooms.read().await.get(code).cloned()
    }

    /// Deliver `frame` to `to` only. `false` when the room or target is unknown.
    pub async fn route_directed(
        &self,
        code: &RoomCode,
        from: &PeerId,
        to: &PeerId,
        frame: String,
    ) -> bool {
        let Some(room) = self.existing_room(code).await else {
            debug!(room = %code, from = %from, to = %to, "Route to unknown room");
            return false;
        };
        let room = room.lock().await;
        match room.members.get(to) {
            Some(connection) => connection.enqueue(frame),
            None => {
                debug!(room = %code, from = %from, to = %to, "Route to unknown peer");
                false
            }
        }
    }

    /// Deliver `frame` to every member except `from`. Returns how many queued it.
    pub async fn broadcast_except_self(&self, code: &RoomCode, from: &PeerId, frame: &str) -> usize {
        match self.existing_room(code).await {
            Some(room) => room.lock().await.broadcast_except(from, frame),
            None => 0,
        }
    }

    /// Remove `peer_id`, announce `peer_left`, delete the room when empty.
    /// Returns whether the peer was a member.
    pub async fn leave(&self, code: &RoomCode, peer_id: &PeerId) -> bool {
        self.leave_inner(code, peer_id, None).await
    }

    /// Like [`leave`](Self::leave), but only when the registered entry still
    /// belongs to `connection`. A connection replaced by a duplicate join
    /// must not evict its successor when it closes.
    pub async fn leave_connection(
        &self,
        code: &RoomCode,
        peer_id: &PeerId,
        connection: ConnectionId,
    ) -> bool {
        self.leave_inner(code, peer_id, Some(connection)).await
    }

    async fn leave_inner(
        &self,
        code: &RoomCode,
        peer_id: &PeerId,
        connection: Option<ConnectionId>,
    ) -> bool {
        let Some(room_arc) = self.existing_room(code).await else {
            return false;
        };
        let mut room = room_arc.lock().await;

        let owned = match (room.members.get(peer_id), connection) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(current), Some(expected)) => current.id() == expected,
        };
        if !owned {
            return false;
        }
        room.members.shift_remove(peer_id);

        info!(
            room = %code,
            peer_id = %peer_id,
            remaining = room.members.len(),
            "Peer left room"
        );

        let peer_left = SignalMessage::PeerLeft {
            peer_id: peer_id.clone(),
        };
        if let Some(frame) = encode(&peer_left) {
            room.broadcast_except(peer_id, &frame);
        }

        if room.members.is_empty() {
            room.closed = true;
            let mut rooms = self.rooms.write().await;
            if rooms
                .get(code)
                .is_some_and(|current| Arc::ptr_eq(current, &room_arc))
            {
                rooms.remove(code);
                debug!(room = %code, "Room empty, removed");
            }
        }
        true
    }

    /// Members of `code` in join order.
    pub async fn members(&self, code: &RoomCode) -> Vec<PeerId> {
        match self.existing_room(code).await {
            Some(room) => room.lock().await.members.keys().cloned().collect(),
            None => Vec::new(),
        }
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

fn encode(message: &SignalMessage) -> Option<String> {
    match message.to_json() {
        Ok(frame) => Some(frame),
        Err(err) => {
            warn!(kind = message.kind(), error = %err, "Failed to encode relay message");
            None
        }
    }
}
