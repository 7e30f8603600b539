//! Room membership and fan-out
//!
//! This module owns the room -> members map and the connection registry,
//! both behind a single lock. Each join, relay and leave takes the lock
//! once, updates membership, snapshots the recipients and releases the lock
//! before anything is enqueued for delivery.

use crate::connection::{Connection, ConnectionId};
use crate::error::SignalingError;
use crate::protocol::{Envelope, PeerEvent, PeerId, RoomId};
use crate::registry::{Assignment, ConnectionRegistry, Membership};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Default, Debug)]
struct InnerState {
    /// Map of room -> connections currently joined. Never holds an empty room.
    rooms: HashMap<RoomId, HashMap<ConnectionId, Connection>>,
    /// Map of connection -> room and peer id
    registry: ConnectionRegistry,
}

/// Shared relay state. Cheap to clone; all clones see the same rooms.
#[derive(Default, Clone)]
pub struct ServerState {
    inner: Arc<Mutex<InnerState>>,
}

impl ServerState {
    /// Create an empty relay state
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch one inbound frame from `connection`.
    ///
    /// Frames that are not JSON objects, joins without `roomId`/`sender`,
    /// and relays from connections outside any room are dropped silently.
    pub fn handle_message(&self, connection: &Connection, raw: &str) {
        match raw.parse::<Envelope>() {
            Ok(Envelope::Join { room_id, sender }) => self.join(connection, room_id, sender),
            Ok(Envelope::Relay { kind }) => {
                let delivered = self.relay(connection, raw);
                debug!(
                    conn_id = %connection.id(),
                    kind = kind.as_deref().unwrap_or_default(),
                    delivered,
                    "relayed message"
                );
            }
            Err(err) => {
                debug!(conn_id = %connection.id(), error = %err, "discarding envelope");
            }
        }
    }

    /// Place `connection` in `room_id` as `sender` and announce it to the
    /// other members.
    ///
    /// A connection joins at most once; later joins are ignored.
    pub fn join(&self, connection: &Connection, room_id: RoomId, sender: PeerId) {
        if !connection.is_open() {
            return;
        }

        let event = PeerEvent::NewPeer {
            room_id: room_id.clone(),
            sender: sender.clone(),
        };

        let recipients = {
            let mut guard = self.inner.lock();
            let state = &mut *guard;

            match state
                .registry
                .assign(connection.id(), room_id.clone(), sender.clone())
            {
                Assignment::New => {}
                Assignment::Unchanged => return,
                Assignment::Conflict => {
                    debug!(
                        conn_id = %connection.id(),
                        requested = %room_id,
                        "ignoring join from a connection already in a room"
                    );
                    return;
                }
            }

            let members = state.rooms.entry(room_id.clone()).or_default();
            members.insert(connection.id(), connection.clone());
            others(members, connection.id())
        };

        info!(
            room_id = %room_id,
            sender = %sender,
            members = recipients.len() + 1,
            "peer joined room"
        );
        fan_out(&recipients, &Arc::from(event.to_string()));
    }

    /// Forward `raw` verbatim to every other member of the sender's room.
    ///
    /// Returns how many recipients accepted the message; zero if the sender
    /// never joined a room.
    pub fn relay(&self, connection: &Connection, raw: &str) -> usize {
        let recipients = {
            let state = self.inner.lock();
            let Some(membership) = state.registry.lookup(connection.id()) else {
                debug!(conn_id = %connection.id(), "sender has not joined a room");
                return 0;
            };
            match state.rooms.get(&membership.room_id) {
                Some(members) => others(members, connection.id()),
                None => return 0,
            }
        };

        fan_out(&recipients, &Arc::from(raw))
    }

    /// Close path for `connection`: leave its room, tell the remaining
    /// members, drop the room if it is now empty.
    ///
    /// Safe to call more than once; only the first call has an effect.
    pub fn disconnect(&self, connection: &Connection) {
        connection.close();

        let (membership, recipients) = {
            let mut guard = self.inner.lock();
            let state = &mut *guard;

            let Some(membership) = state.registry.clear(connection.id()) else {
                return;
            };

            let remaining = match state.rooms.get_mut(&membership.room_id) {
                Some(members) => {
                    members.remove(&connection.id());
                    members.values().cloned().collect::<Vec<_>>()
                }
                None => Vec::new(),
            };
            if remaining.is_empty() {
                state.rooms.remove(&membership.room_id);
            }
            (membership, remaining)
        };

        info!(
            room_id = %membership.room_id,
            sender = %membership.peer_id,
            members = recipients.len(),
            "peer left room"
        );

        let event = PeerEvent::PeerLeft {
            room_id: membership.room_id,
            sender: membership.peer_id,
        };
        fan_out(&recipients, &Arc::from(event.to_string()));
    }

    /// Connections currently joined to `room_id`
    pub fn room_members(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.inner
            .lock()
            .rooms
            .get(room_id)
            .map(|members| members.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Number of non-empty rooms
    pub fn room_count(&self) -> usize {
        self.inner.lock().rooms.len()
    }

    /// Room and peer id assigned to a connection, if it has joined
    pub fn membership(&self, id: ConnectionId) -> Option<Membership> {
        self.inner.lock().registry.lookup(id).cloned()
    }
}

/// Snapshot of every member except `exclude`
fn others(members: &HashMap<ConnectionId, Connection>, exclude: ConnectionId) -> Vec<Connection> {
    members
        .iter()
        .filter(|(id, _)| **id != exclude)
        .map(|(_, connection)| connection.clone())
        .collect()
}

/// Best-effort delivery to each open recipient. A failure for one recipient
/// never affects the others.
fn fan_out(recipients: &[Connection], message: &Arc<str>) -> usize {
    let mut delivered = 0;
    for recipient in recipients.iter().filter(|r| r.is_open()) {
        match recipient.send(Arc::clone(message)) {
            Ok(()) => delivered += 1,
            Err(SignalingError::QueueFull) => {
                warn!(conn_id = %recipient.id(), "outbound queue full, dropping message");
            }
            Err(err) => {
                debug!(conn_id = %recipient.id(), error = %err, "failed to deliver message");
            }
        }
    }
    delivered
}
