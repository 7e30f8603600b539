//! Per-connection room and peer attributes

use crate::connection::ConnectionId;
use crate::protocol::{PeerId, RoomId};
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Room and self-reported peer id of a joined connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub room_id: RoomId,
    pub peer_id: PeerId,
}

/// Outcome of [`ConnectionRegistry::assign`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assignment {
    /// The connection had no attributes and now has these
    New,
    /// The connection already held exactly these values
    Unchanged,
    /// The connection already held different values, which were kept
    Conflict,
}

/// Connection -> membership lookup
///
/// Not synchronized on its own; [`crate::ServerState`] keeps it behind the
/// same lock as the room map so the two never disagree.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    memberships: HashMap<ConnectionId, Membership>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the room and peer id of a connection.
    ///
    /// Attributes are set once; a later call never overwrites them.
    pub fn assign(&mut self, id: ConnectionId, room_id: RoomId, peer_id: PeerId) -> Assignment {
        match self.memberships.entry(id) {
            Entry::Vacant(entry) => {
                entry.insert(Membership { room_id, peer_id });
                Assignment::New
            }
            Entry::Occupied(entry) => {
                let current = entry.get();
                if current.room_id == room_id && current.peer_id == peer_id {
                    Assignment::Unchanged
                } else {
                    Assignment::Conflict
                }
            }
        }
    }

    pub fn lookup(&self, id: ConnectionId) -> Option<&Membership> {
        self.memberships.get(&id)
    }

    /// Forget a connection, returning what it was assigned.
    pub fn clear(&mut self, id: ConnectionId) -> Option<Membership> {
        self.memberships.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.memberships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memberships.is_empty()
    }
}
