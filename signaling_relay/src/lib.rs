//! Room-based WebSocket relay for peer-to-peer signaling
//!
//! Peers connect over WebSocket, join a named room, and then exchange opaque
//! JSON messages with every other member of that room. The relay never looks
//! inside those messages; it only tracks who is in which room.
//!
//! # Protocol
//!
//! All frames are JSON objects with a `type` field.
//!
//! ## Client → relay
//!
//! - `{"type": "join-room", "roomId": "<room>", "sender": "<peer>"}` - join a room
//! - any other object - forwarded verbatim to the other members of the
//!   sender's room (dropped if the sender has not joined one)
//!
//! ## Relay → client
//!
//! - `{"type": "new-peer", "roomId": "<room>", "sender": "<peer>"}` - someone joined
//! - `{"type": "peer-left", "roomId": "<room>", "sender": "<peer>"}` - someone left
//! - whatever the other members send
//!
//! Malformed frames are ignored; the relay never answers with an error.
//!
//! # HTTP
//!
//! - **GET /health** - `200 ok`, for load balancer checks
//! - any other plain request - `200 signaling-ok`
//!
//! # Example
//!
//! ```bash
//! # Start the relay on port 3001
//! PORT=3001 signaling-relay
//!
//! # Health check
//! curl http://127.0.0.1:3001/health
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod connection;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod state;

pub use config::{Args, ServerConfig};
pub use connection::{Connection, ConnectionId};
pub use error::{ClientRequestError, SignalingError};
pub use protocol::{Envelope, PeerEvent, PeerId, RoomId};
pub use registry::{Assignment, ConnectionRegistry, Membership};
pub use server::SignalingServer;
pub use state::ServerState;
