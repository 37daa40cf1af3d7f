//! Network Layer
//!
//! Binary TCP protocol, per-connection sessions and the accept loop.

pub mod handlers;
pub mod protocol;
pub mod server;
pub mod session;

pub use handlers::{ProtocolRouter, HANDOFF_GRACE, TELEPORT_GRACE};
pub use protocol::{ClientMessage, CodecError, PacketType, ServerMessage};
pub use server::{RegionServer, ServerConfig, ServerError};
pub use session::{ClientSession, ConnectionId, SessionRegistry};
