//! # Region Server
//!
//! Authoritative server for one region of a persistent tile world.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      REGION SERVER                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/             - Pure primitives                         │
//! │  ├── geometry.rs   - Tile positions, bounds, step clamping   │
//! │  └── chunk.rs      - Chunk indexing                          │
//! │                                                              │
//! │  world/            - Region state                            │
//! │  ├── map.rs        - Map catalog and loader                  │
//! │  ├── movement.rs   - Walkability checks                      │
//! │  ├── topology.rs   - Region bounds and adjacency             │
//! │  ├── endpoint.rs   - Neighbor address cache                  │
//! │  ├── directory.rs  - Directory service client                │
//! │  └── coordinator.rs- Region coordinator                      │
//! │                                                              │
//! │  network/          - TCP protocol                            │
//! │  ├── protocol.rs   - Binary frames and messages              │
//! │  ├── session.rs    - Sessions and registry                   │
//! │  ├── handlers.rs   - Protocol router                         │
//! │  └── server.rs     - Accept loop and connection tasks        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! Map, topology and definitions are read-only after startup. Each
//! connection task owns its session; the only shared mutable state is the
//! session registry and the endpoint cache.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod network;
pub mod world;

// Re-export commonly used types
pub use crate::config::{ConfigError, RegionConfig};
pub use crate::core::geometry::{Bounds, TilePos};
pub use crate::network::server::{RegionServer, ServerConfig, ServerError};
pub use crate::world::coordinator::RegionCoordinator;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Wire protocol version
pub const PROTOCOL_VERSION: u8 = network::protocol::PROTOCOL_VERSION;
