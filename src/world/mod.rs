//! World Module
//!
//! Spatial state of one region: map, movement rules, topology, neighbor
//! endpoints and the coordinator tying them together.

pub mod coordinator;
pub mod directory;
pub mod endpoint;
pub mod map;
pub mod movement;
pub mod topology;

pub use coordinator::{GhostCandidate, RegionCoordinator, DEAD_ZONE_LIMIT};
pub use directory::{DirectoryClient, DirectoryError};
pub use endpoint::{parse_host_port, Endpoint, EndpointCache, EndpointPreference};
pub use map::{MapCatalog, MapLoadError, MapStore};
pub use movement::MovementValidator;
pub use topology::{clamp_ghost_width, Direction, RegionDefinition, Topology, TopologyError};
