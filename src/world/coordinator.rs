//! Region Coordinator
//!
//! Everything a handler needs to know about this region: bounds, map,
//! topology, neighbor endpoints and the live session registry.

use std::sync::Arc;

use crate::core::chunk::{ChunkCoord, ChunkIndexer};
use crate::core::geometry::{Bounds, TilePos};
use crate::network::session::SessionRegistry;
use crate::world::endpoint::{Endpoint, EndpointCache};
use crate::world::map::{MapCatalog, TeleportTarget};
use crate::world::movement::MovementValidator;
use crate::world::topology::{Direction, Topology};

/// Most blocked tiles sent in one DeadZones message.
pub const DEAD_ZONE_LIMIT: usize = 1024;

/// A neighbor region near a position, with its endpoint if resolvable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GhostCandidate {
    /// Neighbor region name.
    pub region: String,
    /// Edge it lies across.
    pub direction: Direction,
    /// Where clients can reach it.
    pub endpoint: Option<Endpoint>,
}

/// Shared, read-mostly state of one region process.
#[derive(Debug)]
pub struct RegionCoordinator {
    name: String,
    configured: Bounds,
    effective: Bounds,
    map: MapCatalog,
    topology: Topology,
    endpoints: Arc<EndpointCache>,
    chunks: ChunkIndexer,
    sessions: Arc<SessionRegistry>,
}

impl RegionCoordinator {
    /// Build the coordinator for region `name` with configured `bounds`.
    ///
    /// The map is anchored at `(min_x, min_y)`; effective bounds are the
    /// part of `bounds` the map actually covers.
    pub fn new(
        name: impl Into<String>,
        bounds: Bounds,
        map: MapCatalog,
        topology: Topology,
        endpoints: Arc<EndpointCache>,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        let map_bounds = Bounds::anchored(TilePos::new(bounds.min_x, bounds.min_y), map.width, map.height);
        Self {
            name: name.into(),
            configured: bounds,
            effective: bounds.intersect(&map_bounds),
            map,
            topology,
            endpoints,
            chunks: ChunkIndexer::default(),
            sessions,
        }
    }

    /// Use a custom chunk indexer (builder).
    pub fn with_chunk_indexer(mut self, chunks: ChunkIndexer) -> Self {
        self.chunks = chunks;
        self
    }

    /// Region name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bounds from configuration.
    pub fn configured_bounds(&self) -> Bounds {
        self.configured
    }

    /// Configured bounds clipped to the map.
    pub fn effective_bounds(&self) -> Bounds {
        self.effective
    }

    /// Whether a position is playable here.
    pub fn is_inside_bounds(&self, pos: TilePos) -> bool {
        self.effective.contains(pos)
    }

    /// Loaded map.
    pub fn map(&self) -> &MapCatalog {
        &self.map
    }

    /// World topology.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Endpoint cache.
    pub fn endpoints(&self) -> &Arc<EndpointCache> {
        &self.endpoints
    }

    /// Live sessions.
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Walkability checks against the loaded map.
    pub fn validator(&self) -> MovementValidator<'_> {
        MovementValidator::new(&self.map)
    }

    /// Chunk of a position.
    pub fn chunk_for(&self, pos: TilePos) -> ChunkCoord {
        self.chunks.chunk_for(pos)
    }

    /// Teleport defined on a tile.
    pub fn teleport_at(&self, pos: TilePos) -> Option<&TeleportTarget> {
        self.map.teleport_at(pos)
    }

    /// Endpoint of a region from the cache; `None` if unknown.
    pub async fn resolve_endpoint(&self, region: &str) -> Option<Endpoint> {
        self.endpoints.resolve(region).await
    }

    /// Neighbors whose ghost zone `pos` is in, each resolved to an endpoint.
    pub async fn neighbors_near(&self, pos: TilePos, ghost_width: i32) -> Vec<GhostCandidate> {
        let near: Vec<(String, Direction)> = self
            .topology
            .neighbors_near(&self.name, &self.configured, &self.effective, pos, ghost_width)
            .into_iter()
            .map(|n| (n.region.name.clone(), n.direction))
            .collect();

        let mut out = Vec::with_capacity(near.len());
        for (region, direction) in near {
            let endpoint = self.endpoints.resolve(&region).await;
            out.push(GhostCandidate { region, direction, endpoint });
        }
        out
    }

    /// Blocked tiles for the DeadZones message.
    pub fn dead_zones(&self) -> Vec<TilePos> {
        self.map
            .dead_zones(DEAD_ZONE_LIMIT)
            .into_iter()
            .map(|dz| dz.pos)
            .collect()
    }

    /// Send every session a fresh players snapshot.
    pub async fn broadcast_snapshot(&self) -> usize {
        self.sessions.broadcast_snapshot().await
    }
}
