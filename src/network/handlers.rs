//! Protocol Router
//!
//! Dispatches decoded client frames to their handlers. Every handler runs
//! inside the calling connection's task and mutates only that connection's
//! [`ClientSession`]; cross-session effects go through the registry.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::core::geometry::{clamp_step, TilePos};
use crate::network::protocol::{ClientMessage, CodecError, PacketType, ServerMessage};
use crate::network::session::ClientSession;
use crate::world::coordinator::RegionCoordinator;
use crate::world::endpoint::Endpoint;
use crate::world::map::TeleportTarget;
use crate::world::topology::clamp_ghost_width;

/// Time after an arrival during which teleports do not fire.
pub const TELEPORT_GRACE: Duration = Duration::from_millis(1500);

/// Default delay between sending a Handoff and dropping the session.
pub const HANDOFF_GRACE: Duration = Duration::from_millis(250);

/// Longest username kept, in UTF-8 bytes. Longer names are cut at a char
/// boundary so every roster entry stays small.
pub const MAX_USERNAME_LEN: usize = 32;

fn truncate_username(mut name: String) -> String {
    if name.len() > MAX_USERNAME_LEN {
        let mut end = MAX_USERNAME_LEN;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        name.truncate(end);
    }
    name
}

/// Routes client frames to handlers.
#[derive(Clone, Debug)]
pub struct ProtocolRouter {
    coordinator: Arc<RegionCoordinator>,
    handoff_grace: Duration,
}

impl ProtocolRouter {
    /// Create a router over a region.
    pub fn new(coordinator: Arc<RegionCoordinator>, handoff_grace: Duration) -> Self {
        Self { coordinator, handoff_grace }
    }

    /// Region this router serves.
    pub fn coordinator(&self) -> &Arc<RegionCoordinator> {
        &self.coordinator
    }

    /// Handle one frame. Unknown or server-only types are ignored; a
    /// malformed payload is an error and ends the connection.
    pub async fn route(&self, session: &mut ClientSession, packet_type: u8, payload: &[u8]) -> Result<(), CodecError> {
        let Some(ty) = PacketType::from_u8(packet_type) else {
            debug!(
                connection = %session.connection_id,
                packet_type,
                payload = %hex::encode(payload),
                "unknown_packet_ignored"
            );
            return Ok(());
        };

        match ClientMessage::decode(ty, payload) {
            Ok(msg) => {
                self.dispatch(session, msg).await;
                Ok(())
            }
            Err(CodecError::UnexpectedType(ty)) => {
                debug!(connection = %session.connection_id, ?ty, "server_packet_from_client_ignored");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Handle one decoded message.
    pub async fn dispatch(&self, session: &mut ClientSession, msg: ClientMessage) {
        match msg {
            ClientMessage::MoveRequest { x, y } => self.handle_move_request(session, TilePos::new(x, y)).await,
            ClientMessage::ClientConfig { ghost_zone_width, username } => {
                self.handle_client_config(session, ghost_zone_width, username).await
            }
            ClientMessage::MoveState { moving } => self.handle_move_state(session, moving).await,
            ClientMessage::ProvisionalConnection => self.handle_provisional(session),
        }
    }

    // =========================================================================
    // CLIENT CONFIG
    // =========================================================================

    async fn handle_client_config(&self, session: &mut ClientSession, width: i32, username: Option<String>) {
        let width = clamp_ghost_width(width);
        session.ghost_zone_width = width;
        if let Some(name) = username {
            session.username = truncate_username(name);
        }
        if session.client_id == 0 {
            session.client_id = self.coordinator.sessions().assign_client_id();
        }
        self.publish(session).await;

        info!(
            connection = %session.connection_id,
            client_id = session.client_id,
            ghost_zone_width = width,
            username = %session.username,
            "client_config"
        );

        session
            .send(ServerMessage::GhostZoneInfo {
                width,
                bounds: self.coordinator.effective_bounds(),
            })
            .await;
        session
            .send(ServerMessage::PlayerInfo {
                client_id: session.client_id,
            })
            .await;
        session.send(ServerMessage::DeadZones(self.coordinator.dead_zones())).await;
    }

    // =========================================================================
    // MOVE REQUEST
    // =========================================================================

    async fn handle_move_request(&self, session: &mut ClientSession, requested: TilePos) {
        let now = Instant::now();
        let first = session.is_first_move();

        // Arrival: login, handoff landing or teleport landing.
        let arrival = first || session.pos.manhattan(requested) > 1;
        if arrival {
            session.safe_spot = Some(requested);
            session.last_arrival_at = Some(now);
            debug!(connection = %session.connection_id, pos = %requested, "arrival");
        }

        if !arrival {
            let grace_over = session
                .last_arrival_at
                .map_or(true, |t| now.duration_since(t) >= TELEPORT_GRACE);
            if grace_over && session.safe_spot != Some(requested) {
                if let Some(target) = self.coordinator.teleport_at(requested).cloned() {
                    self.handoff(session, requested, target).await;
                    return;
                }
            }
        }

        self.update_ghost_zones(session, requested).await;

        if self.try_move(session, requested, first, now) {
            self.publish(session).await;
            self.coordinator.broadcast_snapshot().await;
        }

        session.send(ServerMessage::PositionUpdate(session.pos)).await;
    }

    /// Bounds, step clamp and collision. Returns whether the move was accepted.
    fn try_move(&self, session: &mut ClientSession, requested: TilePos, first: bool, now: Instant) -> bool {
        if !self.coordinator.is_inside_bounds(requested) {
            debug!(connection = %session.connection_id, pos = %requested, "bounds_reject");
            return false;
        }

        let (from, target) = if first {
            (requested, requested)
        } else {
            (session.pos, clamp_step(session.pos, requested))
        };
        if !first && target == session.pos {
            return false;
        }
        if !self.coordinator.is_inside_bounds(target) {
            debug!(connection = %session.connection_id, pos = %target, "bounds_reject");
            return false;
        }
        if !self.coordinator.validator().can_traverse(from, target) {
            debug!(connection = %session.connection_id, from = %from, to = %target, "move_blocked");
            return false;
        }

        if session.safe_spot.is_some_and(|safe| safe != target) {
            session.safe_spot = None;
        }
        session.pos = target;
        session.chunk = self.coordinator.chunk_for(target);
        session.last_move_at = Some(now);
        true
    }

    async fn handoff(&self, session: &mut ClientSession, at: TilePos, target: TeleportTarget) {
        let endpoint = self.coordinator.resolve_endpoint(&target.region).await;
        let (host, port) = match &endpoint {
            Some(ep) => (ep.host.clone(), i32::from(ep.port)),
            None => (String::new(), 0),
        };
        info!(
            connection = %session.connection_id,
            client_id = session.client_id,
            at = %at,
            region = %target.region,
            host = %host,
            port,
            target = %target.pos,
            "teleport_trigger"
        );

        session
            .send(ServerMessage::Handoff {
                region: target.region,
                host,
                port,
                target: target.pos,
            })
            .await;

        let sessions = self.coordinator.sessions().clone();
        let id = session.connection_id;
        let grace = self.handoff_grace;
        tokio::spawn(async move {
            sleep(grace).await;
            sessions.remove(id).await;
        });
    }

    async fn update_ghost_zones(&self, session: &mut ClientSession, pos: TilePos) {
        let candidates = self.coordinator.neighbors_near(pos, session.ghost_zone_width).await;

        let mut active: BTreeMap<String, Endpoint> = BTreeMap::new();
        for candidate in candidates {
            if let Some(known) = session.active_ghost_regions.get(&candidate.region) {
                active.insert(candidate.region, known.clone());
                continue;
            }
            let Some(endpoint) = candidate.endpoint else {
                debug!(region = %candidate.region, "ghost_endpoint_unresolved");
                continue;
            };
            info!(
                connection = %session.connection_id,
                region = %candidate.region,
                direction = candidate.direction.as_str(),
                endpoint = %endpoint,
                "ghost_enter"
            );
            session
                .send(ServerMessage::GhostZoneEnter {
                    region: candidate.region.clone(),
                    host: endpoint.host.clone(),
                    port: i32::from(endpoint.port),
                })
                .await;
            active.insert(candidate.region, endpoint);
        }

        let previous = std::mem::take(&mut session.active_ghost_regions);
        for (region, endpoint) in previous {
            if active.contains_key(&region) {
                continue;
            }
            info!(connection = %session.connection_id, region = %region, "ghost_leave");
            session
                .send(ServerMessage::GhostZoneLeave {
                    region,
                    host: endpoint.host,
                    port: i32::from(endpoint.port),
                })
                .await;
        }
        session.active_ghost_regions = active;
    }

    // =========================================================================
    // MOVE STATE / PROVISIONAL
    // =========================================================================

    async fn handle_move_state(&self, session: &mut ClientSession, moving: bool) {
        if session.is_moving == moving {
            return;
        }
        session.is_moving = moving;
        self.publish(session).await;
        self.coordinator.broadcast_snapshot().await;
    }

    fn handle_provisional(&self, session: &mut ClientSession) {
        session.is_provisional = true;
        debug!(connection = %session.connection_id, "provisional_connection");
    }

    async fn publish(&self, session: &ClientSession) {
        self.coordinator
            .sessions()
            .publish(session.connection_id, session.view())
            .await;
    }
}
