//! Region Topology
//!
//! Static definition of every region's bounds and named neighbors, loaded
//! once from the shared topology document (`world.regions.json`).
//!
//! Adjacency is geometric: a region is a neighbor across an edge when its
//! opposite edge sits on (or one past) our edge coordinate and the spans on
//! the perpendicular axis overlap. Named neighbors are informational.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::core::geometry::{Bounds, TilePos, ranges_overlap};

/// Smallest ghost-zone width.
pub const MIN_GHOST_WIDTH: i32 = 1;
/// Largest ghost-zone width.
pub const MAX_GHOST_WIDTH: i32 = 3;

/// Clamp a requested ghost-zone width into `[1, 3]`; non-positive means 1.
pub fn clamp_ghost_width(width: i32) -> i32 {
    width.clamp(MIN_GHOST_WIDTH, MAX_GHOST_WIDTH)
}

/// Compass direction of a region edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    /// Increasing x.
    East,
    /// Decreasing x.
    West,
    /// Increasing y.
    North,
    /// Decreasing y.
    South,
}

impl Direction {
    /// All four directions in scan order.
    pub const ALL: [Direction; 4] = [Direction::East, Direction::West, Direction::North, Direction::South];

    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::East => "east",
            Direction::West => "west",
            Direction::North => "north",
            Direction::South => "south",
        }
    }
}

/// Named neighbors of a region. Empty strings in the document read as absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Neighbors {
    /// Region to the east.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub east: Option<String>,
    /// Region to the west.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub west: Option<String>,
    /// Region to the north.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub north: Option<String>,
    /// Region to the south.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub south: Option<String>,
}

impl Neighbors {
    /// Neighbor name in a direction.
    pub fn get(&self, dir: Direction) -> Option<&str> {
        match dir {
            Direction::East => self.east.as_deref(),
            Direction::West => self.west.as_deref(),
            Direction::North => self.north.as_deref(),
            Direction::South => self.south.as_deref(),
        }
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.and_then(|s| {
        let t = s.trim();
        (!t.is_empty()).then(|| t.to_owned())
    }))
}

/// One region in the topology document.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionDefinition {
    /// Region name.
    pub name: String,
    /// Smallest column (inclusive).
    pub min_x: i32,
    /// Largest column (inclusive).
    pub max_x: i32,
    /// Smallest row (inclusive).
    pub min_y: i32,
    /// Largest row (inclusive).
    pub max_y: i32,
    /// Host-local TCP port, if the region exposes one.
    #[serde(default)]
    pub tcp_port: Option<i32>,
    /// Named neighbors.
    #[serde(default)]
    pub neighbors: Neighbors,
}

impl RegionDefinition {
    /// Create a definition without neighbors or port.
    pub fn new(name: impl Into<String>, bounds: Bounds) -> Self {
        Self {
            name: name.into(),
            min_x: bounds.min_x,
            max_x: bounds.max_x,
            min_y: bounds.min_y,
            max_y: bounds.max_y,
            tcp_port: None,
            neighbors: Neighbors::default(),
        }
    }

    /// Set the local port (builder).
    pub fn with_tcp_port(mut self, port: i32) -> Self {
        self.tcp_port = Some(port);
        self
    }

    /// Configured bounds.
    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.min_x, self.max_x, self.min_y, self.max_y)
    }

    /// Whether a name refers to this region (case-insensitive).
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Whether `other` borders this region across the edge facing `dir`,
    /// given this region's bounds `mine`.
    fn borders(mine: &Bounds, other: &RegionDefinition, dir: Direction) -> bool {
        let edge_matches = |theirs: i32, ours: i32, step: i64| {
            let theirs = i64::from(theirs);
            let ours = i64::from(ours);
            theirs == ours || theirs == ours + step
        };
        match dir {
            Direction::East => {
                edge_matches(other.min_x, mine.max_x, 1)
                    && ranges_overlap(mine.min_y, mine.max_y, other.min_y, other.max_y)
            }
            Direction::West => {
                edge_matches(other.max_x, mine.min_x, -1)
                    && ranges_overlap(mine.min_y, mine.max_y, other.min_y, other.max_y)
            }
            Direction::North => {
                edge_matches(other.min_y, mine.max_y, 1)
                    && ranges_overlap(mine.min_x, mine.max_x, other.min_x, other.max_x)
            }
            Direction::South => {
                edge_matches(other.max_y, mine.min_y, -1)
                    && ranges_overlap(mine.min_x, mine.max_x, other.min_x, other.max_x)
            }
        }
    }
}

/// The topology document as stored on disk.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyDocument {
    /// Deployment namespace.
    #[serde(default)]
    pub namespace: String,
    /// Base port for host-local deployments.
    #[serde(default)]
    pub base_port: Option<i32>,
    /// All regions.
    pub regions: Vec<RegionDefinition>,
}

/// Topology loading errors.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// Could not read the document.
    #[error("failed to read topology {path}: {source}")]
    Io {
        /// Document path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Document is malformed or misses a required field.
    #[error("invalid topology {path}: {source}")]
    Json {
        /// Document path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// This process's region is not in the document.
    #[error("region '{0}' not found in topology")]
    UnknownRegion(String),

    /// A region has inverted bounds.
    #[error("region '{0}' has empty bounds")]
    EmptyBounds(String),
}

/// Strip bands either side of each region edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GhostZoneEdges {
    /// Clamped width used.
    pub width: i32,
    /// Western strip.
    pub west: Bounds,
    /// Eastern strip.
    pub east: Bounds,
    /// Northern strip.
    pub north: Bounds,
    /// Southern strip.
    pub south: Bounds,
}

/// A neighbor found near a position.
#[derive(Clone, Copy, Debug)]
pub struct NearNeighbor<'a> {
    /// Edge it was found across.
    pub direction: Direction,
    /// The neighbor region.
    pub region: &'a RegionDefinition,
}

/// Read-only set of all regions.
#[derive(Clone, Debug, Default)]
pub struct Topology {
    regions: Vec<RegionDefinition>,
}

impl Topology {
    /// Build from a list of regions.
    pub fn new(regions: Vec<RegionDefinition>) -> Self {
        Self { regions }
    }

    /// Load and validate the topology document.
    pub fn load(path: &Path) -> Result<Self, TopologyError> {
        let text = std::fs::read_to_string(path).map_err(|source| TopologyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|e| match e {
            TopologyError::Json { source, .. } => TopologyError::Json {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Parse and validate a topology document.
    pub fn from_json(text: &str) -> Result<Self, TopologyError> {
        let doc: TopologyDocument = serde_json::from_str(text).map_err(|source| TopologyError::Json {
            path: PathBuf::new(),
            source,
        })?;
        if let Some(bad) = doc.regions.iter().find(|r| r.bounds().is_empty()) {
            return Err(TopologyError::EmptyBounds(bad.name.clone()));
        }
        Ok(Self::new(doc.regions))
    }

    /// All regions.
    pub fn regions(&self) -> &[RegionDefinition] {
        &self.regions
    }

    /// Region by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&RegionDefinition> {
        self.regions.iter().find(|r| r.is_named(name))
    }

    /// This process's own region; missing is a fatal configuration error.
    pub fn require(&self, name: &str) -> Result<&RegionDefinition, TopologyError> {
        self.get(name).ok_or_else(|| TopologyError::UnknownRegion(name.to_owned()))
    }

    /// Region whose configured bounds contain a position.
    pub fn region_at(&self, pos: TilePos) -> Option<&RegionDefinition> {
        self.regions.iter().find(|r| r.bounds().contains(pos))
    }

    /// Regions across any edge `pos` is within `ghost_width` of.
    ///
    /// `effective` decides nearness; `mine` (configured bounds of `current`)
    /// decides adjacency. Each region appears at most once and `current`
    /// is never returned.
    pub fn neighbors_near(
        &self,
        current: &str,
        mine: &Bounds,
        effective: &Bounds,
        pos: TilePos,
        ghost_width: i32,
    ) -> Vec<NearNeighbor<'_>> {
        let g = i64::from(clamp_ghost_width(ghost_width));
        let (x, y) = (i64::from(pos.x), i64::from(pos.y));

        let mut out: Vec<NearNeighbor<'_>> = Vec::new();
        for dir in Direction::ALL {
            let near = match dir {
                Direction::East => x >= i64::from(effective.max_x) - g,
                Direction::West => x <= i64::from(effective.min_x) + g,
                Direction::North => y >= i64::from(effective.max_y) - g,
                Direction::South => y <= i64::from(effective.min_y) + g,
            };
            if !near {
                continue;
            }
            for region in &self.regions {
                if region.is_named(current) || out.iter().any(|n| n.region.is_named(&region.name)) {
                    continue;
                }
                if RegionDefinition::borders(mine, region, dir) {
                    out.push(NearNeighbor { direction: dir, region });
                }
            }
        }
        out
    }

    /// Describe the ghost-zone strips of `bounds` for a requested width.
    ///
    /// Each strip holds exactly the in-bounds positions [`neighbors_near`]
    /// treats as near that edge: the edge line plus `g` tiles inward.
    ///
    /// [`neighbors_near`]: Topology::neighbors_near
    pub fn ghost_zone_edges(bounds: &Bounds, ghost_width: i32) -> GhostZoneEdges {
        let g = clamp_ghost_width(ghost_width);
        let inward = |v: i32, d: i32| v.saturating_add(d);
        GhostZoneEdges {
            width: g,
            west: Bounds::new(bounds.min_x, inward(bounds.min_x, g), bounds.min_y, bounds.max_y),
            east: Bounds::new(inward(bounds.max_x, -g), bounds.max_x, bounds.min_y, bounds.max_y),
            north: Bounds::new(bounds.min_x, bounds.max_x, inward(bounds.max_y, -g), bounds.max_y),
            south: Bounds::new(bounds.min_x, bounds.max_x, bounds.min_y, inward(bounds.min_y, g)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Topology {
        Topology::new(vec![
            RegionDefinition::new("center", Bounds::new(0, 9, 0, 9)),
            RegionDefinition::new("east", Bounds::new(10, 19, 0, 9)),
            RegionDefinition::new("west", Bounds::new(-10, -1, 0, 9)),
            RegionDefinition::new("north", Bounds::new(0, 9, 9, 20)),
            RegionDefinition::new("far", Bounds::new(10, 19, 50, 60)),
        ])
    }

    fn names(v: &[NearNeighbor<'_>]) -> Vec<String> {
        v.iter().map(|n| n.region.name.clone()).collect()
    }

    #[test]
    fn test_clamp_ghost_width() {
        assert_eq!(clamp_ghost_width(-5), 1);
        assert_eq!(clamp_ghost_width(0), 1);
        assert_eq!(clamp_ghost_width(2), 2);
        assert_eq!(clamp_ghost_width(3), 3);
        assert_eq!(clamp_ghost_width(99), 3);
    }

    #[test]
    fn test_near_east_edge() {
        let topo = grid();
        let b = Bounds::new(0, 9, 0, 9);
        let near = topo.neighbors_near("center", &b, &b, TilePos::new(8, 5), 2);
        assert_eq!(names(&near), vec!["east"]);
        assert_eq!(near[0].direction, Direction::East);
    }

    #[test]
    fn test_interior_has_no_neighbors() {
        let topo = grid();
        let b = Bounds::new(0, 9, 0, 9);
        assert!(topo.neighbors_near("center", &b, &b, TilePos::new(4, 5), 1).is_empty());
    }

    #[test]
    fn test_exact_and_off_by_one_edges() {
        let topo = grid();
        let b = Bounds::new(0, 9, 0, 9);
        // "north" starts at y = 9 (shared edge), "west" ends at x = -1 (off by one).
        let near = topo.neighbors_near("center", &b, &b, TilePos::new(0, 9), 1);
        assert_eq!(names(&near), vec!["west", "north"]);
    }

    #[test]
    fn test_non_overlapping_span_is_not_neighbor() {
        let topo = grid();
        let b = Bounds::new(0, 9, 0, 9);
        let near = topo.neighbors_near("center", &b, &b, TilePos::new(9, 9), 3);
        assert!(!names(&near).contains(&"far".to_string()));
    }

    #[test]
    fn test_self_is_excluded() {
        let topo = Topology::new(vec![
            RegionDefinition::new("loop", Bounds::new(0, 9, 0, 9)),
            RegionDefinition::new("LOOP", Bounds::new(10, 19, 0, 9)),
        ]);
        let b = Bounds::new(0, 9, 0, 9);
        assert!(topo.neighbors_near("loop", &b, &b, TilePos::new(9, 5), 1).is_empty());
    }

    #[test]
    fn test_nearness_uses_effective_bounds() {
        let topo = grid();
        let configured = Bounds::new(0, 9, 0, 9);
        let effective = Bounds::new(0, 5, 0, 9);
        let near = topo.neighbors_near("center", &configured, &effective, TilePos::new(4, 5), 1);
        assert_eq!(names(&near), vec!["east"]);
    }

    #[test]
    fn test_from_json_requires_fields() {
        let ok = r#"{"namespace": "realm", "regions": [
            {"name": "a", "minX": 0, "maxX": 9, "minY": 0, "maxY": 9, "tcpPort": 9101,
             "neighbors": {"east": "b", "west": ""}}
        ]}"#;
        let topo = Topology::from_json(ok).unwrap();
        let a = topo.require("A").unwrap();
        assert_eq!(a.tcp_port, Some(9101));
        assert_eq!(a.neighbors.get(Direction::East), Some("b"));
        assert_eq!(a.neighbors.get(Direction::West), None);

        let missing = r#"{"regions": [{"name": "a", "minX": 0, "maxX": 9, "minY": 0}]}"#;
        assert!(matches!(Topology::from_json(missing), Err(TopologyError::Json { .. })));

        let inverted = r#"{"regions": [{"name": "a", "minX": 9, "maxX": 0, "minY": 0, "maxY": 1}]}"#;
        assert!(matches!(Topology::from_json(inverted), Err(TopologyError::EmptyBounds(_))));
    }

    #[test]
    fn test_require_unknown_region() {
        assert!(matches!(grid().require("nowhere"), Err(TopologyError::UnknownRegion(_))));
    }

    #[test]
    fn test_region_at() {
        assert_eq!(grid().region_at(TilePos::new(15, 5)).unwrap().name, "east");
        assert!(grid().region_at(TilePos::new(100, 100)).is_none());
    }

    #[test]
    fn test_ghost_zone_edges() {
        let edges = Topology::ghost_zone_edges(&Bounds::new(0, 9, 0, 19), 7);
        assert_eq!(edges.width, 3);
        assert_eq!(edges.west, Bounds::new(0, 3, 0, 19));
        assert_eq!(edges.east, Bounds::new(6, 9, 0, 19));
        assert_eq!(edges.north, Bounds::new(0, 9, 16, 19));
        assert_eq!(edges.south, Bounds::new(0, 9, 0, 3));
    }

    #[test]
    fn test_edges_match_nearness() {
        let topo = Topology::new(vec![
            RegionDefinition::new("center", Bounds::new(0, 9, 0, 9)),
            RegionDefinition::new("east", Bounds::new(10, 19, 0, 9)),
            RegionDefinition::new("west", Bounds::new(-10, -1, 0, 9)),
            RegionDefinition::new("north", Bounds::new(0, 9, 10, 19)),
            RegionDefinition::new("south", Bounds::new(0, 9, -10, -1)),
        ]);
        let b = Bounds::new(0, 9, 0, 9);
        for g in MIN_GHOST_WIDTH..=MAX_GHOST_WIDTH {
            let edges = Topology::ghost_zone_edges(&b, g);
            for x in b.min_x..=b.max_x {
                for y in b.min_y..=b.max_y {
                    let pos = TilePos::new(x, y);
                    let near = names(&topo.neighbors_near("center", &b, &b, pos, g));
                    for (name, strip) in [
                        ("east", edges.east),
                        ("west", edges.west),
                        ("north", edges.north),
                        ("south", edges.south),
                    ] {
                        assert_eq!(
                            near.contains(&name.to_string()),
                            strip.contains(pos),
                            "{name} at {pos} with width {g}"
                        );
                    }
                }
            }
        }
    }
}
