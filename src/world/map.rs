//! Map Catalog
//!
//! Immutable tile/object lookup for one region's map, loaded once at startup
//! from a directory holding `map.json`, `tile_definitions.json` and
//! `object_definitions.json`.
//!
//! Missing tiles, objects or definitions are never errors: an unknown cell
//! is walkable.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::core::geometry::TilePos;

/// File name of the tile layout.
pub const MAP_FILE: &str = "map.json";
/// File name of the tile definitions.
pub const TILE_DEFS_FILE: &str = "tile_definitions.json";
/// File name of the object definitions.
pub const OBJECT_DEFS_FILE: &str = "object_definitions.json";

// =============================================================================
// DEFINITIONS
// =============================================================================

/// Static properties of a tile type.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileDef {
    /// Tile type identifier.
    pub tile_id: String,
    /// Display name.
    #[serde(default, alias = "nome")]
    pub name: String,
    /// Whether players may stand on it.
    #[serde(default = "default_true")]
    pub is_walkable: bool,
    /// Whether it blocks line of sight.
    #[serde(default)]
    pub blocks_vision: bool,
}

/// Static properties of an object type.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDef {
    /// Object type identifier.
    pub object_id: String,
    /// Display name.
    #[serde(default, alias = "nome")]
    pub name: String,
    /// Whether it prevents standing on its tile.
    #[serde(default)]
    pub blocks_movement: bool,
    /// Whether players can interact with it.
    #[serde(default)]
    pub interactable: bool,
}

/// Where a teleport tile sends the player.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TeleportTarget {
    /// Destination region name.
    pub region: String,
    /// Destination tile.
    pub pos: TilePos,
}

/// Why a tile appears in the dead-zone list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeadZoneReason {
    /// A movement-blocking object sits on the tile.
    Object,
    /// The tile type itself is not walkable.
    Tile,
}

/// One blocked tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeadZone {
    /// Blocked position.
    pub pos: TilePos,
    /// Why it is blocked.
    pub reason: DeadZoneReason,
}

// =============================================================================
// FILE FORMAT
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TileCell {
    x: i32,
    y: i32,
    tile_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectCell {
    x: i32,
    y: i32,
    object_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TeleportCell {
    x: i32,
    y: i32,
    target_region: String,
    target_x: i32,
    target_y: i32,
}

#[derive(Debug, Deserialize)]
struct MapFile {
    width: u32,
    height: u32,
    #[serde(default)]
    tiles: Vec<TileCell>,
    #[serde(default)]
    objects: Vec<ObjectCell>,
    #[serde(default)]
    teleports: Option<Vec<TeleportCell>>,
}

fn default_true() -> bool {
    true
}

/// Map loading errors.
#[derive(Debug, Error)]
pub enum MapLoadError {
    /// Could not read a file.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Offending file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A file did not parse.
    #[error("failed to parse {path}: {source}")]
    Json {
        /// Offending file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// No usable map directory was found.
    #[error("no maps loaded from {0}")]
    NoMaps(PathBuf),
}

// =============================================================================
// MAP CATALOG
// =============================================================================

/// Read-only tile/object lookup for one map.
#[derive(Clone, Debug, Default)]
pub struct MapCatalog {
    /// Map width in tiles.
    pub width: u32,
    /// Map height in tiles.
    pub height: u32,
    tiles: BTreeMap<TilePos, String>,
    objects: BTreeMap<TilePos, String>,
    teleports: BTreeMap<TilePos, TeleportTarget>,
    tile_defs: HashMap<String, TileDef>,
    object_defs: HashMap<String, ObjectDef>,
}

impl MapCatalog {
    /// Create an empty, fully walkable map.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    /// Load a map from a directory containing the three JSON files.
    pub fn load_dir(dir: &Path) -> Result<Self, MapLoadError> {
        Self::load(
            &dir.join(MAP_FILE),
            &dir.join(TILE_DEFS_FILE),
            &dir.join(OBJECT_DEFS_FILE),
        )
    }

    /// Load a map from explicit file paths.
    pub fn load(map_path: &Path, tile_defs_path: &Path, object_defs_path: &Path) -> Result<Self, MapLoadError> {
        let map: MapFile = read_json(map_path)?;
        let tile_defs: Vec<TileDef> = read_json(tile_defs_path)?;
        let object_defs: Vec<ObjectDef> = read_json(object_defs_path)?;

        let mut catalog = MapCatalog::new(map.width, map.height);
        for t in map.tiles {
            catalog.tiles.insert(TilePos::new(t.x, t.y), t.tile_id);
        }
        for o in map.objects {
            catalog.objects.insert(TilePos::new(o.x, o.y), o.object_id);
        }
        for tp in map.teleports.unwrap_or_default() {
            catalog.teleports.insert(
                TilePos::new(tp.x, tp.y),
                TeleportTarget {
                    region: tp.target_region,
                    pos: TilePos::new(tp.target_x, tp.target_y),
                },
            );
        }
        for def in tile_defs {
            catalog.tile_defs.insert(def.tile_id.clone(), def);
        }
        for def in object_defs {
            catalog.object_defs.insert(def.object_id.clone(), def);
        }
        Ok(catalog)
    }

    /// Place a tile (builder).
    pub fn with_tile(mut self, pos: TilePos, tile_id: impl Into<String>) -> Self {
        self.tiles.insert(pos, tile_id.into());
        self
    }

    /// Place an object (builder).
    pub fn with_object(mut self, pos: TilePos, object_id: impl Into<String>) -> Self {
        self.objects.insert(pos, object_id.into());
        self
    }

    /// Place a teleport (builder).
    pub fn with_teleport(mut self, pos: TilePos, region: impl Into<String>, target: TilePos) -> Self {
        self.teleports.insert(pos, TeleportTarget { region: region.into(), pos: target });
        self
    }

    /// Register a tile definition (builder).
    pub fn with_tile_def(mut self, tile_id: impl Into<String>, is_walkable: bool) -> Self {
        let tile_id = tile_id.into();
        self.tile_defs.insert(tile_id.clone(), TileDef {
            tile_id,
            name: String::new(),
            is_walkable,
            blocks_vision: false,
        });
        self
    }

    /// Register an object definition (builder).
    pub fn with_object_def(mut self, object_id: impl Into<String>, blocks_movement: bool) -> Self {
        let object_id = object_id.into();
        self.object_defs.insert(object_id.clone(), ObjectDef {
            object_id,
            name: String::new(),
            blocks_movement,
            interactable: false,
        });
        self
    }

    /// Tile id at a position.
    pub fn tile_at(&self, pos: TilePos) -> Option<&str> {
        self.tiles.get(&pos).map(String::as_str)
    }

    /// Object id at a position.
    pub fn object_at(&self, pos: TilePos) -> Option<&str> {
        self.objects.get(&pos).map(String::as_str)
    }

    /// Teleport defined on a tile.
    pub fn teleport_at(&self, pos: TilePos) -> Option<&TeleportTarget> {
        self.teleports.get(&pos)
    }

    /// Tile definition by id.
    pub fn tile_def(&self, tile_id: &str) -> Option<&TileDef> {
        self.tile_defs.get(tile_id)
    }

    /// Object definition by id.
    pub fn object_def(&self, object_id: &str) -> Option<&ObjectDef> {
        self.object_defs.get(object_id)
    }

    /// True if a movement-blocking object occupies the tile.
    pub fn object_blocks(&self, pos: TilePos) -> bool {
        self.object_at(pos)
            .and_then(|id| self.object_def(id))
            .is_some_and(|def| def.blocks_movement)
    }

    /// True if the tile type is defined as non-walkable.
    pub fn tile_blocks(&self, pos: TilePos) -> bool {
        self.tile_at(pos)
            .and_then(|id| self.tile_def(id))
            .is_some_and(|def| !def.is_walkable)
    }

    /// Number of placed tiles.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Number of placed objects.
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Number of teleport tiles.
    pub fn teleport_count(&self) -> usize {
        self.teleports.len()
    }

    /// Blocked tiles, objects first then tiles, deduplicated, at most `limit` entries.
    pub fn dead_zones(&self, limit: usize) -> Vec<DeadZone> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();

        let objects = self
            .objects
            .keys()
            .filter(|pos| self.object_blocks(**pos))
            .map(|pos| (*pos, DeadZoneReason::Object));
        let tiles = self
            .tiles
            .keys()
            .filter(|pos| self.tile_blocks(**pos))
            .map(|pos| (*pos, DeadZoneReason::Tile));

        for (pos, reason) in objects.chain(tiles) {
            if out.len() >= limit {
                break;
            }
            if seen.insert(pos) {
                out.push(DeadZone { pos, reason });
            }
        }
        out
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, MapLoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| MapLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| MapLoadError::Json {
        path: path.to_path_buf(),
        source,
    })
}

// =============================================================================
// MAP STORE
// =============================================================================

/// All maps found under the data directory, keyed by directory name.
#[derive(Debug, Default)]
pub struct MapStore {
    maps: BTreeMap<String, MapCatalog>,
}

impl MapStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every subdirectory of `data_dir` that contains all three map files.
    ///
    /// Directories with missing files are skipped; a directory whose files fail
    /// to parse is logged and skipped. Returns [`MapLoadError::NoMaps`] if
    /// nothing loaded.
    pub fn load_from(data_dir: &Path) -> Result<Self, MapLoadError> {
        let entries = std::fs::read_dir(data_dir).map_err(|source| MapLoadError::Io {
            path: data_dir.to_path_buf(),
            source,
        })?;

        let mut dirs: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();

        let mut store = MapStore::new();
        for dir in dirs {
            let complete = [MAP_FILE, TILE_DEFS_FILE, OBJECT_DEFS_FILE]
                .iter()
                .all(|f| dir.join(f).is_file());
            if !complete {
                continue;
            }
            let Some(name) = dir.file_name().and_then(|n| n.to_str()).map(str::to_owned) else {
                continue;
            };

            match MapCatalog::load_dir(&dir) {
                Ok(map) => {
                    info!(
                        name = %name,
                        width = map.width,
                        height = map.height,
                        tiles = map.tile_count(),
                        objects = map.object_count(),
                        teleports = map.teleport_count(),
                        "map_loaded"
                    );
                    store.insert(name, map);
                }
                Err(e) => warn!(name = %name, error = %e, "map_load_failed"),
            }
        }

        if store.is_empty() {
            return Err(MapLoadError::NoMaps(data_dir.to_path_buf()));
        }
        Ok(store)
    }

    /// Add or replace a map.
    pub fn insert(&mut self, name: impl Into<String>, map: MapCatalog) {
        self.maps.insert(name.into(), map);
    }

    /// True if no maps are loaded.
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Names of loaded maps.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.maps.keys().map(String::as_str)
    }

    /// Take the map for a region: the one named like the region
    /// (case-insensitive), otherwise the first by name.
    pub fn into_region_map(mut self, region: &str) -> Option<(String, MapCatalog)> {
        let key = self
            .maps
            .keys()
            .find(|k| k.eq_ignore_ascii_case(region))
            .or_else(|| self.maps.keys().next())
            .cloned()?;
        self.maps.remove(&key).map(|map| (key, map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sample_map() -> MapCatalog {
        MapCatalog::new(10, 10)
            .with_tile_def("grass", true)
            .with_tile_def("water", false)
            .with_object_def("rock", true)
            .with_object_def("flower", false)
            .with_tile(TilePos::new(2, 2), "water")
            .with_tile(TilePos::new(4, 4), "grass")
            .with_object(TilePos::new(3, 3), "rock")
            .with_object(TilePos::new(5, 5), "flower")
    }

    #[test]
    fn test_blocking_lookups() {
        let map = sample_map();
        assert!(map.tile_blocks(TilePos::new(2, 2)));
        assert!(!map.tile_blocks(TilePos::new(4, 4)));
        assert!(map.object_blocks(TilePos::new(3, 3)));
        assert!(!map.object_blocks(TilePos::new(5, 5)));
        assert!(!map.tile_blocks(TilePos::new(9, 9)));
    }

    #[test]
    fn test_unknown_definition_is_walkable() {
        let map = MapCatalog::new(4, 4)
            .with_tile(TilePos::new(1, 1), "lava")
            .with_object(TilePos::new(1, 1), "mystery");
        assert!(!map.tile_blocks(TilePos::new(1, 1)));
        assert!(!map.object_blocks(TilePos::new(1, 1)));
    }

    #[test]
    fn test_dead_zones_exact_set() {
        let zones = sample_map().dead_zones(1024);
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[0], DeadZone { pos: TilePos::new(3, 3), reason: DeadZoneReason::Object });
        assert_eq!(zones[1], DeadZone { pos: TilePos::new(2, 2), reason: DeadZoneReason::Tile });
    }

    #[test]
    fn test_dead_zones_dedup_and_cap() {
        let mut map = MapCatalog::new(100, 100)
            .with_tile_def("wall", false)
            .with_object_def("crate", true)
            .with_tile(TilePos::new(0, 0), "wall")
            .with_object(TilePos::new(0, 0), "crate");
        assert_eq!(map.dead_zones(10).len(), 1);

        for x in 0..50 {
            map = map.with_tile(TilePos::new(x, 1), "wall");
        }
        assert_eq!(map.dead_zones(16).len(), 16);
    }

    fn write_map_dir(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        fs::write(
            dir.join(MAP_FILE),
            r#"{
                "width": 8, "height": 6,
                "tiles": [{"x": 1, "y": 1, "tileId": "water"}],
                "objects": [{"x": 2, "y": 3, "objectId": "tree"}],
                "teleports": [{"x": 7, "y": 0, "targetRegion": "cave", "targetX": 3, "targetY": 4}]
            }"#,
        )
        .unwrap();
        fs::write(
            dir.join(TILE_DEFS_FILE),
            r#"[{"tileId": "water", "nome": "Agua", "isWalkable": false, "blocksVision": false}]"#,
        )
        .unwrap();
        fs::write(
            dir.join(OBJECT_DEFS_FILE),
            r#"[{"objectId": "tree", "nome": "Arvore", "blocksMovement": true, "interactable": false}]"#,
        )
        .unwrap();
    }

    #[test]
    fn test_load_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("meadow");
        write_map_dir(&dir);

        let map = MapCatalog::load_dir(&dir).unwrap();
        assert_eq!((map.width, map.height), (8, 6));
        assert!(map.tile_blocks(TilePos::new(1, 1)));
        assert!(map.object_blocks(TilePos::new(2, 3)));
        assert_eq!(map.tile_def("water").unwrap().name, "Agua");

        let tp = map.teleport_at(TilePos::new(7, 0)).unwrap();
        assert_eq!(tp.region, "cave");
        assert_eq!(tp.pos, TilePos::new(3, 4));
    }

    #[test]
    fn test_store_skips_incomplete_and_selects_region() {
        let tmp = tempfile::tempdir().unwrap();
        write_map_dir(&tmp.path().join("alpha"));
        write_map_dir(&tmp.path().join("Meadow"));
        fs::create_dir_all(tmp.path().join("broken")).unwrap();
        fs::write(tmp.path().join("broken").join(MAP_FILE), "{}").unwrap();

        let store = MapStore::load_from(tmp.path()).unwrap();
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["Meadow", "alpha"]);

        let (name, _) = store.into_region_map("meadow").unwrap();
        assert_eq!(name, "Meadow");
    }

    #[test]
    fn test_store_falls_back_to_first_map() {
        let tmp = tempfile::tempdir().unwrap();
        write_map_dir(&tmp.path().join("zeta"));
        write_map_dir(&tmp.path().join("beta"));

        let store = MapStore::load_from(tmp.path()).unwrap();
        let (name, _) = store.into_region_map("nowhere").unwrap();
        assert_eq!(name, "beta");
    }

    #[test]
    fn test_store_empty_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(MapStore::load_from(tmp.path()), Err(MapLoadError::NoMaps(_))));
    }
}
