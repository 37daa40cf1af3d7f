//! Process Configuration
//!
//! Everything the binary reads from the environment.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

use crate::core::geometry::Bounds;
use crate::network::server::{ServerConfig, DEFAULT_PORT};
use crate::world::endpoint::{parse_host_port, Endpoint, EndpointPreference};
use crate::world::topology::{Direction, RegionDefinition};

/// Default map data directory.
pub const DEFAULT_MAP_DATA_DIR: &str = "data";

/// Default directory service URL.
pub const DEFAULT_DIRECTORY_URL: &str = "http://directory:8085";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `REGION_NAME` is not set.
    #[error("REGION_NAME is not set")]
    MissingRegionName,

    /// A variable holds an unusable value.
    #[error("invalid {key}={value}: {reason}")]
    Invalid {
        /// Variable name.
        key: &'static str,
        /// Offending value.
        value: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Bound overrides leave the region with no tiles.
    #[error("region {region} has empty bounds {bounds}")]
    EmptyBounds {
        /// Region name.
        region: String,
        /// Bounds after overrides.
        bounds: Bounds,
    },
}

/// Region process configuration.
#[derive(Debug, Clone)]
pub struct RegionConfig {
    /// Region this process serves.
    pub region_name: String,
    /// Override of the topology's min x.
    pub min_x: Option<i32>,
    /// Override of the topology's max x.
    pub max_x: Option<i32>,
    /// Override of the topology's min y.
    pub min_y: Option<i32>,
    /// Override of the topology's max y.
    pub max_y: Option<i32>,
    /// Static `host:port` per neighbor direction.
    pub neighbor_addrs: BTreeMap<Direction, String>,
    /// Directory holding one subdirectory per map.
    pub map_data_dir: PathBuf,
    /// Topology document.
    pub topology_path: PathBuf,
    /// Directory service base URL.
    pub directory_base_url: String,
    /// Skip all directory HTTP calls.
    pub directory_disabled: bool,
    /// Address family handed to clients.
    pub endpoint_preference: EndpointPreference,
    /// TCP listen address.
    pub bind_addr: SocketAddr,
}

impl RegionConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let region_name = get("REGION_NAME").ok_or(ConfigError::MissingRegionName)?;

        let int = |key: &'static str| -> Result<Option<i32>, ConfigError> {
            get(key)
                .map(|v| {
                    v.parse::<i32>().map_err(|e| ConfigError::Invalid {
                        key,
                        reason: e.to_string(),
                        value: v,
                    })
                })
                .transpose()
        };

        let mut neighbor_addrs = BTreeMap::new();
        for (key, dir) in [
            ("NEIGHBOR_EAST", Direction::East),
            ("NEIGHBOR_WEST", Direction::West),
            ("NEIGHBOR_NORTH", Direction::North),
            ("NEIGHBOR_SOUTH", Direction::South),
        ] {
            if let Some(addr) = get(key) {
                neighbor_addrs.insert(dir, addr);
            }
        }

        let map_data_dir = PathBuf::from(get("MAP_DATA_DIR").unwrap_or_else(|| DEFAULT_MAP_DATA_DIR.to_owned()));
        let topology_path = get("WORLD_REGIONS_JSON")
            .map(PathBuf::from)
            .unwrap_or_else(|| map_data_dir.join("Game").join("world.regions.json"));

        let endpoint_preference = match get("ENDPOINT_PREFERENCE") {
            Some(v) => v.parse::<EndpointPreference>().map_err(|reason| ConfigError::Invalid {
                key: "ENDPOINT_PREFERENCE",
                value: v,
                reason,
            })?,
            None => EndpointPreference::default(),
        };

        let bind_addr = match get("TCP_BIND") {
            Some(v) => v.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                key: "TCP_BIND",
                reason: e.to_string(),
                value: v,
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
        };

        Ok(Self {
            region_name,
            min_x: int("REGION_MIN_X")?,
            max_x: int("REGION_MAX_X")?,
            min_y: int("REGION_MIN_Y")?,
            max_y: int("REGION_MAX_Y")?,
            neighbor_addrs,
            map_data_dir,
            topology_path,
            directory_base_url: get("DIRECTORY_BASE_URL").unwrap_or_else(|| DEFAULT_DIRECTORY_URL.to_owned()),
            directory_disabled: get("DIRECTORY_DISABLE")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(false),
            endpoint_preference,
            bind_addr,
        })
    }

    /// Region bounds with any environment overrides applied. Overrides
    /// that invert an axis are rejected.
    pub fn bounds_for(&self, region: &RegionDefinition) -> Result<Bounds, ConfigError> {
        let b = region.bounds();
        let bounds = Bounds::new(
            self.min_x.unwrap_or(b.min_x),
            self.max_x.unwrap_or(b.max_x),
            self.min_y.unwrap_or(b.min_y),
            self.max_y.unwrap_or(b.max_y),
        );
        if bounds.is_empty() {
            return Err(ConfigError::EmptyBounds {
                region: region.name.clone(),
                bounds,
            });
        }
        Ok(bounds)
    }

    /// Static fallback endpoints, keyed by the neighbor the topology names
    /// in each configured direction. Unparsable or unnamed entries are skipped.
    pub fn neighbor_fallbacks(&self, region: &RegionDefinition) -> Vec<(String, Endpoint)> {
        self.neighbor_addrs
            .iter()
            .filter_map(|(dir, addr)| {
                let name = region.neighbors.get(*dir)?;
                let endpoint = parse_host_port(addr)?;
                Some((name.to_owned(), endpoint))
            })
            .collect()
    }

    /// Server settings derived from this configuration.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            bind_addr: self.bind_addr,
            ..Default::default()
        }
    }
}
