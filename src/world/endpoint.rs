//! Region Endpoints
//!
//! Network addresses of other region processes. Addresses come from the
//! topology document (host-local ports), from environment fallbacks, and
//! from the directory service; the cache keeps the last known good value
//! for each region and never blocks on the directory.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::world::topology::Topology;

/// Prefix the directory adds to region service names.
const DIRECTORY_NAME_PREFIX: &str = "world-";

/// A resolved `host:port`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Hostname or IP literal (IPv6 without brackets).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl Endpoint {
    /// Create an endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Parse `host:port`, `scheme://host:port[/path]` or `[v6]:port`.
///
/// The port must be explicit and non-zero.
pub fn parse_host_port(s: &str) -> Option<Endpoint> {
    let mut t = s.trim();
    if t.is_empty() {
        return None;
    }
    if let Some(idx) = t.find("://") {
        t = &t[idx + 3..];
    }
    t = t.trim_matches('/');
    if let Some(slash) = t.find('/') {
        t = &t[..slash];
    }
    // Userinfo is never meaningful for a game endpoint.
    if let Some(at) = t.rfind('@') {
        t = &t[at + 1..];
    }

    let (host, port) = if let Some(rest) = t.strip_prefix('[') {
        let rb = rest.find(']')?;
        let host = &rest[..rb];
        let port = rest[rb + 1..].strip_prefix(':')?;
        (host, port)
    } else {
        let colon = t.rfind(':')?;
        (&t[..colon], &t[colon + 1..])
    };

    let host = host.trim();
    let port: u16 = port.trim().parse().ok()?;
    if host.is_empty() || port == 0 {
        return None;
    }
    Some(Endpoint::new(host, port))
}

/// Which address to hand to clients first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EndpointPreference {
    /// Host-local / node-port address (clients connect directly).
    Local,
    /// Cluster-internal service address.
    #[default]
    Cluster,
}

impl FromStr for EndpointPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(EndpointPreference::Local),
            "cluster" => Ok(EndpointPreference::Cluster),
            other => Err(format!("unknown endpoint preference '{other}'")),
        }
    }
}

/// Cached addresses for one region.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionEndpoint {
    /// Cluster-internal address.
    pub cluster_address: Option<String>,
    /// Host-local address.
    pub local_address: Option<String>,
    /// Last reported liveness.
    pub online: bool,
    /// When the directory last reported this region.
    pub last_checked: Option<DateTime<Utc>>,
}

impl RegionEndpoint {
    /// Pick an address by preference, falling back to the other one.
    pub fn resolve(&self, preference: EndpointPreference) -> Option<Endpoint> {
        let local = self.local_address.as_deref().and_then(parse_host_port);
        let cluster = self.cluster_address.as_deref().and_then(parse_host_port);
        match preference {
            EndpointPreference::Local => local.or(cluster),
            EndpointPreference::Cluster => cluster.or(local),
        }
    }
}

/// An update reported by the directory for one region.
#[derive(Clone, Debug, Default)]
pub struct EndpointUpdate {
    /// Region name as the directory reports it.
    pub name: String,
    /// Cluster address, empty if unknown.
    pub cluster_address: String,
    /// Local address, empty if unknown.
    pub local_address: String,
    /// Liveness.
    pub online: bool,
}

fn key(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_owned())
}

/// Last-known-good endpoint cache.
#[derive(Debug, Default)]
pub struct EndpointCache {
    preference: EndpointPreference,
    entries: RwLock<BTreeMap<String, RegionEndpoint>>,
    fallbacks: BTreeMap<String, Endpoint>,
}

impl EndpointCache {
    /// Create an empty cache.
    pub fn new(preference: EndpointPreference) -> Self {
        Self {
            preference,
            entries: RwLock::new(BTreeMap::new()),
            fallbacks: BTreeMap::new(),
        }
    }

    /// Seed host-local addresses from the topology (`127.0.0.1:<tcpPort>`).
    pub fn seeded(preference: EndpointPreference, topology: &Topology) -> Self {
        let mut entries = BTreeMap::new();
        for region in topology.regions() {
            let local_address = region
                .tcp_port
                .filter(|p| *p > 0)
                .map(|p| format!("127.0.0.1:{p}"));
            entries.insert(key(&region.name), RegionEndpoint {
                cluster_address: None,
                local_address,
                online: true,
                last_checked: None,
            });
        }
        Self {
            preference,
            entries: RwLock::new(entries),
            fallbacks: BTreeMap::new(),
        }
    }

    /// Static endpoint used when nothing better is cached (builder).
    pub fn with_fallback(mut self, region: &str, endpoint: Endpoint) -> Self {
        self.fallbacks.insert(key(region), endpoint);
        self
    }

    /// Configured preference.
    pub fn preference(&self) -> EndpointPreference {
        self.preference
    }

    /// Resolve a region name to an endpoint. `None` if unknown or unparsable.
    pub async fn resolve(&self, region: &str) -> Option<Endpoint> {
        let k = key(region);
        let cached = {
            let entries = self.entries.read().await;
            entries.get(&k).and_then(|e| e.resolve(self.preference))
        };
        cached.or_else(|| self.fallbacks.get(&k).cloned())
    }

    /// Cached entry for a region.
    pub async fn get(&self, region: &str) -> Option<RegionEndpoint> {
        self.entries.read().await.get(&key(region)).cloned()
    }

    /// Number of cached regions.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// True if nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Merge directory updates. Empty addresses keep the previous value.
    ///
    /// A directory name `world-<x>` updates region `<x>` when `<x>` is
    /// already known and `world-<x>` is not.
    pub async fn apply(&self, updates: &[EndpointUpdate], now: DateTime<Utc>) {
        let mut entries = self.entries.write().await;
        for update in updates {
            let mut k = key(&update.name);
            if !entries.contains_key(&k) {
                if let Some(stripped) = k.strip_prefix(DIRECTORY_NAME_PREFIX) {
                    if entries.contains_key(stripped) {
                        k = stripped.to_owned();
                    }
                }
            }

            let entry = entries.entry(k).or_default();
            if let Some(cluster) = non_empty(&update.cluster_address) {
                entry.cluster_address = Some(cluster);
            }
            if let Some(local) = non_empty(&update.local_address) {
                entry.local_address = Some(local);
            }
            entry.online = update.online;
            entry.last_checked = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::Bounds;
    use crate::world::topology::RegionDefinition;

    #[test]
    fn test_parse_bare_host_port() {
        assert_eq!(parse_host_port("world-a:9090"), Some(Endpoint::new("world-a", 9090)));
        assert_eq!(parse_host_port("  10.0.0.5:9101 "), Some(Endpoint::new("10.0.0.5", 9101)));
    }

    #[test]
    fn test_parse_with_scheme() {
        assert_eq!(parse_host_port("tcp://localhost:9100"), Some(Endpoint::new("localhost", 9100)));
        assert_eq!(parse_host_port("http://svc.ns:8085/healthz"), Some(Endpoint::new("svc.ns", 8085)));
    }

    #[test]
    fn test_parse_ipv6() {
        assert_eq!(parse_host_port("[::1]:9090"), Some(Endpoint::new("::1", 9090)));
        assert_eq!(parse_host_port("tcp://[fe80::1]:7000/"), Some(Endpoint::new("fe80::1", 7000)));
        assert_eq!(Endpoint::new("::1", 9090).to_string(), "[::1]:9090");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "localhost", "host:", ":9090", "host:0", "host:99999", "[::1]", "tcp://host"] {
            assert_eq!(parse_host_port(bad), None, "{bad}");
        }
    }

    #[test]
    fn test_preference_with_fallback() {
        let entry = RegionEndpoint {
            cluster_address: Some("world-b:9090".into()),
            local_address: Some("127.0.0.1:9102".into()),
            ..Default::default()
        };
        assert_eq!(entry.resolve(EndpointPreference::Cluster), Some(Endpoint::new("world-b", 9090)));
        assert_eq!(entry.resolve(EndpointPreference::Local), Some(Endpoint::new("127.0.0.1", 9102)));

        let cluster_only = RegionEndpoint {
            cluster_address: Some("world-b:9090".into()),
            local_address: Some("garbage".into()),
            ..Default::default()
        };
        assert_eq!(cluster_only.resolve(EndpointPreference::Local), Some(Endpoint::new("world-b", 9090)));
        assert_eq!(RegionEndpoint::default().resolve(EndpointPreference::Local), None);
    }

    #[test]
    fn test_preference_from_str() {
        assert_eq!("LOCAL".parse::<EndpointPreference>(), Ok(EndpointPreference::Local));
        assert_eq!("cluster".parse::<EndpointPreference>(), Ok(EndpointPreference::Cluster));
        assert!("nodeport".parse::<EndpointPreference>().is_err());
    }

    fn topology() -> Topology {
        Topology::new(vec![
            RegionDefinition::new("a", Bounds::new(0, 9, 0, 9)).with_tcp_port(9101),
            RegionDefinition::new("b", Bounds::new(10, 19, 0, 9)),
        ])
    }

    #[tokio::test]
    async fn test_seeded_from_topology() {
        let cache = EndpointCache::seeded(EndpointPreference::Cluster, &topology());
        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.resolve("A").await, Some(Endpoint::new("127.0.0.1", 9101)));
        assert_eq!(cache.resolve("b").await, None);
        assert_eq!(cache.resolve("zzz").await, None);
    }

    #[tokio::test]
    async fn test_fallback_used_when_nothing_cached() {
        let cache = EndpointCache::seeded(EndpointPreference::Cluster, &topology())
            .with_fallback("b", Endpoint::new("10.1.1.1", 9200));
        assert_eq!(cache.resolve("b").await, Some(Endpoint::new("10.1.1.1", 9200)));
    }

    #[tokio::test]
    async fn test_apply_keeps_last_known_good() {
        let cache = EndpointCache::seeded(EndpointPreference::Cluster, &topology());
        let now = Utc::now();
        cache
            .apply(
                &[EndpointUpdate {
                    name: "world-b".into(),
                    cluster_address: "world-b:9090".into(),
                    local_address: String::new(),
                    online: true,
                }],
                now,
            )
            .await;
        assert_eq!(cache.resolve("b").await, Some(Endpoint::new("world-b", 9090)));
        assert!(cache.get("world-b").await.is_none());

        // A later report without addresses does not erase them.
        cache
            .apply(
                &[EndpointUpdate {
                    name: "b".into(),
                    online: false,
                    ..Default::default()
                }],
                now,
            )
            .await;
        let entry = cache.get("b").await.unwrap();
        assert!(!entry.online);
        assert_eq!(entry.last_checked, Some(now));
        assert_eq!(cache.resolve("b").await, Some(Endpoint::new("world-b", 9090)));
    }
}
