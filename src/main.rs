//! Region Server
//!
//! Loads the region's map and topology, then serves players over TCP until
//! Ctrl-C. Configuration errors exit with status 2.

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use region_server::{
    config::RegionConfig,
    core::chunk::ChunkIndexer,
    network::{server::RegionServer, session::SessionRegistry},
    world::{
        coordinator::RegionCoordinator,
        directory::{DirectoryClient, ResolveRequest},
        endpoint::EndpointCache,
        map::MapStore,
        topology::{Topology, MAX_GHOST_WIDTH, MIN_GHOST_WIDTH},
    },
    VERSION,
};

/// Exit status for configuration and startup failures.
const EXIT_FATAL: i32 = 2;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to set tracing subscriber: {e}");
    }

    if let Err(e) = run().await {
        let message = format!("{e:#}");
        error!(error = %message, "fatal");
        std::process::exit(EXIT_FATAL);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = RegionConfig::from_env().context("reading configuration")?;
    info!(version = VERSION, region = %config.region_name, "region_server_starting");

    let store = MapStore::load_from(&config.map_data_dir)
        .with_context(|| format!("loading maps from {}", config.map_data_dir.display()))?;
    let (map_name, map) = store
        .into_region_map(&config.region_name)
        .context("no maps loaded")?;
    let grid = ChunkIndexer::default().describe(map.width, map.height, None);
    info!(
        map = %map_name,
        width = map.width,
        height = map.height,
        chunk_size = grid.chunk_size,
        chunks_x = grid.chunks_x,
        chunks_y = grid.chunks_y,
        "map_selected"
    );

    let topology = Topology::load(&config.topology_path)?;
    let me = topology.require(&config.region_name)?.clone();
    let bounds = config.bounds_for(&me)?;

    let mut cache = EndpointCache::seeded(config.endpoint_preference, &topology);
    for (region, endpoint) in config.neighbor_fallbacks(&me) {
        info!(region = %region, endpoint = %endpoint, "neighbor_fallback");
        cache = cache.with_fallback(&region, endpoint);
    }
    let cache = Arc::new(cache);

    let coordinator = Arc::new(RegionCoordinator::new(
        me.name.clone(),
        bounds,
        map,
        topology,
        cache.clone(),
        Arc::new(SessionRegistry::new()),
    ));
    let effective = coordinator.effective_bounds();
    anyhow::ensure!(
        !effective.is_empty(),
        "region {} bounds {bounds} do not overlap map {map_name}",
        me.name
    );
    let edges = Topology::ghost_zone_edges(&effective, MAX_GHOST_WIDTH);
    info!(
        region = %me.name,
        configured = %bounds,
        effective = %effective,
        ghost_width = edges.width,
        west = %edges.west,
        east = %edges.east,
        north = %edges.north,
        south = %edges.south,
        "region_bounds"
    );

    let server_config = config.server_config();
    let directory = DirectoryClient::new(
        &config.directory_base_url,
        server_config.directory_timeout,
        config.directory_disabled,
    )
    .context("building directory client")?;

    if !directory.is_disabled() {
        let center = effective.center();
        let request = ResolveRequest {
            region_name: me.name.clone(),
            x: center.x,
            y: center.y,
            ghost_zone_width: MIN_GHOST_WIDTH,
        };
        match directory.resolve(&request).await {
            Ok(r) => info!(
                current = %r.current_region,
                online = r.online,
                next = %r.next_region,
                "directory_resolve"
            ),
            Err(e) => warn!(error = %e, base_url = %directory.base_url(), "directory_resolve_failed"),
        }
    }

    let server = RegionServer::new(server_config.clone(), coordinator);
    let refresher = tokio::spawn(directory.run_refresh_loop(
        cache,
        server_config.refresh_interval,
        server.subscribe_shutdown(),
    ));

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl_c_received");
            let _ = shutdown.send(());
        }
    });

    server.run().await.context("serving")?;
    let _ = refresher.await;
    info!("region_server_stopped");
    Ok(())
}
