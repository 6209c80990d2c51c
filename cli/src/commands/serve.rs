use anyhow::{bail, Result};
use tracing::info;
use vectiles::{ServerConfig, TileServer};

use crate::cli::{Cli, ServeArgs};
use super::load_config;

pub fn run(_cli: &Cli, args: &ServeArgs) -> Result<()> {
    let mut config: ServerConfig = load_config(args.config.as_deref())?.tileserver.into();
    if let Some(mbtiles) = &args.mbtiles { config.mbtiles = mbtiles.clone(); }
    if let Some(host) = &args.host { config.host = host.clone(); }
    if let Some(port) = args.port { config.port = port; }

    serve_until_ctrl_c(config)
}

/// Serve `config.mbtiles` until the process receives Ctrl-C.
pub(crate) fn serve_until_ctrl_c(config: ServerConfig) -> Result<()> {
    let mut server = TileServer::new(config);
    if !server.start()? {
        bail!("MBTiles not found at {}", server.config().mbtiles.display());
    }
    if let Some(addr) = server.local_addr() {
        info!("style: http://{addr}/styles/osm-bright/style.json");
        info!("tiles: http://{addr}/data/vectiles/{{z}}/{{x}}/{{y}}.pbf");
    }

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(tokio::signal::ctrl_c())?;

    info!("shutting down");
    server.stop();
    Ok(())
}
