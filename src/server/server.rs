use std::{
    net::{SocketAddr, TcpListener},
    path::PathBuf,
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use axum::{
    extract::{Path as AxumPath, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};
use tracing::{error, info, warn};

use super::pool::{ReadPool, READ_POOL_SIZE};
use super::style::synthesize_style;
use crate::error::TileError;
use crate::mbtiles::MbTiles;
use crate::tile::TileCoord;

/// Content type of vector tile responses.
pub const TILE_CONTENT_TYPE: &str = "application/x-protobuf";

const STOP_TIMEOUT: Duration = Duration::from_secs(10);
const STOP_POLL: Duration = Duration::from_millis(20);

/// Where to listen and which store to serve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub mbtiles: PathBuf,
}

/// HTTP server for a single MBTiles store, running on its own thread.
#[derive(Debug)]
pub struct TileServer {
    config: ServerConfig,
    running: Option<Running>,
}

#[derive(Debug)]
struct Running {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    thread: JoinHandle<Result<()>>,
}

#[derive(Clone)]
struct AppState {
    pool: Arc<ReadPool>,
    tiles_url: Arc<str>,
}

impl TileServer {
    pub fn new(config: ServerConfig) -> Self {
        Self { config, running: None }
    }

    #[inline] pub fn config(&self) -> &ServerConfig { &self.config }

    /// Open the store and start listening.
    ///
    /// Returns `Ok(false)` if the store file does not exist yet and `Ok(true)`
    /// once listening. Calling it on a running server is a no-op.
    pub fn start(&mut self) -> Result<bool> {
        if self.is_running() {
            return Ok(true);
        }
        self.reap();

        let path = &self.config.mbtiles;
        let store = match MbTiles::open(path) {
            Ok(store) => store,
            Err(err) if matches!(err.downcast_ref::<TileError>(), Some(TileError::StoreMissing(_))) => {
                warn!(path = %path.display(), "MBTiles not found, tile server not started");
                return Ok(false);
            }
            Err(err) => return Err(err),
        };

        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port))
            .with_context(|| format!("Failed to bind {}:{}", self.config.host, self.config.port))?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;

        let pool = ReadPool::new(store, READ_POOL_SIZE)?;
        let readers = pool.len();
        let state = AppState {
            pool: Arc::new(pool),
            tiles_url: format!("http://{}:{}/data/vectiles/{{z}}/{{x}}/{{y}}.pbf", self.config.host, addr.port()).into(),
        };
        let router = router(state);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("tile-server")
            .build()
            .context("Failed to create tile server runtime")?;
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();

        let thread = thread::Builder::new()
            .name("tile-server".into())
            .spawn(move || -> Result<()> {
                runtime.block_on(async move {
                    let listener = tokio::net::TcpListener::from_std(listener)?;
                    axum::serve(listener, router)
                        .with_graceful_shutdown(async move {
                            let _ = shutdown_rx.await;
                        })
                        .await?;
                    Ok::<_, anyhow::Error>(())
                })
            })
            .context("Failed to spawn tile server thread")?;

        info!(%addr, mbtiles = %path.display(), readers, "tile server listening");
        self.running = Some(Running { addr, shutdown, thread });
        Ok(true)
    }

    /// Whether the serving thread is alive.
    pub fn is_running(&self) -> bool {
        self.running.as_ref().is_some_and(|running| !running.thread.is_finished())
    }

    /// Address the listener is bound to, while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().filter(|_| self.is_running()).map(|running| running.addr)
    }

    /// Signal the server to drain and wait up to 10 s for it to exit.
    /// A thread that does not exit in time is detached.
    pub fn stop(&mut self) {
        let Some(Running { addr, shutdown, thread }) = self.running.take() else { return };
        let _ = shutdown.send(());

        let deadline = Instant::now() + STOP_TIMEOUT;
        while !thread.is_finished() && Instant::now() < deadline {
            thread::sleep(STOP_POLL);
        }
        if thread.is_finished() {
            join_server(thread);
            info!(%addr, "tile server stopped");
        } else {
            warn!(%addr, "tile server did not stop within {:?}, detaching", STOP_TIMEOUT);
        }
    }

    /// Drop bookkeeping for a serving thread that already exited on its own.
    fn reap(&mut self) {
        if let Some(running) = self.running.take() {
            join_server(running.thread);
        }
    }
}

impl Drop for TileServer {
    fn drop(&mut self) { self.stop() }
}

fn join_server(thread: JoinHandle<Result<()>>) {
    match thread.join() {
        Ok(Ok(())) => {}
        Ok(Err(err)) => error!(error = %format!("{err:#}"), "tile server exited with an error"),
        Err(_) => error!("tile server thread panicked"),
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/metadata.json", get(get_metadata))
        .route("/styles/osm-bright/style.json", get(get_style))
        .route("/data/vectiles/{z}/{x}/{y}", get(get_tile))
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
}

/// Run a store read on the blocking pool against a pooled connection.
async fn with_store<T, F>(state: &AppState, read: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&MbTiles) -> Result<T> + Send + 'static,
{
    let pool = state.pool.clone();
    tokio::task::spawn_blocking(move || pool.read(read))
        .await
        .context("store read task failed")?
}

fn internal_error(err: anyhow::Error) -> StatusCode {
    error!(error = %format!("{err:#}"), "failed to read MBTiles");
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn get_metadata(State(state): State<AppState>) -> Result<Response, StatusCode> {
    let metadata = with_store(&state, MbTiles::metadata).await.map_err(internal_error)?;
    Ok(Json(metadata).into_response())
}

async fn get_style(State(state): State<AppState>) -> Result<Response, StatusCode> {
    let metadata = with_store(&state, MbTiles::metadata).await.map_err(internal_error)?;
    Ok(Json(synthesize_style(&metadata, &state.tiles_url)).into_response())
}

async fn get_tile(
    State(state): State<AppState>,
    AxumPath((z, x, y)): AxumPath<(String, String, String)>,
) -> Result<Response, StatusCode> {
    let coord = parse_tile_path(&z, &x, &y).ok_or(StatusCode::NOT_FOUND)?;
    let data = with_store(&state, move |store| store.tile(coord)).await.map_err(internal_error)?;
    let data = data.ok_or(StatusCode::NOT_FOUND)?;
    Ok(([(header::CONTENT_TYPE, TILE_CONTENT_TYPE)], Bytes::from(data)).into_response())
}

/// Parse `{z}`, `{x}` and `{y}.pbf` path segments into an on-grid coordinate.
fn parse_tile_path(z: &str, x: &str, y: &str) -> Option<TileCoord> {
    let y = y.strip_suffix(".pbf")?;
    let coord = TileCoord::new(z.parse().ok()?, x.parse().ok()?, y.parse().ok()?);
    coord.is_valid().then_some(coord)
}
