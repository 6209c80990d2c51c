#![doc = "Vectiles public API: build MBTiles vector tile pyramids from GeoJSON and serve them"]
mod common;
mod geom;

pub mod config;
pub mod error;
pub mod jobs;
pub mod layer;
pub mod mbtiles;
pub mod pipeline;
pub mod pyramid;
pub mod server;
pub mod tile;

#[doc(inline)]
pub use config::Config;

#[doc(inline)]
pub use error::TileError;

#[doc(inline)]
pub use jobs::{Job, JobHandle, JobId, JobRunner, JobStatus, NoProgress, ProgressSink};

#[doc(inline)]
pub use layer::LayerIndex;

#[doc(inline)]
pub use mbtiles::MbTiles;

#[doc(inline)]
pub use pipeline::{convert_to_mbtiles, load_latest, ConvertOutcome, ConvertRequest};

#[doc(inline)]
pub use pyramid::{build, BuildSummary};

#[doc(inline)]
pub use server::{ServerConfig, TileServer};

#[doc(inline)]
pub use tile::TileCoord;
