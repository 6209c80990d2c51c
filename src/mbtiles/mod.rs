//! MBTiles container: a SQLite file with a `metadata` table and a TMS-addressed `tiles` table.
mod metadata;
mod store;

pub use metadata::{format_bounds, Metadata, VectorLayer, VectorLayers, TILE_FORMAT};
pub use store::{MbTiles, TileWriter};
