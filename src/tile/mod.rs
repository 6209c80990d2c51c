//! Tile grid addressing and vector tile encoding.
mod coord;
mod encode;

pub use coord::{candidate_tiles, flip_row, tiles_covering, TileCoord, MAX_ZOOM};
pub(crate) use coord::MAX_LATITUDE;
pub use encode::{encode_tile, TileLayer, EXTENT};
