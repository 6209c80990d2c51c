//! HTTP tile server and style synthesis.
mod pool;
mod server;
mod style;

pub use server::{ServerConfig, TileServer, TILE_CONTENT_TYPE};
pub use style::{is_line_layer, synthesize_style, vector_layer_ids, SOURCE_NAME};
