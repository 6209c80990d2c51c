//! Tile pyramid builder: GeoJSON layers in, populated MBTiles store out.
mod builder;

pub use builder::{build, BuildSummary, TILESET_DESCRIPTION, TILESET_NAME};
