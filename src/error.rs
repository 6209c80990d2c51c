use std::path::PathBuf;

use thiserror::Error;

/// Caller-correctable failures of the tile engine.
///
/// These travel inside `anyhow::Error`; use `err.downcast_ref::<TileError>()`
/// to tell them apart from I/O or parse failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TileError {
    /// No input layer yielded a single feature.
    #[error("no GeoJSON layers contained features")]
    NoFeatures,

    /// None of the surviving layers produced a bounding box.
    #[error("unable to determine dataset bounds")]
    NoBounds,

    /// Zoom range is inverted or exceeds the supported maximum.
    #[error("invalid zoom range {min}..={max}")]
    InvalidZoomRange { min: u8, max: u8 },

    /// An existing store could not be removed before a rebuild.
    #[error("could not remove {} after {attempts} attempts", path.display())]
    StoreLocked { path: PathBuf, attempts: u32 },

    /// The store file does not exist.
    #[error("MBTiles not found: {}", .0.display())]
    StoreMissing(PathBuf),

    /// The store file exists but lacks the MBTiles schema.
    #[error("{} is not a valid MBTiles store: {}", .0.display(), .1)]
    InvalidStore(PathBuf, String),
}
