//! Application configuration, read from a JSON file. Every field has a default.

use std::{fs, path::{Path, PathBuf}};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::TileError;
use crate::server::ServerConfig;
use crate::tile::MAX_ZOOM;

const DEFAULT_STORE: &str = "storage/tileserver/openmaptiles.mbtiles";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tileserver: TileServerSection,
    pub mbtiles: MbTilesSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileServerSection {
    pub host: String,
    pub port: u16,
    pub mbtiles: PathBuf,
}

impl Default for TileServerSection {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8090, mbtiles: DEFAULT_STORE.into() }
    }
}

impl From<TileServerSection> for ServerConfig {
    fn from(section: TileServerSection) -> Self {
        Self { host: section.host, port: section.port, mbtiles: section.mbtiles }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MbTilesSection {
    pub output: PathBuf,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

impl Default for MbTilesSection {
    fn default() -> Self {
        Self { output: DEFAULT_STORE.into(), min_zoom: 5, max_zoom: 12 }
    }
}

impl Config {
    /// Read and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let MbTilesSection { min_zoom, max_zoom, .. } = self.mbtiles;
        if min_zoom > max_zoom || max_zoom > MAX_ZOOM {
            return Err(TileError::InvalidZoomRange { min: min_zoom, max: max_zoom }.into());
        }
        Ok(())
    }
}
