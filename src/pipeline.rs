//! Convert stage: turn processed GeoJSON files into the served MBTiles store.

use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::common::ensure_parent_dir;
use crate::jobs::{ProgressSink, ScaledProgress};
use crate::pyramid;

/// File written next to the output store describing the latest conversion.
pub const LATEST_RECORD: &str = "latest_mbtiles.json";

/// Inputs of one conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertRequest {
    /// GeoJSON files, one layer each; inputs that do not exist are skipped.
    pub inputs: Vec<PathBuf>,
    pub output: PathBuf,
    pub min_zoom: u8,
    pub max_zoom: u8,
}

/// Record of a finished conversion, persisted as [`LATEST_RECORD`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertOutcome {
    pub mbtiles_path: PathBuf,
    pub inputs: Vec<PathBuf>,
    /// `[west, south, east, north]`
    pub bounds: [f64; 4],
    pub tiles_written: usize,
    pub timestamp: DateTime<Utc>,
}

/// Build the MBTiles store for `request` and record the result beside it.
///
/// Each existing input becomes a layer named after its file stem.
pub fn convert_to_mbtiles(request: &ConvertRequest, progress: &dyn ProgressSink) -> Result<ConvertOutcome> {
    let inputs = request.inputs.iter()
        .filter(|path| {
            let exists = path.is_file();
            if !exists {
                warn!(path = %path.display(), "skipping missing input");
            }
            exists
        })
        .cloned()
        .collect::<Vec<_>>();
    if inputs.is_empty() {
        bail!("no GeoJSON files found to convert");
    }

    let mut names = BTreeSet::new();
    let mut layers = Vec::with_capacity(inputs.len());
    for path in &inputs {
        let name = layer_name(path)?;
        if !names.insert(name.clone()) {
            bail!("more than one input is named {name}: {}", path.display());
        }
        layers.push((name, path.clone()));
    }

    info!(output = %request.output.display(), layers = layers.len(), "converting to MBTiles");
    progress.report(0.05, "Building MBTiles...");
    let summary = pyramid::build(
        &request.output,
        &layers,
        request.min_zoom,
        request.max_zoom,
        &ScaledProgress::new(progress, 0.05, 0.95),
    )?;

    let bounds = summary.bounds;
    let outcome = ConvertOutcome {
        mbtiles_path: request.output.clone(),
        inputs,
        bounds: [bounds.min().x, bounds.min().y, bounds.max().x, bounds.max().y],
        tiles_written: summary.tiles_written,
        timestamp: Utc::now(),
    };
    write_latest(&request.output, &outcome)?;

    progress.report(1.0, "MBTiles ready.");
    Ok(outcome)
}

/// The last conversion recorded in `dir`, `None` if absent or unreadable.
pub fn load_latest(dir: &Path) -> Option<ConvertOutcome> {
    let path = dir.join(LATEST_RECORD);
    let bytes = fs::read(&path).ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(outcome) => Some(outcome),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring corrupt conversion record");
            None
        }
    }
}

fn layer_name(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
        .with_context(|| format!("Cannot derive a layer name from {}", path.display()))
}

fn write_latest(output: &Path, outcome: &ConvertOutcome) -> Result<()> {
    let path = output.with_file_name(LATEST_RECORD);
    ensure_parent_dir(&path)?;
    let json = serde_json::to_vec_pretty(outcome)?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))
}
