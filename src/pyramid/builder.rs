use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use geo::Rect;
use serde::{Serialize, Serializer, ser::SerializeSeq};
use tracing::info;

use crate::common::{ensure_parent_dir, remove_file_with_retries};
use crate::error::TileError;
use crate::geom::union_rect;
use crate::jobs::ProgressSink;
use crate::layer::LayerIndex;
use crate::mbtiles::{MbTiles, Metadata, VectorLayer, VectorLayers};
use crate::tile::{candidate_tiles, encode_tile, TileLayer, MAX_ZOOM};

/// Value of the `name` metadata key.
pub const TILESET_NAME: &str = "OSM Layers";

/// Value of the `description` metadata key.
pub const TILESET_DESCRIPTION: &str = "Generated from GeoJSON via vectiles";

const DELETE_RETRIES: u32 = 20;
const DELETE_DELAY: Duration = Duration::from_millis(500);

const LOAD_DONE: f64 = 0.1;
const TILES_DONE: f64 = 0.95;
const TILE_REPORTS: usize = 100;

/// Outcome of a successful build.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BuildSummary {
    /// Combined bounds of all surviving layers, serialized as `[west, south, east, north]`.
    #[serde(serialize_with = "serialize_bounds")]
    pub bounds: Rect<f64>,
    pub tiles_written: usize,
}

fn serialize_bounds<S: Serializer>(bounds: &Rect<f64>, serializer: S) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(4))?;
    for value in [bounds.min().x, bounds.min().y, bounds.max().x, bounds.max().y] {
        seq.serialize_element(&value)?;
    }
    seq.end()
}

/// Build an MBTiles vector tile pyramid at `output` from GeoJSON layers.
///
/// `layers` is an ordered list of `(name, path)`; the order is kept in every
/// tile. Layers without features are dropped. Any existing file at `output`
/// is replaced. Zoom levels are inclusive.
pub fn build<N, P>(
    output: &Path,
    layers: &[(N, P)],
    min_zoom: u8,
    max_zoom: u8,
    progress: &dyn ProgressSink,
) -> Result<BuildSummary>
where
    N: AsRef<str>,
    P: AsRef<Path>,
{
    if min_zoom > max_zoom || max_zoom > MAX_ZOOM {
        return Err(TileError::InvalidZoomRange { min: min_zoom, max: max_zoom }.into());
    }

    let indexes = load_layers(layers, progress)?;
    if indexes.is_empty() {
        return Err(TileError::NoFeatures.into());
    }
    let bounds = indexes.iter()
        .filter_map(LayerIndex::bounding_box)
        .reduce(union_rect)
        .ok_or(TileError::NoBounds)?;

    ensure_parent_dir(output)?;
    remove_file_with_retries(output, DELETE_RETRIES, DELETE_DELAY)?;
    let mut store = MbTiles::create(output)?;

    let metadata = Metadata {
        name: TILESET_NAME.to_string(),
        description: TILESET_DESCRIPTION.to_string(),
        bounds,
        min_zoom,
        max_zoom,
        layers: VectorLayers {
            vector_layers: indexes.iter()
                .map(|index| VectorLayer {
                    id: index.name().to_string(),
                    description: String::new(),
                    minzoom: min_zoom,
                    maxzoom: max_zoom,
                    fields: index.attribute_schema(),
                })
                .collect(),
        },
    };
    store.write_metadata_batch(&metadata.entries()?)?;

    let candidates = candidate_tiles(indexes.iter().flat_map(LayerIndex::feature_bounds), min_zoom, max_zoom);
    info!(candidates = candidates.len(), min_zoom, max_zoom, "enumerated candidate tiles");
    progress.report(LOAD_DONE, &format!("Encoding {} candidate tiles", candidates.len()));

    let total = candidates.len();
    let report_every = (total / TILE_REPORTS).max(1);
    let mut writer = store.writer()?;

    for (i, tile) in candidates.into_iter().enumerate() {
        let bounds = tile.bounds();
        let tile_layers = indexes.iter()
            .map(|index| TileLayer { name: index.name(), hits: index.query(&bounds) })
            .collect::<Vec<_>>();

        let payload = encode_tile(tile, &tile_layers)
            .with_context(|| format!("Failed to encode tile {tile}"))?;
        if let Some(payload) = payload {
            writer.write(tile, &payload)?;
        }

        let done = i + 1;
        if done % report_every == 0 || done == total {
            let fraction = LOAD_DONE + (TILES_DONE - LOAD_DONE) * done as f64 / total as f64;
            progress.report(fraction, &format!("Encoded {done}/{total} tiles"));
        }
    }

    let tiles_written = writer.commit()?;
    info!(output = %output.display(), tiles_written, "wrote MBTiles");
    progress.report(1.0, &format!("Wrote {tiles_written} tiles"));

    Ok(BuildSummary { bounds, tiles_written })
}

/// Load each source into a [`LayerIndex`], keeping only layers with features.
fn load_layers<N, P>(layers: &[(N, P)], progress: &dyn ProgressSink) -> Result<Vec<LayerIndex>>
where
    N: AsRef<str>,
    P: AsRef<Path>,
{
    let mut indexes = Vec::with_capacity(layers.len());
    for (i, (name, path)) in layers.iter().enumerate() {
        let name = name.as_ref();
        progress.report(LOAD_DONE * i as f64 / layers.len() as f64, &format!("Loading layer {name}"));

        let index = LayerIndex::load(name, path.as_ref())?;
        if index.is_empty() {
            info!(layer = name, "skipping layer without features");
            continue;
        }
        info!(layer = name, features = index.len(), "loaded layer");
        indexes.push(index);
    }
    Ok(indexes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::NoProgress;
    use std::{fs, sync::Mutex};

    fn write_layer(dir: &Path, name: &str, body: &serde_json::Value) -> std::path::PathBuf {
        let path = dir.join(format!("{name}.geojson"));
        fs::write(&path, serde_json::to_vec(body).unwrap()).unwrap();
        path
    }

    fn square_layer() -> serde_json::Value {
        serde_json::json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {"kind": "park"},
                "geometry": {"type": "Polygon", "coordinates": [[[2.30, 48.84], [2.36, 48.84], [2.36, 48.87], [2.30, 48.87], [2.30, 48.84]]]}
            }]
        })
    }

    #[test]
    fn inverted_zoom_range_is_rejected_before_touching_files() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out").join("tiles.mbtiles");

        let err = build(&output, &[("a", dir.path().join("a.geojson"))], 6, 5, &NoProgress).unwrap_err();
        assert_eq!(err.downcast_ref::<TileError>(), Some(&TileError::InvalidZoomRange { min: 6, max: 5 }));
        assert!(!output.parent().unwrap().exists());

        let err = build(&output, &[("a", dir.path().join("a.geojson"))], 0, 25, &NoProgress).unwrap_err();
        assert!(matches!(err.downcast_ref::<TileError>(), Some(TileError::InvalidZoomRange { .. })));
    }

    #[test]
    fn progress_is_monotonic_and_ends_at_one() {
        let dir = tempfile::tempdir().unwrap();
        let parks = write_layer(dir.path(), "parks", &square_layer());
        let seen = Mutex::new(Vec::new());
        let sink = |fraction: f64, _message: &str| seen.lock().unwrap().push(fraction);

        let summary = build(&dir.path().join("t.mbtiles"), &[("parks", parks)], 10, 12, &sink).unwrap();
        assert!(summary.tiles_written > 0);

        let seen = seen.into_inner().unwrap();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
        assert_eq!(seen.last().copied(), Some(1.0));
        assert!(seen.iter().all(|f| (0.0..=1.0).contains(f)));
    }

    #[test]
    fn summary_serializes_bounds_as_array() {
        let summary = BuildSummary {
            bounds: Rect::new(geo::coord! { x: 1.0, y: 2.0 }, geo::coord! { x: 3.0, y: 4.0 }),
            tiles_written: 7,
        };
        assert_eq!(
            serde_json::to_value(summary).unwrap(),
            serde_json::json!({"bounds": [1.0, 2.0, 3.0, 4.0], "tiles_written": 7})
        );
    }
}
