mod common;

use std::collections::BTreeSet;

use geo::{coord, Rect};
use mvt_reader::Reader;
use serde_json::json;
use vectiles::{
    build,
    mbtiles::VectorLayers,
    tile::tiles_covering,
    LayerIndex, MbTiles, NoProgress, TileCoord, TileError,
};

fn tile_at(lon: f64, lat: f64, zoom: u8) -> TileCoord {
    let point = Rect::new(coord! { x: lon, y: lat }, coord! { x: lon, y: lat });
    tiles_covering(&point, zoom).next().unwrap()
}

#[test]
fn built_store_round_trips_through_the_tile_api() {
    let dir = tempfile::tempdir().unwrap();
    let layers = common::write_paris_layers(dir.path());
    let output = dir.path().join("nested").join("paris.mbtiles");

    let summary = build(&output, &layers, 10, 12, &NoProgress).unwrap();
    assert!(summary.tiles_written >= 3);
    assert_eq!(summary.bounds.min(), coord! { x: 2.330, y: 48.857 });
    assert_eq!(summary.bounds.max(), coord! { x: 2.352, y: 48.866 });

    let store = MbTiles::open(&output).unwrap();
    assert_eq!(store.tile_count().unwrap(), summary.tiles_written);

    let louvre = tile_at(2.337, 48.8605, 12);
    let payload = store.tile(louvre).unwrap().expect("tile over the Louvre");
    let reader = Reader::new(payload).unwrap();
    let names = reader.get_layer_names().unwrap();
    assert_eq!(names, vec!["buildings".to_string(), "roads".to_string()]);
    assert_eq!(reader.get_features(0).unwrap().len(), 1);

    // Far from any feature.
    assert_eq!(store.tile(TileCoord::new(12, 0, 0)).unwrap(), None);
    assert_eq!(store.tile(tile_at(-73.98, 40.75, 12)).unwrap(), None);
}

#[test]
fn metadata_describes_the_build() {
    let dir = tempfile::tempdir().unwrap();
    let layers = common::write_paris_layers(dir.path());
    let output = dir.path().join("paris.mbtiles");
    build(&output, &layers, 10, 11, &NoProgress).unwrap();

    let metadata = MbTiles::open(&output).unwrap().metadata().unwrap();
    assert_eq!(metadata["name"], "OSM Layers");
    assert_eq!(metadata["format"], "pbf");
    assert_eq!(metadata["minzoom"], "10");
    assert_eq!(metadata["maxzoom"], "11");
    assert_eq!(metadata["bounds"], "2.33,48.857,2.352,48.866");
    assert!(metadata["center"].ends_with(",10"));

    let layers: VectorLayers = serde_json::from_str(&metadata["json"]).unwrap();
    let ids = layers.vector_layers.iter().map(|layer| layer.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["buildings", "roads"]);
    let fields = layers.vector_layers[0].fields.keys().map(String::as_str).collect::<Vec<_>>();
    assert_eq!(fields, vec!["levels", "name"]);
}

#[test]
fn tiles_are_stored_with_tms_rows() {
    let dir = tempfile::tempdir().unwrap();
    let layers = common::write_paris_layers(dir.path());
    let output = dir.path().join("paris.mbtiles");
    build(&output, &layers, 12, 12, &NoProgress).unwrap();

    let louvre = tile_at(2.337, 48.8605, 12);
    let conn = rusqlite::Connection::open(&output).unwrap();
    let rows: i64 = conn
        .query_row(
            "SELECT count(*) FROM tiles WHERE zoom_level = 12 AND tile_column = ?1 AND tile_row = ?2",
            rusqlite::params![louvre.x, louvre.tms_row()],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn rebuilding_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let layers = common::write_paris_layers(dir.path());
    let output = dir.path().join("paris.mbtiles");

    let first = build(&output, &layers, 9, 12, &NoProgress).unwrap();
    let coords_first = MbTiles::open(&output).unwrap().tile_coords().unwrap();
    let second = build(&output, &layers, 9, 12, &NoProgress).unwrap();
    let store = MbTiles::open(&output).unwrap();

    assert_eq!(first, second);
    assert_eq!(store.tile_count().unwrap(), second.tiles_written);
    assert_eq!(store.tile_coords().unwrap(), coords_first);
    assert_eq!(store.metadata().unwrap().len(), 8);
}

#[test]
fn every_tile_with_query_hits_is_stored() {
    let dir = tempfile::tempdir().unwrap();
    // West edge of column 2074 at zoom 12, the polygon pokes 1e-6 degrees past it.
    let west = 2074.0 / 4096.0 * 360.0 - 180.0 - 1e-6;
    let (east, south, north) = (2.33, 48.85, 48.86);
    let body = json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {"name": "block"},
            "geometry": {"type": "Polygon", "coordinates": [[[west, south], [east, south], [east, north], [west, north], [west, south]]]}
        }]
    });
    let path = common::write_geojson(dir.path(), "blocks", &body);
    let output = dir.path().join("blocks.mbtiles");
    build(&output, &[("blocks".to_string(), path.clone())], 12, 12, &NoProgress).unwrap();

    let layer = LayerIndex::load("blocks", &path).unwrap();
    let store = MbTiles::open(&output).unwrap();
    let bbox = Rect::new(coord! { x: west, y: south }, coord! { x: east, y: north });

    let mut columns = BTreeSet::new();
    for tile in tiles_covering(&bbox, 12) {
        if layer.query(&tile.bounds()).is_empty() {
            continue;
        }
        columns.insert(tile.x);
        let payload = store.tile(tile).unwrap();
        assert!(payload.is_some(), "tile {tile} has hits but was not stored");
        let reader = Reader::new(payload.unwrap()).unwrap();
        assert_eq!(reader.get_layer_names().unwrap(), vec!["blocks".to_string()]);
    }
    assert!(columns.contains(&2073));
    assert!(columns.contains(&2074));
}

#[test]
fn every_zoom_in_range_is_populated() {
    let dir = tempfile::tempdir().unwrap();
    let layers = common::write_paris_layers(dir.path());
    let output = dir.path().join("paris.mbtiles");
    build(&output, &layers, 5, 8, &NoProgress).unwrap();

    let zooms = MbTiles::open(&output).unwrap().tile_coords().unwrap()
        .into_iter()
        .map(|coord| coord.z)
        .collect::<BTreeSet<_>>();
    assert_eq!(zooms, BTreeSet::from([5, 6, 7, 8]));
}

#[test]
fn layers_without_features_fail_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let empty = common::write_geojson(dir.path(), "empty", &common::empty_collection());
    let output = dir.path().join("out.mbtiles");

    let err = build(&output, &[("empty", empty), ("missing", dir.path().join("missing.geojson"))], 5, 6, &NoProgress)
        .unwrap_err();
    assert_eq!(err.downcast_ref::<TileError>(), Some(&TileError::NoFeatures));
    assert!(!output.exists());
}

#[test]
fn empty_layers_are_dropped_from_the_descriptor() {
    let dir = tempfile::tempdir().unwrap();
    let mut layers = common::write_paris_layers(dir.path());
    layers.push(("empty".to_string(), common::write_geojson(dir.path(), "empty", &common::empty_collection())));
    let output = dir.path().join("out.mbtiles");
    build(&output, &layers, 10, 10, &NoProgress).unwrap();

    let metadata = MbTiles::open(&output).unwrap().metadata().unwrap();
    let descriptor: VectorLayers = serde_json::from_str(&metadata["json"]).unwrap();
    assert_eq!(descriptor.vector_layers.len(), 2);
}

#[test]
fn inverted_zoom_range_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let layers = common::write_paris_layers(dir.path());
    let output = dir.path().join("out.mbtiles");

    let err = build(&output, &layers, 12, 5, &NoProgress).unwrap_err();
    assert_eq!(err.downcast_ref::<TileError>(), Some(&TileError::InvalidZoomRange { min: 12, max: 5 }));
    assert!(!output.exists());
}

#[test]
fn malformed_layer_aborts_the_build() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("bad.geojson");
    std::fs::write(&bad, b"{\"type\": \"FeatureCollection\", \"features\": [").unwrap();

    assert!(build(&dir.path().join("out.mbtiles"), &[("bad", bad)], 5, 6, &NoProgress).is_err());
}
