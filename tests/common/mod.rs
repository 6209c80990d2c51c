#![allow(dead_code)]

use std::{fs, path::{Path, PathBuf}};

use serde_json::{json, Value};

/// Two small Paris layers: a building polygon and a road line.
pub fn write_paris_layers(dir: &Path) -> Vec<(String, PathBuf)> {
    let buildings = json!({
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"name": "Louvre", "levels": 4},
             "geometry": {"type": "Polygon", "coordinates": [[[2.335, 48.859], [2.339, 48.859], [2.339, 48.862], [2.335, 48.862], [2.335, 48.859]]]}},
            {"type": "Feature", "properties": {"name": null}, "geometry": null}
        ]
    });
    let roads = json!({
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"highway": "primary"},
             "geometry": {"type": "LineString", "coordinates": [[2.330, 48.857], [2.345, 48.861], [2.352, 48.866]]}}
        ]
    });
    vec![
        ("buildings".to_string(), write_geojson(dir, "buildings", &buildings)),
        ("roads".to_string(), write_geojson(dir, "roads", &roads)),
    ]
}

pub fn write_geojson(dir: &Path, name: &str, body: &Value) -> PathBuf {
    let path = dir.join(format!("{name}.geojson"));
    fs::write(&path, serde_json::to_vec(body).unwrap()).unwrap();
    path
}

pub fn empty_collection() -> Value {
    json!({"type": "FeatureCollection", "features": []})
}
