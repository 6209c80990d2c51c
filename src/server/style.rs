use std::collections::BTreeMap;

use serde_json::{json, Value};

/// Name of the single vector source in synthesized styles.
pub const SOURCE_NAME: &str = "vectiles";

const DEFAULT_MIN_ZOOM: u8 = 5;
const DEFAULT_MAX_ZOOM: u8 = 12;

const PALETTE: [&str; 8] = ["#FF6B6B", "#FFD93D", "#6BCB77", "#4D96FF", "#C77DFF", "#FF8FB1", "#F3A712", "#14B8A6"];

/// Layer ids advertised in the `json` metadata entry, in declaration order.
///
/// Only `vector_layers[*].id` is read; entries without a string id are
/// skipped. Missing or malformed JSON yields no layers.
pub fn vector_layer_ids(metadata: &BTreeMap<String, String>) -> Vec<String> {
    let Some(descriptor) = metadata.get("json").and_then(|json| serde_json::from_str::<Value>(json).ok()) else {
        return Vec::new();
    };
    descriptor.get("vector_layers")
        .and_then(Value::as_array)
        .map(|layers| {
            layers.iter()
                .filter_map(|layer| layer.get("id").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Whether a layer id names a line dataset.
pub fn is_line_layer(id: &str) -> bool {
    let id = id.to_lowercase();
    id.contains("line") || id.contains("road")
}

/// Build a minimal style document with one source and one layer per vector layer.
pub fn synthesize_style(metadata: &BTreeMap<String, String>, tiles_url: &str) -> Value {
    let zoom = |key: &str, default: u8| {
        metadata.get(key).and_then(|value| value.trim().parse::<u8>().ok()).unwrap_or(default)
    };

    let layers = vector_layer_ids(metadata).into_iter()
        .enumerate()
        .map(|(i, id)| {
            let color = PALETTE[i % PALETTE.len()];
            if is_line_layer(&id) {
                json!({
                    "id": id,
                    "type": "line",
                    "source": SOURCE_NAME,
                    "source-layer": id,
                    "paint": {"line-color": color, "line-width": 2},
                })
            } else {
                json!({
                    "id": id,
                    "type": "fill",
                    "source": SOURCE_NAME,
                    "source-layer": id,
                    "paint": {"fill-color": color, "fill-opacity": 0.5},
                })
            }
        })
        .collect::<Vec<_>>();

    json!({
        "version": 8,
        "name": metadata.get("name").map(String::as_str).unwrap_or(SOURCE_NAME),
        "sources": {
            SOURCE_NAME: {
                "type": "vector",
                "tiles": [tiles_url],
                "minzoom": zoom("minzoom", DEFAULT_MIN_ZOOM),
                "maxzoom": zoom("maxzoom", DEFAULT_MAX_ZOOM),
            }
        },
        "layers": layers,
    })
}
