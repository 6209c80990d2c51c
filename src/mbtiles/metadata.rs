use std::collections::BTreeMap;

use anyhow::{Context, Result};
use geo::Rect;
use serde::{Deserialize, Serialize};

/// Tile format identifier written to the `format` metadata key.
pub const TILE_FORMAT: &str = "pbf";

/// One entry of the `vector_layers` descriptor stored under the `json` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorLayer {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub minzoom: u8,
    pub maxzoom: u8,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

/// The JSON object stored under the `json` metadata key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorLayers {
    pub vector_layers: Vec<VectorLayer>,
}

/// Everything the builder writes to the metadata table.
#[derive(Debug, Clone)]
pub struct Metadata {
    pub name: String,
    pub description: String,
    pub bounds: Rect<f64>,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub layers: VectorLayers,
}

impl Metadata {
    /// Center of the bounds at the minimum zoom: (lon, lat, zoom).
    pub fn center(&self) -> (f64, f64, u8) {
        let center = self.bounds.center();
        (center.x, center.y, self.min_zoom)
    }

    /// Flatten into `(name, value)` rows for the metadata table.
    pub fn entries(&self) -> Result<Vec<(String, String)>> {
        let (lon, lat, zoom) = self.center();
        let json = serde_json::to_string(&self.layers).context("Failed to serialize vector_layers")?;

        Ok(vec![
            ("name".into(), self.name.clone()),
            ("description".into(), self.description.clone()),
            ("format".into(), TILE_FORMAT.into()),
            ("bounds".into(), format_bounds(&self.bounds)),
            ("center".into(), format!("{lon},{lat},{zoom}")),
            ("minzoom".into(), self.min_zoom.to_string()),
            ("maxzoom".into(), self.max_zoom.to_string()),
            ("json".into(), json),
        ])
    }
}

/// Render bounds as `west,south,east,north`.
pub fn format_bounds(bounds: &Rect<f64>) -> String {
    format!("{},{},{},{}", bounds.min().x, bounds.min().y, bounds.max().x, bounds.max().y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    fn sample() -> Metadata {
        Metadata {
            name: "OSM Layers".into(),
            description: "test".into(),
            bounds: Rect::new(coord! { x: -1.0, y: 50.0 }, coord! { x: 1.5, y: 52.0 }),
            min_zoom: 5,
            max_zoom: 12,
            layers: VectorLayers {
                vector_layers: vec![VectorLayer {
                    id: "roads".into(),
                    description: String::new(),
                    minzoom: 5,
                    maxzoom: 12,
                    fields: BTreeMap::from([("highway".into(), "String".into())]),
                }],
            },
        }
    }

    #[test]
    fn entries_carry_required_keys() {
        let entries = sample().entries().unwrap();
        let map = entries.into_iter().collect::<BTreeMap<_, _>>();

        assert_eq!(map["format"], "pbf");
        assert_eq!(map["bounds"], "-1,50,1.5,52");
        assert_eq!(map["center"], "0.25,51,5");
        assert_eq!(map["minzoom"], "5");
        assert_eq!(map["maxzoom"], "12");

        let layers: VectorLayers = serde_json::from_str(&map["json"]).unwrap();
        assert_eq!(layers, sample().layers);
    }
}
