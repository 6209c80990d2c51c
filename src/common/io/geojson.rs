use anyhow::{anyhow, bail, Context, Result};
use geo::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon,
};
use serde_json::{Map, Value};

/// A single feature as read from a GeoJSON FeatureCollection.
#[derive(Debug, Clone)]
pub(crate) struct GeoJsonFeature {
    /// `None` when the feature's geometry is `null` or missing.
    pub(crate) geometry: Option<Geometry<f64>>,
    pub(crate) properties: Map<String, Value>,
}

/// Read features from GeoJSON FeatureCollection bytes.
pub(crate) fn read_features_from_geojson_bytes(bytes: &[u8]) -> Result<Vec<GeoJsonFeature>> {
    let value: Value = serde_json::from_slice(bytes).context("Failed to parse GeoJSON bytes")?;

    let features = match value.get("features") {
        Some(Value::Array(features)) => features,
        Some(Value::Null) | None => return Ok(Vec::new()),
        Some(_) => bail!("Invalid FeatureCollection: \"features\" must be an array"),
    };

    features.iter().enumerate()
        .map(|(idx, feature)| {
            let geometry = match feature.get("geometry") {
                Some(Value::Null) | None => None,
                Some(geometry) => Some(parse_geometry(geometry)
                    .with_context(|| format!("Invalid geometry in feature {idx}"))?),
            };
            let properties = match feature.get("properties") {
                Some(Value::Object(properties)) => properties.clone(),
                _ => Map::new(),
            };
            Ok(GeoJsonFeature { geometry, properties })
        })
        .collect()
}

/// Parse a GeoJSON geometry object into a geo::Geometry.
pub(crate) fn parse_geometry(value: &Value) -> Result<Geometry<f64>> {
    let kind = value.get("type").and_then(Value::as_str)
        .ok_or_else(|| anyhow!("geometry is missing its \"type\""))?;

    if kind == "GeometryCollection" {
        let members = value.get("geometries").and_then(Value::as_array)
            .ok_or_else(|| anyhow!("GeometryCollection is missing \"geometries\""))?;
        let geometries = members.iter().map(parse_geometry).collect::<Result<Vec<_>>>()?;
        return Ok(Geometry::GeometryCollection(GeometryCollection(geometries)));
    }

    let coords = value.get("coordinates")
        .ok_or_else(|| anyhow!("{kind} is missing \"coordinates\""))?;

    Ok(match kind {
        "Point" => Geometry::Point(Point(parse_coord(coords)?)),
        "MultiPoint" => Geometry::MultiPoint(MultiPoint(
            as_array(coords)?.iter().map(|c| parse_coord(c).map(Point)).collect::<Result<_>>()?
        )),
        "LineString" => Geometry::LineString(parse_line_string(coords)?),
        "MultiLineString" => Geometry::MultiLineString(MultiLineString(
            as_array(coords)?.iter().map(parse_line_string).collect::<Result<_>>()?
        )),
        "Polygon" => Geometry::Polygon(parse_polygon(coords)?),
        "MultiPolygon" => Geometry::MultiPolygon(MultiPolygon(
            as_array(coords)?.iter().map(parse_polygon).collect::<Result<_>>()?
        )),
        other => bail!("Unsupported geometry type: {other}"),
    })
}

fn as_array(value: &Value) -> Result<&Vec<Value>> {
    value.as_array().ok_or_else(|| anyhow!("coordinates must be an array"))
}

/// Parse a position: [x, y, ...]. Extra dimensions are ignored.
fn parse_coord(value: &Value) -> Result<Coord<f64>> {
    let position = as_array(value)?;
    if position.len() < 2 {
        bail!("position must have at least two elements");
    }
    let x = position[0].as_f64()
        .ok_or_else(|| anyhow!("Invalid coordinate: x must be a number"))?;
    let y = position[1].as_f64()
        .ok_or_else(|| anyhow!("Invalid coordinate: y must be a number"))?;
    Ok(Coord { x, y })
}

fn parse_line_string(value: &Value) -> Result<LineString<f64>> {
    Ok(LineString(as_array(value)?.iter().map(parse_coord).collect::<Result<_>>()?))
}

/// Parse polygon rings: the first is the exterior, the rest are holes.
fn parse_polygon(value: &Value) -> Result<Polygon<f64>> {
    let mut rings = as_array(value)?.iter().map(parse_ring);
    let exterior = match rings.next() {
        Some(ring) => ring?,
        None => LineString(Vec::new()),
    };
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn parse_ring(value: &Value) -> Result<LineString<f64>> {
    let mut ring = parse_line_string(value)?;
    // Ensure ring is closed (first point == last point)
    if let (Some(first), Some(last)) = (ring.0.first().copied(), ring.0.last().copied()) {
        if first != last {
            ring.0.push(first);
        }
    }
    Ok(ring)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_mixed_feature_collection() {
        let doc = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1.0, 2.0]}, "properties": {"name": "a"}},
                {"type": "Feature", "geometry": null, "properties": {"name": "b"}},
                {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}},
                {"type": "Feature", "geometry": {"type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 1]]]}, "properties": null}
            ]
        });
        let features = read_features_from_geojson_bytes(&serde_json::to_vec(&doc).unwrap()).unwrap();

        assert_eq!(features.len(), 4);
        assert!(matches!(features[0].geometry, Some(Geometry::Point(_))));
        assert!(features[1].geometry.is_none());
        assert!(matches!(features[2].geometry, Some(Geometry::LineString(_))));
        assert!(features[3].properties.is_empty());

        // Unclosed ring gets closed.
        let Some(Geometry::Polygon(polygon)) = &features[3].geometry else { panic!("expected polygon") };
        assert_eq!(polygon.exterior().0.first(), polygon.exterior().0.last());
    }

    #[test]
    fn parses_nested_collections() {
        let geometry = parse_geometry(&json!({
            "type": "GeometryCollection",
            "geometries": [
                {"type": "MultiPoint", "coordinates": [[0, 0], [1, 1]]},
                {"type": "MultiPolygon", "coordinates": [[[[0, 0], [1, 0], [1, 1], [0, 0]]]]}
            ]
        })).unwrap();
        let Geometry::GeometryCollection(collection) = geometry else { panic!("expected collection") };
        assert_eq!(collection.0.len(), 2);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(read_features_from_geojson_bytes(b"{not json").is_err());
        assert!(parse_geometry(&json!({"type": "Point", "coordinates": ["a", 1]})).is_err());
        assert!(parse_geometry(&json!({"type": "Curve", "coordinates": []})).is_err());
    }

    #[test]
    fn missing_features_is_empty() {
        let features = read_features_from_geojson_bytes(br#"{"type": "FeatureCollection"}"#).unwrap();
        assert!(features.is_empty());
    }
}
