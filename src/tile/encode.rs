use std::f64::consts::PI;

use anyhow::Result;
use geo::{Coord, Geometry, LineString, Polygon};
use mvt::{GeomData, GeomEncoder, GeomType, Tile};

use crate::layer::{Attributes, QueryHit};
use crate::tile::{TileCoord, MAX_LATITUDE};

/// Side length of the tile-local integer coordinate space.
pub const EXTENT: u32 = 4096;

/// The features one layer contributes to a single tile.
#[derive(Debug)]
pub struct TileLayer<'a> {
    pub name: &'a str,
    pub hits: Vec<QueryHit<'a>>,
}

/// Convert longitude to Web Mercator X coordinate (in radians)
fn lon_to_mercator_x(lon: f64) -> f64 { lon.to_radians() }

/// Convert latitude to Web Mercator Y coordinate (in radians)
fn lat_to_mercator_y(lat: f64) -> f64 {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE);
    (PI / 4.0 + lat.to_radians() / 2.0).tan().ln()
}

/// A tile's extent in Web Mercator coordinates, used to quantize lon/lat into tile space.
#[derive(Debug, Clone, Copy)]
struct TileFrame {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
    extent: f64,
}

impl TileFrame {
    fn new(tile: TileCoord, extent: u32) -> Self {
        let n = tile.dim() as f64;
        Self {
            min_x: (tile.x as f64 / n) * 2.0 * PI - PI,
            max_x: ((tile.x as f64 + 1.0) / n) * 2.0 * PI - PI,
            min_y: PI - ((tile.y as f64 + 1.0) / n) * 2.0 * PI,
            max_y: PI - (tile.y as f64 / n) * 2.0 * PI,
            extent: extent as f64,
        }
    }

    /// Convert world coordinates to rounded tile coordinates (0-extent).
    fn project(&self, coord: Coord<f64>) -> (f64, f64) {
        let merc_x = lon_to_mercator_x(coord.x);
        let merc_y = lat_to_mercator_y(coord.y);

        // Y in MVT: 0 = top of tile (north), extent = bottom of tile (south)
        let tile_x = ((merc_x - self.min_x) / (self.max_x - self.min_x)) * self.extent;
        let tile_y = self.extent - ((merc_y - self.min_y) / (self.max_y - self.min_y)) * self.extent;

        (tile_x.round(), tile_y.round())
    }

    fn project_path(&self, line: &LineString<f64>) -> Vec<(f64, f64)> {
        dedup_consecutive(line.coords()
            .filter(|coord| coord.x.is_finite() && coord.y.is_finite())
            .map(|coord| self.project(*coord))
            .collect())
    }
}

/// Drop repeated vertices that rounding collapsed onto each other.
fn dedup_consecutive(mut points: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    points.dedup();
    points
}

/// Calculate signed area of a ring (for winding order detection).
/// In tile coordinates (Y down) a positive area means clockwise.
fn ring_signed_area(ring: &[(f64, f64)]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut area = 0.0;
    for i in 0..ring.len() {
        let j = (i + 1) % ring.len();
        area += ring[i].0 * ring[j].1;
        area -= ring[j].0 * ring[i].1;
    }
    area / 2.0
}

/// Clean a ring: remove the closing duplicate and A-B-A backtracks, require 3 distinct points.
fn clean_ring(mut ring: Vec<(f64, f64)>) -> Vec<(f64, f64)> {
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }

    let mut cleaned: Vec<(f64, f64)> = Vec::with_capacity(ring.len());
    for point in ring {
        if cleaned.len() >= 2 && cleaned[cleaned.len() - 2] == point {
            cleaned.pop();
            continue;
        }
        if cleaned.last() != Some(&point) {
            cleaned.push(point);
        }
    }

    if cleaned.len() < 3 || ring_signed_area(&cleaned) == 0.0 {
        return Vec::new();
    }
    cleaned
}

/// MVT wants outer rings clockwise and holes counter-clockwise in tile coordinates.
fn ensure_winding_order(ring: Vec<(f64, f64)>, is_hole: bool) -> Vec<(f64, f64)> {
    let is_clockwise = ring_signed_area(&ring) > 0.0;
    if is_clockwise == is_hole {
        ring.into_iter().rev().collect()
    } else {
        ring
    }
}

/// Split a geometry into the three MVT geometry kinds.
#[derive(Default)]
struct Parts {
    points: Vec<Coord<f64>>,
    lines: Vec<LineString<f64>>,
    polygons: Vec<Polygon<f64>>,
}

impl Parts {
    fn collect(geometry: &Geometry<f64>, parts: &mut Self) {
        match geometry {
            Geometry::Point(point) => parts.points.push(point.0),
            Geometry::MultiPoint(points) => parts.points.extend(points.iter().map(|p| p.0)),
            Geometry::Line(line) => parts.lines.push(LineString(vec![line.start, line.end])),
            Geometry::LineString(line) => parts.lines.push(line.clone()),
            Geometry::MultiLineString(lines) => parts.lines.extend(lines.iter().cloned()),
            Geometry::Polygon(polygon) => parts.polygons.push(polygon.clone()),
            Geometry::MultiPolygon(polygons) => parts.polygons.extend(polygons.iter().cloned()),
            Geometry::Rect(rect) => parts.polygons.push(rect.to_polygon()),
            Geometry::Triangle(triangle) => parts.polygons.push(triangle.to_polygon()),
            Geometry::GeometryCollection(collection) => {
                for member in collection.iter() {
                    Self::collect(member, parts);
                }
            }
        }
    }
}

/// Encode one geometry into zero or more MVT geometries (one per kind present).
fn encode_geometry(geometry: &Geometry<f64>, frame: &TileFrame) -> Result<Vec<GeomData>> {
    let mut parts = Parts::default();
    Parts::collect(geometry, &mut parts);

    let mut encoded = Vec::new();

    let points = dedup_consecutive(parts.points.iter()
        .filter(|coord| coord.x.is_finite() && coord.y.is_finite())
        .map(|coord| frame.project(*coord))
        .collect());
    if !points.is_empty() {
        let mut encoder = GeomEncoder::new(GeomType::Point);
        for (x, y) in points {
            encoder = encoder.point(x, y)?;
        }
        encoded.push(encoder.encode()?);
    }

    let lines = parts.lines.iter()
        .map(|line| frame.project_path(line))
        .filter(|line| line.len() >= 2)
        .collect::<Vec<_>>();
    if !lines.is_empty() {
        let mut encoder = GeomEncoder::new(GeomType::Linestring);
        for line in lines {
            for (x, y) in line {
                encoder = encoder.point(x, y)?;
            }
            encoder = encoder.complete()?;
        }
        encoded.push(encoder.encode()?);
    }

    let mut rings_written = 0;
    let mut encoder = GeomEncoder::new(GeomType::Polygon);
    for polygon in &parts.polygons {
        let exterior = clean_ring(frame.project_path(polygon.exterior()));
        if exterior.is_empty() {
            continue;
        }
        for (x, y) in ensure_winding_order(exterior, false) {
            encoder = encoder.point(x, y)?;
        }
        encoder = encoder.complete()?;
        rings_written += 1;

        for interior in polygon.interiors() {
            let hole = clean_ring(frame.project_path(interior));
            if hole.is_empty() {
                continue;
            }
            for (x, y) in ensure_winding_order(hole, true) {
                encoder = encoder.point(x, y)?;
            }
            encoder = encoder.complete()?;
        }
    }
    if rings_written > 0 {
        encoded.push(encoder.encode()?);
    }

    Ok(encoded)
}

fn add_tags(feature: &mut mvt::Feature, attributes: &Attributes) {
    for (key, value) in attributes {
        feature.add_tag_string(key, value);
    }
}

/// Encode the layers' hits for `tile` into an MVT payload.
///
/// Every layer with at least one hit is written, even when quantization
/// collapses all of its geometries. Returns `None` only when no layer has hits.
pub fn encode_tile(tile: TileCoord, layers: &[TileLayer<'_>]) -> Result<Option<Vec<u8>>> {
    let frame = TileFrame::new(tile, EXTENT);
    let mut mvt_tile = Tile::new(EXTENT);
    let mut layers_written = 0;

    for layer in layers.iter().filter(|layer| !layer.hits.is_empty()) {
        let mut mvt_layer = mvt_tile.create_layer(layer.name);
        for hit in &layer.hits {
            for geom_data in encode_geometry(&hit.geometry, &frame)? {
                let mut feature = mvt_layer.into_feature(geom_data);
                feature.set_id(hit.id as u64);
                add_tags(&mut feature, hit.attributes);
                mvt_layer = feature.into_layer();
            }
        }
        mvt_tile.add_layer(mvt_layer)?;
        layers_written += 1;
    }

    if layers_written == 0 {
        return Ok(None);
    }
    Ok(Some(mvt_tile.to_bytes()?))
}
