use std::{collections::BTreeSet, f64::consts::PI, fmt};

use geo::{Coord, Rect};
use serde::{Deserialize, Serialize};

/// Highest zoom level the builder and store accept.
pub const MAX_ZOOM: u8 = 24;

/// Latitude limit of the spherical mercator square.
pub(crate) const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Nudge applied to east/south edges so boxes ending on a tile edge stay in the tile.
const EDGE_EPSILON: f64 = 1e-11;

/// A tile in the XYZ scheme: origin top-left, `x` and `y` in `[0, 2^z)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u8, x: u32, y: u32) -> Self { Self { z, x, y } }

    /// Number of tiles along one axis at this zoom.
    #[inline]
    pub fn dim(&self) -> u64 { tiles_per_axis(self.z) }

    /// Whether `x` and `y` fall inside the grid for `z`.
    pub fn is_valid(&self) -> bool {
        self.z <= MAX_ZOOM && (self.x as u64) < self.dim() && (self.y as u64) < self.dim()
    }

    /// Row of this tile in TMS (bottom-left origin) addressing.
    #[inline]
    pub fn tms_row(&self) -> u32 { flip_row(self.y, self.z) }

    /// Build an XYZ coordinate from a stored TMS row.
    #[inline]
    pub fn from_tms(z: u8, x: u32, tms_row: u32) -> Self { Self { z, x, y: flip_row(tms_row, z) } }

    /// Geographic bounds (west, south, east, north) of this tile.
    pub fn bounds(&self) -> Rect<f64> {
        let n = self.dim() as f64;
        let west = self.x as f64 / n * 360.0 - 180.0;
        let east = (self.x as f64 + 1.0) / n * 360.0 - 180.0;
        let north = row_to_lat(self.y as f64, n);
        let south = row_to_lat(self.y as f64 + 1.0, n);
        Rect::new(Coord { x: west, y: south }, Coord { x: east, y: north })
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

#[inline]
fn tiles_per_axis(z: u8) -> u64 { 1u64 << z }

/// Convert a row between XYZ and TMS addressing. The conversion is its own inverse.
#[inline]
pub fn flip_row(row: u32, z: u8) -> u32 {
    (tiles_per_axis(z) - 1 - row as u64) as u32
}

/// Latitude of the top edge of the given (fractional) row.
fn row_to_lat(row: f64, n: f64) -> f64 {
    (PI * (1.0 - 2.0 * row / n)).sinh().atan().to_degrees()
}

/// Convert longitude to tile X coordinate at a given zoom level
fn lon_to_tile_x(lon: f64, zoom: u8) -> u32 {
    let n = tiles_per_axis(zoom) as f64;
    let x = ((lon + 180.0) / 360.0 * n).floor();
    x.clamp(0.0, n - 1.0) as u32
}

/// Convert latitude to tile Y coordinate at a given zoom level
fn lat_to_tile_y(lat: f64, zoom: u8) -> u32 {
    let n = tiles_per_axis(zoom) as f64;
    let lat_rad = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n).floor();
    y.clamp(0.0, n - 1.0) as u32
}

/// Tiles at `zoom` whose footprint intersects a (west, south, east, north) box.
pub fn tiles_covering(bbox: &Rect<f64>, zoom: u8) -> impl Iterator<Item = TileCoord> {
    let (west, south) = (bbox.min().x.max(-180.0), bbox.min().y);
    let (east, north) = (bbox.max().x.min(180.0), bbox.max().y);

    let min_x = lon_to_tile_x(west, zoom);
    let max_x = lon_to_tile_x((east - EDGE_EPSILON).max(west), zoom);
    let min_y = lat_to_tile_y(north, zoom);
    let max_y = lat_to_tile_y((south + EDGE_EPSILON).min(north), zoom);

    (min_x..=max_x).flat_map(move |x| (min_y..=max_y).map(move |y| TileCoord::new(zoom, x, y)))
}

/// Deduplicated, sorted set of tiles covering any of the boxes at any zoom in the range.
pub fn candidate_tiles<'a, I>(boxes: I, min_zoom: u8, max_zoom: u8) -> BTreeSet<TileCoord>
where
    I: IntoIterator<Item = &'a Rect<f64>>,
{
    let mut tiles = BTreeSet::new();
    for bbox in boxes {
        for zoom in min_zoom..=max_zoom {
            tiles.extend(tiles_covering(bbox, zoom));
        }
    }
    tiles
}
