use geo::{
    BooleanOps, Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Point,
    Polygon, Rect,
};

/// Intersect a geometry with a rectangle.
///
/// Polygons are intersected as areas, lines are clipped as paths, and points
/// are kept when they lie inside or on the rectangle's boundary. Returns
/// `None` when nothing of the geometry survives.
pub(crate) fn clip_to_rect(geometry: &Geometry<f64>, rect: &Rect<f64>) -> Option<Geometry<f64>> {
    match geometry {
        Geometry::Point(point) => contains_inclusive(rect, point.0).then(|| Geometry::Point(*point)),
        Geometry::MultiPoint(points) => {
            let kept = points.iter()
                .filter(|point| contains_inclusive(rect, point.0))
                .copied()
                .collect::<Vec<Point<f64>>>();
            match kept.len() {
                0 => None,
                1 => Some(Geometry::Point(kept[0])),
                _ => Some(Geometry::MultiPoint(MultiPoint(kept))),
            }
        }
        Geometry::Line(line) => clip_lines(rect, MultiLineString(vec![LineString(vec![line.start, line.end])])),
        Geometry::LineString(line) => clip_lines(rect, MultiLineString(vec![line.clone()])),
        Geometry::MultiLineString(lines) => clip_lines(rect, lines.clone()),
        Geometry::Polygon(polygon) => clip_polygons(rect, polygon),
        Geometry::MultiPolygon(polygons) => clip_polygons(rect, polygons),
        Geometry::Rect(other) => clip_polygons(rect, &other.to_polygon()),
        Geometry::Triangle(triangle) => clip_polygons(rect, &triangle.to_polygon()),
        Geometry::GeometryCollection(collection) => {
            let kept = collection.iter()
                .filter_map(|member| clip_to_rect(member, rect))
                .collect::<Vec<_>>();
            (!kept.is_empty()).then(|| Geometry::GeometryCollection(GeometryCollection(kept)))
        }
    }
}

#[inline]
fn contains_inclusive(rect: &Rect<f64>, coord: Coord<f64>) -> bool {
    coord.x >= rect.min().x && coord.x <= rect.max().x
        && coord.y >= rect.min().y && coord.y <= rect.max().y
}

fn clip_lines(rect: &Rect<f64>, lines: MultiLineString<f64>) -> Option<Geometry<f64>> {
    let clipped = rect.to_polygon().clip(&lines, false);
    let mut kept = clipped.0.into_iter()
        .filter(|line| line.0.len() >= 2)
        .collect::<Vec<_>>();
    match kept.len() {
        0 => None,
        1 => kept.pop().map(Geometry::LineString),
        _ => Some(Geometry::MultiLineString(MultiLineString(kept))),
    }
}

fn clip_polygons<B>(rect: &Rect<f64>, shape: &B) -> Option<Geometry<f64>>
where
    B: BooleanOps<Scalar = f64>,
{
    let MultiPolygon(mut kept) = shape.intersection(&rect.to_polygon());
    kept.retain(|polygon: &Polygon<f64>| polygon.exterior().0.len() >= 4);
    match kept.len() {
        0 => None,
        1 => kept.pop().map(Geometry::Polygon),
        _ => Some(Geometry::MultiPolygon(MultiPolygon(kept))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Area, BoundingRect, coord, line_string, point, polygon};

    fn unit_rect() -> Rect<f64> {
        Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 })
    }

    #[test]
    fn polygon_is_cut_to_rect() {
        let square = polygon![(x: -1.0, y: -1.0), (x: 0.5, y: -1.0), (x: 0.5, y: 0.5), (x: -1.0, y: 0.5)];
        let clipped = clip_to_rect(&Geometry::Polygon(square), &unit_rect()).unwrap();

        let Geometry::Polygon(polygon) = &clipped else { panic!("expected a polygon, got {clipped:?}") };
        assert!((polygon.unsigned_area() - 0.25).abs() < 1e-9);
        let bounds = clipped.bounding_rect().unwrap();
        assert!(bounds.min().x >= 0.0 && bounds.max().x <= 0.5);
    }

    #[test]
    fn disjoint_polygon_vanishes() {
        let far = polygon![(x: 5.0, y: 5.0), (x: 6.0, y: 5.0), (x: 6.0, y: 6.0), (x: 5.0, y: 6.0)];
        assert!(clip_to_rect(&Geometry::Polygon(far), &unit_rect()).is_none());
    }

    #[test]
    fn line_is_clipped_at_edges() {
        let line = line_string![(x: -1.0, y: 0.5), (x: 2.0, y: 0.5)];
        let clipped = clip_to_rect(&Geometry::LineString(line), &unit_rect()).unwrap();

        let bounds = clipped.bounding_rect().unwrap();
        assert!((bounds.min().x - 0.0).abs() < 1e-9);
        assert!((bounds.max().x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn points_on_boundary_are_kept() {
        assert!(clip_to_rect(&Geometry::Point(point!(x: 1.0, y: 1.0)), &unit_rect()).is_some());
        assert!(clip_to_rect(&Geometry::Point(point!(x: 1.5, y: 0.5)), &unit_rect()).is_none());

        let points = MultiPoint(vec![point!(x: 0.5, y: 0.5), point!(x: 3.0, y: 3.0)]);
        let clipped = clip_to_rect(&Geometry::MultiPoint(points), &unit_rect());
        assert!(matches!(clipped, Some(Geometry::Point(_))));
    }
}
