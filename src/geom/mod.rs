mod bbox;
mod clip;

pub(crate) use bbox::{envelope_of, BoundingBox};
pub(crate) use clip::clip_to_rect;

use geo::{Coord, Rect};

/// Smallest rectangle covering both inputs.
#[inline]
pub(crate) fn union_rect(a: Rect<f64>, b: Rect<f64>) -> Rect<f64> {
    Rect::new(
        Coord {
            x: a.min().x.min(b.min().x),
            y: a.min().y.min(b.min().y),
        },
        Coord {
            x: a.max().x.max(b.max().x),
            y: a.max().y.max(b.max().y),
        },
    )
}
