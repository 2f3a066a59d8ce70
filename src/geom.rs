use euclid::TypedPoint2D;

/// Unit of measure for map-space coordinates.
pub struct MapSpace;

pub type Coord = f64;
pub type Point = TypedPoint2D<Coord, MapSpace>;

/// Axis-aligned rectangle in map space.  Field order follows the on-disk
/// node bounding boxes.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundBox {
    pub top: Coord,
    pub bottom: Coord,
    pub left: Coord,
    pub right: Coord,
}

impl BoundBox {
    /// An inverted box; growing it absorbs the first point added.
    pub fn inverted() -> BoundBox {
        BoundBox {
            top: ::std::f64::NEG_INFINITY,
            bottom: ::std::f64::INFINITY,
            left: ::std::f64::INFINITY,
            right: ::std::f64::NEG_INFINITY,
        }
    }

    pub fn add(&mut self, point: Point) {
        if point.x < self.left {
            self.left = point.x;
        }
        if point.x > self.right {
            self.right = point.x;
        }
        if point.y < self.bottom {
            self.bottom = point.y;
        }
        if point.y > self.top {
            self.top = point.y;
        }
    }
}

/// A sector's extent on the blockmap grid, clamped to the map's blocks.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BlockBox {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}
