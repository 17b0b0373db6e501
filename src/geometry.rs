use rstar::AABB;
use serde::Serialize;

/// A position on the map canvas. The save's `(x, z)` ground plane is mapped
/// to `(x, -z)` so that north points up.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Maps a save-file ground coordinate onto the canvas.
    pub fn from_save(x: f64, z: f64) -> Self {
        Self { x, y: -z }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Arithmetic mean of a set of points. `None` for an empty set.
pub fn centroid<'a, I>(points: I) -> Option<Point>
where
    I: IntoIterator<Item = &'a Point>,
{
    let mut count = 0usize;
    let (sum_x, sum_y) = points.into_iter().fold((0.0, 0.0), |acc, p| {
        count += 1;
        (acc.0 + p.x, acc.1 + p.y)
    });
    if count == 0 {
        return None;
    }
    Some(Point::new(sum_x / count as f64, sum_y / count as f64))
}

/// Axis-aligned rectangle, `x1 <= x2` and `y1 <= y2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Rect {
    pub fn centered(center: Point, width: f64, height: f64) -> Self {
        Self {
            x1: center.x - width / 2.0,
            y1: center.y - height / 2.0,
            x2: center.x + width / 2.0,
            y2: center.y + height / 2.0,
        }
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Overlapping region of two rectangles. Rectangles that only touch do
    /// not intersect.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x1 = self.x1.max(other.x1);
        let x2 = self.x2.min(other.x2);
        let y1 = self.y1.max(other.y1);
        let y2 = self.y2.min(other.y2);
        if x1 < x2 && y1 < y2 {
            Some(Rect { x1, y1, x2, y2 })
        } else {
            None
        }
    }

    pub fn overlap_area(&self, other: &Rect) -> f64 {
        self.intersection(other).map_or(0.0, |r| r.area())
    }

    pub fn envelope(&self) -> AABB<[f64; 2]> {
        AABB::from_corners([self.x1, self.y1], [self.x2, self.y2])
    }
}
