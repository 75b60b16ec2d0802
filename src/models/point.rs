/// 2D point in image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    /// X coordinate
    pub x: f32,
    /// Y coordinate
    pub y: f32,
}

impl Point {
    /// Create a new point
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Cosine of the angle at `self` formed by the rays towards `a` and `b`.
    ///
    /// Returns `None` when either ray is degenerate.
    pub fn corner_cosine(&self, a: &Point, b: &Point) -> Option<f32> {
        let (v1x, v1y) = (a.x - self.x, a.y - self.y);
        let (v2x, v2y) = (b.x - self.x, b.y - self.y);
        let denom = (v1x * v1x + v1y * v1y).sqrt() * (v2x * v2x + v2y * v2y).sqrt();
        if denom == 0.0 {
            return None;
        }
        Some((v1x * v2x + v1y * v2y) / denom)
    }
}
