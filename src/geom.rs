//! Planar geometry primitives shared by the generation pipeline.
//!
//! Everything works in world units (f64). Angles are radians, measured
//! counter-clockwise from the positive x axis.

use std::ops::{Add, Mul, Neg, Sub};

/// A 2D point or direction vector in world space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// A vector with both components set to the same value.
    pub fn splat(value: f64) -> Self {
        Self { x: value, y: value }
    }

    pub fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    pub fn distance_to(self, other: Vec2) -> f64 {
        (other - self).length()
    }

    pub fn distance_squared_to(self, other: Vec2) -> f64 {
        (other - self).length_squared()
    }

    /// Unit vector in the same direction. Zero stays zero.
    pub fn normalized(self) -> Vec2 {
        let len = self.length();
        if len > 0.0 {
            Vec2::new(self.x / len, self.y / len)
        } else {
            Vec2::ZERO
        }
    }

    /// Rotate counter-clockwise by `angle` radians.
    pub fn rotated(self, angle: f64) -> Vec2 {
        let (sin, cos) = angle.sin_cos();
        Vec2::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    /// Angle of the direction from this point towards `other`.
    pub fn angle_to_point(self, other: Vec2) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    /// Unit vector pointing at `angle` radians.
    pub fn from_angle(angle: f64) -> Vec2 {
        let (sin, cos) = angle.sin_cos();
        Vec2::new(cos, sin)
    }

    /// 2D cross product (z component of the 3D cross product).
    pub fn cross(self, other: Vec2) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn dot(self, other: Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Perpendicular vector (90 degrees counter-clockwise).
    pub fn perpendicular(self) -> Vec2 {
        Vec2::new(-self.y, self.x)
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

/// Axis-aligned rectangle, `min` inclusive, `max` inclusive for containment.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn from_size(min: Vec2, size: Vec2) -> Self {
        Self { min, max: min + size }
    }

    /// Smallest rectangle containing all points. Empty input yields a
    /// degenerate rect at the origin.
    pub fn bounding(points: &[Vec2]) -> Rect {
        let mut min = Vec2::splat(f64::MAX);
        let mut max = Vec2::splat(f64::MIN);

        for point in points {
            min.x = min.x.min(point.x);
            min.y = min.y.min(point.y);
            max.x = max.x.max(point.x);
            max.y = max.y.max(point.y);
        }

        if points.is_empty() {
            return Rect::default();
        }

        Rect { min, max }
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Shrink the rectangle by `margin` on every side.
    pub fn inset(&self, margin: f64) -> Rect {
        Rect {
            min: self.min + Vec2::splat(margin),
            max: self.max - Vec2::splat(margin),
        }
    }

    /// Grow the rectangle by `margin` on every side.
    pub fn expanded(&self, margin: f64) -> Rect {
        self.inset(-margin)
    }

    /// Clamp a point into the rectangle.
    pub fn clamp(&self, point: Vec2) -> Vec2 {
        Vec2::new(
            point.x.clamp(self.min.x, self.max.x),
            point.y.clamp(self.min.y, self.max.y),
        )
    }
}

/// A line segment between two points.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Line {
    pub start: Vec2,
    pub end: Vec2,
}

impl Line {
    pub fn new(start: Vec2, end: Vec2) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> f64 {
        self.start.distance_to(self.end)
    }

    pub fn midpoint(&self) -> Vec2 {
        (self.start + self.end) * 0.5
    }

    /// Unit direction from start to end.
    pub fn direction(&self) -> Vec2 {
        (self.end - self.start).normalized()
    }

    pub fn bbox(&self) -> Rect {
        Rect::bounding(&[self.start, self.end])
    }

    /// Strict-interior segment intersection. Touching endpoints do not count,
    /// so chains of connected segments never report intersections with their
    /// own neighbors.
    pub fn intersection(&self, other: &Line) -> Option<Vec2> {
        let r = self.end - self.start;
        let s = other.end - other.start;
        let denom = r.cross(s);

        if denom == 0.0 {
            // parallel or degenerate
            return None;
        }

        let qp = other.start - self.start;
        let t = qp.cross(s) / denom;
        let u = qp.cross(r) / denom;

        if t > 0.0 && t < 1.0 && u > 0.0 && u < 1.0 {
            Some(self.start + r * t)
        } else {
            None
        }
    }

    pub fn intersects(&self, other: &Line) -> bool {
        self.intersection(other).is_some()
    }

    /// Distance from `point` to the closest position on the segment.
    pub fn distance_to_point(&self, point: Vec2) -> f64 {
        let dir = self.end - self.start;
        let len_sq = dir.length_squared();
        if len_sq == 0.0 {
            return self.start.distance_to(point);
        }

        let t = ((point - self.start).dot(dir) / len_sq).clamp(0.0, 1.0);
        (self.start + dir * t).distance_to(point)
    }
}

/// Cross product of OA and OB (O, A, B are points). Positive means B lies to
/// the left of the directed line O->A.
fn cross3(o: Vec2, a: Vec2, b: Vec2) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Convex hull of a point set using Andrew's monotone chain.
/// The result is in counter-clockwise order with collinear points dropped.
pub fn convex_hull(points: &[Vec2]) -> Vec<Vec2> {
    let mut points = points.to_vec();
    let n = points.len();
    if n <= 1 {
        return points;
    }

    // sort lexicographically (by x, then y)
    points.sort_by(|a, b| {
        a.x.partial_cmp(&b.x)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut lower: Vec<Vec2> = Vec::new();
    for &p in &points {
        while lower.len() >= 2 && cross3(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<Vec2> = Vec::new();
    for &p in points.iter().rev() {
        while upper.len() >= 2 && cross3(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    // drop the last point of each chain, it repeats the other chain's first
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Check whether `p` lies inside (or on the boundary of) a convex polygon
/// given in counter-clockwise order. Fewer than 3 vertices never contain
/// anything.
pub fn point_in_convex_hull(hull: &[Vec2], p: Vec2) -> bool {
    let n = hull.len();
    if n < 3 {
        return false;
    }

    for i in 0..n {
        let a = hull[i];
        let b = hull[(i + 1) % n];
        if cross3(a, b, p) < 0.0 {
            // point is to the right of edge a->b, outside the hull
            return false;
        }
    }

    true
}
