//! Points and bounding boxes.

use crate::util::to_numbers;

/// A 2D point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Parse `"x y"` or `"x,y"`; missing coordinates take `default`.
    pub fn parse(s: &str, default: f64) -> Self {
        let numbers = to_numbers(s);
        Self::new(
            numbers.first().copied().unwrap_or(default),
            numbers.get(1).copied().unwrap_or(default),
        )
    }

    /// Parse a scale pair; a single value scales both axes.
    pub fn parse_scale(s: &str, default: f64) -> Self {
        let numbers = to_numbers(s);
        let x = numbers.first().copied().unwrap_or(default);
        Self::new(x, numbers.get(1).copied().unwrap_or(x))
    }

    /// Parse a `points` list. A trailing unpaired coordinate is dropped.
    pub fn parse_path(s: &str) -> Vec<Point> {
        to_numbers(s)
            .chunks_exact(2)
            .map(|pair| Point::new(pair[0], pair[1]))
            .collect()
    }

    /// Angle of the vector from `self` to `other`, in radians.
    pub fn angle_to(&self, other: &Point) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Point {
        Point::new(self.x + dx, self.y + dy)
    }

    /// Map through a `[a, b, c, d, e, f]` matrix in place.
    pub fn apply_transform(&mut self, m: &[f64; 6]) {
        let x = self.x * m[0] + self.y * m[2] + m[4];
        let y = self.x * m[1] + self.y * m[3] + m[5];
        self.x = x;
        self.y = y;
    }
}

/// An axis-aligned box grown point by point.
///
/// A fresh box is empty: it reports zero size and the first point added sets both extrema.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    x_range: Option<(f64, f64)>,
    y_range: Option<(f64, f64)>,
}

impl BoundingBox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_corners(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let mut bb = Self::new();
        bb.add_point(x1, y1);
        bb.add_point(x2, y2);
        bb
    }

    pub fn is_empty(&self) -> bool {
        self.x_range.is_none() || self.y_range.is_none()
    }

    pub fn x(&self) -> f64 {
        self.x_range.map_or(0.0, |(min, _)| min)
    }

    pub fn y(&self) -> f64 {
        self.y_range.map_or(0.0, |(min, _)| min)
    }

    pub fn x2(&self) -> f64 {
        self.x_range.map_or(0.0, |(_, max)| max)
    }

    pub fn y2(&self) -> f64 {
        self.y_range.map_or(0.0, |(_, max)| max)
    }

    pub fn width(&self) -> f64 {
        self.x_range.map_or(0.0, |(min, max)| max - min)
    }

    pub fn height(&self) -> f64 {
        self.y_range.map_or(0.0, |(min, max)| max - min)
    }

    pub fn add_point(&mut self, x: f64, y: f64) {
        self.add_x(x);
        self.add_y(y);
    }

    pub fn add_x(&mut self, x: f64) {
        extend(&mut self.x_range, x);
    }

    pub fn add_y(&mut self, y: f64) {
        extend(&mut self.y_range, y);
    }

    /// Grow to cover another box. Empty boxes change nothing.
    pub fn add_bounding_box(&mut self, other: &BoundingBox) {
        if let Some((min, max)) = other.x_range {
            self.add_x(min);
            self.add_x(max);
        }
        if let Some((min, max)) = other.y_range {
            self.add_y(min);
            self.add_y(max);
        }
    }

    /// Grow to cover a cubic bezier, including its extrema between the end points.
    #[allow(clippy::too_many_arguments)]
    pub fn add_bezier_curve(
        &mut self,
        p0x: f64,
        p0y: f64,
        p1x: f64,
        p1y: f64,
        p2x: f64,
        p2y: f64,
        p3x: f64,
        p3y: f64,
    ) {
        self.add_point(p0x, p0y);
        self.add_point(p3x, p3y);
        for t in cubic_extrema(p0x, p1x, p2x, p3x) {
            self.add_x(sum_cubic(t, p0x, p1x, p2x, p3x));
        }
        for t in cubic_extrema(p0y, p1y, p2y, p3y) {
            self.add_y(sum_cubic(t, p0y, p1y, p2y, p3y));
        }
    }

    /// Grow to cover a quadratic bezier by elevating it to a cubic.
    pub fn add_quadratic_curve(
        &mut self,
        p0x: f64,
        p0y: f64,
        p1x: f64,
        p1y: f64,
        p2x: f64,
        p2y: f64,
    ) {
        let cp1x = p0x + 2.0 / 3.0 * (p1x - p0x);
        let cp1y = p0y + 2.0 / 3.0 * (p1y - p0y);
        let cp2x = cp1x + 1.0 / 3.0 * (p2x - p0x);
        let cp2y = cp1y + 1.0 / 3.0 * (p2y - p0y);
        self.add_bezier_curve(p0x, p0y, cp1x, cp1y, cp2x, cp2y, p2x, p2y);
    }

    pub fn is_point_in_box(&self, x: f64, y: f64) -> bool {
        match (self.x_range, self.y_range) {
            (Some((x1, x2)), Some((y1, y2))) => x1 <= x && x <= x2 && y1 <= y && y <= y2,
            _ => false,
        }
    }
}

fn extend(range: &mut Option<(f64, f64)>, v: f64) {
    if v.is_nan() {
        return;
    }
    *range = Some(match *range {
        Some((min, max)) => (min.min(v), max.max(v)),
        None => (v, v),
    });
}

fn sum_cubic(t: f64, p0: f64, p1: f64, p2: f64, p3: f64) -> f64 {
    let mt = 1.0 - t;
    mt.powi(3) * p0 + 3.0 * mt.powi(2) * t * p1 + 3.0 * mt * t.powi(2) * p2 + t.powi(3) * p3
}

/// Parameters in (0, 1) where the derivative of a 1D cubic vanishes.
fn cubic_extrema(p0: f64, p1: f64, p2: f64, p3: f64) -> Vec<f64> {
    let b = 6.0 * p0 - 12.0 * p1 + 6.0 * p2;
    let a = -3.0 * p0 + 9.0 * p1 - 9.0 * p2 + 3.0 * p3;
    let c = 3.0 * p1 - 3.0 * p0;
    let inside = |t: &f64| 0.0 < *t && *t < 1.0;

    if a == 0.0 {
        if b == 0.0 {
            return Vec::new();
        }
        return [-c / b].into_iter().filter(inside).collect();
    }

    let discriminant = b * b - 4.0 * c * a;
    if discriminant < 0.0 {
        return Vec::new();
    }
    let root = discriminant.sqrt();
    [(-b + root) / (2.0 * a), (-b - root) / (2.0 * a)]
        .into_iter()
        .filter(inside)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_point_parse() {
        assert_eq!(Point::parse("10, 20", 0.0), Point::new(10.0, 20.0));
        assert_eq!(Point::parse("5", 0.0), Point::new(5.0, 0.0));
        assert_eq!(Point::parse_scale("2", 1.0), Point::new(2.0, 2.0));
        assert_eq!(Point::parse_scale("", 1.0), Point::new(1.0, 1.0));
    }

    #[test]
    fn test_point_parse_path() {
        let points = Point::parse_path("10,20 30,40 50");
        assert_eq!(points, vec![Point::new(10.0, 20.0), Point::new(30.0, 40.0)]);
    }

    #[test]
    fn test_angle_to() {
        let origin = Point::new(0.0, 0.0);
        assert_eq!(origin.angle_to(&Point::new(1.0, 0.0)), 0.0);
        assert_eq!(origin.angle_to(&Point::new(0.0, 1.0)), FRAC_PI_2);
        assert_eq!(origin.angle_to(&Point::new(-1.0, 0.0)), PI);
    }

    #[test]
    fn test_apply_transform() {
        let mut p = Point::new(1.0, 1.0);
        p.apply_transform(&[2.0, 0.0, 0.0, 2.0, 10.0, 20.0]);
        assert_eq!(p, Point::new(12.0, 22.0));
        assert_eq!(p.translate(-2.0, -2.0), Point::new(10.0, 20.0));
    }

    #[test]
    fn test_empty_box() {
        let bb = BoundingBox::new();
        assert!(bb.is_empty());
        assert_eq!(bb.width(), 0.0);
        assert_eq!(bb.height(), 0.0);
        assert!(!bb.is_point_in_box(0.0, 0.0));
    }

    #[test]
    fn test_empty_box_does_not_corrupt_extrema() {
        let mut bb = BoundingBox::new();
        bb.add_bounding_box(&BoundingBox::new());
        bb.add_point(5.0, 5.0);
        bb.add_point(f64::NAN, 7.0);
        bb.add_bounding_box(&BoundingBox::from_corners(10.0, 10.0, 20.0, 15.0));
        assert_eq!((bb.x(), bb.y(), bb.width(), bb.height()), (5.0, 5.0, 15.0, 10.0));
        assert!(bb.is_point_in_box(6.0, 6.0));
    }

    #[test]
    fn test_bezier_extrema() {
        let mut bb = BoundingBox::new();
        // symmetric arch peaking at y = -75
        bb.add_bezier_curve(0.0, 0.0, 0.0, -100.0, 100.0, -100.0, 100.0, 0.0);
        assert_eq!(bb.x(), 0.0);
        assert_eq!(bb.x2(), 100.0);
        assert!((bb.y() + 75.0).abs() < 1e-9);
        assert_eq!(bb.y2(), 0.0);
    }

    #[test]
    fn test_quadratic_extrema() {
        let mut bb = BoundingBox::new();
        bb.add_quadratic_curve(0.0, 0.0, 50.0, 100.0, 100.0, 0.0);
        assert!((bb.y2() - 50.0).abs() < 1e-9);
        assert_eq!(bb.width(), 100.0);
    }
}
