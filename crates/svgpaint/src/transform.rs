//! Transform lists: parsing, applying to a context, and mapping single points.

use svgpaint_canvas::{Matrix, RenderingContext2D};
use tracing::trace;

use crate::document::Document;
use crate::element::Element;
use crate::geometry::Point;
use crate::screen::Axis;
use crate::util::{compress_spaces, to_numbers, PSEUDO_ZERO};

/// One affine operation of a transform list.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformOp {
    Translate(Point),
    /// Angle in degrees around an optional center.
    Rotate { angle: f64, cx: f64, cy: f64 },
    Scale(Point),
    Matrix([f64; 6]),
    /// Angles in degrees.
    Skew { ax: f64, ay: f64 },
    SkewX(f64),
    SkewY(f64),
}

impl TransformOp {
    /// Parse one `name(args)` entry, `None` for unknown names.
    pub fn parse(name: &str, args: &str) -> Option<Self> {
        let numbers = to_numbers(args);
        let arg = |i: usize| numbers.get(i).copied().unwrap_or(0.0);
        let op = match name.trim() {
            "translate" => TransformOp::Translate(Point::parse(args, 0.0)),
            "rotate" => TransformOp::Rotate {
                angle: arg(0),
                cx: arg(1),
                cy: arg(2),
            },
            "scale" => {
                let scale = Point::parse_scale(args, 1.0);
                let guard = |v: f64| if v == 0.0 { PSEUDO_ZERO } else { v };
                TransformOp::Scale(Point::new(guard(scale.x), guard(scale.y)))
            }
            "matrix" => TransformOp::Matrix([arg(0), arg(1), arg(2), arg(3), arg(4), arg(5)]),
            "skew" => TransformOp::Skew {
                ax: arg(0),
                ay: arg(1),
            },
            "skewX" => TransformOp::SkewX(arg(0)),
            "skewY" => TransformOp::SkewY(arg(0)),
            _ => return None,
        };
        Some(op)
    }

    /// Matrix of the operation with the origin folded in.
    pub fn matrix(&self, origin: (f64, f64)) -> Matrix {
        let local = match *self {
            TransformOp::Translate(p) => return Matrix::translate(p.x, p.y),
            TransformOp::Rotate { angle, cx, cy } => Matrix::translate(cx, cy)
                .multiply(&Matrix::rotate(angle.to_radians()))
                .multiply(&Matrix::translate(-cx, -cy)),
            TransformOp::Scale(p) => Matrix::scale(p.x, p.y),
            TransformOp::Matrix(m) => Matrix::from_array(m),
            TransformOp::Skew { ax, ay } => skew_matrix(ax, ay),
            TransformOp::SkewX(a) => skew_matrix(a, 0.0),
            TransformOp::SkewY(a) => skew_matrix(0.0, a),
        };
        let (tx, ty) = origin;
        Matrix::translate(tx, ty)
            .multiply(&local)
            .multiply(&Matrix::translate(-tx, -ty))
    }

    pub fn apply(&self, ctx: &mut dyn RenderingContext2D, origin: (f64, f64)) {
        let (tx, ty) = origin;
        match *self {
            TransformOp::Translate(p) => ctx.translate(p.x, p.y),
            TransformOp::Rotate { angle, cx, cy } => {
                ctx.translate(tx, ty);
                ctx.translate(cx, cy);
                ctx.rotate(angle.to_radians());
                ctx.translate(-cx, -cy);
                ctx.translate(-tx, -ty);
            }
            TransformOp::Scale(p) => {
                ctx.translate(tx, ty);
                ctx.scale(p.x, p.y);
                ctx.translate(-tx, -ty);
            }
            _ => {
                let [a, b, c, d, e, f] = self.matrix((0.0, 0.0)).to_array();
                ctx.translate(tx, ty);
                ctx.transform(a, b, c, d, e, f);
                ctx.translate(-tx, -ty);
            }
        }
    }

    /// Undo exactly what `apply` did.
    pub fn unapply(&self, ctx: &mut dyn RenderingContext2D, origin: (f64, f64)) {
        let (tx, ty) = origin;
        match *self {
            TransformOp::Translate(p) => ctx.translate(-p.x, -p.y),
            TransformOp::Rotate { angle, cx, cy } => {
                ctx.translate(tx, ty);
                ctx.translate(cx, cy);
                ctx.rotate(-angle.to_radians());
                ctx.translate(-cx, -cy);
                ctx.translate(-tx, -ty);
            }
            TransformOp::Scale(p) => {
                ctx.translate(tx, ty);
                ctx.scale(1.0 / p.x, 1.0 / p.y);
                ctx.translate(-tx, -ty);
            }
            _ => {
                let Some(inverse) = self.matrix((0.0, 0.0)).inverse() else {
                    trace!(op = ?self, "Singular transform left applied");
                    return;
                };
                let [a, b, c, d, e, f] = inverse.to_array();
                ctx.translate(tx, ty);
                ctx.transform(a, b, c, d, e, f);
                ctx.translate(-tx, -ty);
            }
        }
    }

    pub fn apply_to_point(&self, point: &mut Point, origin: (f64, f64)) {
        point.apply_transform(&self.matrix(origin).to_array());
    }

    /// Map a point through the inverse operation. Singular operations leave it unchanged.
    pub fn unapply_to_point(&self, point: &mut Point, origin: (f64, f64)) {
        if let Some(inverse) = self.matrix(origin).inverse() {
            point.apply_transform(&inverse.to_array());
        }
    }
}

fn skew_matrix(ax: f64, ay: f64) -> Matrix {
    Matrix::new(
        1.0,
        ay.to_radians().tan(),
        ax.to_radians().tan(),
        1.0,
        0.0,
        0.0,
    )
}

/// Split a transform list into `(name, args)` entries.
fn split_transform_list(transform: &str) -> Vec<(String, String)> {
    let compressed = compress_spaces(transform);

    // Normalize separators: `)x` and `),` both become `) `.
    let mut normalized = String::with_capacity(compressed.len() + 8);
    let mut chars = compressed.chars().peekable();
    while let Some(c) = chars.next() {
        normalized.push(c);
        if c != ')' {
            continue;
        }
        while matches!(chars.peek(), Some(' ')) {
            chars.next();
        }
        if matches!(chars.peek(), Some(',')) {
            chars.next();
            while matches!(chars.peek(), Some(' ')) {
                chars.next();
            }
        }
        if chars.peek().is_some() {
            normalized.push(' ');
        }
    }

    // Entries start at a space followed by a lowercase letter.
    let mut entries = Vec::new();
    let mut start = 0;
    let bytes = normalized.as_bytes();
    for i in 0..bytes.len() {
        if bytes[i] == b' ' && bytes.get(i + 1).is_some_and(|b| b.is_ascii_lowercase()) {
            entries.push(&normalized[start..i]);
            start = i + 1;
        }
    }
    entries.push(&normalized[start..]);

    entries
        .into_iter()
        .map(str::trim)
        .filter(|entry| !entry.is_empty() && *entry != "none")
        .map(|entry| match entry.split_once('(') {
            Some((name, args)) => (name.trim().to_string(), args.to_string()),
            None => (entry.to_string(), String::new()),
        })
        .collect()
}

/// An ordered list of affine operations with a shared origin.
///
/// `apply` runs the operations left to right against the context and `unapply` undoes
/// them right to left, so `apply` followed by `unapply` restores the context transform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transform {
    ops: Vec<TransformOp>,
    origin: (f64, f64),
}

impl Transform {
    /// Parse a transform list. Unknown functions are skipped.
    pub fn parse(transform: &str, origin: (f64, f64)) -> Self {
        let ops = split_transform_list(transform)
            .into_iter()
            .filter_map(|(name, args)| {
                let op = TransformOp::parse(&name, &args);
                if op.is_none() {
                    trace!(name = %name, "Skipping unknown transform function");
                }
                op
            })
            .collect();
        Self { ops, origin }
    }

    /// Build from an element's `transform` and `transform-origin` styles.
    pub fn from_element(document: &Document, element: &Element) -> Option<Self> {
        let transform = element.get_style(document, "transform", true);
        if !transform.has_value() {
            return None;
        }

        let origin = element.get_style(document, "transform-origin", true);
        let origin = if origin.has_value() {
            let parts = origin.split();
            let x = parts.first().map_or(0.0, |p| p.get_pixels(Some(Axis::X), false));
            let y = parts
                .get(1)
                .or_else(|| parts.first())
                .map_or(0.0, |p| p.get_pixels(Some(Axis::Y), false));
            (x, y)
        } else {
            (0.0, 0.0)
        };

        Some(Self::parse(transform.get_string(), origin))
    }

    pub fn ops(&self) -> &[TransformOp] {
        &self.ops
    }

    pub fn origin(&self) -> (f64, f64) {
        self.origin
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Combined matrix of the whole list.
    pub fn matrix(&self) -> Matrix {
        self.ops
            .iter()
            .fold(Matrix::identity(), |acc, op| acc.multiply(&op.matrix(self.origin)))
    }

    pub fn apply(&self, ctx: &mut dyn RenderingContext2D) {
        for op in &self.ops {
            op.apply(ctx, self.origin);
        }
    }

    pub fn unapply(&self, ctx: &mut dyn RenderingContext2D) {
        for op in self.ops.iter().rev() {
            op.unapply(ctx, self.origin);
        }
    }

    pub fn apply_to_point(&self, point: &mut Point) {
        for op in self.ops.iter().rev() {
            op.apply_to_point(point, self.origin);
        }
    }

    pub fn unapply_to_point(&self, point: &mut Point) {
        for op in &self.ops {
            op.unapply_to_point(point, self.origin);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use svgpaint_canvas::CanvasRenderingContext2D;

    fn mapped(transform: &str, x: f64, y: f64) -> Point {
        let mut point = Point::new(x, y);
        Transform::parse(transform, (0.0, 0.0)).apply_to_point(&mut point);
        point
    }

    fn assert_close(point: Point, x: f64, y: f64) {
        assert!(
            (point.x - x).abs() < 1e-9 && (point.y - y).abs() < 1e-9,
            "({}, {}) != ({}, {})",
            point.x,
            point.y,
            x,
            y
        );
    }

    #[test]
    fn test_translate_then_scale_maps_points() {
        assert_close(mapped("translate(10,20) scale(2)", 0.0, 0.0), 10.0, 20.0);
        assert_close(mapped("translate(10,20) scale(2)", 1.0, 1.0), 12.0, 22.0);
    }

    #[test]
    fn test_split_variants() {
        let entries = split_transform_list("translate(1 2),scale(3)rotate(4)  skewX(5)");
        let names: Vec<_> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["translate", "scale", "rotate", "skewX"]);
        assert_eq!(entries[0].1, "1 2)");
    }

    #[test]
    fn test_unknown_and_none_skipped() {
        let transform = Transform::parse("none", (0.0, 0.0));
        assert!(transform.is_empty());

        let transform = Transform::parse("translate(5) wobble(3) scale(2)", (0.0, 0.0));
        assert_eq!(transform.ops().len(), 2);
        assert_close(mapped("translate(5) wobble(3) scale(2)", 1.0, 1.0), 7.0, 2.0);
    }

    #[test]
    fn test_rotate_about_center() {
        assert_close(mapped("rotate(90 10 10)", 20.0, 10.0), 10.0, 20.0);
        assert_close(mapped("rotate(180)", 1.0, 0.0), -1.0, 0.0);
    }

    #[test]
    fn test_origin_applies_to_scale() {
        let mut point = Point::new(20.0, 20.0);
        Transform::parse("scale(2)", (10.0, 10.0)).apply_to_point(&mut point);
        assert_close(point, 30.0, 30.0);
    }

    #[test]
    fn test_zero_scale_stays_invertible() {
        let transform = Transform::parse("scale(0, 2)", (0.0, 0.0));
        assert_eq!(
            transform.ops()[0],
            TransformOp::Scale(Point::new(PSEUDO_ZERO, 2.0))
        );
        assert!(transform.matrix().inverse().is_some());
    }

    #[test]
    fn test_unapply_to_point_inverts() {
        let transform = Transform::parse(
            "translate(3,4) rotate(30) scale(2,3) skewX(10) matrix(1,0.5,0,1,2,2)",
            (5.0, 6.0),
        );
        let mut point = Point::new(7.0, -3.0);
        transform.apply_to_point(&mut point);
        transform.unapply_to_point(&mut point);
        assert_close(point, 7.0, -3.0);
    }

    #[test]
    fn test_apply_unapply_restores_context() {
        let mut ctx = CanvasRenderingContext2D::new(100.0, 100.0);
        ctx.translate(3.0, 7.0);
        ctx.scale(1.5, 1.5);
        let before = ctx.get_transform();

        let transform = Transform::parse(
            "translate(10,20) rotate(45 5 5) scale(2 0) skew(10, 20) skewY(15) matrix(2 1 0 2 4 4)",
            (12.0, 8.0),
        );
        transform.apply(&mut ctx);
        assert!(!ctx.get_transform().approx_eq(&before, 1e-9));
        transform.unapply(&mut ctx);
        assert!(ctx.get_transform().approx_eq(&before, 1e-6));
    }

    #[test]
    fn test_context_matches_point_mapping() {
        let transform = Transform::parse("translate(10 0) rotate(90) scale(2)", (0.0, 0.0));
        let mut ctx = CanvasRenderingContext2D::new(100.0, 100.0);
        transform.apply(&mut ctx);
        let (x, y) = ctx.get_transform().apply(1.0, 0.0);

        let mut point = Point::new(1.0, 0.0);
        transform.apply_to_point(&mut point);
        assert_close(point, x, y);
        assert_close(point, 10.0, 2.0);
    }
}
