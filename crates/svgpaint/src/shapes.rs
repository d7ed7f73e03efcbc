//! Geometry of the path-based elements: path data, basic shapes and markers.

use std::f64::consts::{PI, SQRT_2, TAU};

use svgpaint_canvas::{FillRule, RenderingContext2D};
use tracing::trace;

use crate::document::Document;
use crate::element::{Element, ElementType};
use crate::geometry::{BoundingBox, Point};
use crate::path_parser::PathParser;
use crate::screen::Axis;

/// Control point distance for approximating a quarter circle with one cubic.
const KAPPA: f64 = 4.0 * ((SQRT_2 - 1.0) / 3.0);

/// Bounds plus marker positions and angles of a built shape.
#[derive(Debug, Clone, Default)]
pub struct ShapeGeometry {
    pub bounding_box: BoundingBox,
    pub markers: Vec<(Point, f64)>,
}

/// Forwards path calls to a surface when there is one; bounds-only builds pass none.
struct PathSink<'a> {
    ctx: Option<&'a mut dyn RenderingContext2D>,
}

impl PathSink<'_> {
    fn begin_path(&mut self) {
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.begin_path();
        }
    }

    fn move_to(&mut self, p: Point) {
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.move_to(p.x, p.y);
        }
    }

    fn line_to(&mut self, p: Point) {
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.line_to(p.x, p.y);
        }
    }

    fn bezier_curve_to(&mut self, c1: Point, c2: Point, p: Point) {
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.bezier_curve_to(c1.x, c1.y, c2.x, c2.y, p.x, p.y);
        }
    }

    fn quadratic_curve_to(&mut self, c: Point, p: Point) {
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.quadratic_curve_to(c.x, c.y, p.x, p.y);
        }
    }

    fn arc(&mut self, center: Point, radius: f64, start: f64, end: f64, counterclockwise: bool) {
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.arc(center.x, center.y, radius, start, end, counterclockwise);
        }
    }

    /// An elliptical arc drawn as a scaled circle, the frame undone afterwards.
    fn elliptical_arc(&mut self, arc: &CenterArc) {
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        let r = arc.rx.max(arc.ry);
        let (sx, sy) = if arc.rx > arc.ry {
            (1.0, arc.ry / arc.rx)
        } else {
            (arc.rx / arc.ry, 1.0)
        };
        ctx.translate(arc.center.x, arc.center.y);
        ctx.rotate(arc.rotation);
        ctx.scale(sx, sy);
        ctx.arc(0.0, 0.0, r, arc.start, arc.start + arc.sweep, arc.sweep < 0.0);
        ctx.scale(1.0 / sx, 1.0 / sy);
        ctx.rotate(-arc.rotation);
        ctx.translate(-arc.center.x, -arc.center.y);
    }

    fn close_path(&mut self) {
        if let Some(ctx) = self.ctx.as_mut() {
            ctx.close_path();
        }
    }
}

/// Build the outline of a path-based element, issuing it to `ctx` when given.
pub fn build_path(
    element: &Element,
    ctx: Option<&mut dyn RenderingContext2D>,
    doc: &Document,
) -> ShapeGeometry {
    let mut sink = PathSink { ctx };
    match element.kind {
        ElementType::Path | ElementType::Glyph | ElementType::MissingGlyph => {
            let mut parser = PathParser::new(element.get_attribute(doc, "d").get_string());
            let bounding_box = trace_path(&mut parser, &mut sink);
            let angles = parser.get_marker_angles();
            let markers = parser
                .get_marker_points()
                .iter()
                .copied()
                .zip(angles)
                .collect();
            ShapeGeometry {
                bounding_box,
                markers,
            }
        }
        ElementType::Rect => rect(element, doc, &mut sink),
        ElementType::Circle => circle(element, doc, &mut sink),
        ElementType::Ellipse => ellipse(element, doc, &mut sink),
        ElementType::Line => line(element, doc, &mut sink),
        ElementType::Polyline => polyline(element, doc, &mut sink, false),
        ElementType::Polygon => polyline(element, doc, &mut sink, true),
        _ => ShapeGeometry::default(),
    }
}

/// Walk path data command by command.
fn trace_path(parser: &mut PathParser, sink: &mut PathSink<'_>) -> BoundingBox {
    let mut bounds = BoundingBox::new();
    parser.reset();
    sink.begin_path();

    while !parser.is_end() {
        parser.next_command();
        let Some(command) = parser.command else {
            break;
        };
        match command.to_ascii_uppercase() {
            'M' => {
                let point = parser.get_as_current_point();
                parser.add_marker(point, None, None);
                bounds.add_point(point.x, point.y);
                sink.move_to(point);
                parser.start = parser.current;
                while !parser.is_command_or_end() {
                    let from = parser.current;
                    let point = parser.get_as_current_point();
                    parser.add_marker(point, Some(from), None);
                    bounds.add_point(point.x, point.y);
                    sink.line_to(point);
                }
            }
            'L' => {
                while !parser.is_command_or_end() {
                    let from = parser.current;
                    let point = parser.get_as_current_point();
                    parser.add_marker(point, Some(from), None);
                    bounds.add_point(point.x, point.y);
                    sink.line_to(point);
                }
            }
            'H' => {
                while !parser.is_command_or_end() {
                    let base = if parser.is_relative_command() {
                        parser.current.x
                    } else {
                        0.0
                    };
                    let point = Point::new(base + parser.get_scalar(), parser.current.y);
                    parser.add_marker(point, Some(parser.current), None);
                    parser.current = point;
                    bounds.add_point(point.x, point.y);
                    sink.line_to(point);
                }
            }
            'V' => {
                while !parser.is_command_or_end() {
                    let base = if parser.is_relative_command() {
                        parser.current.y
                    } else {
                        0.0
                    };
                    let point = Point::new(parser.current.x, base + parser.get_scalar());
                    parser.add_marker(point, Some(parser.current), None);
                    parser.current = point;
                    bounds.add_point(point.x, point.y);
                    sink.line_to(point);
                }
            }
            'C' => {
                while !parser.is_command_or_end() {
                    let from = parser.current;
                    let p1 = parser.get_point();
                    let control = parser.get_as_control_point();
                    let point = parser.get_as_current_point();
                    parser.add_marker(point, Some(control), Some(p1));
                    bounds.add_bezier_curve(
                        from.x, from.y, p1.x, p1.y, control.x, control.y, point.x, point.y,
                    );
                    sink.bezier_curve_to(p1, control, point);
                }
            }
            'S' => {
                while !parser.is_command_or_end() {
                    let from = parser.current;
                    let p1 = parser.get_reflected_control_point();
                    let control = parser.get_as_control_point();
                    let point = parser.get_as_current_point();
                    parser.add_marker(point, Some(control), Some(p1));
                    bounds.add_bezier_curve(
                        from.x, from.y, p1.x, p1.y, control.x, control.y, point.x, point.y,
                    );
                    sink.bezier_curve_to(p1, control, point);
                    parser.previous_command = parser.command;
                }
            }
            'Q' => {
                while !parser.is_command_or_end() {
                    let from = parser.current;
                    let control = parser.get_as_control_point();
                    let point = parser.get_as_current_point();
                    parser.add_marker(point, Some(control), Some(control));
                    bounds.add_quadratic_curve(from.x, from.y, control.x, control.y, point.x, point.y);
                    sink.quadratic_curve_to(control, point);
                }
            }
            'T' => {
                while !parser.is_command_or_end() {
                    let from = parser.current;
                    let control = parser.get_reflected_control_point();
                    parser.control = control;
                    let point = parser.get_as_current_point();
                    parser.add_marker(point, Some(control), Some(control));
                    bounds.add_quadratic_curve(from.x, from.y, control.x, control.y, point.x, point.y);
                    sink.quadratic_curve_to(control, point);
                    parser.previous_command = parser.command;
                }
            }
            'A' => {
                while !parser.is_command_or_end() {
                    trace_arc(parser, sink, &mut bounds);
                }
            }
            'Z' => {
                let from = parser.current;
                let start = parser.start;
                let from = (from != start).then_some(from);
                parser.add_marker(start, from, None);
                parser.current = start;
                sink.close_path();
            }
            _ => {}
        }
    }

    bounds
}

/// An arc in center parameterization.
#[derive(Debug, Clone, Copy)]
struct CenterArc {
    center: Point,
    rx: f64,
    ry: f64,
    /// x-axis rotation in radians
    rotation: f64,
    start: f64,
    /// Signed angular extent: negative runs counterclockwise.
    sweep: f64,
}

impl CenterArc {
    /// Convert endpoint parameters to center form, scaling radii up when too small.
    fn from_endpoints(
        from: Point,
        to: Point,
        mut rx: f64,
        mut ry: f64,
        rotation: f64,
        large_arc: bool,
        sweep: bool,
    ) -> Self {
        let (sin, cos) = rotation.sin_cos();
        let half_dx = (from.x - to.x) / 2.0;
        let half_dy = (from.y - to.y) / 2.0;
        let prime = Point::new(cos * half_dx + sin * half_dy, -sin * half_dx + cos * half_dy);

        let lambda = prime.x.powi(2) / rx.powi(2) + prime.y.powi(2) / ry.powi(2);
        if lambda > 1.0 {
            rx *= lambda.sqrt();
            ry *= lambda.sqrt();
        }

        let sign = if large_arc == sweep { -1.0 } else { 1.0 };
        let numerator =
            rx.powi(2) * ry.powi(2) - rx.powi(2) * prime.y.powi(2) - ry.powi(2) * prime.x.powi(2);
        let denominator = rx.powi(2) * prime.y.powi(2) + ry.powi(2) * prime.x.powi(2);
        let mut s = sign * (numerator / denominator).max(0.0).sqrt();
        if !s.is_finite() {
            s = 0.0;
        }
        let center_prime = Point::new(s * rx * prime.y / ry, s * -ry * prime.x / rx);
        let center = Point::new(
            (from.x + to.x) / 2.0 + cos * center_prime.x - sin * center_prime.y,
            (from.y + to.y) / 2.0 + sin * center_prime.x + cos * center_prime.y,
        );

        let u = [
            (prime.x - center_prime.x) / rx,
            (prime.y - center_prime.y) / ry,
        ];
        let v = [
            (-prime.x - center_prime.x) / rx,
            (-prime.y - center_prime.y) / ry,
        ];
        let start = vector_angle([1.0, 0.0], u);
        let mut extent = vector_angle(u, v);
        let ratio = vector_ratio(u, v);
        if ratio <= -1.0 {
            extent = PI;
        }
        if ratio >= 1.0 {
            extent = 0.0;
        }
        if !sweep && extent > 0.0 {
            extent -= TAU;
        }
        if sweep && extent < 0.0 {
            extent += TAU;
        }

        Self {
            center,
            rx,
            ry,
            rotation,
            start,
            sweep: extent,
        }
    }

    fn point_at(&self, angle: f64) -> Point {
        let (sin, cos) = self.rotation.sin_cos();
        let x = self.rx * angle.cos();
        let y = self.ry * angle.sin();
        Point::new(
            self.center.x + cos * x - sin * y,
            self.center.y + sin * x + cos * y,
        )
    }

    /// Direction of travel at `angle`.
    fn tangent_at(&self, angle: f64) -> f64 {
        let (sin, cos) = self.rotation.sin_cos();
        let direction = if self.sweep < 0.0 { -1.0 } else { 1.0 };
        let dx = -self.rx * angle.sin() * direction;
        let dy = self.ry * angle.cos() * direction;
        (sin * dx + cos * dy).atan2(cos * dx - sin * dy)
    }
}

fn vector_magnitude(v: [f64; 2]) -> f64 {
    (v[0].powi(2) + v[1].powi(2)).sqrt()
}

fn vector_ratio(u: [f64; 2], v: [f64; 2]) -> f64 {
    (u[0] * v[0] + u[1] * v[1]) / (vector_magnitude(u) * vector_magnitude(v))
}

fn vector_angle(u: [f64; 2], v: [f64; 2]) -> f64 {
    let sign = if u[0] * v[1] < u[1] * v[0] { -1.0 } else { 1.0 };
    sign * vector_ratio(u, v).clamp(-1.0, 1.0).acos()
}

fn trace_arc(parser: &mut PathParser, sink: &mut PathSink<'_>, bounds: &mut BoundingBox) {
    let from = parser.current;
    let rx = parser.get_scalar().abs();
    let ry = parser.get_scalar().abs();
    let rotation = parser.get_scalar().to_radians();
    let large_arc = parser.get_scalar() != 0.0;
    let sweep = parser.get_scalar() != 0.0;
    let to = parser.get_as_current_point();

    if rx == 0.0 || ry == 0.0 || from == to {
        parser.add_marker(to, Some(from), None);
        bounds.add_point(to.x, to.y);
        sink.line_to(to);
        return;
    }

    let arc = CenterArc::from_endpoints(from, to, rx, ry, rotation, large_arc, sweep);
    let half_angle = arc.start + arc.sweep / 2.0;
    let half_way = arc.point_at(half_angle);
    parser.add_marker_angle(half_way, Some(arc.tangent_at(half_angle)));
    parser.add_marker_angle(to, Some(arc.tangent_at(arc.start + arc.sweep)));

    bounds.add_point(half_way.x, half_way.y);
    bounds.add_point(to.x, to.y);
    sink.elliptical_arc(&arc);
}

fn rect(element: &Element, doc: &Document, sink: &mut PathSink<'_>) -> ShapeGeometry {
    let x = element.get_attribute(doc, "x").get_pixels(Some(Axis::X), false);
    let y = element.get_attribute(doc, "y").get_pixels(Some(Axis::Y), false);
    let width = element.get_style(doc, "width", true).get_pixels(Some(Axis::X), false);
    let height = element.get_style(doc, "height", true).get_pixels(Some(Axis::Y), false);
    let rx_attr = element.get_attribute(doc, "rx");
    let ry_attr = element.get_attribute(doc, "ry");
    let mut rx = rx_attr.get_pixels(Some(Axis::X), false);
    let mut ry = ry_attr.get_pixels(Some(Axis::Y), false);
    if rx_attr.has_value() && !ry_attr.has_value() {
        ry = rx;
    }
    if ry_attr.has_value() && !rx_attr.has_value() {
        rx = ry;
    }
    rx = rx.min(width / 2.0).max(0.0);
    ry = ry.min(height / 2.0).max(0.0);

    if width > 0.0 && height > 0.0 {
        sink.begin_path();
        sink.move_to(Point::new(x + rx, y));
        sink.line_to(Point::new(x + width - rx, y));
        sink.bezier_curve_to(
            Point::new(x + width - rx + KAPPA * rx, y),
            Point::new(x + width, y + ry - KAPPA * ry),
            Point::new(x + width, y + ry),
        );
        sink.line_to(Point::new(x + width, y + height - ry));
        sink.bezier_curve_to(
            Point::new(x + width, y + height - ry + KAPPA * ry),
            Point::new(x + width - rx + KAPPA * rx, y + height),
            Point::new(x + width - rx, y + height),
        );
        sink.line_to(Point::new(x + rx, y + height));
        sink.bezier_curve_to(
            Point::new(x + rx - KAPPA * rx, y + height),
            Point::new(x, y + height - ry + KAPPA * ry),
            Point::new(x, y + height - ry),
        );
        sink.line_to(Point::new(x, y + ry));
        sink.bezier_curve_to(
            Point::new(x, y + ry - KAPPA * ry),
            Point::new(x + rx - KAPPA * rx, y),
            Point::new(x + rx, y),
        );
        sink.close_path();
    }

    ShapeGeometry {
        bounding_box: BoundingBox::from_corners(x, y, x + width, y + height),
        markers: Vec::new(),
    }
}

fn circle(element: &Element, doc: &Document, sink: &mut PathSink<'_>) -> ShapeGeometry {
    let cx = element.get_attribute(doc, "cx").get_pixels(Some(Axis::X), false);
    let cy = element.get_attribute(doc, "cy").get_pixels(Some(Axis::Y), false);
    let r = element.get_attribute(doc, "r").get_pixels(Some(Axis::Diagonal), false);

    if r > 0.0 {
        sink.begin_path();
        sink.arc(Point::new(cx, cy), r, 0.0, TAU, false);
        sink.close_path();
    }

    ShapeGeometry {
        bounding_box: BoundingBox::from_corners(cx - r, cy - r, cx + r, cy + r),
        markers: Vec::new(),
    }
}

fn ellipse(element: &Element, doc: &Document, sink: &mut PathSink<'_>) -> ShapeGeometry {
    let cx = element.get_attribute(doc, "cx").get_pixels(Some(Axis::X), false);
    let cy = element.get_attribute(doc, "cy").get_pixels(Some(Axis::Y), false);
    let rx = element.get_attribute(doc, "rx").get_pixels(Some(Axis::X), false);
    let ry = element.get_attribute(doc, "ry").get_pixels(Some(Axis::Y), false);

    if rx > 0.0 && ry > 0.0 {
        let (kx, ky) = (KAPPA * rx, KAPPA * ry);
        sink.begin_path();
        sink.move_to(Point::new(cx + rx, cy));
        sink.bezier_curve_to(
            Point::new(cx + rx, cy + ky),
            Point::new(cx + kx, cy + ry),
            Point::new(cx, cy + ry),
        );
        sink.bezier_curve_to(
            Point::new(cx - kx, cy + ry),
            Point::new(cx - rx, cy + ky),
            Point::new(cx - rx, cy),
        );
        sink.bezier_curve_to(
            Point::new(cx - rx, cy - ky),
            Point::new(cx - kx, cy - ry),
            Point::new(cx, cy - ry),
        );
        sink.bezier_curve_to(
            Point::new(cx + kx, cy - ry),
            Point::new(cx + rx, cy - ky),
            Point::new(cx + rx, cy),
        );
        sink.close_path();
    }

    ShapeGeometry {
        bounding_box: BoundingBox::from_corners(cx - rx, cy - ry, cx + rx, cy + ry),
        markers: Vec::new(),
    }
}

fn line(element: &Element, doc: &Document, sink: &mut PathSink<'_>) -> ShapeGeometry {
    let p0 = Point::new(
        element.get_attribute(doc, "x1").get_pixels(Some(Axis::X), false),
        element.get_attribute(doc, "y1").get_pixels(Some(Axis::Y), false),
    );
    let p1 = Point::new(
        element.get_attribute(doc, "x2").get_pixels(Some(Axis::X), false),
        element.get_attribute(doc, "y2").get_pixels(Some(Axis::Y), false),
    );

    sink.begin_path();
    sink.move_to(p0);
    sink.line_to(p1);

    let angle = p0.angle_to(&p1);
    ShapeGeometry {
        bounding_box: BoundingBox::from_corners(p0.x, p0.y, p1.x, p1.y),
        markers: vec![(p0, angle), (p1, angle)],
    }
}

fn polyline(element: &Element, doc: &Document, sink: &mut PathSink<'_>, close: bool) -> ShapeGeometry {
    let points = Point::parse_path(element.get_attribute(doc, "points").get_string());
    let mut bounds = BoundingBox::new();
    let Some((first, rest)) = points.split_first() else {
        return ShapeGeometry::default();
    };

    sink.begin_path();
    sink.move_to(*first);
    bounds.add_point(first.x, first.y);
    for point in rest {
        sink.line_to(*point);
        bounds.add_point(point.x, point.y);
    }
    if close {
        sink.close_path();
    }

    let mut markers: Vec<(Point, f64)> = points
        .windows(2)
        .map(|pair| (pair[0], pair[0].angle_to(&pair[1])))
        .collect();
    let last_angle = markers.last().map(|(_, angle)| *angle).unwrap_or(0.0);
    markers.push((points[points.len() - 1], last_angle));

    ShapeGeometry {
        bounding_box: bounds,
        markers,
    }
}

/// Fill, stroke and decorate a path-based element.
pub fn render_shape(element: &Element, doc: &Document, ctx: &mut dyn RenderingContext2D) {
    let geometry = build_path(element, Some(&mut *ctx), doc);

    let fill_rule = element
        .get_style(doc, "fill-rule", false)
        .get_string()
        .parse::<FillRule>()
        .unwrap_or_default();
    ctx.fill(fill_rule);

    if element.get_attribute(doc, "vector-effect").get_string() == "non-scaling-stroke" {
        ctx.save();
        ctx.set_transform(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);
        ctx.stroke();
        ctx.restore();
    } else {
        ctx.stroke();
    }

    render_markers(element, doc, ctx, &geometry.markers);
}

fn render_markers(
    element: &Element,
    doc: &Document,
    ctx: &mut dyn RenderingContext2D,
    markers: &[(Point, f64)],
) {
    if markers.is_empty() || inside_marker(element) {
        return;
    }
    let last = markers.len() - 1;
    let marker_for = |name: &str| {
        let property = element.get_style(doc, name, false);
        if !property.is_url_definition() {
            return None;
        }
        property
            .get_definition()
            .filter(|marker| marker.kind == ElementType::Marker)
    };

    if let Some(marker) = marker_for("marker-start") {
        let (point, angle) = markers[0];
        render_marker(&marker, doc, ctx, point, angle);
    }
    if let Some(marker) = marker_for("marker-mid") {
        for &(point, angle) in markers.iter().take(last).skip(1) {
            render_marker(&marker, doc, ctx, point, angle);
        }
    }
    if let Some(marker) = marker_for("marker-end") {
        let (point, angle) = markers[last];
        render_marker(&marker, doc, ctx, point, angle);
    }
}

/// Shapes drawn as part of a marker never carry markers of their own.
fn inside_marker(element: &Element) -> bool {
    let mut ancestor = element.parent();
    while let Some(current) = ancestor {
        if current.kind == ElementType::Marker {
            return true;
        }
        ancestor = current.parent();
    }
    false
}

/// Draw a marker definition at `point`, oriented and scaled, leaving `ctx` as found.
pub fn render_marker(
    marker: &Element,
    doc: &Document,
    ctx: &mut dyn RenderingContext2D,
    point: Point,
    angle: f64,
) {
    let orient = marker.get_attribute(doc, "orient");
    let rotation = match orient.get_string_or("auto").trim() {
        "auto" | "auto-start-reverse" => angle,
        fixed if fixed.ends_with("deg") || fixed.ends_with("rad") => orient.get_radians(),
        _ => orient.get_number().to_radians(),
    };
    let stroke_units = marker.get_attribute(doc, "markerUnits").get_string_or("strokeWidth")
        == "strokeWidth";
    let line_width = ctx.line_width();

    ctx.translate(point.x, point.y);
    ctx.rotate(rotation);
    if stroke_units {
        ctx.scale(line_width, line_width);
    }

    ctx.save();
    let mut attributes = Vec::new();
    for (source, target) in [
        ("viewBox", "viewBox"),
        ("refX", "refX"),
        ("refY", "refY"),
        ("overflow", "overflow"),
        ("fill", "fill"),
        ("stroke", "stroke"),
        ("preserveAspectRatio", "preserveAspectRatio"),
    ] {
        if let Some(value) = marker.raw_attribute(source) {
            attributes.push((target, value));
        }
    }
    attributes.push((
        "width",
        marker
            .raw_attribute("markerWidth")
            .unwrap_or_else(|| "3".to_string()),
    ));
    attributes.push((
        "height",
        marker
            .raw_attribute("markerHeight")
            .unwrap_or_else(|| "3".to_string()),
    ));
    let marker_svg = Element::synthetic(ElementType::Svg, "marker", attributes, marker.children());
    trace!(x = point.x, y = point.y, angle = rotation, "Render marker");
    marker_svg.render(doc, ctx);
    ctx.restore();

    if stroke_units {
        ctx.scale(1.0 / line_width, 1.0 / line_width);
    }
    ctx.rotate(-rotation);
    ctx.translate(-point.x, -point.y);
}
