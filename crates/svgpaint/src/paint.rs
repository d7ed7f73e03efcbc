//! Gradient and pattern paint servers.

use svgpaint_canvas::{
    parse_color, CanvasRenderingContext2D, Color, LinearGradient, PaintStyle, Pattern,
    PatternRepetition, RadialGradient, RenderingContext2D,
};
use tracing::{debug, trace};

use crate::document::Document;
use crate::element::{Element, ElementType};
use crate::geometry::BoundingBox;
use crate::property::Property;
use crate::screen::Axis;

/// Longest `href` chain followed between gradients.
const MAX_HREF_DEPTH: usize = 16;

/// A gradient attribute, inherited through the `href` chain when unset.
fn gradient_attribute<'d>(doc: &'d Document, gradient: &Element, name: &str) -> Property<'d> {
    let own = gradient.get_attribute(doc, name);
    if own.has_value() {
        return own;
    }
    let mut next = gradient.get_href_attribute(doc).get_definition();
    for _ in 0..MAX_HREF_DEPTH {
        let Some(linked) = next else {
            break;
        };
        let value = linked.get_attribute(doc, name);
        if value.has_value() {
            return value;
        }
        next = linked.get_href_attribute(doc).get_definition();
    }
    own
}

/// `(offset, color)` of each stop, taken from the first gradient in the `href` chain
/// that has any.
fn gradient_stops(doc: &Document, gradient: &Element) -> Vec<(f64, Color)> {
    let mut container = gradient.get_href_attribute(doc).get_definition();
    let mut stops = collect_stops(doc, gradient);
    for _ in 0..MAX_HREF_DEPTH {
        if !stops.is_empty() {
            break;
        }
        let Some(linked) = container else {
            break;
        };
        stops = collect_stops(doc, &linked);
        container = linked.get_href_attribute(doc).get_definition();
    }
    stops
}

fn collect_stops(doc: &Document, gradient: &Element) -> Vec<(f64, Color)> {
    gradient
        .children()
        .iter()
        .filter(|child| child.kind == ElementType::Stop)
        .map(|stop| {
            let offset = stop.get_attribute(doc, "offset").get_number().clamp(0.0, 1.0);
            let stop_opacity = stop.get_style(doc, "stop-opacity", false);
            let mut color = stop.get_style(doc, "stop-color", true);
            if !color.has_value() {
                color.set_value("black");
            }
            let color = parse_color(color.add_opacity(&stop_opacity).get_string())
                .unwrap_or(Color::BLACK);
            (offset, color)
        })
        .collect()
}

/// Fold the painted element's fill/stroke opacity into a stop color.
fn with_parent_opacity(doc: &Document, color: Color, opacity: &Property<'_>) -> Color {
    if !opacity.has_value() {
        return color;
    }
    let faded = Property::new(doc, "color", Some(color.to_rgba_string())).add_opacity(opacity);
    parse_color(faded.get_string()).unwrap_or(color)
}

/// Build the gradient `gradient` defines for painting `element`.
///
/// A degenerate gradient (collapsed vector or empty bounding box) paints its last stop.
pub fn create_gradient(
    doc: &Document,
    gradient: &Element,
    element: &Element,
    opacity: &Property<'_>,
) -> Option<PaintStyle> {
    let stops = gradient_stops(doc, gradient);
    let Some(&(_, last_color)) = stops.last() else {
        debug!(tag = gradient.tag(), "Gradient without stops");
        return None;
    };
    if gradient.get_attribute(doc, "gradientTransform").has_value() {
        debug!("gradientTransform is not supported; drawing untransformed");
    }

    let bounding_box = (gradient_attribute(doc, gradient, "gradientUnits")
        .get_string_or("objectBoundingBox")
        == "objectBoundingBox")
        .then(|| element.get_bounding_box(doc));
    if bounding_box.is_some_and(|bb| bb.is_empty()) {
        return Some(with_parent_opacity(doc, last_color, opacity).into());
    }

    let mut style = match gradient.kind {
        ElementType::LinearGradient => linear(doc, gradient, bounding_box.as_ref()),
        ElementType::RadialGradient => radial(doc, gradient, bounding_box.as_ref()),
        _ => None,
    };
    let Some(paint) = style.as_mut() else {
        return Some(with_parent_opacity(doc, last_color, opacity).into());
    };

    for (offset, color) in stops {
        let color = with_parent_opacity(doc, color, opacity);
        match paint {
            PaintStyle::LinearGradient(g) => g.add_color_stop(offset, color),
            PaintStyle::RadialGradient(g) => g.add_color_stop(offset, color),
            _ => {}
        }
    }
    style
}

fn linear(doc: &Document, gradient: &Element, bounds: Option<&BoundingBox>) -> Option<PaintStyle> {
    let attribute = |name: &str| gradient_attribute(doc, gradient, name);
    let (mut x1, mut y1, mut x2, mut y2) = (attribute("x1"), attribute("y1"), attribute("x2"), attribute("y2"));
    if !x1.has_value() && !y1.has_value() && !x2.has_value() && !y2.has_value() {
        x1.set_value("0");
        y1.set_value("0");
        x2.set_value("1");
        y2.set_value("0");
    }

    let (x1, y1, x2, y2) = match bounds {
        Some(bb) => (
            bb.x() + bb.width() * x1.get_number(),
            bb.y() + bb.height() * y1.get_number(),
            bb.x() + bb.width() * x2.get_number(),
            bb.y() + bb.height() * y2.get_number(),
        ),
        None => (
            x1.get_pixels(Some(Axis::X), false),
            y1.get_pixels(Some(Axis::Y), false),
            x2.get_pixels(Some(Axis::X), false),
            y2.get_pixels(Some(Axis::Y), false),
        ),
    };
    if x1 == x2 && y1 == y2 {
        return None;
    }
    Some(PaintStyle::LinearGradient(LinearGradient::new(x1, y1, x2, y2)))
}

fn radial(doc: &Document, gradient: &Element, bounds: Option<&BoundingBox>) -> Option<PaintStyle> {
    let attribute = |name: &str, default: &str| {
        let mut property = gradient_attribute(doc, gradient, name);
        if !property.has_value() && !default.is_empty() {
            property.set_value(default);
        }
        property
    };
    let (cx_attr, cy_attr, r_attr) = (attribute("cx", "50%"), attribute("cy", "50%"), attribute("r", "50%"));
    let (fx_attr, fy_attr, fr_attr) = (attribute("fx", ""), attribute("fy", ""), attribute("fr", ""));

    let along_x = |p: &Property<'_>| match bounds {
        Some(bb) => bb.x() + bb.width() * p.get_number(),
        None => p.get_pixels(Some(Axis::X), false),
    };
    let along_y = |p: &Property<'_>| match bounds {
        Some(bb) => bb.y() + bb.height() * p.get_number(),
        None => p.get_pixels(Some(Axis::Y), false),
    };
    let radius = |p: &Property<'_>| match bounds {
        Some(bb) => (bb.width() + bb.height()) / 2.0 * p.get_number(),
        None => p.get_pixels(Some(Axis::Diagonal), false),
    };

    let cx = along_x(&cx_attr);
    let cy = along_y(&cy_attr);
    let fx = if fx_attr.has_value() { along_x(&fx_attr) } else { cx };
    let fy = if fy_attr.has_value() { along_y(&fy_attr) } else { cy };
    let r = radius(&r_attr);
    let fr = radius(&fr_attr);
    if r <= 0.0 {
        return None;
    }
    Some(PaintStyle::RadialGradient(RadialGradient::new(fx, fy, fr, cx, cy, r)))
}

/// Record a pattern's children into a tile paint.
///
/// The tile is drawn in a 3x3 grid around the origin so a transformed pattern has no
/// gaps at its edges.
pub fn create_pattern(
    doc: &Document,
    pattern: &Element,
    _element: &Element,
    opacity: &Property<'_>,
) -> Option<PaintStyle> {
    let width = pattern.get_style(doc, "width", true).get_pixels(Some(Axis::X), true);
    let height = pattern.get_style(doc, "height", true).get_pixels(Some(Axis::Y), true);
    if !(width > 0.0 && height > 0.0) {
        debug!(width, height, "Pattern with empty tile");
        return None;
    }

    let mut tile = CanvasRenderingContext2D::new(width, height);
    let x = pattern.get_attribute(doc, "x");
    let y = pattern.get_attribute(doc, "y");
    if x.has_value() && y.has_value() {
        tile.translate(x.get_pixels(Some(Axis::X), true), y.get_pixels(Some(Axis::Y), true));
    }

    if opacity.has_value() {
        pattern.set_style("fill-opacity", opacity.get_string());
    } else {
        pattern.remove_style("fill-opacity");
    }

    let mut base = vec![
        ("width", format!("{}px", width)),
        ("height", format!("{}px", height)),
    ];
    for (source, target) in [("viewBox", "viewBox"), ("patternTransform", "transform")] {
        if let Some(value) = pattern.raw_attribute(source) {
            base.push((target, value));
        }
    }

    for column in -1..=1 {
        for row in -1..=1 {
            let mut attributes = base.clone();
            attributes.push(("x", (f64::from(column) * width).to_string()));
            attributes.push(("y", (f64::from(row) * height).to_string()));
            let cell = Element::synthetic(ElementType::Svg, "svg", attributes, pattern.children());
            tile.save();
            cell.render(doc, &mut tile);
            tile.restore();
        }
    }

    trace!(width, height, commands = tile.commands().len(), "Pattern recorded");
    Some(PaintStyle::Pattern(Pattern::from_recording(
        &tile,
        PatternRepetition::Repeat,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{DocumentOptions, RenderOptions};
    use crate::test_support::NullLoader;
    use std::rc::Rc;
    use svgpaint_canvas::DrawCommand;

    fn parse(text: &str) -> Rc<Document> {
        Document::parse(text, DocumentOptions::default(), Rc::new(NullLoader)).unwrap()
    }

    fn paint_of(doc: &Document, gradient: &str, target: &str) -> Option<PaintStyle> {
        let gradient = doc.definition(gradient).unwrap();
        let target = doc.definition(target).unwrap();
        create_gradient(doc, &gradient, &target, &Property::empty(doc, "fill-opacity"))
    }

    #[test]
    fn test_linear_gradient_in_bounding_box() {
        let doc = parse(
            r##"<svg><linearGradient id="g"><stop offset="0" stop-color="red"/>
                <stop offset="150%" stop-color="blue" stop-opacity="0.5"/></linearGradient>
                <rect id="r" x="10" y="10" width="100" height="20"/></svg>"##,
        );
        match paint_of(&doc, "g", "r") {
            Some(PaintStyle::LinearGradient(g)) => {
                assert_eq!((g.x0, g.y0, g.x1, g.y1), (10.0, 10.0, 110.0, 10.0));
                assert_eq!(g.stops.len(), 2);
                assert_eq!(g.stops[1].offset, 1.0);
                assert!((g.stops[1].color.a - 0.5).abs() < 1e-6);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_href_inherits_stops_and_attributes() {
        let doc = parse(
            r##"<svg>
                <linearGradient id="base" gradientUnits="userSpaceOnUse" x2="50">
                    <stop offset="0" stop-color="green"/></linearGradient>
                <linearGradient id="g" href="#base" y2="5"/>
                <rect id="r" width="10" height="10"/></svg>"##,
        );
        match paint_of(&doc, "g", "r") {
            Some(PaintStyle::LinearGradient(g)) => {
                assert_eq!((g.x1, g.y1), (50.0, 5.0));
                assert_eq!(g.stops.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_degenerate_gradient_paints_last_stop() {
        let doc = parse(
            r##"<svg><linearGradient id="g" x1="0" x2="0" y1="0" y2="0">
                <stop offset="0" stop-color="red"/><stop offset="1" stop-color="lime"/>
                </linearGradient><rect id="r" width="10" height="10"/>
                <linearGradient id="empty"/></svg>"##,
        );
        assert_eq!(
            paint_of(&doc, "g", "r").and_then(|p| p.as_color()),
            Some(Color::from_rgb(0, 255, 0))
        );
        assert_eq!(paint_of(&doc, "empty", "r"), None);
    }

    #[test]
    fn test_radial_gradient_defaults() {
        let doc = parse(
            r##"<svg><radialGradient id="g"><stop offset="1" stop-color="red"/></radialGradient>
                <rect id="r" width="20" height="10"/></svg>"##,
        );
        match paint_of(&doc, "g", "r") {
            Some(PaintStyle::RadialGradient(g)) => {
                assert_eq!((g.x1, g.y1, g.r1), (10.0, 5.0, 7.5));
                assert_eq!((g.x0, g.y0, g.r0), (10.0, 5.0, 0.0));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_pattern_fill_records_tile() {
        let doc = parse(
            r##"<svg><pattern id="p" width="4" height="4" patternUnits="userSpaceOnUse">
                <rect width="2" height="2" fill="red"/></pattern>
                <rect width="10" height="10" fill="url(#p)"/></svg>"##,
        );
        let mut ctx = CanvasRenderingContext2D::new(50.0, 50.0);
        doc.render_frame(&mut ctx, &RenderOptions::default());
        let pattern = ctx
            .commands()
            .iter()
            .find_map(|c| match c {
                DrawCommand::FillPath {
                    paint: PaintStyle::Pattern(p),
                    ..
                } => Some(p.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!((pattern.width, pattern.height), (4.0, 4.0));
        let cells = pattern
            .commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::FillPath { .. }))
            .count();
        assert_eq!(cells, 9);
    }
}
