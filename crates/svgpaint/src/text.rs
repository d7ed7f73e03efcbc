//! Text layout: font shorthands, text chunks, anchoring and SVG fonts.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use svgpaint_canvas::{FillRule, RenderingContext2D};
use tracing::{debug, trace};

use crate::document::Document;
use crate::element::{Element, ElementType};
use crate::geometry::BoundingBox;
use crate::screen::Axis;
use crate::shapes;
use crate::util::parse_leading_number;

/// Font size used when neither the element nor the context names one.
const DEFAULT_FONT_SIZE: f64 = 10.0;

/// Design grid of an SVG font without a `units-per-em`.
const DEFAULT_UNITS_PER_EM: f64 = 1000.0;

/// Horizontal shear applied to glyph outlines for italic SVG fonts.
const ITALIC_SKEW: f64 = 0.4;

/// A CSS font shorthand split into its parts.
///
/// Empty parts are omitted when formatted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Font {
    pub style: String,
    pub variant: String,
    pub weight: String,
    pub size: String,
    pub family: String,
}

impl Font {
    /// Build a font, taking any empty or `inherit` part from the `inherit` shorthand.
    pub fn new(
        style: &str,
        variant: &str,
        weight: &str,
        size: &str,
        family: &str,
        inherit: Option<&str>,
    ) -> Self {
        let inherited = inherit.map(Font::parse).unwrap_or_default();
        let pick = |own: &str, fallback: String| {
            let own = own.trim();
            if own.is_empty() || own == "inherit" {
                fallback
            } else {
                own.to_string()
            }
        };
        Self {
            style: pick(style, inherited.style),
            variant: pick(variant, inherited.variant),
            weight: pick(weight, inherited.weight),
            size: pick(size, inherited.size),
            family: pick(family, inherited.family),
        }
    }

    /// Parse a shorthand such as `italic bold 12px/1.5 "Open Sans", serif`.
    ///
    /// Keywords are recognised in style, variant, weight order until the size; everything
    /// after the size is the family list.
    pub fn parse(font: &str) -> Self {
        let mut parsed = Font::default();
        let (mut seen_style, mut seen_variant, mut seen_weight, mut seen_size) =
            (false, false, false, false);
        let mut family = Vec::new();

        for part in font.split_whitespace() {
            if !seen_style && is_style(part) {
                if part != "inherit" {
                    parsed.style = part.to_string();
                }
                seen_style = true;
            } else if !seen_variant && is_variant(part) {
                if part != "inherit" {
                    parsed.variant = part.to_string();
                }
                seen_style = true;
                seen_variant = true;
            } else if !seen_weight && is_weight(part) {
                if part != "inherit" {
                    parsed.weight = part.to_string();
                }
                seen_style = true;
                seen_variant = true;
                seen_weight = true;
            } else if !seen_size {
                if part != "inherit" {
                    parsed.size = part.split('/').next().unwrap_or_default().to_string();
                }
                seen_style = true;
                seen_variant = true;
                seen_weight = true;
                seen_size = true;
            } else if part != "inherit" {
                family.push(part);
            }
        }

        parsed.family = family.join(" ");
        parsed
    }

    /// Size in pixels, when the size part is a plain pixel length.
    pub fn size_px(&self) -> Option<f64> {
        let size = self.size.trim();
        if size.is_empty() || !(size.ends_with("px") || size.parse::<f64>().is_ok()) {
            return None;
        }
        parse_leading_number(size)
    }
}

impl fmt::Display for Font {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = [
            self.style.as_str(),
            self.variant.as_str(),
            self.weight.as_str(),
            self.size.as_str(),
            self.family.as_str(),
        ];
        let joined = parts
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        f.write_str(&joined)
    }
}

fn is_style(part: &str) -> bool {
    matches!(part, "normal" | "italic" | "oblique" | "inherit")
}

fn is_variant(part: &str) -> bool {
    matches!(part, "normal" | "small-caps" | "inherit")
}

fn is_weight(part: &str) -> bool {
    matches!(
        part,
        "normal"
            | "bold"
            | "bolder"
            | "lighter"
            | "100"
            | "200"
            | "300"
            | "400"
            | "500"
            | "600"
            | "700"
            | "800"
            | "900"
            | "inherit"
    )
}

/// Collapse whitespace runs to single spaces, keeping a space at either edge.
pub fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Concatenated text of every text run below `element`.
pub fn text_content(element: &Element) -> String {
    if let Some(text) = element.text() {
        return text.to_string();
    }
    element
        .children()
        .iter()
        .map(|child| text_content(child))
        .collect()
}

/// Where the next run of a text element starts.
#[derive(Debug, Clone, Copy)]
struct TextCursor {
    x: f64,
    y: f64,
    at_start: bool,
}

/// Lay out and draw a `text` element (or a `tspan` outside one).
pub fn render_text(element: &Element, doc: &Document, ctx: &mut dyn RenderingContext2D) {
    let mut cursor = TextCursor {
        x: element.get_attribute(doc, "x").get_pixels(Some(Axis::X), false)
            + element.get_attribute(doc, "dx").get_pixels(Some(Axis::X), false),
        y: element.get_attribute(doc, "y").get_pixels(Some(Axis::Y), false)
            + element.get_attribute(doc, "dy").get_pixels(Some(Axis::Y), false),
        at_start: true,
    };

    let children = element.children();
    cursor.x += anchor_delta(element, doc, ctx, &children, 0);
    for index in 0..children.len() {
        render_child(element, doc, ctx, &children, index, &mut cursor);
    }
}

fn render_child(
    owner: &Element,
    doc: &Document,
    ctx: &mut dyn RenderingContext2D,
    siblings: &[Rc<Element>],
    index: usize,
    cursor: &mut TextCursor,
) {
    let child = &siblings[index];

    let x = child.get_attribute(doc, "x");
    let dx = child.get_attribute(doc, "dx").get_pixels(Some(Axis::X), false);
    if x.has_value() {
        cursor.x = x.get_pixels(Some(Axis::X), false)
            + anchor_delta(owner, doc, ctx, siblings, index)
            + dx;
    } else {
        cursor.x += dx;
    }

    let y = child.get_attribute(doc, "y");
    let dy = child.get_attribute(doc, "dy").get_pixels(Some(Axis::Y), false);
    if y.has_value() {
        cursor.y = y.get_pixels(Some(Axis::Y), false) + dy;
    } else {
        cursor.y += dy;
    }

    match child.kind {
        ElementType::TextNode => {
            let mut text = collapse_whitespace(child.text().unwrap_or_default());
            if cursor.at_start {
                text = text.trim_start().to_string();
            }
            if text.is_empty() {
                return;
            }
            if text.trim().is_empty() {
                cursor.x += measure_run(owner, doc, ctx, &text);
                return;
            }
            cursor.at_start = false;
            cursor.x += draw_run(owner, doc, ctx, &text, cursor.x, cursor.y);
        }
        ElementType::TSpan => {
            if child.get_style(doc, "display", true).get_string() == "none" {
                return;
            }
            ctx.save();
            {
                let _scope = child.set_context(doc, ctx);
                let grandchildren = child.children();
                for inner in 0..grandchildren.len() {
                    render_child(child, doc, ctx, &grandchildren, inner, cursor);
                }
            }
            ctx.restore();
        }
        _ => trace!(tag = child.tag(), "Ignoring non-text child of text"),
    }
}

/// Offset for `text-anchor` over the chunk that starts at `start`.
///
/// A chunk runs until the next sibling with its own `x`.
fn anchor_delta(
    owner: &Element,
    doc: &Document,
    ctx: &mut dyn RenderingContext2D,
    siblings: &[Rc<Element>],
    start: usize,
) -> f64 {
    let anchor = owner.get_style(doc, "text-anchor", false);
    let factor = match anchor.get_string_or("start") {
        "end" => 1.0,
        "middle" => 0.5,
        _ => return 0.0,
    };

    let mut width = 0.0;
    for (index, child) in siblings.iter().enumerate().skip(start) {
        if index > start && child.has_attribute("x") {
            break;
        }
        width += measure_recursive(owner, child, doc, ctx, index == 0);
    }
    -width * factor
}

fn measure_recursive(
    owner: &Element,
    element: &Element,
    doc: &Document,
    ctx: &mut dyn RenderingContext2D,
    at_start: bool,
) -> f64 {
    match element.kind {
        ElementType::TextNode => {
            let mut text = collapse_whitespace(element.text().unwrap_or_default());
            if at_start {
                text = text.trim_start().to_string();
            }
            measure_run(owner, doc, ctx, &text)
        }
        ElementType::TSpan => {
            ctx.save();
            let width: f64 = {
                let _em = element.set_font(doc, ctx);
                element
                    .children()
                    .iter()
                    .enumerate()
                    .map(|(index, child)| {
                        measure_recursive(element, child, doc, ctx, at_start && index == 0)
                    })
                    .sum()
            };
            ctx.restore();
            width
        }
        _ => 0.0,
    }
}

/// Draw one run of text and return its advance.
fn draw_run(
    owner: &Element,
    doc: &Document,
    ctx: &mut dyn RenderingContext2D,
    text: &str,
    x: f64,
    y: f64,
) -> f64 {
    if let Some(font) = SvgFont::for_element(owner, doc) {
        return font.render(owner, doc, ctx, text, x, y);
    }
    ctx.fill_text(text, x, y);
    ctx.stroke_text(text, x, y);
    ctx.measure_text(text).width
}

fn measure_run(owner: &Element, doc: &Document, ctx: &mut dyn RenderingContext2D, text: &str) -> f64 {
    if let Some(font) = SvgFont::for_element(owner, doc) {
        let size = current_font_size(ctx);
        return text.chars().map(|c| font.advance(c, size)).sum();
    }
    ctx.measure_text(text).width
}

fn current_font_size(ctx: &dyn RenderingContext2D) -> f64 {
    Font::parse(ctx.font()).size_px().unwrap_or(DEFAULT_FONT_SIZE)
}

/// Approximate bounds of a text element: one em tall above the baseline.
pub fn bounding_box(element: &Element, doc: &Document) -> BoundingBox {
    let x = element.get_attribute(doc, "x").get_pixels(Some(Axis::X), false);
    let y = element.get_attribute(doc, "y").get_pixels(Some(Axis::Y), false);
    let font_size = element.get_style(doc, "font-size", false);
    let size = if font_size.has_value() {
        font_size.get_font_size_pixels()
    } else {
        doc.em_size()
    };
    let chars = collapse_whitespace(&text_content(element)).trim().chars().count();
    let width = (size * 2.0 / 3.0).floor() * chars as f64;
    BoundingBox::from_corners(x, y - size, x + width, y)
}

/// Register a `font` element under the family named by its `font-face`.
pub fn register_font(doc: &Document, font: &Rc<Element>) {
    let family = font
        .children()
        .iter()
        .find(|child| child.kind == ElementType::FontFace)
        .map(|face| face.get_attribute(doc, "font-family").get_string().trim().to_string())
        .unwrap_or_default();
    if family.is_empty() {
        debug!("SVG font without a font-face family");
        return;
    }
    debug!(family = %family, "Registered SVG font");
    doc.set_definition(family, Rc::clone(font));
}

/// An SVG font: glyph outlines keyed by the characters they draw.
pub struct SvgFont {
    units_per_em: f64,
    horiz_adv_x: f64,
    glyphs: HashMap<char, Rc<Element>>,
    missing_glyph: Option<Rc<Element>>,
}

impl SvgFont {
    pub fn from_element(font: &Element, doc: &Document) -> Self {
        let mut units_per_em = DEFAULT_UNITS_PER_EM;
        let mut glyphs = HashMap::new();
        let mut missing_glyph = None;

        for child in font.children() {
            match child.kind {
                ElementType::FontFace => {
                    let units = child.get_attribute(doc, "units-per-em");
                    if units.has_value() && units.get_number() > 0.0 {
                        units_per_em = units.get_number();
                    }
                }
                ElementType::MissingGlyph => missing_glyph = Some(child),
                ElementType::Glyph => {
                    // Contextual Arabic forms need shaping; only isolated glyphs are used.
                    let form = child.get_attribute(doc, "arabic-form");
                    if form.has_value() && form.get_string() != "isolated" {
                        continue;
                    }
                    let unicode = child.get_attribute(doc, "unicode");
                    let mut chars = unicode.get_string().chars();
                    if let (Some(c), None) = (chars.next(), chars.next()) {
                        glyphs.entry(c).or_insert(child);
                    }
                }
                _ => {}
            }
        }

        Self {
            units_per_em,
            horiz_adv_x: font.get_attribute(doc, "horiz-adv-x").get_number(),
            glyphs,
            missing_glyph,
        }
    }

    /// The SVG font named first in `element`'s `font-family`, if one is defined.
    pub fn for_element(element: &Element, doc: &Document) -> Option<Self> {
        let family = element.get_style(doc, "font-family", false);
        if !family.has_value() {
            return None;
        }
        let first = family
            .get_string()
            .split(',')
            .next()
            .unwrap_or_default()
            .trim()
            .trim_matches(|c| c == '"' || c == '\'');
        let font = doc.definition(first)?;
        (font.kind == ElementType::Font).then(|| Self::from_element(&font, doc))
    }

    pub fn units_per_em(&self) -> f64 {
        self.units_per_em
    }

    pub fn glyph(&self, c: char) -> Option<&Rc<Element>> {
        self.glyphs.get(&c).or(self.missing_glyph.as_ref())
    }

    /// Horizontal advance of `c` at `size` pixels.
    pub fn advance(&self, c: char, size: f64) -> f64 {
        let units = self
            .glyph(c)
            .map(|glyph| {
                let own = glyph.raw_attribute("horiz-adv-x");
                own.and_then(|value| value.trim().parse::<f64>().ok())
                    .unwrap_or(self.horiz_adv_x)
            })
            .unwrap_or(self.horiz_adv_x);
        size * units / self.units_per_em
    }

    /// Draw `text` glyph by glyph from `(x, y)` and return the total advance.
    fn render(
        &self,
        owner: &Element,
        doc: &Document,
        ctx: &mut dyn RenderingContext2D,
        text: &str,
        x: f64,
        y: f64,
    ) -> f64 {
        let size = current_font_size(ctx);
        let scale = size / self.units_per_em;
        let italic = owner.get_style(doc, "font-style", false).get_string() == "italic"
            || Font::parse(ctx.font()).style == "italic";

        let mut pen = x;
        for c in text.chars() {
            if let Some(glyph) = self.glyph(c) {
                ctx.save();
                ctx.translate(pen, y);
                ctx.scale(scale, -scale);
                let line_width = ctx.line_width() / scale;
                ctx.set_line_width(line_width);
                if italic {
                    ctx.transform(1.0, 0.0, ITALIC_SKEW, 1.0, 0.0, 0.0);
                }
                shapes::build_path(glyph, Some(&mut *ctx), doc);
                ctx.fill(FillRule::NonZero);
                ctx.stroke();
                ctx.restore();
            }
            pen += self.advance(c, size);
        }
        pen - x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{DocumentOptions, RenderOptions};
    use crate::test_support::NullLoader;
    use svgpaint_canvas::{CanvasRenderingContext2D, DrawCommand};

    fn parse(text: &str) -> Rc<Document> {
        Document::parse(text, DocumentOptions::default(), Rc::new(NullLoader)).unwrap()
    }

    fn draw(markup: &str) -> Vec<DrawCommand> {
        let doc = parse(markup);
        let mut ctx = CanvasRenderingContext2D::new(200.0, 100.0);
        doc.render_frame(&mut ctx, &RenderOptions::default());
        ctx.take_commands()
    }

    fn texts(commands: &[DrawCommand]) -> Vec<(String, f64, f64, String)> {
        commands
            .iter()
            .filter_map(|command| match command {
                DrawCommand::FillText { text, x, y, font, .. } => {
                    Some((text.clone(), *x, *y, font.clone()))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_font_parse() {
        let font = Font::parse("italic bold 12px/1.5 \"Open Sans\", serif");
        assert_eq!(font.style, "italic");
        assert_eq!(font.variant, "");
        assert_eq!(font.weight, "bold");
        assert_eq!(font.size, "12px");
        assert_eq!(font.family, "\"Open Sans\", serif");
        assert_eq!(font.size_px(), Some(12.0));
    }

    #[test]
    fn test_font_inherits_missing_parts() {
        let font = Font::new("", "", "bold", "", "", Some("italic 20px serif"));
        assert_eq!(font.to_string(), "italic bold 20px serif");

        let font = Font::new("inherit", "", "", "8px", "monospace", Some("oblique 20px serif"));
        assert_eq!(font.to_string(), "oblique 8px monospace");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  "), " a b ");
        assert_eq!(collapse_whitespace("ab"), "ab");
    }

    #[test]
    fn test_text_runs_advance() {
        let commands = draw(
            r#"<svg><text x="10" y="20" font-size="10px">ab<tspan fill="red">cd</tspan>
            <tspan x="100" dy="5">e</tspan></text></svg>"#,
        );
        let runs = texts(&commands);
        assert_eq!(runs[0].0, "ab");
        assert_eq!((runs[0].1, runs[0].2), (10.0, 20.0));
        // Two characters at half an em each.
        assert_eq!(runs[1].0, "cd");
        assert_eq!((runs[1].1, runs[1].2), (20.0, 20.0));
        assert_eq!(runs[2].0, "e");
        assert_eq!((runs[2].1, runs[2].2), (100.0, 25.0));
    }

    #[test]
    fn test_text_anchor() {
        let commands = draw(
            r#"<svg><text x="100" y="10" font-size="10px" text-anchor="middle">abcd</text>
            <text x="100" y="30" font-size="10px" text-anchor="end">abcd</text></svg>"#,
        );
        let runs = texts(&commands);
        assert_eq!(runs[0].1, 90.0);
        assert_eq!(runs[1].1, 80.0);
    }

    #[test]
    fn test_tspan_font_size() {
        let commands = draw(
            r#"<svg><text y="10" font-size="10px">a<tspan font-size="2em">b</tspan></text></svg>"#,
        );
        let runs = texts(&commands);
        assert!(runs[0].3.contains("10px"));
        assert!(runs[1].3.contains("20px"));
    }

    #[test]
    fn test_bounding_box() {
        let doc = parse(r#"<svg><text x="5" y="30" font-size="12px">abc</text></svg>"#);
        let text = doc.document_element().unwrap().children()[0].clone();
        let bounds = bounding_box(&text, &doc);
        assert_eq!(bounds.x(), 5.0);
        assert_eq!(bounds.y(), 18.0);
        assert_eq!(bounds.width(), 24.0);
        assert_eq!(bounds.height(), 12.0);
    }

    #[test]
    fn test_svg_font_glyphs() {
        let commands = draw(
            r#"<svg>
              <defs>
                <font horiz-adv-x="500">
                  <font-face font-family="Boxes" units-per-em="1000"/>
                  <missing-glyph d="M0,0 L100,0 L100,100 Z"/>
                  <glyph unicode="A" horiz-adv-x="800" d="M0,0 L800,0 L800,800 Z"/>
                </font>
              </defs>
              <text x="0" y="50" font-family="Boxes" font-size="10px">AB</text>
            </svg>"#,
        );
        assert!(texts(&commands).is_empty());
        let fills = commands
            .iter()
            .filter(|command| matches!(command, DrawCommand::FillPath { .. }))
            .count();
        assert_eq!(fills, 2);
    }

    #[test]
    fn test_svg_font_advance() {
        let doc = parse(
            r#"<svg><font horiz-adv-x="500"><font-face font-family="Boxes" units-per-em="2000"/>
            <glyph unicode="A" horiz-adv-x="1000" d="M0,0"/></font></svg>"#,
        );
        let font = SvgFont::for_element(
            &Element::synthetic(
                ElementType::Text,
                "text",
                vec![("font-family", "'Boxes', serif".to_string())],
                Vec::new(),
            ),
            &doc,
        )
        .unwrap();
        assert_eq!(font.units_per_em(), 2000.0);
        assert_eq!(font.advance('A', 20.0), 10.0);
        assert_eq!(font.advance('Z', 20.0), 5.0);
    }
}
