//! Tree walk: per-element drawing state, clipping, viewports and frames.

use svgpaint_canvas::{parse_color, Color, LineCap, LineJoin, PaintStyle, RenderingContext2D};
use tracing::{debug, trace};

use crate::document::{Document, EmSizeGuard};
use crate::element::{Element, ElementType};
use crate::geometry::BoundingBox;
use crate::options::RenderOptions;
use crate::property::Property;
use crate::screen::{Axis, ViewBox, ViewportGuard};
use crate::transform::Transform;
use crate::util::{to_numbers, PSEUDO_ZERO};
use crate::{image, shapes, text};

/// Scopes an element opened while setting its context.
///
/// Dropping it pops the em size and viewport the element pushed.
#[derive(Default)]
#[must_use = "scopes close when dropped"]
pub struct RenderScope<'d> {
    em: Option<EmSizeGuard<'d>>,
    viewport: Option<ViewportGuard<'d>>,
}

impl RenderScope<'_> {
    pub fn pushed_em(&self) -> bool {
        self.em.is_some()
    }

    pub fn pushed_viewport(&self) -> bool {
        self.viewport.is_some()
    }
}

impl Element {
    /// Draw this element and its subtree inside a save/restore pair.
    pub fn render(&self, doc: &Document, ctx: &mut dyn RenderingContext2D) {
        if self.kind.is_non_rendering() || self.kind == ElementType::TextNode {
            return;
        }
        if self.get_style(doc, "display", true).get_string() == "none"
            || self.get_style(doc, "visibility", false).get_string() == "hidden"
        {
            return;
        }

        ctx.save();
        {
            let _scope = self.set_context(doc, ctx);
            self.render_children(doc, ctx);
        }
        ctx.restore();
    }

    /// Push this element's drawing state onto `ctx`.
    pub fn set_context<'d>(
        &self,
        doc: &'d Document,
        ctx: &mut dyn RenderingContext2D,
    ) -> RenderScope<'d> {
        match self.kind {
            ElementType::Svg => self.set_svg_context(doc, ctx),
            ElementType::Unknown => RenderScope::default(),
            ElementType::Text => {
                let scope = self.set_rendered_context(doc, ctx);
                let mut baseline = self.get_style(doc, "dominant-baseline", false).get_text_baseline();
                if baseline.is_none() {
                    baseline = self.get_style(doc, "alignment-baseline", false).get_text_baseline();
                }
                if let Some(baseline) = baseline {
                    ctx.set_text_baseline(baseline);
                }
                scope
            }
            _ => self.set_rendered_context(doc, ctx),
        }
    }

    /// Draw what this element holds: its geometry, its text, its image or its children.
    pub fn render_children(&self, doc: &Document, ctx: &mut dyn RenderingContext2D) {
        match self.kind {
            kind if kind.is_shape() => shapes::render_shape(self, doc, ctx),
            ElementType::Text | ElementType::TSpan => text::render_text(self, doc, ctx),
            ElementType::Image => image::render_image(self, doc, ctx),
            _ => {
                for child in self.children() {
                    child.render(doc, ctx);
                }
            }
        }
    }

    /// Fill, stroke, font, transform, clip and opacity of a drawable element.
    fn set_rendered_context<'d>(
        &self,
        doc: &'d Document,
        ctx: &mut dyn RenderingContext2D,
    ) -> RenderScope<'d> {
        let fill = self.get_style(doc, "fill", false);
        let fill_opacity = self.get_style(doc, "fill-opacity", false);
        if let Some(style) = self.resolve_paint(doc, &fill, &fill_opacity) {
            ctx.set_fill_style(style);
        }
        if fill_opacity.has_value() {
            if let Some(color) = fade(doc, "fill", ctx.fill_style(), &fill_opacity) {
                ctx.set_fill_style(color.into());
            }
        }

        let stroke = self.get_style(doc, "stroke", false);
        let stroke_opacity = self.get_style(doc, "stroke-opacity", false);
        if let Some(style) = self.resolve_paint(doc, &stroke, &stroke_opacity) {
            ctx.set_stroke_style(style);
        }
        if stroke_opacity.has_value() {
            if let Some(color) = fade(doc, "stroke", ctx.stroke_style(), &stroke_opacity) {
                ctx.set_stroke_style(color.into());
            }
        }

        let stroke_width = self.get_style(doc, "stroke-width", false);
        if stroke_width.has_value() {
            let width = stroke_width.get_pixels(Some(Axis::Diagonal), false);
            ctx.set_line_width(if width == 0.0 || width.is_nan() {
                PSEUDO_ZERO
            } else {
                width
            });
        }
        if let Ok(cap) = self
            .get_style(doc, "stroke-linecap", false)
            .get_string()
            .parse::<LineCap>()
        {
            ctx.set_line_cap(cap);
        }
        if let Ok(join) = self
            .get_style(doc, "stroke-linejoin", false)
            .get_string()
            .parse::<LineJoin>()
        {
            ctx.set_line_join(join);
        }
        let miter_limit = self.get_style(doc, "stroke-miterlimit", false);
        if miter_limit.has_value() {
            ctx.set_miter_limit(miter_limit.get_pixels(None, false));
        }
        let dash_array = self.get_style(doc, "stroke-dasharray", false);
        if dash_array.has_value() {
            let dashes = if dash_array.get_string() == "none" {
                Vec::new()
            } else {
                to_numbers(dash_array.get_string())
            };
            ctx.set_line_dash(dashes);
        }
        let dash_offset = self.get_style(doc, "stroke-dashoffset", false);
        if dash_offset.has_value() {
            ctx.set_line_dash_offset(dash_offset.get_pixels(None, false));
        }

        let em = self.set_font(doc, ctx);

        if let Some(transform) = Transform::from_element(doc, self) {
            transform.apply(ctx);
        }

        let clip_path = self.get_style(doc, "clip-path", true);
        if clip_path.has_value() {
            if let Some(clip) = clip_path
                .get_definition()
                .filter(|clip| clip.kind == ElementType::ClipPath)
            {
                apply_clip_path(&clip, doc, ctx);
            }
        }

        ctx.set_global_alpha(self.calculate_opacity(doc));

        RenderScope { em, viewport: None }
    }

    /// Paint for a `fill` or `stroke` value, `None` to keep the inherited one.
    fn resolve_paint(
        &self,
        doc: &Document,
        paint: &Property<'_>,
        opacity: &Property<'_>,
    ) -> Option<PaintStyle> {
        if paint.is_url_definition() {
            return paint.get_fill_style_definition(self, opacity);
        }
        if !paint.has_value() {
            return None;
        }
        match paint.get_string().trim() {
            "inherit" => None,
            "none" => Some(Color::TRANSPARENT.into()),
            "currentColor" => {
                let color = self.get_style(doc, "color", false).get_color("black");
                PaintStyle::from_color_string(&color)
            }
            _ => PaintStyle::from_color_string(&paint.get_color("black")),
        }
    }

    /// Set the font shorthand from this element's font properties over the inherited font.
    ///
    /// Only an own `font-size` opens an em scope, so relative sizes never compound
    /// through inheritance.
    pub(crate) fn set_font<'d>(
        &self,
        doc: &'d Document,
        ctx: &mut dyn RenderingContext2D,
    ) -> Option<EmSizeGuard<'d>> {
        let own_size = self.get_style(doc, "font-size", true);
        let size = own_size
            .has_value()
            .then(|| own_size.get_font_size_pixels());

        let font = text::Font::new(
            self.get_style(doc, "font-style", false).get_string(),
            self.get_style(doc, "font-variant", false).get_string(),
            self.get_style(doc, "font-weight", false).get_string(),
            &size.map(|px| format!("{}px", px)).unwrap_or_default(),
            self.get_style(doc, "font-family", false).get_string(),
            Some(ctx.font()),
        );
        ctx.set_font(&font.to_string());

        size.map(|px| doc.push_em_size(px))
    }

    /// Product of every `opacity` from here up through the ancestors.
    fn calculate_opacity(&self, doc: &Document) -> f64 {
        let own_opacity = |element: &Element| {
            let opacity = element.get_style(doc, "opacity", true);
            if opacity.has_value() {
                opacity.get_number()
            } else {
                1.0
            }
        };
        let mut opacity = own_opacity(self);
        let mut ancestor = self.parent();
        while let Some(element) = ancestor {
            opacity *= own_opacity(&element);
            ancestor = element.parent();
        }
        opacity
    }

    /// Viewport, view box and clipping for an `svg` element (or a marker drawn as one).
    fn set_svg_context<'d>(
        &self,
        doc: &'d Document,
        ctx: &mut dyn RenderingContext2D,
    ) -> RenderScope<'d> {
        ctx.set_stroke_style(Color::TRANSPARENT.into());
        ctx.set_line_cap(LineCap::Butt);
        ctx.set_line_join(LineJoin::Miter);
        ctx.set_miter_limit(4.0);

        let view_box = to_numbers(self.get_attribute(doc, "viewBox").get_string());
        let view_box = (view_box.len() >= 4 && view_box[2] > 0.0 && view_box[3] > 0.0)
            .then(|| [view_box[0], view_box[1], view_box[2], view_box[3]]);

        let viewport = &doc.screen.viewport;
        let (mut min_x, mut min_y) = view_box.map(|vb| (vb[0], vb[1])).unwrap_or((0.0, 0.0));
        let (mut clip_x, mut clip_y) = (0.0, 0.0);
        let (mut width, mut height) = viewport.current();
        let clip = !self.is_root()
            && self.get_style(doc, "overflow", true).get_string_or("hidden") != "visible";

        if !self.is_root() {
            width = length_or_full(self.get_style(doc, "width", true)).get_pixels(Some(Axis::X), false);
            height =
                length_or_full(self.get_style(doc, "height", true)).get_pixels(Some(Axis::Y), false);
            if self.tag() == "marker" {
                clip_x = min_x;
                clip_y = min_y;
                min_x = 0.0;
                min_y = 0.0;
            }
        }

        let viewport_guard = viewport.push(width, height);
        let mut scope = self.set_rendered_context(doc, ctx);

        let x = self.get_attribute(doc, "x").get_pixels(Some(Axis::X), false);
        let y = self.get_attribute(doc, "y").get_pixels(Some(Axis::Y), false);
        ctx.translate(x, y);

        let ref_x = self.get_attribute(doc, "refX");
        let ref_y = self.get_attribute(doc, "refY");
        let reference = (ref_x.has_value() && ref_y.has_value()).then(|| {
            (
                ref_x.get_pixels(Some(Axis::X), false),
                ref_y.get_pixels(Some(Axis::Y), false),
            )
        });

        let (desired_width, desired_height) =
            view_box.map(|vb| (vb[2], vb[3])).unwrap_or((width, height));
        let aspect_ratio = self.get_attribute(doc, "preserveAspectRatio");
        doc.screen.set_view_box(
            ctx,
            &ViewBox {
                aspect_ratio: aspect_ratio.get_string(),
                width: viewport.width(),
                desired_width,
                height: viewport.height(),
                desired_height,
                min_x,
                min_y,
                reference,
                clip,
                clip_x,
                clip_y,
            },
        );
        if let Some(vb) = view_box {
            viewport.replace_current(vb[2], vb[3]);
        }

        trace!(tag = self.tag(), width, height, "Svg viewport");
        scope.viewport = Some(viewport_guard);
        scope
    }

    /// Bounds of this element's geometry in its own user space.
    pub fn get_bounding_box(&self, doc: &Document) -> BoundingBox {
        match self.kind {
            kind if kind.is_shape() => shapes::build_path(self, None, doc).bounding_box,
            ElementType::Text | ElementType::TSpan => text::bounding_box(self, doc),
            ElementType::Image => image::bounding_box(self, doc),
            _ => {
                let mut bounds = BoundingBox::new();
                for child in self.children() {
                    bounds.add_bounding_box(&child.get_bounding_box(doc));
                }
                bounds
            }
        }
    }
}

fn length_or_full(property: Property<'_>) -> Property<'_> {
    if property.has_value() {
        property
    } else {
        let mut full = property;
        full.set_value("100%");
        full
    }
}

/// The current solid paint with an opacity folded in, if it is a color.
fn fade(doc: &Document, name: &str, paint: &PaintStyle, opacity: &Property<'_>) -> Option<Color> {
    let color = paint.as_color()?;
    let faded = Property::new(doc, name, Some(color.to_rgba_string())).add_opacity(opacity);
    parse_color(faded.get_string())
}

/// Clip `ctx` to the union of a clip path's shapes.
pub fn apply_clip_path(clip: &Element, doc: &Document, ctx: &mut dyn RenderingContext2D) {
    ctx.begin_path();
    for child in clip.children() {
        if !child.kind.is_shape() {
            continue;
        }
        let transform = Transform::from_element(doc, &child);
        if let Some(transform) = &transform {
            transform.apply(ctx);
        }
        shapes::build_path(&child, Some(&mut *ctx), doc);
        if let Some(transform) = &transform {
            transform.unapply(ctx);
        }
    }
    ctx.clip();
}

impl Document {
    /// Draw one frame of this document into `ctx`.
    ///
    /// The viewport restarts at the surface size. Sizing overrides and the scale-to-size
    /// transform start from the root as parsed, so repeated frames do not accumulate.
    pub fn render_frame(&self, ctx: &mut dyn RenderingContext2D, options: &RenderOptions) {
        let Some(root) = self.document_element() else {
            debug!("Nothing to render");
            return;
        };
        self.restore_frame_attributes(&root);

        let viewport = &self.screen.viewport;
        viewport.clear();
        viewport.set_current(ctx.width(), ctx.height());

        let width_style = root.get_style(self, "width", true);
        let height_style = root.get_style(self, "height", true);
        let (mut width, mut height) = (ctx.width(), ctx.height());
        if !options.ignore_dimensions {
            if width_style.has_value() {
                width = width_style.get_pixels(Some(Axis::X), false);
            }
            if height_style.has_value() {
                height = height_style.get_pixels(Some(Axis::Y), false);
            }
        } else if width_style.has_value() && height_style.has_value() {
            width = width_style.get_pixels(Some(Axis::X), false);
            height = height_style.get_pixels(Some(Axis::Y), false);
        }
        viewport.set_current(width, height);

        if let Some(x) = options.offset_x {
            root.set_attribute("x", x.to_string());
        }
        if let Some(y) = options.offset_y {
            root.set_attribute("y", y.to_string());
        }

        let base_transform = self.base_transform();
        if options.scale_width.is_some() || options.scale_height.is_some() {
            let view_box = to_numbers(root.get_attribute(self, "viewBox").get_string());
            let mut x_ratio = 0.0;
            let mut y_ratio = 0.0;

            if let Some(scale_width) = options.scale_width {
                if width_style.has_value() {
                    x_ratio = width_style.get_pixels(Some(Axis::X), false) / scale_width;
                } else if let Some(vb_width) = view_box.get(2) {
                    x_ratio = vb_width / scale_width;
                }
            }
            if let Some(scale_height) = options.scale_height {
                if height_style.has_value() {
                    y_ratio = height_style.get_pixels(Some(Axis::Y), false) / scale_height;
                } else if let Some(vb_height) = view_box.get(3) {
                    y_ratio = vb_height / scale_height;
                }
            }
            if x_ratio == 0.0 {
                x_ratio = y_ratio;
            }
            if y_ratio == 0.0 {
                y_ratio = x_ratio;
            }

            if let Some(scale_width) = options.scale_width {
                root.set_attribute("width", scale_width.to_string());
            }
            if let Some(scale_height) = options.scale_height {
                root.set_attribute("height", scale_height.to_string());
            }

            let transform = if x_ratio.is_normal() && y_ratio.is_normal() {
                format!("{} scale({}, {})", base_transform, 1.0 / x_ratio, 1.0 / y_ratio)
                    .trim()
                    .to_string()
            } else {
                base_transform
            };
            root.set_style("transform", transform);
        } else if base_transform.is_empty() {
            root.remove_style("transform");
        } else {
            root.set_style("transform", base_transform);
        }

        if !options.ignore_clear {
            ctx.clear_rect(0.0, 0.0, width, height);
        }
        trace!(width, height, "Render frame");
        root.render(self, ctx);
    }
}
