//! Typed access to attribute and style values with unit resolution.

use std::f64::consts::PI;
use std::fmt;
use std::rc::Rc;

use svgpaint_canvas::{normalize_color, parse_color, PaintStyle, TextBaseline};

use crate::document::Document;
use crate::element::{Element, ElementType};
use crate::paint;
use crate::screen::Axis;
use crate::util::{compress_spaces, parse_leading_number};

/// Pixels per inch.
pub const DPI: f64 = 96.0;

/// A named raw value read from an element, resolved against its document.
///
/// Lookups never fail: absent or unparseable values fall back to a default.
#[derive(Clone)]
pub struct Property<'d> {
    document: &'d Document,
    name: String,
    value: Option<String>,
}

impl<'d> Property<'d> {
    pub fn new(document: &'d Document, name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            document,
            name: name.into(),
            value,
        }
    }

    pub fn empty(document: &'d Document, name: impl Into<String>) -> Self {
        Self::new(document, name, None)
    }

    pub fn document(&self) -> &'d Document {
        self.document
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Neither absent nor empty.
    pub fn has_value(&self) -> bool {
        self.value.as_deref().is_some_and(|v| !v.is_empty())
    }

    pub fn is_string(&self) -> bool {
        self.value.is_some()
    }

    pub fn is_string_matching(&self, pattern: impl Fn(&str) -> bool) -> bool {
        self.value.as_deref().is_some_and(pattern)
    }

    pub fn is_url_definition(&self) -> bool {
        self.is_string_matching(|v| v.starts_with("url("))
    }

    /// Ends in `px` or is a plain integer.
    pub fn is_pixels(&self) -> bool {
        self.is_string_matching(|v| {
            v.ends_with("px") || (!v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()))
        })
    }

    pub fn set_value(&mut self, value: impl Into<String>) -> &mut Self {
        self.value = Some(value.into());
        self
    }

    pub fn get_value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn get_string(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    /// The value, or `default` when there is none.
    pub fn get_string_or<'a>(&'a self, default: &'a str) -> &'a str {
        if self.has_value() {
            self.get_string()
        } else {
            default
        }
    }

    /// Split on whitespace into properties sharing this name.
    pub fn split(&self) -> Vec<Property<'d>> {
        compress_spaces(self.get_string())
            .split(' ')
            .filter(|part| !part.is_empty())
            .map(|part| Property::new(self.document, self.name.clone(), Some(part.to_string())))
            .collect()
    }

    pub fn get_number(&self) -> f64 {
        self.get_number_or(0.0)
    }

    /// Leading number of the value; a `%` suffix divides by 100.
    pub fn get_number_or(&self, default: f64) -> f64 {
        if !self.has_value() {
            return default;
        }
        let value = self.get_string();
        match parse_leading_number(value) {
            Some(n) if value.trim_end().ends_with('%') => n / 100.0,
            Some(n) => n,
            None => default,
        }
    }

    /// Normalized color string, or `default` when there is no value.
    pub fn get_color(&self, default: &str) -> String {
        if self.has_value() {
            normalize_color(self.get_string())
        } else {
            default.to_string()
        }
    }

    pub fn get_dpi(&self) -> f64 {
        DPI
    }

    pub fn get_rem(&self) -> f64 {
        self.document.root_em_size()
    }

    pub fn get_em(&self) -> f64 {
        self.document.em_size()
    }

    /// The unit suffix, with digits, dots and signs removed.
    pub fn get_units(&self) -> String {
        self.get_string()
            .chars()
            .filter(|c| !c.is_ascii_digit() && !matches!(c, '.' | '-' | '+'))
            .collect()
    }

    /// Length in pixels.
    ///
    /// Percentages resolve against the viewport along `axis`; without an axis they stay the
    /// bare fraction. With `process_percent`, a unitless value below one is also treated as
    /// a fraction of the axis.
    pub fn get_pixels(&self, axis: Option<Axis>, process_percent: bool) -> f64 {
        self.resolve_pixels(axis, false, process_percent)
    }

    /// Length in pixels where `%` is relative to the current em size.
    pub fn get_font_size_pixels(&self) -> f64 {
        self.resolve_pixels(None, true, false)
    }

    fn resolve_pixels(&self, axis: Option<Axis>, is_font_size: bool, process_percent: bool) -> f64 {
        if !self.has_value() {
            return 0.0;
        }
        let value = self.get_string().trim_end();
        let viewport = &self.document.screen.viewport;
        let n = self.get_number();

        if value.ends_with("vmin") {
            n / 100.0 * viewport.width().min(viewport.height())
        } else if value.ends_with("vmax") {
            n / 100.0 * viewport.width().max(viewport.height())
        } else if value.ends_with("vw") {
            n / 100.0 * viewport.width()
        } else if value.ends_with("vh") {
            n / 100.0 * viewport.height()
        } else if value.ends_with("rem") {
            n * self.get_rem()
        } else if value.ends_with("em") {
            n * self.get_em()
        } else if value.ends_with("ex") {
            n * self.get_em() / 2.0
        } else if value.ends_with("px") {
            n
        } else if value.ends_with("pt") {
            n * self.get_dpi() / 72.0
        } else if value.ends_with("pc") {
            n * self.get_dpi() / 6.0
        } else if value.ends_with("cm") {
            n * self.get_dpi() / 2.54
        } else if value.ends_with("mm") {
            n * self.get_dpi() / 25.4
        } else if value.ends_with("in") {
            n * self.get_dpi()
        } else if value.ends_with('%') {
            if is_font_size {
                n * self.get_em()
            } else if let Some(axis) = axis {
                n * viewport.compute_size(axis)
            } else {
                n
            }
        } else {
            match axis {
                Some(axis) if process_percent && n < 1.0 => n * viewport.compute_size(axis),
                _ => n,
            }
        }
    }

    pub fn get_milliseconds(&self) -> f64 {
        if !self.has_value() {
            return 0.0;
        }
        let value = self.get_string().trim_end();
        if value.ends_with("ms") {
            self.get_number()
        } else if value.ends_with('s') {
            self.get_number() * 1000.0
        } else {
            self.get_number()
        }
    }

    pub fn get_radians(&self) -> f64 {
        if !self.has_value() {
            return 0.0;
        }
        let value = self.get_string().trim_end();
        if value.ends_with("deg") {
            self.get_number() * PI / 180.0
        } else if value.ends_with("grad") {
            self.get_number() * PI / 200.0
        } else {
            self.get_number()
        }
    }

    /// Name referenced by the value: the `#id` of a `url(#id)`, else the unquoted value.
    pub fn definition_name(&self) -> String {
        let value = self.get_string();
        if let Some(start) = value.find('#') {
            let name: String = value[start + 1..]
                .chars()
                .take_while(|c| !matches!(c, ')' | '\'' | '"'))
                .collect();
            if !name.is_empty() {
                return name;
            }
        }
        value.trim().trim_matches(|c| c == '"' || c == '\'').to_string()
    }

    /// The element the value references, if registered.
    pub fn get_definition(&self) -> Option<Rc<Element>> {
        if !self.has_value() {
            return None;
        }
        self.document.definition(&self.definition_name())
    }

    /// Resolve a `url(#...)` paint to a gradient or pattern for `element`.
    pub fn get_fill_style_definition(
        &self,
        element: &Element,
        opacity: &Property<'_>,
    ) -> Option<PaintStyle> {
        let definition = self.get_definition()?;
        match definition.kind {
            ElementType::LinearGradient | ElementType::RadialGradient => {
                paint::create_gradient(self.document, &definition, element, opacity)
            }
            ElementType::Pattern => {
                let href = definition.get_href_attribute(self.document);
                if !href.has_value() {
                    return paint::create_pattern(self.document, &definition, element, opacity);
                }
                let transform = definition.get_attribute(self.document, "patternTransform");
                let target = href.get_definition()?;
                if transform.has_value() {
                    target.set_attribute("patternTransform", transform.get_string());
                }
                paint::create_pattern(self.document, &target, element, opacity)
            }
            _ => None,
        }
    }

    pub fn get_text_baseline(&self) -> Option<TextBaseline> {
        if !self.has_value() {
            return None;
        }
        let baseline = match self.get_string().trim() {
            "baseline" | "alphabetic" | "mathematical" => TextBaseline::Alphabetic,
            "before-edge" | "text-before-edge" => TextBaseline::Top,
            "middle" | "central" => TextBaseline::Middle,
            "after-edge" | "text-after-edge" => TextBaseline::Bottom,
            "ideographic" => TextBaseline::Ideographic,
            "hanging" => TextBaseline::Hanging,
            _ => return None,
        };
        Some(baseline)
    }

    /// Fold an opacity into an opaque color value as an `rgba(...)` string.
    ///
    /// Values that are not colors, already carry alpha, or meet an opacity of one or
    /// more come back unchanged.
    pub fn add_opacity(&self, opacity: &Property<'_>) -> Property<'d> {
        if !opacity.has_value() {
            return self.clone();
        }
        let alpha = opacity.get_number();
        match parse_color(self.get_string()) {
            Some(color) if color.a >= 1.0 && alpha < 1.0 => Property::new(
                self.document,
                self.name.clone(),
                Some(color.with_alpha(alpha as f32).to_rgba_string()),
            ),
            _ => self.clone(),
        }
    }
}

impl fmt::Debug for Property<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("name", &self.name)
            .field("value", &self.value)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::DocumentOptions;
    use crate::test_support::NullLoader;

    fn document() -> Rc<Document> {
        Document::new(DocumentOptions::default(), Rc::new(NullLoader))
    }

    fn prop<'d>(doc: &'d Document, value: &str) -> Property<'d> {
        Property::new(doc, "test", Some(value.to_string()))
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "{} != {}", actual, expected);
    }

    #[test]
    fn test_has_value() {
        let doc = document();
        assert!(!Property::empty(&doc, "x").has_value());
        assert!(!prop(&doc, "").has_value());
        assert!(prop(&doc, "").is_string());
        assert!(prop(&doc, "0").has_value());
    }

    #[test]
    fn test_numbers() {
        let doc = document();
        assert_close(prop(&doc, "12.5px").get_number(), 12.5);
        assert_close(prop(&doc, "50%").get_number(), 0.5);
        assert_close(prop(&doc, "abc").get_number_or(7.0), 7.0);
        assert_close(Property::empty(&doc, "x").get_number_or(3.0), 3.0);
        assert_eq!(prop(&doc, "12.5px").get_units(), "px");
    }

    #[test]
    fn test_em_resolves_against_current_size() {
        let doc = document();
        assert_close(prop(&doc, "2em").get_pixels(None, false), 24.0);
        {
            let _scope = doc.push_em_size(20.0);
            assert_close(prop(&doc, "2em").get_pixels(None, false), 40.0);
            assert_close(prop(&doc, "1rem").get_pixels(None, false), 12.0);
            assert_close(prop(&doc, "150%").get_font_size_pixels(), 30.0);
        }
        assert_close(prop(&doc, "2em").get_pixels(None, false), 24.0);
    }

    #[test]
    fn test_absolute_units() {
        let doc = document();
        assert_close(prop(&doc, "10").get_pixels(None, false), 10.0);
        assert_close(prop(&doc, "72pt").get_pixels(None, false), 96.0);
        assert_close(prop(&doc, "6pc").get_pixels(None, false), 96.0);
        assert_close(prop(&doc, "1in").get_pixels(None, false), 96.0);
        assert_close(prop(&doc, "2.54cm").get_pixels(None, false), 96.0);
        assert_close(prop(&doc, "25.4mm").get_pixels(None, false), 96.0);
        assert_close(prop(&doc, "1ex").get_pixels(None, false), 6.0);
        assert_close(Property::empty(&doc, "x").get_pixels(None, false), 0.0);
    }

    #[test]
    fn test_viewport_relative_units() {
        let doc = document();
        let _viewport = doc.screen.viewport.push(200.0, 100.0);
        assert_close(prop(&doc, "50%").get_pixels(Some(Axis::X), false), 100.0);
        assert_close(prop(&doc, "50%").get_pixels(Some(Axis::Y), false), 50.0);
        assert_close(prop(&doc, "50%").get_pixels(None, false), 0.5);
        assert_close(prop(&doc, "10vw").get_pixels(None, false), 20.0);
        assert_close(prop(&doc, "10vh").get_pixels(None, false), 10.0);
        assert_close(prop(&doc, "10vmin").get_pixels(None, false), 10.0);
        assert_close(prop(&doc, "10vmax").get_pixels(None, false), 20.0);
        assert_close(prop(&doc, "0.25").get_pixels(Some(Axis::X), true), 50.0);
        assert_close(prop(&doc, "0.25").get_pixels(Some(Axis::X), false), 0.25);
        assert_close(prop(&doc, "3").get_pixels(Some(Axis::X), true), 3.0);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let doc = document();
        let p = prop(&doc, "3em");
        assert_close(p.get_pixels(None, false), p.get_pixels(None, false));
    }

    #[test]
    fn test_time_and_angles() {
        let doc = document();
        assert_close(prop(&doc, "2s").get_milliseconds(), 2000.0);
        assert_close(prop(&doc, "250ms").get_milliseconds(), 250.0);
        assert_close(prop(&doc, "40").get_milliseconds(), 40.0);
        assert_close(prop(&doc, "180deg").get_radians(), PI);
        assert_close(prop(&doc, "200grad").get_radians(), PI);
        assert_close(prop(&doc, "1.5rad").get_radians(), 1.5);
        assert_close(prop(&doc, "2").get_radians(), 2.0);
    }

    #[test]
    fn test_definition_names() {
        let doc = document();
        assert_eq!(prop(&doc, "url(#grad1)").definition_name(), "grad1");
        assert_eq!(prop(&doc, "url('#grad1')").definition_name(), "grad1");
        assert_eq!(prop(&doc, "'My Font'").definition_name(), "My Font");
        assert!(prop(&doc, "url(#missing)").get_definition().is_none());
        assert!(prop(&doc, "url(#a)").is_url_definition());
    }

    #[test]
    fn test_text_baseline_table() {
        let doc = document();
        assert_eq!(prop(&doc, "central").get_text_baseline(), Some(TextBaseline::Middle));
        assert_eq!(
            prop(&doc, "text-before-edge").get_text_baseline(),
            Some(TextBaseline::Top)
        );
        assert_eq!(
            prop(&doc, "mathematical").get_text_baseline(),
            Some(TextBaseline::Alphabetic)
        );
        assert_eq!(prop(&doc, "sideways").get_text_baseline(), None);
        assert_eq!(Property::empty(&doc, "x").get_text_baseline(), None);
    }

    #[test]
    fn test_add_opacity() {
        let doc = document();
        let half = prop(&doc, "0.5");
        assert_eq!(
            prop(&doc, "red").add_opacity(&half).get_string(),
            "rgba(255, 0, 0, 0.5)"
        );
        assert_eq!(prop(&doc, "#00ff00").add_opacity(&prop(&doc, "1")).get_string(), "#00ff00");
        let translucent = prop(&doc, "rgba(0, 0, 255, 0.2)");
        assert_eq!(translucent.add_opacity(&half).get_string(), "rgba(0, 0, 255, 0.2)");
        assert_eq!(prop(&doc, "url(#g)").add_opacity(&half).get_string(), "url(#g)");
    }

    #[test]
    fn test_split_and_pixels_flag() {
        let doc = document();
        let parts = prop(&doc, " 10px   20% ").split();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].is_pixels());
        assert!(!parts[1].is_pixels());
        assert!(prop(&doc, "14").is_pixels());
    }
}
