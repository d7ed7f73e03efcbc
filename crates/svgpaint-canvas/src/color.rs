//! CSS colors.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An sRGB color with straight alpha.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Color = Color {
        r: 0,
        g: 0,
        b: 0,
        a: 0.0,
    };
    pub const BLACK: Color = Color {
        r: 0,
        g: 0,
        b: 0,
        a: 1.0,
    };
    pub const WHITE: Color = Color {
        r: 255,
        g: 255,
        b: 255,
        a: 1.0,
    };

    pub fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Same color with a different alpha.
    pub fn with_alpha(self, a: f32) -> Self {
        Self {
            a: a.clamp(0.0, 1.0),
            ..self
        }
    }

    /// Whether drawing with this color leaves no trace.
    pub fn is_invisible(&self) -> bool {
        self.a <= 0.0
    }

    /// Serialize as `rgba(r, g, b, a)`.
    pub fn to_rgba_string(&self) -> String {
        format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a >= 1.0 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            f.write_str(&self.to_rgba_string())
        }
    }
}

/// Parse a CSS color string.
///
/// Supports `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `rgb()`/`rgba()` with integer or
/// percentage channels, `hsl()`/`hsla()`, `transparent` and the CSS named colors.
pub fn parse_color(s: &str) -> Option<Color> {
    let s = s.trim().to_ascii_lowercase();

    if let Some(hex) = s.strip_prefix('#') {
        return parse_hex(hex);
    }

    if let Some(inner) = function_args(&s, "rgba").or_else(|| function_args(&s, "rgb")) {
        let parts = split_args(inner);
        if parts.len() < 3 {
            return None;
        }
        let r = parse_channel(parts[0])?;
        let g = parse_channel(parts[1])?;
        let b = parse_channel(parts[2])?;
        let a = match parts.get(3) {
            Some(alpha) => parse_alpha(alpha)?,
            None => 1.0,
        };
        return Some(Color::new(r, g, b, a));
    }

    if let Some(inner) = function_args(&s, "hsla").or_else(|| function_args(&s, "hsl")) {
        let parts = split_args(inner);
        if parts.len() < 3 {
            return None;
        }
        let h = parts[0].trim_end_matches("deg").parse::<f64>().ok()?;
        let sat = parts[1].trim_end_matches('%').parse::<f64>().ok()? / 100.0;
        let light = parts[2].trim_end_matches('%').parse::<f64>().ok()? / 100.0;
        let a = match parts.get(3) {
            Some(alpha) => parse_alpha(alpha)?,
            None => 1.0,
        };
        let (r, g, b) = hsl_to_rgb(h, sat.clamp(0.0, 1.0), light.clamp(0.0, 1.0));
        return Some(Color::new(r, g, b, a));
    }

    if s == "transparent" {
        return Some(Color::TRANSPARENT);
    }

    NAMED_COLORS
        .get(s.as_str())
        .map(|&(r, g, b)| Color::from_rgb(r, g, b))
}

/// Rewrite a color string into a canonical form, leaving unknown strings untouched.
pub fn normalize_color(s: &str) -> String {
    match parse_color(s) {
        Some(color) if s.trim_start().starts_with("rgb") || s.trim_start().starts_with("hsl") => {
            color.to_rgba_string()
        }
        _ => s.to_string(),
    }
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let digit = |i: usize| u8::from_str_radix(&hex[i..i + 1].repeat(2), 16).ok();
    let pair = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    match hex.len() {
        3 => Some(Color::from_rgb(digit(0)?, digit(1)?, digit(2)?)),
        4 => Some(Color::new(
            digit(0)?,
            digit(1)?,
            digit(2)?,
            digit(3)? as f32 / 255.0,
        )),
        6 => Some(Color::from_rgb(pair(0)?, pair(2)?, pair(4)?)),
        8 => Some(Color::new(
            pair(0)?,
            pair(2)?,
            pair(4)?,
            pair(6)? as f32 / 255.0,
        )),
        _ => None,
    }
}

fn function_args<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    s.strip_prefix(name)?
        .trim_start()
        .strip_prefix('(')?
        .strip_suffix(')')
}

fn split_args(inner: &str) -> Vec<&str> {
    inner
        .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .collect()
}

fn parse_channel(s: &str) -> Option<u8> {
    let value = match s.strip_suffix('%') {
        Some(percent) => percent.parse::<f64>().ok()? / 100.0 * 255.0,
        None => s.parse::<f64>().ok()?,
    };
    Some(value.round().clamp(0.0, 255.0) as u8)
}

fn parse_alpha(s: &str) -> Option<f32> {
    let value = match s.strip_suffix('%') {
        Some(percent) => percent.parse::<f32>().ok()? / 100.0,
        None => s.parse::<f32>().ok()?,
    };
    Some(value.clamp(0.0, 1.0))
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (u8, u8, u8) {
    let h = h.rem_euclid(360.0) / 360.0;
    if s == 0.0 {
        let v = (l * 255.0).round() as u8;
        return (v, v, v);
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let hue = |mut t: f64| {
        if t < 0.0 {
            t += 1.0;
        }
        if t > 1.0 {
            t -= 1.0;
        }
        let v = if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        };
        (v * 255.0).round() as u8
    };
    (hue(h + 1.0 / 3.0), hue(h), hue(h - 1.0 / 3.0))
}

lazy_static::lazy_static! {
    static ref NAMED_COLORS: HashMap<&'static str, (u8, u8, u8)> = {
        let mut m = HashMap::new();
        m.insert("aliceblue", (240, 248, 255));
        m.insert("antiquewhite", (250, 235, 215));
        m.insert("aqua", (0, 255, 255));
        m.insert("aquamarine", (127, 255, 212));
        m.insert("azure", (240, 255, 255));
        m.insert("beige", (245, 245, 220));
        m.insert("bisque", (255, 228, 196));
        m.insert("black", (0, 0, 0));
        m.insert("blanchedalmond", (255, 235, 205));
        m.insert("blue", (0, 0, 255));
        m.insert("blueviolet", (138, 43, 226));
        m.insert("brown", (165, 42, 42));
        m.insert("burlywood", (222, 184, 135));
        m.insert("cadetblue", (95, 158, 160));
        m.insert("chartreuse", (127, 255, 0));
        m.insert("chocolate", (210, 105, 30));
        m.insert("coral", (255, 127, 80));
        m.insert("cornflowerblue", (100, 149, 237));
        m.insert("cornsilk", (255, 248, 220));
        m.insert("crimson", (220, 20, 60));
        m.insert("cyan", (0, 255, 255));
        m.insert("darkblue", (0, 0, 139));
        m.insert("darkcyan", (0, 139, 139));
        m.insert("darkgoldenrod", (184, 134, 11));
        m.insert("darkgray", (169, 169, 169));
        m.insert("darkgreen", (0, 100, 0));
        m.insert("darkgrey", (169, 169, 169));
        m.insert("darkkhaki", (189, 183, 107));
        m.insert("darkmagenta", (139, 0, 139));
        m.insert("darkolivegreen", (85, 107, 47));
        m.insert("darkorange", (255, 140, 0));
        m.insert("darkorchid", (153, 50, 204));
        m.insert("darkred", (139, 0, 0));
        m.insert("darksalmon", (233, 150, 122));
        m.insert("darkseagreen", (143, 188, 143));
        m.insert("darkslateblue", (72, 61, 139));
        m.insert("darkslategray", (47, 79, 79));
        m.insert("darkslategrey", (47, 79, 79));
        m.insert("darkturquoise", (0, 206, 209));
        m.insert("darkviolet", (148, 0, 211));
        m.insert("deeppink", (255, 20, 147));
        m.insert("deepskyblue", (0, 191, 255));
        m.insert("dimgray", (105, 105, 105));
        m.insert("dimgrey", (105, 105, 105));
        m.insert("dodgerblue", (30, 144, 255));
        m.insert("firebrick", (178, 34, 34));
        m.insert("floralwhite", (255, 250, 240));
        m.insert("forestgreen", (34, 139, 34));
        m.insert("fuchsia", (255, 0, 255));
        m.insert("gainsboro", (220, 220, 220));
        m.insert("ghostwhite", (248, 248, 255));
        m.insert("gold", (255, 215, 0));
        m.insert("goldenrod", (218, 165, 32));
        m.insert("gray", (128, 128, 128));
        m.insert("grey", (128, 128, 128));
        m.insert("green", (0, 128, 0));
        m.insert("greenyellow", (173, 255, 47));
        m.insert("honeydew", (240, 255, 240));
        m.insert("hotpink", (255, 105, 180));
        m.insert("indianred", (205, 92, 92));
        m.insert("indigo", (75, 0, 130));
        m.insert("ivory", (255, 255, 240));
        m.insert("khaki", (240, 230, 140));
        m.insert("lavender", (230, 230, 250));
        m.insert("lavenderblush", (255, 240, 245));
        m.insert("lawngreen", (124, 252, 0));
        m.insert("lemonchiffon", (255, 250, 205));
        m.insert("lightblue", (173, 216, 230));
        m.insert("lightcoral", (240, 128, 128));
        m.insert("lightcyan", (224, 255, 255));
        m.insert("lightgoldenrodyellow", (250, 250, 210));
        m.insert("lightgray", (211, 211, 211));
        m.insert("lightgreen", (144, 238, 144));
        m.insert("lightgrey", (211, 211, 211));
        m.insert("lightpink", (255, 182, 193));
        m.insert("lightsalmon", (255, 160, 122));
        m.insert("lightseagreen", (32, 178, 170));
        m.insert("lightskyblue", (135, 206, 250));
        m.insert("lightslategray", (119, 136, 153));
        m.insert("lightslategrey", (119, 136, 153));
        m.insert("lightsteelblue", (176, 196, 222));
        m.insert("lightyellow", (255, 255, 224));
        m.insert("lime", (0, 255, 0));
        m.insert("limegreen", (50, 205, 50));
        m.insert("linen", (250, 240, 230));
        m.insert("magenta", (255, 0, 255));
        m.insert("maroon", (128, 0, 0));
        m.insert("mediumaquamarine", (102, 205, 170));
        m.insert("mediumblue", (0, 0, 205));
        m.insert("mediumorchid", (186, 85, 211));
        m.insert("mediumpurple", (147, 112, 219));
        m.insert("mediumseagreen", (60, 179, 113));
        m.insert("mediumslateblue", (123, 104, 238));
        m.insert("mediumspringgreen", (0, 250, 154));
        m.insert("mediumturquoise", (72, 209, 204));
        m.insert("mediumvioletred", (199, 21, 133));
        m.insert("midnightblue", (25, 25, 112));
        m.insert("mintcream", (245, 255, 250));
        m.insert("mistyrose", (255, 228, 225));
        m.insert("moccasin", (255, 228, 181));
        m.insert("navajowhite", (255, 222, 173));
        m.insert("navy", (0, 0, 128));
        m.insert("oldlace", (253, 245, 230));
        m.insert("olive", (128, 128, 0));
        m.insert("olivedrab", (107, 142, 35));
        m.insert("orange", (255, 165, 0));
        m.insert("orangered", (255, 69, 0));
        m.insert("orchid", (218, 112, 214));
        m.insert("palegoldenrod", (238, 232, 170));
        m.insert("palegreen", (152, 251, 152));
        m.insert("paleturquoise", (175, 238, 238));
        m.insert("palevioletred", (219, 112, 147));
        m.insert("papayawhip", (255, 239, 213));
        m.insert("peachpuff", (255, 218, 185));
        m.insert("peru", (205, 133, 63));
        m.insert("pink", (255, 192, 203));
        m.insert("plum", (221, 160, 221));
        m.insert("powderblue", (176, 224, 230));
        m.insert("purple", (128, 0, 128));
        m.insert("rebeccapurple", (102, 51, 153));
        m.insert("red", (255, 0, 0));
        m.insert("rosybrown", (188, 143, 143));
        m.insert("royalblue", (65, 105, 225));
        m.insert("saddlebrown", (139, 69, 19));
        m.insert("salmon", (250, 128, 114));
        m.insert("sandybrown", (244, 164, 96));
        m.insert("seagreen", (46, 139, 87));
        m.insert("seashell", (255, 245, 238));
        m.insert("sienna", (160, 82, 45));
        m.insert("silver", (192, 192, 192));
        m.insert("skyblue", (135, 206, 235));
        m.insert("slateblue", (106, 90, 205));
        m.insert("slategray", (112, 128, 144));
        m.insert("slategrey", (112, 128, 144));
        m.insert("snow", (255, 250, 250));
        m.insert("springgreen", (0, 255, 127));
        m.insert("steelblue", (70, 130, 180));
        m.insert("tan", (210, 180, 140));
        m.insert("teal", (0, 128, 128));
        m.insert("thistle", (216, 191, 216));
        m.insert("tomato", (255, 99, 71));
        m.insert("turquoise", (64, 224, 208));
        m.insert("violet", (238, 130, 238));
        m.insert("wheat", (245, 222, 179));
        m.insert("white", (255, 255, 255));
        m.insert("whitesmoke", (245, 245, 245));
        m.insert("yellow", (255, 255, 0));
        m.insert("yellowgreen", (154, 205, 50));
        m
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_color("#ff0000"), Some(Color::from_rgb(255, 0, 0)));
        assert_eq!(parse_color("#F00"), Some(Color::from_rgb(255, 0, 0)));
        let translucent = parse_color("#00ff0080").unwrap();
        assert_eq!(translucent.g, 255);
        assert!((translucent.a - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(parse_color("#12"), None);
        assert_eq!(parse_color("#ggg"), None);
    }

    #[test]
    fn test_parse_functions() {
        assert_eq!(parse_color("rgb(0, 255, 0)"), Some(Color::from_rgb(0, 255, 0)));
        assert_eq!(
            parse_color("rgba(10,20,30,0.5)"),
            Some(Color::new(10, 20, 30, 0.5))
        );
        assert_eq!(
            parse_color("rgb(100%, 0%, 50%)"),
            Some(Color::from_rgb(255, 0, 128))
        );
        assert_eq!(parse_color("hsl(120, 100%, 50%)"), Some(Color::from_rgb(0, 255, 0)));
    }

    #[test]
    fn test_parse_named() {
        assert_eq!(parse_color("red"), Some(Color::from_rgb(255, 0, 0)));
        assert_eq!(parse_color(" CornflowerBlue "), Some(Color::from_rgb(100, 149, 237)));
        assert_eq!(parse_color("transparent"), Some(Color::TRANSPARENT));
        assert_eq!(parse_color("currentColor"), None);
    }

    #[test]
    fn test_display_and_normalize() {
        assert_eq!(Color::from_rgb(255, 0, 0).to_string(), "#ff0000");
        assert_eq!(Color::new(1, 2, 3, 0.5).to_string(), "rgba(1, 2, 3, 0.5)");
        assert_eq!(normalize_color("rgb(1.4, 2, 3)"), "rgba(1, 2, 3, 1)");
        assert_eq!(normalize_color("red"), "red");
        assert_eq!(normalize_color("bogus"), "bogus");
    }
}
