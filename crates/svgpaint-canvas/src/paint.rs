//! Fill and stroke paints plus the enumerated drawing states.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::color::{parse_color, Color};
use crate::context::{CanvasRenderingContext2D, DrawCommand};
use crate::CanvasError;

// ==================== Paint Style ====================

/// Fill or stroke style.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaintStyle {
    /// Solid color.
    Color(Color),
    /// Linear gradient.
    LinearGradient(LinearGradient),
    /// Radial gradient.
    RadialGradient(RadialGradient),
    /// Pattern.
    Pattern(Pattern),
}

impl Default for PaintStyle {
    fn default() -> Self {
        PaintStyle::Color(Color::BLACK)
    }
}

impl PaintStyle {
    /// Get solid color if applicable.
    pub fn as_color(&self) -> Option<Color> {
        match self {
            PaintStyle::Color(c) => Some(*c),
            _ => None,
        }
    }

    /// Create from a CSS color string, `None` if it does not parse.
    pub fn from_color_string(s: &str) -> Option<Self> {
        parse_color(s).map(PaintStyle::Color)
    }

    /// A solid color with zero alpha paints nothing.
    pub fn is_invisible(&self) -> bool {
        matches!(self, PaintStyle::Color(c) if c.is_invisible())
    }
}

impl From<Color> for PaintStyle {
    fn from(color: Color) -> Self {
        PaintStyle::Color(color)
    }
}

/// Gradient color stop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GradientStop {
    pub offset: f64,
    pub color: Color,
}

fn insert_stop(stops: &mut Vec<GradientStop>, offset: f64, color: Color) {
    stops.push(GradientStop {
        offset: offset.clamp(0.0, 1.0),
        color,
    });
    stops.sort_by(|a, b| a.offset.total_cmp(&b.offset));
}

fn color_at(stops: &[GradientStop], t: f64) -> Color {
    let (first, last) = match (stops.first(), stops.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Color::TRANSPARENT,
    };
    if stops.len() == 1 || t <= first.offset {
        return first.color;
    }
    if t >= last.offset {
        return last.color;
    }

    for pair in stops.windows(2) {
        let (from, to) = (&pair[0], &pair[1]);
        if t >= from.offset && t <= to.offset {
            let range = to.offset - from.offset;
            let local_t = if range > 0.0 {
                (t - from.offset) / range
            } else {
                0.0
            };
            return interpolate_color(&from.color, &to.color, local_t as f32);
        }
    }

    last.color
}

/// Interpolate between two colors.
fn interpolate_color(a: &Color, b: &Color, t: f32) -> Color {
    let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;

    Color {
        r: lerp(a.r, b.r),
        g: lerp(a.g, b.g),
        b: lerp(a.b, b.b),
        a: a.a + (b.a - a.a) * t,
    }
}

/// Linear gradient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearGradient {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    pub stops: Vec<GradientStop>,
}

impl LinearGradient {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x0,
            y0,
            x1,
            y1,
            stops: Vec::new(),
        }
    }

    pub fn add_color_stop(&mut self, offset: f64, color: Color) {
        insert_stop(&mut self.stops, offset, color);
    }

    /// Get color at position (0.0 to 1.0).
    pub fn color_at(&self, t: f64) -> Color {
        color_at(&self.stops, t)
    }
}

/// Radial gradient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadialGradient {
    pub x0: f64,
    pub y0: f64,
    pub r0: f64,
    pub x1: f64,
    pub y1: f64,
    pub r1: f64,
    pub stops: Vec<GradientStop>,
}

impl RadialGradient {
    pub fn new(x0: f64, y0: f64, r0: f64, x1: f64, y1: f64, r1: f64) -> Self {
        Self {
            x0,
            y0,
            r0,
            x1,
            y1,
            r1,
            stops: Vec::new(),
        }
    }

    pub fn add_color_stop(&mut self, offset: f64, color: Color) {
        insert_stop(&mut self.stops, offset, color);
    }

    pub fn color_at(&self, t: f64) -> Color {
        color_at(&self.stops, t)
    }
}

/// Pattern fill: a recorded tile replayed across the painted area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pattern {
    pub width: f64,
    pub height: f64,
    pub commands: Vec<DrawCommand>,
    pub repetition: PatternRepetition,
}

impl Pattern {
    /// Snapshot a recording context as a pattern tile.
    pub fn from_recording(tile: &CanvasRenderingContext2D, repetition: PatternRepetition) -> Self {
        Self {
            width: tile.width,
            height: tile.height,
            commands: tile.commands().to_vec(),
            repetition,
        }
    }
}

/// Pattern repetition mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatternRepetition {
    #[default]
    Repeat,
    RepeatX,
    RepeatY,
    NoRepeat,
}

impl FromStr for PatternRepetition {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "repeat" | "" => Ok(Self::Repeat),
            "repeat-x" => Ok(Self::RepeatX),
            "repeat-y" => Ok(Self::RepeatY),
            "no-repeat" => Ok(Self::NoRepeat),
            other => Err(CanvasError::InvalidValue(other.to_string())),
        }
    }
}

// ==================== Line Style ====================

/// Line cap style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

impl FromStr for LineCap {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "butt" => Ok(Self::Butt),
            "round" => Ok(Self::Round),
            "square" => Ok(Self::Square),
            other => Err(CanvasError::InvalidValue(other.to_string())),
        }
    }
}

/// Line join style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

impl FromStr for LineJoin {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "miter" | "miter-clip" | "arcs" => Ok(Self::Miter),
            "round" => Ok(Self::Round),
            "bevel" => Ok(Self::Bevel),
            other => Err(CanvasError::InvalidValue(other.to_string())),
        }
    }
}

/// Fill rule for `fill` and `clip`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

impl FromStr for FillRule {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "nonzero" => Ok(Self::NonZero),
            "evenodd" => Ok(Self::EvenOdd),
            other => Err(CanvasError::InvalidValue(other.to_string())),
        }
    }
}

// ==================== Text Style ====================

/// Text alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Start,
    End,
    Left,
    Right,
    Center,
}

impl FromStr for TextAlign {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "start" => Ok(Self::Start),
            "end" => Ok(Self::End),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "center" | "middle" => Ok(Self::Center),
            other => Err(CanvasError::InvalidValue(other.to_string())),
        }
    }
}

/// Text baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextBaseline {
    Top,
    Hanging,
    Middle,
    #[default]
    Alphabetic,
    Ideographic,
    Bottom,
}

impl FromStr for TextBaseline {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "top" => Ok(Self::Top),
            "hanging" => Ok(Self::Hanging),
            "middle" => Ok(Self::Middle),
            "alphabetic" => Ok(Self::Alphabetic),
            "ideographic" => Ok(Self::Ideographic),
            "bottom" => Ok(Self::Bottom),
            other => Err(CanvasError::InvalidValue(other.to_string())),
        }
    }
}

// ==================== Compositing ====================

/// Global composite operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompositeOperation {
    #[default]
    SourceOver,
    SourceIn,
    SourceOut,
    SourceAtop,
    DestinationOver,
    DestinationIn,
    DestinationOut,
    DestinationAtop,
    Lighter,
    Copy,
    Xor,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
}

impl FromStr for CompositeOperation {
    type Err = CanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.trim() {
            "source-over" => Self::SourceOver,
            "source-in" => Self::SourceIn,
            "source-out" => Self::SourceOut,
            "source-atop" => Self::SourceAtop,
            "destination-over" => Self::DestinationOver,
            "destination-in" => Self::DestinationIn,
            "destination-out" => Self::DestinationOut,
            "destination-atop" => Self::DestinationAtop,
            "lighter" => Self::Lighter,
            "copy" => Self::Copy,
            "xor" => Self::Xor,
            "multiply" => Self::Multiply,
            "screen" => Self::Screen,
            "overlay" => Self::Overlay,
            "darken" => Self::Darken,
            "lighten" => Self::Lighten,
            "color-dodge" => Self::ColorDodge,
            "color-burn" => Self::ColorBurn,
            "hard-light" => Self::HardLight,
            "soft-light" => Self::SoftLight,
            "difference" => Self::Difference,
            "exclusion" => Self::Exclusion,
            other => return Err(CanvasError::InvalidValue(other.to_string())),
        };
        Ok(op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient() {
        let mut grad = LinearGradient::new(0.0, 0.0, 100.0, 0.0);
        grad.add_color_stop(1.0, Color::from_rgb(0, 0, 255));
        grad.add_color_stop(0.0, Color::from_rgb(255, 0, 0));

        assert_eq!(grad.stops[0].offset, 0.0);
        let mid = grad.color_at(0.5);
        assert!(mid.r > 100 && mid.r < 150);
        assert!(mid.b > 100 && mid.b < 150);
        assert_eq!(grad.color_at(2.0), Color::from_rgb(0, 0, 255));
    }

    #[test]
    fn test_empty_gradient_is_transparent() {
        let grad = RadialGradient::new(0.0, 0.0, 0.0, 0.0, 0.0, 10.0);
        assert_eq!(grad.color_at(0.3), Color::TRANSPARENT);
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("round".parse::<LineCap>().unwrap(), LineCap::Round);
        assert_eq!("bevel".parse::<LineJoin>().unwrap(), LineJoin::Bevel);
        assert_eq!("evenodd".parse::<FillRule>().unwrap(), FillRule::EvenOdd);
        assert_eq!("middle".parse::<TextBaseline>().unwrap(), TextBaseline::Middle);
        assert_eq!(
            "destination-out".parse::<CompositeOperation>().unwrap(),
            CompositeOperation::DestinationOut
        );
        assert!("zigzag".parse::<LineCap>().is_err());
    }

    #[test]
    fn test_invisible_paint() {
        assert!(PaintStyle::Color(Color::TRANSPARENT).is_invisible());
        assert!(!PaintStyle::default().is_invisible());
        assert!(PaintStyle::from_color_string("nonsense").is_none());
    }
}
