//! Path construction and flattening.

use std::f64::consts::PI;

use serde::Serialize;

use crate::paint::FillRule;

/// Path command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PathCommand {
    MoveTo {
        x: f64,
        y: f64,
    },
    LineTo {
        x: f64,
        y: f64,
    },
    QuadraticCurveTo {
        cpx: f64,
        cpy: f64,
        x: f64,
        y: f64,
    },
    BezierCurveTo {
        cp1x: f64,
        cp1y: f64,
        cp2x: f64,
        cp2y: f64,
        x: f64,
        y: f64,
    },
    Arc {
        x: f64,
        y: f64,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
        counterclockwise: bool,
    },
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    ClosePath,
}

/// A 2D path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path2D {
    commands: Vec<PathCommand>,
}

impl Path2D {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        self.commands.push(PathCommand::MoveTo { x, y });
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        self.commands.push(PathCommand::LineTo { x, y });
    }

    pub fn quadratic_curve_to(&mut self, cpx: f64, cpy: f64, x: f64, y: f64) {
        self.commands
            .push(PathCommand::QuadraticCurveTo { cpx, cpy, x, y });
    }

    pub fn bezier_curve_to(&mut self, cp1x: f64, cp1y: f64, cp2x: f64, cp2y: f64, x: f64, y: f64) {
        self.commands.push(PathCommand::BezierCurveTo {
            cp1x,
            cp1y,
            cp2x,
            cp2y,
            x,
            y,
        });
    }

    pub fn arc(
        &mut self,
        x: f64,
        y: f64,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
        counterclockwise: bool,
    ) {
        self.commands.push(PathCommand::Arc {
            x,
            y,
            radius,
            start_angle,
            end_angle,
            counterclockwise,
        });
    }

    pub fn rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.commands.push(PathCommand::Rect {
            x,
            y,
            width,
            height,
        });
    }

    pub fn close_path(&mut self) {
        self.commands.push(PathCommand::ClosePath);
    }

    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Convert to polylines, one per subpath.
    pub fn to_segments(&self) -> Vec<Vec<(f64, f64)>> {
        let mut segments = Vec::new();
        let mut current_segment: Vec<(f64, f64)> = Vec::new();
        let mut current = (0.0_f64, 0.0_f64);
        let mut start = (0.0_f64, 0.0_f64);

        for cmd in &self.commands {
            match *cmd {
                PathCommand::MoveTo { x, y } => {
                    if !current_segment.is_empty() {
                        segments.push(std::mem::take(&mut current_segment));
                    }
                    current = (x, y);
                    start = (x, y);
                    current_segment.push(current);
                }
                PathCommand::LineTo { x, y } => {
                    if current_segment.is_empty() {
                        current_segment.push(current);
                    }
                    current = (x, y);
                    current_segment.push(current);
                }
                PathCommand::QuadraticCurveTo { cpx, cpy, x, y } => {
                    if current_segment.is_empty() {
                        current_segment.push(current);
                    }
                    current_segment.extend(quadratic_bezier_points(current, (cpx, cpy), (x, y), 20));
                    current = (x, y);
                }
                PathCommand::BezierCurveTo {
                    cp1x,
                    cp1y,
                    cp2x,
                    cp2y,
                    x,
                    y,
                } => {
                    if current_segment.is_empty() {
                        current_segment.push(current);
                    }
                    current_segment.extend(cubic_bezier_points(
                        current,
                        (cp1x, cp1y),
                        (cp2x, cp2y),
                        (x, y),
                        20,
                    ));
                    current = (x, y);
                }
                PathCommand::Arc {
                    x,
                    y,
                    radius,
                    start_angle,
                    end_angle,
                    counterclockwise,
                } => {
                    let points = arc_points(x, y, radius, start_angle, end_angle, counterclockwise, 32);
                    if let Some((&first, rest)) = points.split_first() {
                        if current_segment.is_empty() {
                            start = first;
                        }
                        current_segment.push(first);
                        current_segment.extend_from_slice(rest);
                        current = points.last().copied().unwrap_or(first);
                    }
                }
                PathCommand::Rect {
                    x,
                    y,
                    width,
                    height,
                } => {
                    if !current_segment.is_empty() {
                        segments.push(std::mem::take(&mut current_segment));
                    }
                    segments.push(vec![
                        (x, y),
                        (x + width, y),
                        (x + width, y + height),
                        (x, y + height),
                        (x, y),
                    ]);
                    current = (x, y);
                    start = (x, y);
                }
                PathCommand::ClosePath => {
                    if !current_segment.is_empty() {
                        current_segment.push(start);
                        segments.push(std::mem::take(&mut current_segment));
                    }
                    current = start;
                }
            }
        }

        if !current_segment.is_empty() {
            segments.push(current_segment);
        }

        segments
    }

    /// Check if a point is inside the path.
    pub fn contains_point(&self, x: f64, y: f64, rule: FillRule) -> bool {
        let mut winding = 0i32;
        let mut crossings = 0u32;

        for segment in self.to_segments() {
            if segment.len() < 2 {
                continue;
            }
            // Subpaths are implicitly closed for filling.
            let closing = [segment[segment.len() - 1], segment[0]];
            for edge in segment.windows(2).chain(std::iter::once(&closing[..])) {
                let (x1, y1) = edge[0];
                let (x2, y2) = edge[1];

                if y1 <= y {
                    if y2 > y && x < x1 + (y - y1) / (y2 - y1) * (x2 - x1) {
                        winding += 1;
                        crossings += 1;
                    }
                } else if y2 <= y && x < x1 + (y - y1) / (y2 - y1) * (x2 - x1) {
                    winding -= 1;
                    crossings += 1;
                }
            }
        }

        match rule {
            FillRule::NonZero => winding != 0,
            FillRule::EvenOdd => crossings % 2 == 1,
        }
    }

    /// Check if a point is within `line_width / 2` of the outline.
    pub fn stroke_contains_point(&self, x: f64, y: f64, line_width: f64) -> bool {
        let half_width = line_width / 2.0;

        self.to_segments().iter().any(|segment| {
            segment.windows(2).any(|edge| {
                let (x1, y1) = edge[0];
                let (x2, y2) = edge[1];
                let dx = x2 - x1;
                let dy = y2 - y1;
                let len_sq = dx * dx + dy * dy;
                let t = if len_sq == 0.0 {
                    0.0
                } else {
                    (((x - x1) * dx + (y - y1) * dy) / len_sq).clamp(0.0, 1.0)
                };
                let px = x1 + t * dx;
                let py = y1 + t * dy;
                ((x - px).powi(2) + (y - py).powi(2)).sqrt() <= half_width
            })
        })
    }
}

/// Generate points along a quadratic bezier curve, excluding the start.
fn quadratic_bezier_points(
    p0: (f64, f64),
    p1: (f64, f64),
    p2: (f64, f64),
    segments: usize,
) -> Vec<(f64, f64)> {
    (1..=segments)
        .map(|i| {
            let t = i as f64 / segments as f64;
            let mt = 1.0 - t;
            (
                mt * mt * p0.0 + 2.0 * mt * t * p1.0 + t * t * p2.0,
                mt * mt * p0.1 + 2.0 * mt * t * p1.1 + t * t * p2.1,
            )
        })
        .collect()
}

/// Generate points along a cubic bezier curve, excluding the start.
fn cubic_bezier_points(
    p0: (f64, f64),
    p1: (f64, f64),
    p2: (f64, f64),
    p3: (f64, f64),
    segments: usize,
) -> Vec<(f64, f64)> {
    (1..=segments)
        .map(|i| {
            let t = i as f64 / segments as f64;
            let t2 = t * t;
            let t3 = t2 * t;
            let mt = 1.0 - t;
            let mt2 = mt * mt;
            let mt3 = mt2 * mt;
            (
                mt3 * p0.0 + 3.0 * mt2 * t * p1.0 + 3.0 * mt * t2 * p2.0 + t3 * p3.0,
                mt3 * p0.1 + 3.0 * mt2 * t * p1.1 + 3.0 * mt * t2 * p2.1 + t3 * p3.1,
            )
        })
        .collect()
}

/// Generate points along an arc.
fn arc_points(
    cx: f64,
    cy: f64,
    r: f64,
    start: f64,
    end: f64,
    ccw: bool,
    segments: u32,
) -> Vec<(f64, f64)> {
    let mut angle_diff = end - start;
    if ccw {
        if angle_diff <= -2.0 * PI {
            angle_diff = -2.0 * PI;
        }
        while angle_diff > 0.0 {
            angle_diff -= 2.0 * PI;
        }
    } else {
        if angle_diff >= 2.0 * PI {
            angle_diff = 2.0 * PI;
        }
        while angle_diff < 0.0 {
            angle_diff += 2.0 * PI;
        }
    }

    let num_segments = ((angle_diff.abs() / (2.0 * PI) * segments as f64).ceil() as u32).max(1);
    let step = angle_diff / num_segments as f64;

    (0..=num_segments)
        .map(|i| {
            let angle = start + step * i as f64;
            (cx + r * angle.cos(), cy + r * angle.sin())
        })
        .collect()
}
