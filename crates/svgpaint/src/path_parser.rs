//! Path data tokenizer and the cursor the path element drives.
//!
//! The parser does not know how to draw. [`crate::shapes`] walks it command by command,
//! pulling coordinates with [`PathParser::get_point`] and friends until
//! [`PathParser::is_command_or_end`] says the implicit repetition is over.

use crate::geometry::Point;
use crate::util::number_tokens;

/// Cursor over tokenized path data.
#[derive(Debug, Clone)]
pub struct PathParser {
    tokens: Vec<String>,
    i: isize,
    pub command: Option<char>,
    pub previous_command: Option<char>,
    /// Origin of the current subpath
    pub start: Point,
    /// Pen position
    pub current: Point,
    /// Last control point, for `S` and `T` reflection
    pub control: Point,
    points: Vec<Point>,
    angles: Vec<Option<f64>>,
}

fn is_command_letter(c: char) -> bool {
    matches!(
        c,
        'M' | 'm' | 'L' | 'l' | 'H' | 'h' | 'V' | 'v' | 'C' | 'c' | 'S' | 's' | 'Q' | 'q' | 'T'
            | 't' | 'A' | 'a' | 'Z' | 'z'
    )
}

fn is_argument_char(c: char) -> bool {
    matches!(c, '+' | '-' | 'e' | 'E' | '.' | ',') || c.is_ascii_digit() || c.is_whitespace()
}

/// Split path data into command letters and numeric literals.
///
/// Each command letter takes the run of argument characters after it; characters outside
/// the grammar are skipped.
pub fn tokenize(path: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = path;

    while let Some(pos) = rest.find(is_command_letter) {
        let after = &rest[pos..];
        let mut chars = after.chars();
        let Some(command) = chars.next() else {
            break;
        };
        tokens.push(command.to_string());

        let args = chars.as_str();
        let end = args.find(|c: char| !is_argument_char(c)).unwrap_or(args.len());
        tokens.extend(number_tokens(&args[..end]).into_iter().map(str::to_string));
        rest = &args[end..];
    }

    tokens
}

impl PathParser {
    pub fn new(path: &str) -> Self {
        Self {
            tokens: tokenize(path),
            i: -1,
            command: None,
            previous_command: None,
            start: Point::default(),
            current: Point::default(),
            control: Point::default(),
            points: Vec::new(),
            angles: Vec::new(),
        }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Rewind to before the first token and clear all pen and marker state.
    pub fn reset(&mut self) {
        self.i = -1;
        self.command = None;
        self.previous_command = None;
        self.start = Point::default();
        self.current = Point::default();
        self.control = Point::default();
        self.points.clear();
        self.angles.clear();
    }

    pub fn is_end(&self) -> bool {
        self.i >= self.tokens.len() as isize - 1
    }

    pub fn is_command_or_end(&self) -> bool {
        if self.is_end() {
            return true;
        }
        self.peek()
            .map(|token| {
                let mut chars = token.chars();
                matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_alphabetic())
            })
            .unwrap_or(true)
    }

    pub fn is_relative_command(&self) -> bool {
        matches!(
            self.command,
            Some('m' | 'l' | 'h' | 'v' | 'c' | 's' | 'q' | 't' | 'a' | 'z')
        )
    }

    fn peek(&self) -> Option<&str> {
        usize::try_from(self.i + 1)
            .ok()
            .and_then(|next| self.tokens.get(next))
            .map(String::as_str)
    }

    fn next_token(&mut self) -> Option<&str> {
        self.i += 1;
        usize::try_from(self.i)
            .ok()
            .and_then(|i| self.tokens.get(i))
            .map(String::as_str)
    }

    /// Next token as a number; `NaN` when it is missing or not numeric. Always advances.
    pub fn get_scalar(&mut self) -> f64 {
        self.next_token()
            .and_then(|token| token.parse().ok())
            .unwrap_or(f64::NAN)
    }

    /// Advance to the next command letter.
    pub fn next_command(&mut self) {
        self.previous_command = self.command;
        self.command = self.next_token().and_then(|token| token.chars().next());
    }

    /// Next coordinate pair, made absolute for relative commands.
    pub fn get_point(&mut self) -> Point {
        let x = self.get_scalar();
        let y = self.get_scalar();
        self.make_absolute(Point::new(x, y))
    }

    pub fn get_as_control_point(&mut self) -> Point {
        let point = self.get_point();
        self.control = point;
        point
    }

    pub fn get_as_current_point(&mut self) -> Point {
        let point = self.get_point();
        self.current = point;
        point
    }

    /// First control point of a smooth curve.
    ///
    /// Only a preceding curve command leaves a control point to mirror; otherwise this is
    /// the pen position itself.
    pub fn get_reflected_control_point(&self) -> Point {
        let previous = self.previous_command.map(|c| c.to_ascii_lowercase());
        if !matches!(previous, Some('c' | 's' | 'q' | 't')) {
            return self.current;
        }
        Point::new(
            2.0 * self.current.x - self.control.x,
            2.0 * self.current.y - self.control.y,
        )
    }

    pub fn make_absolute(&self, point: Point) -> Point {
        if self.is_relative_command() {
            point.translate(self.current.x, self.current.y)
        } else {
            point
        }
    }

    /// Record a marker position.
    ///
    /// `from` gives the incoming direction. `prior_to` is the point the previous marker
    /// heads toward, used to fill in its angle if it was still unknown.
    pub fn add_marker(&mut self, point: Point, from: Option<Point>, prior_to: Option<Point>) {
        if let Some(prior_to) = prior_to {
            if let (Some(last_point), Some(last_angle)) = (self.points.last(), self.angles.last_mut())
            {
                if last_angle.is_none() {
                    *last_angle = Some(last_point.angle_to(&prior_to));
                }
            }
        }
        let angle = from.map(|from| from.angle_to(&point));
        self.add_marker_angle(point, angle);
    }

    pub fn add_marker_angle(&mut self, point: Point, angle: Option<f64>) {
        self.points.push(point);
        self.angles.push(angle);
    }

    pub fn get_marker_points(&self) -> &[Point] {
        &self.points
    }

    /// Marker angles with every gap filled.
    ///
    /// An unknown angle takes the next known one. Trailing gaps take the last known angle,
    /// and a path with no known angle at all reports zero.
    pub fn get_marker_angles(&mut self) -> Vec<f64> {
        let len = self.angles.len();
        for i in 0..len {
            if self.angles[i].is_none() {
                self.angles[i] = self.angles[i + 1..].iter().find_map(|a| *a);
            }
        }
        let mut previous = None;
        for angle in self.angles.iter_mut() {
            match angle {
                Some(a) => previous = Some(*a),
                None => *angle = previous,
            }
        }
        self.angles.iter().map(|a| a.unwrap_or(0.0)).collect()
    }
}
