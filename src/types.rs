//! Shared boundary types for the stage.
//!
//! This module defines the two key data contracts:
//! - Engine → Surface (in-memory): geometry, paint and `DrawCommand`s
//! - Renderer → Player (in-memory): terminal `Cell` grids and their diffs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::loader::ImageData;
use crate::error::StageError;

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }
}

impl std::ops::Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Size { width, height }
    }

    pub fn is_zero(&self) -> bool {
        self.width == 0.0 && self.height == 0.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect { x, y, width, height }
    }

    pub fn from_origin(top_left: Point, size: Size) -> Self {
        Rect::new(top_left.x, top_left.y, size.width, size.height)
    }

    /// Inclusive on every edge, so a click on the border counts as a hit.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }
}

/// A coordinate that is either absolute or a percentage of some basis that is
/// only known at draw time (box size, measured text width, image size).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Absolute(f64),
    Percent(f64),
}

impl Axis {
    pub fn resolve(&self, basis: f64) -> f64 {
        match *self {
            Axis::Absolute(v) => v,
            Axis::Percent(p) => basis * (p / 100.0),
        }
    }
}

impl Default for Axis {
    fn default() -> Self {
        Axis::Absolute(0.0)
    }
}

impl From<f64> for Axis {
    fn from(v: f64) -> Self {
        Axis::Absolute(v)
    }
}

/// Shorthand for `Axis::Percent`.
pub fn percent(value: f64) -> Axis {
    Axis::Percent(value)
}

// ---------------------------------------------------------------------------
// Paint primitives
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Color { r, g, b, a }
    }

    /// Builds a color from a packed `0xRRGGBB` integer.
    pub const fn from_hex(value: u32) -> Self {
        Color::rgb((value >> 16) as u8, (value >> 8) as u8, value as u8)
    }

    pub fn is_opaque(&self) -> bool {
        self.a == 255
    }

    /// Composite `self` over `under`, ignoring the alpha of `under`.
    pub fn over(&self, under: Color) -> Color {
        let a = self.a as u32;
        let mix = |top: u8, bottom: u8| ((top as u32 * a + bottom as u32 * (255 - a)) / 255) as u8;
        Color::rgb(mix(self.r, under.r), mix(self.g, under.g), mix(self.b, under.b))
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

impl From<u32> for Color {
    fn from(value: u32) -> Self {
        Color::from_hex(value)
    }
}

fn named_color(name: &str) -> Option<Color> {
    let c = match name {
        "black" => Color::BLACK,
        "white" => Color::WHITE,
        "red" => Color::rgb(255, 0, 0),
        "green" => Color::rgb(0, 128, 0),
        "lime" => Color::rgb(0, 255, 0),
        "blue" => Color::rgb(0, 0, 255),
        "yellow" => Color::rgb(255, 255, 0),
        "cyan" | "aqua" => Color::rgb(0, 255, 255),
        "magenta" | "fuchsia" => Color::rgb(255, 0, 255),
        "gray" | "grey" => Color::rgb(128, 128, 128),
        "orange" => Color::rgb(255, 165, 0),
        "pink" => Color::rgb(255, 192, 203),
        "purple" => Color::rgb(128, 0, 128),
        "transparent" => Color::TRANSPARENT,
        _ => return None,
    };
    Some(c)
}

fn parse_hex(hex: &str) -> Option<Color> {
    let digit = |i: usize| u8::from_str_radix(hex.get(i..i + 1)?, 16).ok();
    let pair = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    match hex.len() {
        3 => Some(Color::rgb(digit(0)? * 17, digit(1)? * 17, digit(2)? * 17)),
        4 => Some(Color::rgba(digit(0)? * 17, digit(1)? * 17, digit(2)? * 17, digit(3)? * 17)),
        6 => Some(Color::rgb(pair(0)?, pair(2)?, pair(4)?)),
        8 => Some(Color::rgba(pair(0)?, pair(2)?, pair(4)?, pair(6)?)),
        _ => None,
    }
}

/// `rgb(r, g, b)` / `rgba(r, g, b, a)` with `a` in `0.0..=1.0`.
fn parse_functional(s: &str) -> Option<Color> {
    let (args, has_alpha) = if let Some(rest) = s.strip_prefix("rgba(") {
        (rest.strip_suffix(')')?, true)
    } else {
        (s.strip_prefix("rgb(")?.strip_suffix(')')?, false)
    };
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    let expected = if has_alpha { 4 } else { 3 };
    if parts.len() != expected {
        return None;
    }
    let channel = |p: &str| p.parse::<f64>().ok().map(|v| v.clamp(0.0, 255.0).round() as u8);
    let a = if has_alpha {
        let a = parts[3].parse::<f64>().ok()?;
        (a.clamp(0.0, 1.0) * 255.0).round() as u8
    } else {
        255
    };
    Some(Color::rgba(channel(parts[0])?, channel(parts[1])?, channel(parts[2])?, a))
}

impl FromStr for Color {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();
        let parsed = match lower.strip_prefix('#') {
            Some(hex) => parse_hex(hex),
            None => named_color(&lower).or_else(|| parse_functional(&lower)),
        };
        parsed.ok_or_else(|| StageError::InvalidStyle {
            kind: "color",
            value: trimmed.to_string(),
        })
    }
}

impl TryFrom<String> for Color {
    type Error = StageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(c: Color) -> String {
        c.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_opaque() {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

/// How a node's shape is painted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Paint {
    #[default]
    Fill,
    Stroke,
}

impl FromStr for Paint {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fill" => Ok(Paint::Fill),
            "stroke" => Ok(Paint::Stroke),
            other => Err(StageError::InvalidStyle {
                kind: "paint style",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    #[default]
    Start,
    End,
    Left,
    Right,
    Center,
}

impl TextAlign {
    /// Offset of the text's left edge relative to the anchor, for a
    /// left-to-right layout.
    pub fn left_offset(&self, width: f64) -> f64 {
        match self {
            TextAlign::Start | TextAlign::Left => 0.0,
            TextAlign::End | TextAlign::Right => -width,
            TextAlign::Center => -width / 2.0,
        }
    }
}

impl FromStr for TextAlign {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(TextAlign::Start),
            "end" => Ok(TextAlign::End),
            "left" => Ok(TextAlign::Left),
            "right" => Ok(TextAlign::Right),
            "center" => Ok(TextAlign::Center),
            other => Err(StageError::InvalidStyle {
                kind: "text align",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Baseline {
    Top,
    Hanging,
    Middle,
    #[default]
    Alphabetic,
    Ideographic,
    Bottom,
}

impl Baseline {
    /// Offset of the text's top edge relative to the anchor, for a line of
    /// the given height.
    pub fn top_offset(&self, height: f64) -> f64 {
        match self {
            Baseline::Top | Baseline::Hanging => 0.0,
            Baseline::Middle => -height / 2.0,
            Baseline::Alphabetic | Baseline::Ideographic | Baseline::Bottom => -height,
        }
    }
}

impl FromStr for Baseline {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top" => Ok(Baseline::Top),
            "hanging" => Ok(Baseline::Hanging),
            "middle" => Ok(Baseline::Middle),
            "alphabetic" => Ok(Baseline::Alphabetic),
            "ideographic" => Ok(Baseline::Ideographic),
            "bottom" => Ok(Baseline::Bottom),
            other => Err(StageError::InvalidStyle {
                kind: "text baseline",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    pub size: f64,
    pub family: String,
    pub bold: bool,
    pub align: TextAlign,
    pub baseline: Baseline,
}

impl Default for Font {
    fn default() -> Self {
        Font {
            size: 16.0,
            family: "sans-serif".into(),
            bold: false,
            align: TextAlign::Start,
            baseline: Baseline::Alphabetic,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TextMetrics {
    pub width: f64,
    pub height: f64,
}

// ---------------------------------------------------------------------------
// Engine → Surface boundary (in-memory only, never serialized)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    FillRect {
        rect: Rect,
        color: Color,
    },
    StrokeRect {
        rect: Rect,
        color: Color,
        line_width: f64,
    },
    FillText {
        text: String,
        at: Point,
        font: Font,
        color: Color,
    },
    StrokeText {
        text: String,
        at: Point,
        font: Font,
        color: Color,
    },
    Image {
        image: ImageData,
        rect: Rect,
    },
}

// ---------------------------------------------------------------------------
// Renderer → Player boundary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalContract {
    pub width: u16,
    pub height: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub bold: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Cell {
            ch: ' ',
            fg: None,
            bg: None,
            bold: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellChange {
    pub x: u16,
    pub y: u16,
    pub cell: Cell,
}
