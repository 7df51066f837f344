//! The render surface the engine draws onto.
//!
//! `CommandBuffer` is the stock surface: it records `DrawCommand`s for the
//! renderer and answers text measurements from fixed glyph metrics, so the
//! same frame always lays out the same way.

use crate::engine::loader::ImageData;
use crate::types::{Color, DrawCommand, Font, Point, Rect, Size, TextMetrics};

pub trait Surface {
    fn size(&self) -> Size;
    fn clear(&mut self);
    fn fill_rect(&mut self, rect: Rect, color: Color);
    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f64);
    fn fill_text(&mut self, text: &str, at: Point, font: &Font, color: Color);
    fn stroke_text(&mut self, text: &str, at: Point, font: &Font, color: Color);
    fn measure_text(&self, text: &str, font: &Font) -> TextMetrics;
    fn draw_image(&mut self, image: &ImageData, rect: Rect);
}

/// How glyph advances are computed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GlyphMetrics {
    /// Every glyph is `font.size * ratio` wide and `font.size` tall.
    Proportional { ratio: f64 },
    /// Every glyph occupies one fixed cell regardless of font size, as on a
    /// terminal.
    Cells { width: f64, height: f64 },
}

impl GlyphMetrics {
    pub fn measure(&self, text: &str, font: &Font) -> TextMetrics {
        let n = text.chars().count() as f64;
        match *self {
            GlyphMetrics::Proportional { ratio } => TextMetrics {
                width: n * font.size * ratio,
                height: font.size,
            },
            GlyphMetrics::Cells { width, height } => TextMetrics {
                width: n * width,
                height,
            },
        }
    }
}

pub struct CommandBuffer {
    size: Size,
    metrics: GlyphMetrics,
    commands: Vec<DrawCommand>,
}

impl CommandBuffer {
    pub fn new(size: Size, metrics: GlyphMetrics) -> Self {
        CommandBuffer {
            size,
            metrics,
            commands: Vec::new(),
        }
    }

    pub fn set_metrics(&mut self, metrics: GlyphMetrics) {
        self.metrics = metrics;
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Texts of every `FillText` command, in draw order.
    pub fn texts(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DrawCommand::FillText { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl Surface for CommandBuffer {
    fn size(&self) -> Size {
        self.size
    }

    fn clear(&mut self) {
        self.commands.clear();
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.commands.push(DrawCommand::FillRect { rect, color });
    }

    fn stroke_rect(&mut self, rect: Rect, color: Color, line_width: f64) {
        self.commands.push(DrawCommand::StrokeRect {
            rect,
            color,
            line_width,
        });
    }

    fn fill_text(&mut self, text: &str, at: Point, font: &Font, color: Color) {
        self.commands.push(DrawCommand::FillText {
            text: text.to_string(),
            at,
            font: font.clone(),
            color,
        });
    }

    fn stroke_text(&mut self, text: &str, at: Point, font: &Font, color: Color) {
        self.commands.push(DrawCommand::StrokeText {
            text: text.to_string(),
            at,
            font: font.clone(),
            color,
        });
    }

    fn measure_text(&self, text: &str, font: &Font) -> TextMetrics {
        self.metrics.measure(text, font)
    }

    fn draw_image(&mut self, image: &ImageData, rect: Rect) {
        self.commands.push(DrawCommand::Image {
            image: image.clone(),
            rect,
        });
    }
}
