//! Renderer: the deterministic rasterizer.
//!
//! Takes the `DrawCommand`s the engine recorded for one frame and paints
//! them onto a terminal cell grid, scaling surface pixels down to cells.
//! Commands are applied in order, so later ones paint over earlier ones.
//!
//! The renderer knows nothing about scenes, dialog, or time. Given the same
//! commands it always produces the same grid.

use crate::engine::loader::ImageData;
use crate::engine::surface::GlyphMetrics;
use crate::types::{Cell, CellChange, Color, DrawCommand, Font, Point, Rect, Size, TerminalContract};

/// Color the grid is composited over where nothing has been painted yet.
const BACKDROP: Color = Color::BLACK;
/// Drawn for images the loader did not decode pixels for.
const IMAGE_PLACEHOLDER: char = '▒';

pub struct Renderer {
    surface: Size,
    contract: TerminalContract,
}

impl Renderer {
    pub fn new(surface: Size, contract: TerminalContract) -> Self {
        Renderer { surface, contract }
    }

    pub fn contract(&self) -> TerminalContract {
        self.contract
    }

    /// Surface pixels covered by one cell.
    pub fn cell_size(&self) -> Size {
        Size::new(
            self.surface.width / self.contract.width.max(1) as f64,
            self.surface.height / self.contract.height.max(1) as f64,
        )
    }

    /// Metrics the engine should measure text with so layout matches the
    /// grid: one glyph per cell.
    pub fn glyph_metrics(&self) -> GlyphMetrics {
        let cell = self.cell_size();
        GlyphMetrics::Cells {
            width: cell.width,
            height: cell.height,
        }
    }

    /// Centre of a cell in surface pixels.
    pub fn cell_center(&self, col: u16, row: u16) -> Point {
        let cell = self.cell_size();
        Point::new((col as f64 + 0.5) * cell.width, (row as f64 + 0.5) * cell.height)
    }

    pub fn blank(&self) -> Vec<Vec<Cell>> {
        vec![vec![Cell::default(); self.contract.width as usize]; self.contract.height as usize]
    }

    /// Rasterize one frame of draw commands onto a fresh grid.
    pub fn rasterize(&self, commands: &[DrawCommand]) -> Vec<Vec<Cell>> {
        let mut grid = self.blank();
        for command in commands {
            match command {
                DrawCommand::FillRect { rect, color } => self.fill_rect(&mut grid, *rect, *color),
                DrawCommand::StrokeRect { rect, color, .. } => self.stroke_rect(&mut grid, *rect, *color),
                DrawCommand::FillText { text, at, font, color } => self.text(&mut grid, text, *at, font, *color, false),
                DrawCommand::StrokeText { text, at, font, color } => self.text(&mut grid, text, *at, font, *color, true),
                DrawCommand::Image { image, rect } => self.image(&mut grid, image, *rect),
            }
        }
        grid
    }

    /// Compute a cell-level diff between two grids.
    pub fn diff(prev: &[Vec<Cell>], next: &[Vec<Cell>]) -> Vec<CellChange> {
        let mut changes = Vec::new();
        for (y, (prev_row, next_row)) in prev.iter().zip(next.iter()).enumerate() {
            for (x, (prev_cell, next_cell)) in prev_row.iter().zip(next_row.iter()).enumerate() {
                if prev_cell != next_cell {
                    changes.push(CellChange {
                        x: x as u16,
                        y: y as u16,
                        cell: next_cell.clone(),
                    });
                }
            }
        }
        changes
    }

    /// Cells whose centres fall inside `rect`, as half-open column and row
    /// ranges clamped to the grid.
    fn covered(&self, rect: Rect) -> (std::ops::Range<usize>, std::ops::Range<usize>) {
        let cell = self.cell_size();
        let span = |start: f64, len: f64, unit: f64, max: u16| {
            let lo = (start / unit - 0.5).ceil().clamp(0.0, max as f64) as usize;
            let hi = ((start + len) / unit - 0.5).ceil().clamp(0.0, max as f64) as usize;
            lo..hi.max(lo)
        };
        (
            span(rect.x, rect.width, cell.width, self.contract.width),
            span(rect.y, rect.height, cell.height, self.contract.height),
        )
    }

    fn fill_rect(&self, grid: &mut [Vec<Cell>], rect: Rect, color: Color) {
        let (cols, rows) = self.covered(rect);
        for row in &mut grid[rows] {
            for cell in &mut row[cols.clone()] {
                let under = cell.bg.unwrap_or(BACKDROP);
                cell.bg = Some(color.over(under));
                if color.is_opaque() {
                    cell.ch = ' ';
                    cell.fg = None;
                }
            }
        }
    }

    fn stroke_rect(&self, grid: &mut [Vec<Cell>], rect: Rect, color: Color) {
        let (cols, rows) = self.covered(rect);
        if cols.is_empty() || rows.is_empty() {
            return;
        }
        let (left, right) = (cols.start, cols.end - 1);
        let (top, bottom) = (rows.start, rows.end - 1);
        for y in rows.clone() {
            for x in cols.clone() {
                let ch = match (x == left, x == right, y == top, y == bottom) {
                    (true, _, true, _) => '┌',
                    (_, true, true, _) => '┐',
                    (true, _, _, true) => '└',
                    (_, true, _, true) => '┘',
                    (_, _, true, _) | (_, _, _, true) => '─',
                    (true, _, _, _) | (_, true, _, _) => '│',
                    _ => continue,
                };
                let cell = &mut grid[y][x];
                cell.ch = ch;
                cell.fg = Some(color.over(cell.bg.unwrap_or(BACKDROP)));
            }
        }
    }

    fn text(&self, grid: &mut [Vec<Cell>], text: &str, at: Point, font: &Font, color: Color, outline: bool) {
        let cell = self.cell_size();
        let glyphs = text.chars().count() as f64;
        let left = at.x + font.align.left_offset(glyphs * cell.width);
        let top = at.y + font.baseline.top_offset(cell.height);
        let row = (top / cell.height + 0.5).floor();
        if row < 0.0 || row >= self.contract.height as f64 {
            return;
        }
        let row = row as usize;
        let first = (left / cell.width + 0.5).floor();
        for (i, ch) in text.chars().enumerate() {
            let col = first + i as f64;
            if col < 0.0 || col >= self.contract.width as f64 {
                continue;
            }
            let target = &mut grid[row][col as usize];
            if ch == ' ' && !outline {
                continue;
            }
            target.ch = ch;
            target.fg = Some(color.over(target.bg.unwrap_or(BACKDROP)));
            target.bold = font.bold;
        }
    }

    fn image(&self, grid: &mut [Vec<Cell>], image: &ImageData, rect: Rect) {
        let (cols, rows) = self.covered(rect);
        let cell = self.cell_size();
        for y in rows {
            for x in cols.clone() {
                let target = &mut grid[y][x];
                let Some(pixels) = &image.pixels else {
                    target.ch = IMAGE_PLACEHOLDER;
                    target.fg = Some(Color::rgb(0x80, 0x80, 0x80));
                    continue;
                };
                let centre = Point::new((x as f64 + 0.5) * cell.width, (y as f64 + 0.5) * cell.height);
                let u = ((centre.x - rect.x) / rect.width * pixels.width() as f64) as u32;
                let v = ((centre.y - rect.y) / rect.height * pixels.height() as f64) as u32;
                let px = pixels.get_pixel(u.min(pixels.width().saturating_sub(1)), v.min(pixels.height().saturating_sub(1)));
                let [r, g, b, a] = px.0;
                if a == 0 {
                    continue;
                }
                let under = target.bg.unwrap_or(BACKDROP);
                target.bg = Some(Color::rgba(r, g, b, a).over(under));
                target.ch = ' ';
                target.fg = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::types::{Baseline, TextAlign};

    fn renderer() -> Renderer {
        // 10x10 pixel cells.
        Renderer::new(Size::new(100.0, 50.0), TerminalContract { width: 10, height: 5 })
    }

    #[test]
    fn fill_covers_cells_by_centre() {
        let grid = renderer().rasterize(&[DrawCommand::FillRect {
            rect: Rect::new(10.0, 10.0, 20.0, 10.0),
            color: Color::WHITE,
        }]);
        assert_eq!(grid[1][1].bg, Some(Color::WHITE));
        assert_eq!(grid[1][2].bg, Some(Color::WHITE));
        assert_eq!(grid[1][3].bg, None);
        assert_eq!(grid[2][1].bg, None);
    }

    #[test]
    fn translucent_fill_blends_and_keeps_text() {
        let grid = renderer().rasterize(&[
            DrawCommand::FillText {
                text: "hi".into(),
                at: Point::new(0.0, 0.0),
                font: Font {
                    baseline: Baseline::Top,
                    ..Font::default()
                },
                color: Color::WHITE,
            },
            DrawCommand::FillRect {
                rect: Rect::new(0.0, 0.0, 100.0, 50.0),
                color: Color::rgba(255, 255, 255, 128),
            },
        ]);
        assert_eq!(grid[0][0].ch, 'h');
        assert_eq!(grid[0][0].bg, Some(Color::rgb(128, 128, 128)));
    }

    #[test]
    fn text_honours_alignment() {
        let grid = renderer().rasterize(&[DrawCommand::FillText {
            text: "abcd".into(),
            at: Point::new(50.0, 20.0),
            font: Font {
                align: TextAlign::Center,
                baseline: Baseline::Top,
                ..Font::default()
            },
            color: Color::WHITE,
        }]);
        let row: String = grid[2].iter().map(|c| c.ch).collect();
        assert_eq!(row, "   abcd   ");
    }

    #[test]
    fn images_sample_pixels_or_fall_back() {
        let mut pixels = RgbaImage::new(2, 1);
        pixels.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        pixels.put_pixel(1, 0, Rgba([0, 0, 255, 255]));
        let decoded = ImageData {
            src: "flag.png".into(),
            width: 2,
            height: 1,
            pixels: Some(Arc::new(pixels)),
        };
        let grid = renderer().rasterize(&[
            DrawCommand::Image {
                image: decoded,
                rect: Rect::new(0.0, 0.0, 20.0, 10.0),
            },
            DrawCommand::Image {
                image: ImageData {
                    src: "missing.png".into(),
                    width: 1,
                    height: 1,
                    pixels: None,
                },
                rect: Rect::new(50.0, 0.0, 10.0, 10.0),
            },
        ]);
        assert_eq!(grid[0][0].bg, Some(Color::rgb(255, 0, 0)));
        assert_eq!(grid[0][1].bg, Some(Color::rgb(0, 0, 255)));
        assert_eq!(grid[0][5].ch, IMAGE_PLACEHOLDER);
    }

    #[test]
    fn diff_reports_changed_cells_only() {
        let r = renderer();
        let before = r.blank();
        let after = r.rasterize(&[DrawCommand::FillRect {
            rect: Rect::new(0.0, 0.0, 10.0, 10.0),
            color: Color::WHITE,
        }]);
        let changes = Renderer::diff(&before, &after);
        assert_eq!(changes.len(), 1);
        assert_eq!((changes[0].x, changes[0].y), (0, 0));
    }

    #[test]
    fn cell_centres_map_back_to_surface() {
        assert_eq!(renderer().cell_center(3, 2), Point::new(35.0, 25.0));
    }
}
