//! Player: the terminal host.
//!
//! Drives the engine at a fixed frame cadence, rasterizes each recorded
//! frame, and writes only the cells that changed. Mouse clicks are
//! translated from cells to surface pixels before they reach the engine.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use crossterm::event::{self, Event, KeyEvent, KeyEventKind, MouseButton, MouseEventKind};
use crossterm::{cursor, execute, queue, style, terminal};
use log::warn;

use crate::config::{KeyBindings, matches_binding};
use crate::engine::Engine;
use crate::menubar::{menu_items, print_menu_item};
use crate::renderer::Renderer;
use crate::types::{Cell, CellChange, Color, TerminalContract};

/// Rows reserved above the canvas for the menu bar.
const CANVAS_OFFSET: u16 = 1;
/// Rows taken by the menu bar and the status bar together.
const CHROME_ROWS: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Advance,
    ToggleDebug,
    Quit,
}

fn action_for(keys: &KeyBindings, key: &KeyEvent) -> Option<Action> {
    if matches_binding(&keys.quit, key) || matches_binding(&keys.quit_alt, key) {
        Some(Action::Quit)
    } else if matches_binding(&keys.advance, key) || matches_binding(&keys.advance_alt, key) {
        Some(Action::Advance)
    } else if matches_binding(&keys.toggle_debug, key) {
        Some(Action::ToggleDebug)
    } else {
        None
    }
}

pub struct Player {
    engine: Engine,
    renderer: Renderer,
    grid: Vec<Vec<Cell>>,
    frame_interval: Duration,
    frames: u64,
}

impl Player {
    pub fn new(engine: Engine) -> Self {
        let size = engine.context().size();
        let frame_interval = Duration::from_millis(engine.context().config.frame_interval_ms.max(1));
        let renderer = Renderer::new(size, TerminalContract { width: 1, height: 1 });
        Self {
            engine,
            grid: renderer.blank(),
            renderer,
            frame_interval,
            frames: 0,
        }
    }

    /// Play the engine's scene in the terminal.
    ///
    /// Sets up the terminal, enters the event loop, and restores the terminal
    /// on exit (even on error).
    pub fn play(&mut self) -> Result<()> {
        let (term_w, term_h) = terminal::size()?;
        if term_w < 20 || term_h < CHROME_ROWS + 5 {
            bail!("Terminal too small: need at least 20x{}, have {}x{}", CHROME_ROWS + 5, term_w, term_h);
        }
        self.resize(term_w, term_h);

        let mut stdout = io::stdout();
        terminal::enable_raw_mode()?;
        execute!(
            stdout,
            terminal::EnterAlternateScreen,
            event::EnableMouseCapture,
            cursor::Hide,
            terminal::Clear(terminal::ClearType::All),
        )?;

        let result = self.run_loop(&mut stdout);

        // Always restore terminal state.
        let _ = execute!(
            stdout,
            event::DisableMouseCapture,
            cursor::Show,
            terminal::LeaveAlternateScreen
        );
        let _ = terminal::disable_raw_mode();

        result
    }

    fn resize(&mut self, term_w: u16, term_h: u16) {
        let contract = TerminalContract {
            width: term_w,
            height: term_h.saturating_sub(CHROME_ROWS).max(1),
        };
        self.renderer = Renderer::new(self.engine.context().size(), contract);
        self.engine.set_glyph_metrics(self.renderer.glyph_metrics());
        self.grid = self.renderer.blank();
    }

    // -----------------------------------------------------------------------
    // Event loop
    // -----------------------------------------------------------------------

    fn run_loop(&mut self, stdout: &mut io::Stdout) -> Result<()> {
        let clock = Instant::now();
        self.render_menubar(stdout)?;
        self.render_full(stdout)?;

        loop {
            let frame_start = Instant::now();
            self.engine.tick(clock.elapsed().as_secs_f64() * 1000.0)?;
            self.frames += 1;

            let next = self.renderer.rasterize(self.engine.commands());
            let changes = Renderer::diff(&self.grid, &next);
            self.grid = next;
            self.render_changes(stdout, &changes)?;
            self.render_status(stdout)?;

            let deadline = frame_start + self.frame_interval;
            while let Some(timeout) = deadline.checked_duration_since(Instant::now()) {
                if !event::poll(timeout)? {
                    break;
                }
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        let keys = self.engine.context().config.key_bindings.clone();
                        match action_for(&keys, &key) {
                            Some(Action::Quit) => return Ok(()),
                            Some(Action::Advance) => {
                                let anchor = self.engine.textbox_anchor();
                                self.click(anchor);
                            }
                            Some(Action::ToggleDebug) => self.engine.toggle_debug(),
                            None => {}
                        }
                    }
                    Event::Mouse(mouse) if mouse.kind == MouseEventKind::Down(MouseButton::Left) => {
                        if mouse.row >= CANVAS_OFFSET {
                            let point = self.renderer.cell_center(mouse.column, mouse.row - CANVAS_OFFSET);
                            self.click(point);
                        }
                    }
                    Event::Resize(w, h) => {
                        self.resize(w, h);
                        queue!(stdout, terminal::Clear(terminal::ClearType::All))?;
                        self.render_menubar(stdout)?;
                        self.render_full(stdout)?;
                    }
                    _ => {}
                }
            }
        }
    }

    fn click(&mut self, point: crate::types::Point) {
        if let Err(e) = self.engine.click(point) {
            warn!("click at ({:.0}, {:.0}) failed: {e}", point.x, point.y);
        }
    }

    // -----------------------------------------------------------------------
    // Terminal output
    // -----------------------------------------------------------------------

    fn render_menubar(&self, stdout: &mut io::Stdout) -> Result<()> {
        let items = menu_items(&self.engine.context().config.key_bindings);
        queue!(
            stdout,
            cursor::MoveTo(0, 0),
            terminal::Clear(terminal::ClearType::CurrentLine),
            style::Print(" "),
        )?;
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                queue!(stdout, style::Print("  "))?;
            }
            print_menu_item(stdout, item)?;
        }
        stdout.flush()?;
        Ok(())
    }

    fn render_full(&self, stdout: &mut io::Stdout) -> Result<()> {
        for (y, row) in self.grid.iter().enumerate() {
            queue!(stdout, cursor::MoveTo(0, y as u16 + CANVAS_OFFSET))?;
            for cell in row {
                queue!(stdout, style::PrintStyledContent(styled(cell)))?;
            }
        }
        stdout.flush()?;
        Ok(())
    }

    fn render_changes(&self, stdout: &mut io::Stdout, changes: &[CellChange]) -> Result<()> {
        for change in changes {
            queue!(
                stdout,
                cursor::MoveTo(change.x, change.y + CANVAS_OFFSET),
                style::PrintStyledContent(styled(&change.cell)),
            )?;
        }
        stdout.flush()?;
        Ok(())
    }

    fn render_status(&self, stdout: &mut io::Stdout) -> Result<()> {
        let status_y = self.renderer.contract().height + CANVAS_OFFSET;
        let scene = self.engine.scene().map_or("-", |s| s.name());
        let paused = if self.engine.context().progression_paused() { " | paused" } else { "" };
        let status = format!(" {scene} | frame {}{paused} ", self.frames);

        let mut cs = style::ContentStyle::default();
        cs.attributes.set(style::Attribute::Dim);

        queue!(
            stdout,
            cursor::MoveTo(0, status_y),
            terminal::Clear(terminal::ClearType::CurrentLine),
            style::PrintStyledContent(style::StyledContent::new(cs, status)),
        )?;
        stdout.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Style conversion
// ---------------------------------------------------------------------------

fn styled(cell: &Cell) -> style::StyledContent<char> {
    let mut cs = style::ContentStyle::default();
    cs.foreground_color = cell.fg.map(to_ct_color);
    cs.background_color = cell.bg.map(to_ct_color);
    if cell.bold {
        cs.attributes.set(style::Attribute::Bold);
    }
    style::StyledContent::new(cs, cell.ch)
}

pub fn to_ct_color(c: Color) -> style::Color {
    style::Color::Rgb { r: c.r, g: c.g, b: c.b }
}
