//! Textbox: the typewriter reveal engine.
//!
//! Text is flattened into word fragments, each carrying its own style, and
//! revealed one character at a time on a fixed interval. The box slides in
//! before any text is shown; the first character appears on the first draw
//! after the slide completes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Baseline, Color, Font, Point, Rect, TextAlign};
use crate::engine::surface::Surface;

const DEFAULT_FONT_SIZE: f64 = 24.0;
const DEFAULT_FONT_FAMILY: &str = "sans-serif";
const BOX_HEIGHT: f64 = 200.0;
const BOX_MARGIN_X: f64 = 64.0;
const BOX_MARGIN_BOTTOM: f64 = 32.0;
const TEXT_INSET_X: f64 = 8.0;
const TEXT_INSET_Y: f64 = 4.0;
const WRAP_SLACK: f64 = 4.0;
const LINE_GAP: f64 = 2.0;
const SLIDE_START: f64 = -100.0;
const SLIDE_DIVISOR: f64 = 50.0;
/// Text is drawn once the slide-in has passed this point.
const SLIDE_OPEN: f64 = 99.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
}

impl TextStyle {
    /// `self` layered over `defaults`: every field set here wins.
    pub fn over(&self, defaults: &TextStyle) -> TextStyle {
        TextStyle {
            color: self.color.or(defaults.color),
            font_size: self.font_size.or(defaults.font_size),
            font_family: self.font_family.clone().or_else(|| defaults.font_family.clone()),
            bold: self.bold.or(defaults.bold),
        }
    }

    pub fn font(&self) -> Font {
        Font {
            size: self.font_size.unwrap_or(DEFAULT_FONT_SIZE),
            family: self.font_family.clone().unwrap_or_else(|| DEFAULT_FONT_FAMILY.into()),
            bold: self.bold.unwrap_or(false),
            align: TextAlign::Left,
            baseline: Baseline::Top,
        }
    }

    pub fn color_or_default(&self) -> Color {
        self.color.unwrap_or(Color::WHITE)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextTemplate {
    pub text: String,
    #[serde(flatten)]
    pub style: TextStyle,
}

impl From<&str> for TextTemplate {
    fn from(text: &str) -> Self {
        TextTemplate {
            text: text.to_string(),
            style: TextStyle::default(),
        }
    }
}

impl From<String> for TextTemplate {
    fn from(text: String) -> Self {
        TextTemplate {
            text,
            style: TextStyle::default(),
        }
    }
}

/// One piece of input text: a literal, a styled template, or a thunk that
/// produces a template when the text is displayed.
pub enum TextInput {
    Literal(String),
    Template(TextTemplate),
    Deferred(Box<dyn FnOnce() -> TextTemplate>),
}

impl TextInput {
    pub fn deferred(f: impl FnOnce() -> TextTemplate + 'static) -> Self {
        TextInput::Deferred(Box::new(f))
    }

    /// Resolve to a template layered over `defaults`.
    pub fn resolve(self, defaults: &TextStyle) -> TextTemplate {
        let template = match self {
            TextInput::Literal(text) => TextTemplate::from(text),
            TextInput::Template(t) => t,
            TextInput::Deferred(f) => f(),
        };
        TextTemplate {
            style: template.style.over(defaults),
            text: template.text,
        }
    }
}

impl fmt::Debug for TextInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextInput::Literal(s) => f.debug_tuple("Literal").field(s).finish(),
            TextInput::Template(t) => f.debug_tuple("Template").field(t).finish(),
            TextInput::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl From<&str> for TextInput {
    fn from(s: &str) -> Self {
        TextInput::Literal(s.to_string())
    }
}

impl From<String> for TextInput {
    fn from(s: String) -> Self {
        TextInput::Literal(s)
    }
}

impl From<TextTemplate> for TextInput {
    fn from(t: TextTemplate) -> Self {
        TextInput::Template(t)
    }
}

/// An ordered list of text inputs shown as one line.
#[derive(Debug, Default)]
pub struct TextBody(pub Vec<TextInput>);

impl From<TextInput> for TextBody {
    fn from(input: TextInput) -> Self {
        TextBody(vec![input])
    }
}

impl From<&str> for TextBody {
    fn from(s: &str) -> Self {
        TextBody(vec![s.into()])
    }
}

impl From<String> for TextBody {
    fn from(s: String) -> Self {
        TextBody(vec![s.into()])
    }
}

impl From<TextTemplate> for TextBody {
    fn from(t: TextTemplate) -> Self {
        TextBody(vec![t.into()])
    }
}

impl From<Vec<TextInput>> for TextBody {
    fn from(inputs: Vec<TextInput>) -> Self {
        TextBody(inputs)
    }
}

/// Split a template into word fragments. Every word except the last keeps the
/// space that followed it, so joining the fragments gives back the input.
pub fn tokenize(template: &TextTemplate) -> Vec<TextTemplate> {
    let words: Vec<&str> = template.text.split(' ').collect();
    let last = words.len() - 1;
    words
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let mut text = (*w).to_string();
            if i < last {
                text.push(' ');
            }
            TextTemplate {
                text,
                style: template.style.clone(),
            }
        })
        .collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// First `n` characters of `s`.
fn prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

#[derive(Debug, Clone)]
pub struct Textbox {
    title: Option<TextTemplate>,
    fragments: Vec<TextTemplate>,
    defaults: TextStyle,
    revealed: usize,
    reveal_max: usize,
    started: bool,
    carry: f64,
    slide: f64,
}

impl Default for Textbox {
    fn default() -> Self {
        Textbox {
            title: None,
            fragments: Vec::new(),
            defaults: TextStyle::default(),
            revealed: 0,
            reveal_max: 0,
            started: false,
            carry: 0.0,
            slide: SLIDE_START,
        }
    }
}

impl Textbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// A textbox whose slide-in has already finished.
    pub fn opened() -> Self {
        Textbox {
            slide: 100.0,
            ..Self::default()
        }
    }

    /// Replace the current line and start revealing it from the beginning.
    pub fn display(&mut self, text: impl Into<TextBody>, title: Option<TextInput>, defaults: &TextStyle) {
        self.title = title.map(|t| t.resolve(defaults));
        self.fragments = Self::flatten(text.into(), defaults);
        self.defaults = defaults.clone();
        self.reveal_max = self.fragments.iter().map(|f| char_len(&f.text)).sum();
        self.revealed = 0;
        self.carry = 0.0;
        self.started = false;
    }

    /// Append to the current line, keeping what is already revealed. The
    /// appended text takes the defaults of the last `display`.
    pub fn continue_dialog(&mut self, text: impl Into<TextBody>) {
        let added = Self::flatten(text.into(), &self.defaults);
        self.reveal_max += added.iter().map(|f| char_len(&f.text)).sum::<usize>();
        self.fragments.extend(added);
    }

    fn flatten(body: TextBody, defaults: &TextStyle) -> Vec<TextTemplate> {
        body.0
            .into_iter()
            .flat_map(|input| tokenize(&input.resolve(defaults)))
            .collect()
    }

    pub fn finished(&self) -> bool {
        self.revealed >= self.reveal_max
    }

    pub fn revealed(&self) -> usize {
        self.revealed
    }

    pub fn reveal_max(&self) -> usize {
        self.reveal_max
    }

    pub fn started(&self) -> bool {
        self.started
    }

    pub fn title(&self) -> Option<&TextTemplate> {
        self.title.as_ref()
    }

    pub fn fragments(&self) -> &[TextTemplate] {
        &self.fragments
    }

    /// Slide-in progress, from -100 up toward 100.
    pub fn slide_progress(&self) -> f64 {
        self.slide
    }

    /// The characters revealed so far, across all fragments.
    pub fn visible_text(&self) -> String {
        self.fragments.iter().flat_map(|f| f.text.chars()).take(self.revealed).collect()
    }

    /// Begin revealing. Only the first call after a `display` has an effect;
    /// it reveals the first character immediately unless the line was
    /// already fast-forwarded.
    pub fn start_reveal(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        if self.revealed < self.reveal_max {
            self.revealed += 1;
        }
    }

    /// Advance the reveal timer by `dt` milliseconds.
    pub fn advance(&mut self, dt: f64, interval: f64) {
        if !self.started || self.finished() {
            self.carry = 0.0;
            return;
        }
        self.carry += dt;
        while self.carry >= interval && self.revealed < self.reveal_max {
            self.carry -= interval;
            self.revealed += 1;
        }
        if self.finished() {
            self.carry = 0.0;
        }
    }

    /// Reveal everything at once. Does nothing when already finished.
    pub fn fast_forward(&mut self) {
        if self.finished() {
            return;
        }
        self.revealed = self.reveal_max;
        self.carry = 0.0;
    }

    /// Outer rectangle of the box at the current slide progress.
    pub fn box_rect(&self, surface: &dyn Surface) -> Rect {
        let size = surface.size();
        let percent = self.slide.max(0.0) / 100.0;
        let width = (size.width - BOX_MARGIN_X) * percent;
        let center_x = size.width / 2.0;
        let bottom = size.height - BOX_MARGIN_BOTTOM;
        Rect::new(center_x - width / 2.0, bottom - BOX_HEIGHT, width, BOX_HEIGHT)
    }

    pub fn draw(&mut self, surface: &mut dyn Surface) {
        if self.slide < 100.0 {
            self.slide += (100.0 - self.slide) / SLIDE_DIVISOR;
        }
        let rect = self.box_rect(surface);

        if self.slide > 0.0 {
            surface.fill_rect(rect, Color::rgba(0, 0, 0, 128));
            surface.stroke_rect(rect, Color::BLACK, 2.0);
        }

        if self.slide <= SLIDE_OPEN {
            return;
        }

        if let Some(title) = &self.title {
            let font = title.style.font();
            let at = Point::new(rect.x + TEXT_INSET_X, rect.y - font.size);
            surface.fill_text(&title.text, at, &font, title.style.color_or_default());
        }

        if !self.started {
            self.start_reveal();
        }

        let origin = Point::new(rect.x + TEXT_INSET_X, rect.y + TEXT_INSET_Y);
        let mut cursor_x = 0.0;
        let mut line = 0.0;
        let mut shown = 0;
        for fragment in &self.fragments {
            let text = prefix(&fragment.text, self.revealed.saturating_sub(shown));
            let font = fragment.style.font();
            let width = surface.measure_text(text, &font).width;
            if cursor_x + width > rect.width - WRAP_SLACK {
                cursor_x = 0.0;
                line += 1.0;
            }
            shown += char_len(text);
            if !text.is_empty() {
                let at = Point::new(origin.x + cursor_x, origin.y + line * (font.size + LINE_GAP));
                surface.fill_text(text, at, &font, fragment.style.color_or_default());
            }
            cursor_x += width;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::surface::{CommandBuffer, GlyphMetrics};
    use crate::types::{DrawCommand, Size};

    fn surface() -> CommandBuffer {
        CommandBuffer::new(Size::new(800.0, 600.0), GlyphMetrics::Proportional { ratio: 0.5 })
    }

    fn joined(tb: &Textbox) -> String {
        tb.fragments().iter().map(|f| f.text.as_str()).collect()
    }

    #[test]
    fn tokenize_reattaches_spaces() {
        let parts = tokenize(&"Hi there  friend".into());
        let texts: Vec<&str> = parts.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, ["Hi ", "there ", " ", "friend"]);
    }

    #[test]
    fn fragments_round_trip_input() {
        for input in ["", "one", "two words", " leading", "trailing ", "a  b   c"] {
            let mut tb = Textbox::new();
            tb.display(input, None, &TextStyle::default());
            assert_eq!(joined(&tb), input);
            assert_eq!(tb.reveal_max(), input.chars().count());
        }
    }

    #[test]
    fn multiple_inputs_keep_their_styles() {
        let mut tb = Textbox::new();
        let red = TextTemplate {
            text: "red words".into(),
            style: TextStyle {
                color: Some(Color::rgb(255, 0, 0)),
                ..Default::default()
            },
        };
        let defaults = TextStyle {
            font_size: Some(18.0),
            ..Default::default()
        };
        tb.display(vec![TextInput::from("plain "), red.into(), TextInput::deferred(|| "late".into())], None, &defaults);
        assert_eq!(joined(&tb), "plain red wordslate");
        let styles: Vec<_> = tb.fragments().iter().map(|f| (f.style.color, f.style.font_size)).collect();
        assert_eq!(styles[2], (Some(Color::rgb(255, 0, 0)), Some(18.0)));
        assert_eq!(styles[0], (None, Some(18.0)));
    }

    #[test]
    fn reveal_finishes_at_character_count() {
        let mut tb = Textbox::opened();
        tb.display("Hi there", None, &TextStyle::default());
        assert!(!tb.finished());
        tb.start_reveal();
        assert_eq!(tb.revealed(), 1);
        let mut ticks = 0;
        while !tb.finished() {
            tb.advance(15.0, 15.0);
            ticks += 1;
            assert!(tb.revealed() <= tb.reveal_max());
        }
        assert_eq!(tb.revealed(), 8);
        assert_eq!(ticks, 7);
        tb.advance(1000.0, 15.0);
        assert_eq!(tb.revealed(), 8);
        assert!(tb.finished());
    }

    #[test]
    fn start_reveal_is_idempotent() {
        let mut tb = Textbox::opened();
        tb.display("abc", None, &TextStyle::default());
        tb.start_reveal();
        tb.start_reveal();
        assert_eq!(tb.revealed(), 1);
    }

    #[test]
    fn fast_forward_completes_and_then_is_a_no_op() {
        let mut tb = Textbox::opened();
        tb.display("skip me", None, &TextStyle::default());
        tb.start_reveal();
        tb.fast_forward();
        assert!(tb.finished());
        assert_eq!(tb.revealed(), 7);
        tb.fast_forward();
        assert_eq!(tb.revealed(), 7);
    }

    #[test]
    fn continue_dialog_appends_without_resetting() {
        let mut tb = Textbox::opened();
        tb.display("Hello", None, &TextStyle::default());
        tb.start_reveal();
        tb.fast_forward();
        tb.continue_dialog(" again");
        assert_eq!(tb.revealed(), 5);
        assert_eq!(tb.reveal_max(), 11);
        assert!(!tb.finished());
        tb.advance(15.0 * 6.0, 15.0);
        assert!(tb.finished());
        assert_eq!(tb.visible_text(), "Hello again");
    }

    #[test]
    fn display_resets_reveal_state() {
        let mut tb = Textbox::opened();
        tb.display("first", None, &TextStyle::default());
        tb.start_reveal();
        tb.fast_forward();
        tb.display("second", None, &TextStyle::default());
        assert_eq!(tb.revealed(), 0);
        assert!(!tb.started());
        assert!(!tb.finished());
    }

    #[test]
    fn box_slides_in_before_text_appears() {
        let mut tb = Textbox::new();
        tb.display("Hi", Some("Narrator".into()), &TextStyle::default());
        let mut s = surface();
        tb.draw(&mut s);
        assert!(s.texts().is_empty());
        assert!(!tb.started());

        for _ in 0..1000 {
            s.clear();
            tb.draw(&mut s);
            if tb.started() {
                break;
            }
        }
        assert!(tb.slide_progress() > 99.0);
        assert_eq!(s.texts(), vec!["Narrator", "H"]);
    }

    #[test]
    fn fast_forward_during_slide_in_still_shows_the_line() {
        let mut tb = Textbox::new();
        tb.display("Hello", None, &TextStyle::default());
        let mut s = surface();
        tb.draw(&mut s);
        tb.fast_forward();
        assert!(tb.finished());

        while tb.slide_progress() <= SLIDE_OPEN {
            s.clear();
            tb.draw(&mut s);
        }
        assert!(tb.started());
        assert_eq!(s.texts(), vec!["Hello"]);

        tb.continue_dialog(" world");
        for _ in 0..20 {
            tb.advance(15.0, 15.0);
        }
        assert!(tb.finished());
        s.clear();
        tb.draw(&mut s);
        assert_eq!(s.texts().concat(), "Hello world");
    }

    #[test]
    fn continued_text_keeps_the_display_defaults() {
        let mut tb = Textbox::opened();
        let defaults = TextStyle {
            color: Some(Color::rgb(0, 0x56, 0xa2)),
            font_size: Some(18.0),
            ..Default::default()
        };
        tb.display("Hi", None, &defaults);
        tb.continue_dialog(" there");
        for fragment in tb.fragments() {
            assert_eq!(fragment.style, defaults);
        }
    }

    #[test]
    fn wraps_when_fragment_overflows_box() {
        // Box is 736px wide on an 800px surface; glyphs are 12px at 24px.
        let mut tb = Textbox::opened();
        tb.display(format!("ab cd {}", "x".repeat(60)), None, &TextStyle::default());
        tb.start_reveal();
        tb.fast_forward();
        let mut s = surface();
        tb.draw(&mut s);
        let ys: Vec<f64> = s
            .commands()
            .iter()
            .filter_map(|c| match c {
                DrawCommand::FillText { at, .. } => Some(at.y),
                _ => None,
            })
            .collect();
        assert_eq!(ys.len(), 3);
        assert_eq!(ys[0], ys[1]);
        // 72px of short words plus 720px of x's overflows the 732px line.
        assert_eq!(ys[2], ys[0] + 26.0);
    }
}
