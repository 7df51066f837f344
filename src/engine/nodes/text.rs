use serde::{Deserialize, Serialize};

use crate::engine::surface::Surface;
use crate::types::{Baseline, Font, Paint, Size, TextAlign, TextMetrics};

use super::{Draw, Props};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextContent {
    pub text: String,
    pub font_size: f64,
    pub font_family: String,
    pub align: TextAlign,
    pub baseline: Baseline,
    #[serde(skip)]
    measured: TextMetrics,
}

impl Default for TextContent {
    fn default() -> Self {
        TextContent {
            text: String::new(),
            font_size: 16.0,
            font_family: "sans-serif".into(),
            align: TextAlign::Start,
            baseline: Baseline::Alphabetic,
            measured: TextMetrics::default(),
        }
    }
}

impl TextContent {
    pub fn new(text: &str) -> Self {
        TextContent {
            text: text.to_string(),
            ..Default::default()
        }
    }

    pub fn with_font_size(mut self, size: f64) -> Self {
        self.font_size = size;
        self
    }

    pub fn with_font_family(mut self, family: &str) -> Self {
        self.font_family = family.to_string();
        self
    }

    pub fn with_align(mut self, align: TextAlign) -> Self {
        self.align = align;
        self
    }

    pub fn with_baseline(mut self, baseline: Baseline) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn font(&self) -> Font {
        Font {
            size: self.font_size,
            family: self.font_family.clone(),
            bold: false,
            align: self.align,
            baseline: self.baseline,
        }
    }

    /// Width of the text as of the last draw.
    pub fn text_width(&self) -> f64 {
        self.measured.width
    }

    /// Height of the text as of the last draw.
    pub fn text_height(&self) -> f64 {
        self.measured.height
    }
}

impl Draw for TextContent {
    fn draw(&mut self, props: &mut Props, surface: &mut dyn Surface) {
        let font = self.font();
        self.measured = surface.measure_text(&self.text, &font);
        let offset = props.origin_offset(Size::new(self.measured.width, props.size.height));
        let at = props.absolute() - offset;
        match props.paint {
            Paint::Fill => surface.fill_text(&self.text, at, &font, props.color),
            Paint::Stroke => surface.stroke_text(&self.text, at, &font, props.color),
        }
    }

    fn footprint(&self, props: &Props) -> Size {
        if props.size.is_zero() {
            Size::new(self.measured.width, self.measured.height)
        } else {
            props.size
        }
    }
}
