use crate::engine::dialog::{DialogStep, Script};
use crate::engine::textbox::{TextBody, TextStyle, TextTemplate};
use crate::types::Color;

use super::{NodeId, Sprite};

/// A sprite that speaks under its own name.
#[derive(Debug, Clone)]
pub struct Character {
    pub name: String,
    pub sprite: Sprite,
}

impl Character {
    pub const TITLE_SIZE: f64 = 32.0;
    /// Node color for characters created without one.
    pub const DEFAULT_COLOR: Color = Color::rgb(0x00, 0x56, 0xa2);

    pub fn new(name: &str, sprite: Sprite) -> Self {
        Character {
            name: name.to_string(),
            sprite,
        }
    }

    /// The textbox title used when this character speaks.
    pub fn title(&self, color: Color) -> TextTemplate {
        TextTemplate {
            text: self.name.clone(),
            style: TextStyle {
                font_size: Some(Self::TITLE_SIZE),
                ..self.to_text(color).style
            },
        }
    }

    /// The character's name as a bold template in their color, for use inside
    /// other lines.
    pub fn to_text(&self, color: Color) -> TextTemplate {
        TextTemplate {
            text: self.name.clone(),
            style: TextStyle {
                color: Some(color),
                bold: Some(true),
                ..Default::default()
            },
        }
    }
}

/// A dialog step that shows `text` with `speaker`'s name as the title.
pub fn say(speaker: NodeId, text: impl Into<TextBody>) -> DialogStep {
    Script::new().say(speaker, text).into()
}

/// A dialog step that appends `text` to the line currently on screen.
pub fn continue_dialog(text: impl Into<TextBody>) -> DialogStep {
    Script::new().continue_dialog(text).into()
}
