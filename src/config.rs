use std::path::{Path, PathBuf};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use log::warn;
use serde::{Deserialize, Serialize};

/// Stage-wide settings. Every field has a default so a partial JSON file is
/// enough to override a single value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Render surface width in pixels.
    pub width: u32,
    /// Render surface height in pixels.
    pub height: u32,
    pub debug: bool,
    /// Milliseconds between two revealed characters.
    pub reveal_interval_ms: f64,
    /// Milliseconds between two movement easing steps.
    pub move_cadence_ms: f64,
    /// Target host frame interval in milliseconds.
    pub frame_interval_ms: u64,
    pub key_bindings: KeyBindings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub advance: String,
    pub advance_alt: String,
    pub toggle_debug: String,
    pub quit: String,
    pub quit_alt: String,
}

impl Default for KeyBindings {
    fn default() -> Self {
        KeyBindings {
            advance: "Space".into(),
            advance_alt: "Enter".into(),
            toggle_debug: "d".into(),
            quit: "q".into(),
            quit_alt: "Esc".into(),
        }
    }
}

impl Default for StageConfig {
    fn default() -> Self {
        StageConfig {
            width: 800,
            height: 600,
            debug: false,
            reveal_interval_ms: 15.0,
            move_cadence_ms: 10.0,
            frame_interval_ms: 16,
            key_bindings: KeyBindings::default(),
        }
    }
}

impl StageConfig {
    /// Load the user config, falling back to defaults when it is missing or
    /// invalid.
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => config,
                Err(e) => {
                    warn!("invalid stage config {} ({e}), using defaults", path.display());
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    pub fn builder() -> StageConfigBuilder {
        StageConfigBuilder::default()
    }

    fn config_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".into());
        let mut path = PathBuf::from(home);
        path.push(".config");
        path.push("vn-stage");
        path.push("stage.json");
        path
    }
}

#[derive(Debug, Default)]
pub struct StageConfigBuilder {
    config: StageConfig,
}

impl StageConfigBuilder {
    pub fn width(mut self, width: u32) -> Self {
        self.config.width = width;
        self
    }

    pub fn height(mut self, height: u32) -> Self {
        self.config.height = height;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    pub fn build(self) -> StageConfig {
        self.config
    }
}

/// Check whether a crossterm `KeyEvent` matches a binding string from config.
pub fn matches_binding(binding: &str, event: &KeyEvent) -> bool {
    if let Some(ch) = binding.strip_prefix("Ctrl-") {
        if !event.modifiers.contains(KeyModifiers::CONTROL) {
            return false;
        }
        return match ch.chars().next() {
            Some(c) => event.code == KeyCode::Char(c),
            None => false,
        };
    }

    // Plain bindings must not fire while Ctrl or Alt is held.
    if event.modifiers.contains(KeyModifiers::CONTROL)
        || event.modifiers.contains(KeyModifiers::ALT)
    {
        return false;
    }

    match binding {
        "Enter" => event.code == KeyCode::Enter,
        "Esc" => event.code == KeyCode::Esc,
        "Space" => event.code == KeyCode::Char(' '),
        "Tab" => event.code == KeyCode::Tab,
        "Right" => event.code == KeyCode::Right,
        s => {
            if let Some(rest) = s.strip_prefix('F') {
                if let Ok(n) = rest.parse::<u8>() {
                    return event.code == KeyCode::F(n);
                }
            }
            match s.chars().next() {
                Some(c) => event.code == KeyCode::Char(c),
                None => false,
            }
        }
    }
}
