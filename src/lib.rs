//! A visual-novel stage: a layered scene graph of animated nodes, a
//! typewriter textbox and a dialog engine driven by clicks, with a terminal
//! player as the host.

pub mod config;
pub mod engine;
pub mod error;
pub mod menubar;
pub mod player;
pub mod renderer;
pub mod types;
