use std::io::Write;

use crossterm::{queue, style};

use crate::config::KeyBindings;

/// Menu entries for the player, labelled with the configured keys.
pub fn menu_items(keys: &KeyBindings) -> Vec<String> {
    vec![
        format!("[click][{}][{}] advance", keys.advance, keys.advance_alt),
        format!("[{}] debug", keys.toggle_debug),
        format!("[{}][{}] quit", keys.quit, keys.quit_alt),
    ]
}

/// Print a menu item string, bolding any text inside `[...]` brackets.
/// Text outside brackets is printed dim.
pub fn print_menu_item(out: &mut impl Write, item: &str) -> anyhow::Result<()> {
    let mut rest = item;
    while let Some(open) = rest.find('[') {
        if open > 0 {
            print_dim(out, &rest[..open])?;
        }
        rest = &rest[open..];
        let Some(close) = rest.find(']') else {
            break;
        };
        queue!(
            out,
            style::SetAttribute(style::Attribute::Bold),
            style::Print(&rest[..=close]),
            style::SetAttribute(style::Attribute::Reset),
        )?;
        rest = &rest[close + 1..];
    }
    if !rest.is_empty() {
        print_dim(out, rest)?;
    }
    Ok(())
}

fn print_dim(out: &mut impl Write, text: &str) -> anyhow::Result<()> {
    queue!(
        out,
        style::SetAttribute(style::Attribute::Dim),
        style::Print(text),
        style::SetAttribute(style::Attribute::Reset),
    )?;
    Ok(())
}
