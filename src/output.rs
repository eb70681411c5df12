use std::fmt::Write;

use anstyle::{AnsiColor, Reset, Style};

use crate::commands::locator::CommandReference;

const NAME_STYLE: Style = Style::new().bold();
const ERROR_STYLE: Style = Style::new().fg_color(Some(anstyle::Color::Ansi(AnsiColor::Red)));

/// One entry per script: the name, then the full path indented below it.
#[must_use]
pub fn format_listing(commands: &[CommandReference], color: bool) -> String {
    let mut out = String::new();
    for command in commands {
        if color {
            let _ = writeln!(out, "{NAME_STYLE}{}{Reset}", command.name);
        } else {
            let _ = writeln!(out, "{}", command.name);
        }
        let _ = writeln!(out, "    {}", command.path.display());
    }
    out
}

#[must_use]
pub fn format_error(message: &str, color: bool) -> String {
    if color {
        format!("{ERROR_STYLE}Error:{Reset} {message}")
    } else {
        format!("Error: {message}")
    }
}
