use anstyle::{AnsiColor, Effects, Style};

pub(crate) const GREEN: Style = AnsiColor::Green.on_default().effects(Effects::BOLD);
pub(crate) const YELLOW: Style = AnsiColor::Yellow.on_default().effects(Effects::BOLD);
pub(crate) const RED: Style = AnsiColor::Red.on_default().effects(Effects::BOLD);
pub(crate) const CYAN: Style = AnsiColor::Cyan.on_default().effects(Effects::BOLD);

/// Prints `status` right-aligned in a fixed column, followed by `message`.
pub(crate) fn write_status(style: &Style, status: &str, message: &str) {
  println!("{}{status:>12}{} {message}", style.render(), style.render_reset());
}
