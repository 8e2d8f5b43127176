//! Styles for the echo CLI.
//!
//! Renderers use semantic names (a time, a count, a sender) and never pick
//! colors themselves, so the palette can change in one place. `console`
//! disables styling on its own when stdout is not a terminal.

use console::Style;

pub fn muted() -> Style {
    Style::new().dim()
}

pub fn time() -> Style {
    muted().italic()
}

pub fn count() -> Style {
    Style::new().bold()
}

pub fn sender() -> Style {
    Style::new().cyan()
}

pub fn id() -> Style {
    Style::new().yellow()
}

pub fn unread() -> Style {
    Style::new().yellow().bold()
}

pub fn success() -> Style {
    Style::new().green()
}

pub fn warning() -> Style {
    Style::new().yellow().bold()
}
