//! Terminal output for query hits.

use std::io::{self, Write};

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::index::LineMatch;

/// Prints one `filename: line` row per hit with the matched bytes
/// highlighted. Line bytes are written raw so non-UTF-8 corpora print
/// as-is.
pub fn print_matches(matches: &[LineMatch], color: bool) -> io::Result<()> {
    let choice = if color {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    let mut stdout = StandardStream::stdout(choice);

    for m in matches {
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
        write!(stdout, "{}", m.filename)?;
        stdout.reset()?;
        write!(stdout, ": ")?;

        stdout.write_all(&m.before)?;
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
        stdout.write_all(&m.matched)?;
        stdout.reset()?;
        stdout.write_all(&m.after)?;
        writeln!(stdout)?;
    }

    Ok(())
}
