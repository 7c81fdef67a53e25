//! Grep-style result formatting.

use crate::grep::FileMatches;
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Formatting toggles mapped from the search flags.
#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    /// Prefix each line with the file name (off under `-h`).
    pub with_filename: bool,
    /// Prefix each line with its line number (`-n`).
    pub line_numbers: bool,
    pub color: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            with_filename: true,
            line_numbers: false,
            color: true,
        }
    }
}

pub struct Printer {
    stdout: StandardStream,
    opts: OutputOptions,
}

impl Printer {
    pub fn new(opts: OutputOptions) -> Self {
        let choice = if opts.color {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self {
            stdout: StandardStream::stdout(choice),
            opts,
        }
    }

    /// Print every match in a file, one line per match, with the matched
    /// span highlighted.
    pub fn matches(&mut self, fm: &FileMatches) -> io::Result<()> {
        for m in &fm.matches {
            if self.opts.with_filename {
                self.stdout
                    .set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
                write!(self.stdout, "{}", fm.name)?;
                self.stdout.reset()?;
                write!(self.stdout, ":")?;
            }
            if self.opts.line_numbers {
                self.stdout
                    .set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
                write!(self.stdout, "{}", m.line_number)?;
                self.stdout.reset()?;
                write!(self.stdout, ":")?;
            }
            self.highlighted_line(m.start - m.line_start, m.end - m.line_start, &m.line)?;
        }
        Ok(())
    }

    /// `-l`: the file name alone.
    pub fn file_name(&mut self, fm: &FileMatches) -> io::Result<()> {
        self.stdout
            .set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
        writeln!(self.stdout, "{}", fm.name)?;
        self.stdout.reset()
    }

    /// `-c`: `name:count`, or the bare count under `-h`.
    pub fn count(&mut self, fm: &FileMatches) -> io::Result<()> {
        if self.opts.with_filename {
            self.stdout
                .set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
            write!(self.stdout, "{}", fm.name)?;
            self.stdout.reset()?;
            write!(self.stdout, ":")?;
        }
        writeln!(self.stdout, "{}", fm.count)
    }

    /// Write a line with the byte span `[start, end)` highlighted. Offsets
    /// are clamped to char boundaries of the (lossily decoded) line text.
    fn highlighted_line(&mut self, start: usize, end: usize, line: &str) -> io::Result<()> {
        let safe_start = floor_char_boundary(line, start.min(line.len()));
        let safe_end = floor_char_boundary(line, end.min(line.len()));

        if safe_start > 0 {
            write!(self.stdout, "{}", &line[..safe_start])?;
        }
        if safe_end > safe_start {
            self.stdout
                .set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
            write!(self.stdout, "{}", &line[safe_start..safe_end])?;
            self.stdout.reset()?;
        }
        if safe_end < line.len() {
            write!(self.stdout, "{}", &line[safe_end..])?;
        }
        writeln!(self.stdout)
    }
}

/// Largest char boundary at or below `index`.
fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}
