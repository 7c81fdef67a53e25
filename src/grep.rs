//! Regex scanning over candidate file contents.
//!
//! Each candidate file is scanned independently, line by line; every
//! non-overlapping leftmost match within a line is reported with its line
//! number and byte range in the file. Matching runs on bytes: admission is a
//! pairwise UTF-8 gate, not full validation, so stored content is not
//! guaranteed to be valid UTF-8.

use crate::error::Result;
use regex::bytes::{Regex, RegexBuilder};

/// One match within a line.
#[derive(Debug, Clone)]
pub struct LineMatch {
    /// 1-based line number.
    pub line_number: u32,
    /// Byte offset of the match start within the file.
    pub start: usize,
    /// Byte offset of the match end within the file.
    pub end: usize,
    /// Byte offset where the line begins within the file.
    pub line_start: usize,
    /// The line's text, without its trailing newline.
    pub line: String,
}

/// All matches found in one file.
#[derive(Debug, Clone)]
pub struct FileMatches {
    pub name: String,
    pub count: usize,
    pub matches: Vec<LineMatch>,
}

pub struct Grep {
    regex: Regex,
}

impl Grep {
    /// Compile the search pattern. Anchors bind to line boundaries; `-i`
    /// folds case. The same flags feed the planner so the candidate set and
    /// the scan agree.
    pub fn new(pattern: &str, case_insensitive: bool) -> Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .multi_line(true)
            .case_insensitive(case_insensitive)
            .build()?;
        Ok(Self { regex })
    }

    /// Scan one file's bytes, reporting every non-overlapping match per line.
    pub fn scan(&self, name: &str, content: &[u8]) -> FileMatches {
        let mut matches = Vec::new();
        let mut line_number: u32 = 0;
        let mut offset = 0;

        for raw_line in content.split_inclusive(|&b| b == b'\n') {
            line_number += 1;
            let line = match raw_line {
                [rest @ .., b'\n'] => rest,
                _ => raw_line,
            };
            for m in self.regex.find_iter(line) {
                matches.push(LineMatch {
                    line_number,
                    start: offset + m.start(),
                    end: offset + m.end(),
                    line_start: offset,
                    line: String::from_utf8_lossy(line).into_owned(),
                });
            }
            offset += raw_line.len();
        }

        FileMatches {
            name: name.to_string(),
            count: matches.len(),
            matches,
        }
    }
}
