//! NDJSON event streams.
//!
//! The classic-format ingest adapter emits one canonical-JSON [`Event`]
//! per line; this reader parses them lazily, one line at a time, so that a
//! multi-decade backfill never holds more than one event in memory.

use std::io::BufRead;

use anyhow::{Context, Result};
use canon_core::domain::Event;

/// Iterator over NDJSON events.
///
/// Yields one `Result<Event>` per non-empty line.
pub struct NdjsonEvents<R: BufRead> {
    reader: R,
    line_buffer: String,
    line_number: usize,
}

impl<R: BufRead> NdjsonEvents<R> {
    pub fn new(reader: R) -> Self {
        NdjsonEvents {
            reader,
            line_buffer: String::new(),
            line_number: 0,
        }
    }

    /// Current line number (1-indexed, for error messages).
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl<R: BufRead> Iterator for NdjsonEvents<R> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line_buffer.clear();
            match self.reader.read_line(&mut self.line_buffer) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line_number += 1;
                    let line = self.line_buffer.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let parsed = serde_json::from_str::<Event>(line)
                        .with_context(|| format!("bad event on line {}", self.line_number));
                    return Some(parsed);
                }
                Err(e) => {
                    return Some(
                        Err(e).context(format!("read failed at line {}", self.line_number + 1)),
                    )
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn skips_blank_lines_and_reports_bad_ones() {
        let data = "\n{not json}\n";
        let mut events = NdjsonEvents::new(Cursor::new(data));
        let first = events.next().unwrap();
        assert!(first.is_err());
        assert_eq!(events.line_number(), 2);
        assert!(events.next().is_none());
    }
}
