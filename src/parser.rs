//! Line grammar for sysdig trace logs
//!
//! One trimmed line looks like:
//!
//! ```text
//! 120 00:00:01.500000000 3 bash (1000) > open fd=3(<f>/etc/passwd) flags=1(O_RDONLY)
//! ```
//!
//! i.e. sequence number, timestamp, cpu id, process name, `(thread id)`,
//! direction character, event type, and optional trailing arguments text. The
//! trailing text is left raw here; see [`crate::args`] for the next stage.

use crate::event::{Direction, Event};
use regex::Regex;
use thiserror::Error;

/// Errors for the parsing stages of the pipeline
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("unrecognized log line: {line}")]
    LineFormat { line: String },

    #[error("unrecognized time format: {text}")]
    TimeFormat { text: String },

    #[error("unrecognized argument format: {text}")]
    ArgFormat { text: String },
}

/// Result type for parsing operations
pub type Result<T> = std::result::Result<T, ParseError>;

/// Parser for the fixed single-line grammar
#[derive(Debug, Clone)]
pub struct LineParser {
    line_re: Regex,
    time_re: Regex,
}

impl LineParser {
    pub fn new() -> Self {
        Self {
            line_re: Regex::new(r"^(\d+) ([\d.:]+) (\d+) ([^(]+) \((\d+)\) ([<>]) ([^ ]+) ?(.*)$")
                .expect("line grammar regex is valid"),
            time_re: Regex::new(r"^(\d+):(\d+):(\d+)\.(\d+)$").expect("time regex is valid"),
        }
    }

    /// Parse one trimmed raw line into a typed event record
    ///
    /// The arguments slot stays raw text; an absent trailing section becomes
    /// the empty string.
    pub fn parse_line(&self, raw_line: &str) -> Result<Event<String>> {
        let caps = self
            .line_re
            .captures(raw_line)
            .ok_or_else(|| ParseError::LineFormat {
                line: raw_line.to_string(),
            })?;

        let line_err = || ParseError::LineFormat {
            line: raw_line.to_string(),
        };

        let seq: u64 = caps[1].parse().map_err(|_| line_err())?;
        let time_ns = self.parse_time(&caps[2])?;
        let cpu: u32 = caps[3].parse().map_err(|_| line_err())?;
        let thread: u64 = caps[5].parse().map_err(|_| line_err())?;
        let direction = caps[6]
            .chars()
            .next()
            .and_then(Direction::from_char)
            .ok_or_else(line_err)?;

        Ok(Event {
            seq,
            time_ns,
            cpu,
            process: caps[4].to_string(),
            thread,
            direction,
            event_type: caps[7].to_string(),
            args: caps.get(8).map_or("", |m| m.as_str()).to_string(),
        })
    }

    /// Parse an `H:M:S.fraction` timestamp
    ///
    /// The value is `(H*3600 + M*60 + S) * 10^9` plus the fractional digit
    /// string parsed as an integer, verbatim. The fractional width is NOT
    /// rescaled: sysdig emits nine digits, so the sum is nanoseconds there,
    /// but a shorter or longer fractional part yields a value in no fixed
    /// unit. Downstream only needs the value to be deterministic per line, so
    /// the literal behavior is kept.
    pub fn parse_time(&self, time_str: &str) -> Result<u64> {
        let caps = self
            .time_re
            .captures(time_str)
            .ok_or_else(|| ParseError::TimeFormat {
                text: time_str.to_string(),
            })?;

        let time_err = || ParseError::TimeFormat {
            text: time_str.to_string(),
        };

        let h: u64 = caps[1].parse().map_err(|_| time_err())?;
        let m: u64 = caps[2].parse().map_err(|_| time_err())?;
        let s: u64 = caps[3].parse().map_err(|_| time_err())?;
        let frac: u64 = caps[4].parse().map_err(|_| time_err())?;

        Ok((h * 3600 + m * 60 + s) * 1_000_000_000 + frac)
    }
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}
