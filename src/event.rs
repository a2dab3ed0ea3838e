//! Typed event model for sysdig trace log records
//!
//! A log line moves through the pipeline as an [`Event`] whose arguments slot
//! is progressively refined: the line parser yields `Event<String>` (raw
//! trailing text), the argument parser turns it into `Event<ArgMap>` with each
//! argument held as a tagged [`ArgValue`], and the augmenters replace selected
//! `Text` values with decoded variants in place.

use serde::{Deserialize, Serialize};

/// Direction of a syscall event: entering or exiting the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    /// `>` in the log
    Enter,
    /// `<` in the log
    Exit,
}

impl Direction {
    /// Map a direction character from the log grammar
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '>' => Some(Direction::Enter),
            '<' => Some(Direction::Exit),
            _ => None,
        }
    }
}

/// A decoded optional argument: integer value plus symbolic flag tokens
///
/// Example: `flags=1(O_RDONLY)` decodes to value 1, options `["O_RDONLY"]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptArg {
    pub value: i64,
    /// Pipe-delimited tokens in their original order; empty when the log
    /// carried no parenthesized list
    pub options: Vec<String>,
}

/// A syscall error result: negative code plus symbolic errno name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyscallError {
    pub code: i64,
    pub name: String,
}

/// A decoded file descriptor: value, type code and location text
///
/// The type code is the character(s) inside the angle brackets of the log's
/// `fd=3(<f>/etc/passwd)` form; location is whatever follows them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FdArg {
    pub value: i64,
    pub fd_type: String,
    pub location: String,
}

/// One argument slot, staged from raw text to decoded variants
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    /// Undecoded raw value text
    Text(String),
    /// Argument name present with no value (`name ` instead of `name=value`)
    Flag,
    /// Decoded optional argument
    Opt(OptArg),
    /// Decoded syscall error result
    Error(SyscallError),
    /// Decoded file descriptor
    Fd(FdArg),
}

impl ArgValue {
    /// Raw text payload, if this slot is still undecoded
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ArgValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Insertion-ordered name to value mapping for event arguments
///
/// Argument order in the log line is part of the record; a plain `HashMap`
/// would lose it. Lines carry a handful of arguments, so linear lookup on a
/// `Vec` is the right trade.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArgMap {
    entries: Vec<(String, ArgValue)>,
}

impl ArgMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, overwriting in place if the name already exists so the
    /// original position is kept
    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ArgValue> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Iterate entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One parsed log line
///
/// The type parameter is the current stage of the arguments slot: `String`
/// straight out of the line parser, [`ArgMap`] after argument parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct Event<A = ArgMap> {
    /// Monotonic sequence number
    pub seq: u64,
    /// Event time: whole seconds scaled by 10^9 plus the literal fractional
    /// digit string (see `parser::parse_time` for the width caveat)
    pub time_ns: u64,
    pub cpu: u32,
    pub process: String,
    pub thread: u64,
    pub direction: Direction,
    pub event_type: String,
    pub args: A,
}

impl<A> Event<A> {
    /// Replace the arguments slot, moving the record to the next stage
    pub fn with_args<B>(self, args: B) -> Event<B> {
        Event {
            seq: self.seq,
            time_ns: self.time_ns,
            cpu: self.cpu,
            process: self.process,
            thread: self.thread,
            direction: self.direction,
            event_type: self.event_type,
            args,
        }
    }
}

/// Bucket key for frequency counting: `(event_type)` as the fallback form or
/// `(event_type, feature_name, feature_value)` per generated feature
///
/// Ordering is element-wise lexicographic with a shorter tuple sorting before
/// its extensions, which keeps training-time and detection-time vocabularies
/// in the same order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventFeatureTuple(Vec<String>);

impl EventFeatureTuple {
    /// Fallback singleton `(event_type)` for records with no generated features
    pub fn fallback(event_type: &str) -> Self {
        Self(vec![event_type.to_string()])
    }

    /// Full form `(event_type, feature_name, feature_value)`
    pub fn feature(event_type: &str, name: &str, value: &str) -> Self {
        Self(vec![
            event_type.to_string(),
            name.to_string(),
            value.to_string(),
        ])
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}
