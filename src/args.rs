//! Argument string parsing for event records
//!
//! The trailing text of a log line is a run of `name=value` and bare `name`
//! (flag) entries. Values are extracted by a per-name strategy because some
//! arguments (`data`, `exe`, ...) embed spaces and some (`fd`, `res`) carry a
//! parenthesized suffix that belongs to the value.

use crate::event::{ArgMap, ArgValue, Event};
use crate::parser::{ParseError, Result};
use regex::Regex;
use std::collections::HashMap;

/// How to pull one raw value out of the remaining arguments text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractStrategy {
    /// Read up to the next space (the default)
    NextSpace,
    /// Read everything to the end of the line; for values with embedded spaces
    UntilLineEnd,
    /// Read a token plus an optional trailing `(...)` suffix as one unit
    WithParenthetical,
}

/// Explicit lookup table from argument name to extraction strategy
///
/// Constructed per pipeline rather than shared, so configuration never leaks
/// between runs. Unlisted names use [`ExtractStrategy::NextSpace`].
#[derive(Debug, Clone)]
pub struct ArgExtractors {
    table: HashMap<String, ExtractStrategy>,
}

impl ArgExtractors {
    /// Table with no entries; every name uses the default strategy
    pub fn empty() -> Self {
        Self {
            table: HashMap::new(),
        }
    }

    /// Register a strategy for one argument name
    pub fn with_strategy(mut self, name: impl Into<String>, strategy: ExtractStrategy) -> Self {
        self.table.insert(name.into(), strategy);
        self
    }

    pub fn strategy_for(&self, name: &str) -> ExtractStrategy {
        self.table
            .get(name)
            .copied()
            .unwrap_or(ExtractStrategy::NextSpace)
    }
}

impl Default for ArgExtractors {
    /// The preset for sysdig logs: line-end reads for arguments whose values
    /// embed spaces, parenthetical reads for `fd` and `res`
    fn default() -> Self {
        let mut extractors = Self::empty();
        for name in ["data", "fds", "args", "tuple", "exe", "msg", "name"] {
            extractors = extractors.with_strategy(name, ExtractStrategy::UntilLineEnd);
        }
        for name in ["fd", "res"] {
            extractors = extractors.with_strategy(name, ExtractStrategy::WithParenthetical);
        }
        extractors
    }
}

/// Parser for the raw arguments text of an event record
#[derive(Debug, Clone)]
pub struct ArgParser {
    name_re: Regex,
    paren_re: Regex,
    extractors: ArgExtractors,
    strict: bool,
}

impl ArgParser {
    pub fn new(extractors: ArgExtractors, strict: bool) -> Self {
        Self {
            name_re: Regex::new(r"^(\w+)(=| )(.*)$").expect("argument name regex is valid"),
            paren_re: Regex::new(r"^(-?\w+(?:\([^)]*\))?) ?(.*)$")
                .expect("parenthetical value regex is valid"),
            extractors,
            strict,
        }
    }

    /// Replace the record's raw arguments text with an insertion-ordered map
    pub fn parse(&self, event: Event<String>) -> Result<Event> {
        let args = self.parse_str(&event.args)?;
        Ok(event.with_args(args))
    }

    /// Parse an arguments string into name/value entries
    ///
    /// With strict parsing off, an unparseable remainder ends the loop and is
    /// dropped; with it on, the remainder is an error.
    pub fn parse_str(&self, raw: &str) -> Result<ArgMap> {
        let mut args = ArgMap::new();
        let mut rest = raw;

        while !rest.is_empty() {
            let Some(caps) = self.name_re.captures(rest) else {
                if self.strict {
                    return Err(ParseError::ArgFormat {
                        text: rest.to_string(),
                    });
                }
                tracing::debug!(remainder = rest, "discarding unparseable arguments remainder");
                break;
            };

            let name = caps[1].to_string();
            let delimiter = &caps[2];
            // Slice the tail out of `rest` by offset so extraction borrows
            // stay tied to the input string.
            let tail_start = caps.get(3).map_or(rest.len(), |m| m.start());

            if delimiter == "=" {
                let tail = &rest[tail_start..];
                let (value, remaining) = self.extract(&name, tail)?;
                args.insert(name, ArgValue::Text(value.to_string()));
                rest = remaining;
            } else {
                args.insert(name, ArgValue::Flag);
                rest = &rest[tail_start..];
            }
        }

        Ok(args)
    }

    /// Apply the per-name strategy to the text following `name=`
    fn extract<'t>(&self, name: &str, text: &'t str) -> Result<(&'t str, &'t str)> {
        match self.extractors.strategy_for(name) {
            ExtractStrategy::NextSpace => Ok(match text.split_once(' ') {
                Some((value, rest)) => (value, rest),
                None => (text, ""),
            }),
            ExtractStrategy::UntilLineEnd => Ok((text, "")),
            ExtractStrategy::WithParenthetical => {
                let caps = self
                    .paren_re
                    .captures(text)
                    .ok_or_else(|| ParseError::ArgFormat {
                        text: text.to_string(),
                    })?;
                let value = caps.get(1).map_or("", |m| m.as_str());
                let rest = caps.get(2).map_or("", |m| m.as_str());
                Ok((value, rest))
            }
        }
    }
}

impl Default for ArgParser {
    fn default() -> Self {
        Self::new(ArgExtractors::default(), false)
    }
}
