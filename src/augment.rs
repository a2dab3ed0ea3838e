//! Argument augmenters: decode selected raw values into richer variants
//!
//! Two decoders run after argument parsing. The optional-argument augmenter
//! rewrites `value(FLAG_A|FLAG_B)` texts into [`OptArg`] for the argument
//! names configured per event type. The file-descriptor augmenter classifies
//! `value(extra)` texts into [`FdArg`] or, for negative values,
//! [`SyscallError`].

use crate::event::{ArgValue, Event, FdArg, OptArg, SyscallError};
use crate::parser::{ParseError, Result};
use regex::Regex;
use std::collections::HashMap;

/// Shared shape of decodable values: `-?digits` plus an optional `(...)` suffix
fn value_with_extra_regex() -> Regex {
    Regex::new(r"^(-?\d+)(?:\(([^)]+)\))?").expect("value/extra regex is valid")
}

/// Table of event type to argument names carrying optional-argument encodings
///
/// Owned by the pipeline that uses it; never a hidden shared default.
#[derive(Debug, Clone)]
pub struct OptArgTable {
    map: HashMap<String, Vec<String>>,
}

impl OptArgTable {
    pub fn empty() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    /// Register the optional-argument names for one event type
    pub fn with_event<I, S>(mut self, event_type: impl Into<String>, arg_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.map.insert(
            event_type.into(),
            arg_names.into_iter().map(Into::into).collect(),
        );
        self
    }

    pub fn get(&self, event_type: &str) -> Option<&[String]> {
        self.map.get(event_type).map(Vec::as_slice)
    }
}

impl Default for OptArgTable {
    /// The sysdig event types whose arguments encode `value(flag|flag)` lists
    fn default() -> Self {
        Self::empty()
            .with_event("mmap", ["prot", "flags"])
            .with_event("futex", ["op"])
            .with_event("access", ["mode"])
            .with_event("open", ["flags"])
            .with_event("fcntl", ["cmd"])
            .with_event("lseek", ["whence"])
            .with_event("clone", ["flags"])
    }
}

/// Decodes optional arguments into [`OptArg`] values in place
#[derive(Debug, Clone)]
pub struct OptArgAugmenter {
    table: OptArgTable,
    value_re: Regex,
}

impl OptArgAugmenter {
    pub fn new(table: OptArgTable) -> Self {
        Self {
            table,
            value_re: value_with_extra_regex(),
        }
    }

    /// Rewrite every configured argument of this event that still holds text
    pub fn augment(&self, mut event: Event) -> Result<Event> {
        let Some(names) = self.table.get(&event.event_type) else {
            return Ok(event);
        };

        for name in names {
            let Some(slot) = event.args.get_mut(name) else {
                continue;
            };
            let Some(text) = slot.as_text() else {
                continue;
            };

            let caps = self
                .value_re
                .captures(text)
                .ok_or_else(|| ParseError::ArgFormat {
                    text: text.to_string(),
                })?;
            let value: i64 = caps[1].parse().map_err(|_| ParseError::ArgFormat {
                text: text.to_string(),
            })?;
            let options = caps
                .get(2)
                .map(|m| m.as_str().split('|').map(String::from).collect())
                .unwrap_or_default();

            *slot = ArgValue::Opt(OptArg { value, options });
        }

        Ok(event)
    }
}

/// Decodes file-descriptor style arguments into [`FdArg`] / [`SyscallError`]
///
/// Applies to the `fd` argument by default; additional names (`res` results
/// share the same wire shape) can be configured.
#[derive(Debug, Clone)]
pub struct FdAugmenter {
    arg_names: Vec<String>,
    outer_re: Regex,
    inner_re: Regex,
}

impl FdAugmenter {
    pub fn new() -> Self {
        Self {
            arg_names: vec!["fd".to_string()],
            outer_re: value_with_extra_regex(),
            inner_re: Regex::new(r"^<(\w+)>(.*)$").expect("fd inner regex is valid"),
        }
    }

    /// Replace the decoded argument-name list
    pub fn with_arg_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arg_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Rewrite every configured argument of this event that still holds text
    pub fn augment(&self, mut event: Event) -> Result<Event> {
        for name in &self.arg_names {
            let Some(slot) = event.args.get_mut(name) else {
                continue;
            };
            let Some(text) = slot.as_text() else {
                continue;
            };

            *slot = self.decode(text)?;
        }

        Ok(event)
    }

    /// Decode one `value(extra)` text
    ///
    /// Negative values are syscall errors with the extra text as errno name;
    /// non-negative values are file descriptors whose extra text, when
    /// present, must be `<type>location`.
    pub fn decode(&self, text: &str) -> Result<ArgValue> {
        let arg_err = || ParseError::ArgFormat {
            text: text.to_string(),
        };

        let caps = self.outer_re.captures(text).ok_or_else(arg_err)?;
        let value: i64 = caps[1].parse().map_err(|_| arg_err())?;
        let extra = caps.get(2).map(|m| m.as_str());

        if value < 0 {
            return Ok(ArgValue::Error(SyscallError {
                code: value,
                name: extra.unwrap_or("").to_string(),
            }));
        }

        let (fd_type, location) = match extra {
            Some(inner) => {
                let caps = self.inner_re.captures(inner).ok_or_else(arg_err)?;
                (caps[1].to_string(), caps[2].to_string())
            }
            None => (String::new(), String::new()),
        };

        Ok(ArgValue::Fd(FdArg {
            value,
            fd_type,
            location,
        }))
    }
}

impl Default for FdAugmenter {
    fn default() -> Self {
        Self::new()
    }
}
