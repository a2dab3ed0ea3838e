//! Lazy, single-pass pipeline over raw log lines
//!
//! Stages chain as pull-driven iterator adapters: reader, line parser, event
//! filter, argument parser, then the enabled augmenters. Each stage consumes
//! the previous stage's stream and may drop items but never reorders or
//! duplicates them. Nothing is buffered beyond the record in flight; the file
//! handle is scoped to the iterator and closed on drop, whichever way the
//! traversal ends.

use crate::args::{ArgExtractors, ArgParser};
use crate::augment::{FdAugmenter, OptArgAugmenter, OptArgTable};
use crate::event::Event;
use crate::features::{FdFeatures, FeatureGenerator, OptArgFeatures, DEFAULT_FD_PATH_PATTERNS};
use crate::filter::EventFilter;
use crate::parser::{LineParser, ParseError};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors surfaced while processing a log file
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("I/O error reading log: {0}")]
    Io(#[from] io::Error),

    #[error("invalid fd path pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Selectable feature families, mirrored by the augmenter/generator pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFeature {
    /// Optional-argument flag decoding and features (`option-arg`)
    OptionArg,
    /// File-descriptor decoding and features (`fd`)
    Fd,
}

impl LogFeature {
    /// Identifier used on the CLI and in persisted models
    pub fn id(&self) -> &'static str {
        match self {
            LogFeature::OptionArg => "option-arg",
            LogFeature::Fd => "fd",
        }
    }
}

impl FromStr for LogFeature {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "option-arg" => Ok(LogFeature::OptionArg),
            "fd" => Ok(LogFeature::Fd),
            other => Err(format!(
                "unknown log feature: {other} (expected option-arg or fd)"
            )),
        }
    }
}

/// Configuration for one pipeline run
///
/// Every table is owned here and constructed explicitly; two runs never share
/// mutable configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Event types dropped by the filter stage
    pub exclude_events: Vec<String>,
    /// Fail on unparseable argument remainders instead of discarding them
    pub strict_args: bool,
    /// Per-name argument value extraction strategies
    pub extractors: ArgExtractors,
    /// Event type to optional-argument-name table
    pub opt_args: OptArgTable,
    /// Path-prefix patterns for fd location features
    pub fd_path_patterns: Vec<String>,
    /// Enabled feature families, in order
    pub features: Vec<LogFeature>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            exclude_events: vec!["switch".to_string()],
            strict_args: false,
            extractors: ArgExtractors::default(),
            opt_args: OptArgTable::default(),
            fd_path_patterns: DEFAULT_FD_PATH_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            features: vec![LogFeature::OptionArg, LogFeature::Fd],
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict_args(mut self, strict: bool) -> Self {
        self.strict_args = strict;
        self
    }

    pub fn with_excluded_events<I, S>(mut self, events: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_events = events.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_features(mut self, features: Vec<LogFeature>) -> Self {
        self.features = features;
        self
    }

    pub fn with_opt_args(mut self, table: OptArgTable) -> Self {
        self.opt_args = table;
        self
    }

    pub fn with_fd_path_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fd_path_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Assemble the pipeline stages for this configuration
    pub fn build_pipeline(&self) -> Pipeline {
        Pipeline {
            parser: LineParser::new(),
            filter: EventFilter::excluding(self.exclude_events.iter().cloned()),
            args: ArgParser::new(self.extractors.clone(), self.strict_args),
            opt_augmenter: self
                .features
                .contains(&LogFeature::OptionArg)
                .then(|| OptArgAugmenter::new(self.opt_args.clone())),
            fd_augmenter: self
                .features
                .contains(&LogFeature::Fd)
                .then(FdAugmenter::new),
        }
    }

    /// Build the feature generators matching the enabled feature families
    pub fn build_generators(&self) -> Result<Vec<Box<dyn FeatureGenerator>>> {
        let mut generators: Vec<Box<dyn FeatureGenerator>> = Vec::new();
        for feature in &self.features {
            match feature {
                LogFeature::OptionArg => {
                    generators.push(Box::new(OptArgFeatures::new(self.opt_args.clone())));
                }
                LogFeature::Fd => {
                    generators.push(Box::new(FdFeatures::new(&self.fd_path_patterns)?));
                }
            }
        }
        Ok(generators)
    }
}

/// Read trimmed, non-empty lines from a log file
///
/// The file handle lives inside the returned iterator and is released when
/// the iterator is dropped, including on early abandonment.
pub fn lines_from_file(path: &Path) -> io::Result<impl Iterator<Item = io::Result<String>>> {
    let file = File::open(path)?;
    Ok(BufReader::new(file).lines().filter_map(|line| match line {
        Ok(line) => {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(Ok(trimmed.to_string()))
            }
        }
        Err(e) => Some(Err(e)),
    }))
}

/// The composed stage chain for one configuration
///
/// Reusable across files; all per-file state lives in the iterators returned
/// by [`Pipeline::events`].
#[derive(Debug)]
pub struct Pipeline {
    parser: LineParser,
    filter: EventFilter,
    args: ArgParser,
    opt_augmenter: Option<OptArgAugmenter>,
    fd_augmenter: Option<FdAugmenter>,
}

impl Pipeline {
    /// Stream decoded events from one log file
    pub fn events<'a>(
        &'a self,
        path: &Path,
    ) -> Result<impl Iterator<Item = Result<Event>> + 'a> {
        tracing::debug!(path = %path.display(), "processing log file");
        let lines = lines_from_file(path)?;
        Ok(self.events_from_lines(lines))
    }

    /// Stream decoded events from an already-open line source
    pub fn events_from_lines<'a, I>(&'a self, lines: I) -> impl Iterator<Item = Result<Event>> + 'a
    where
        I: Iterator<Item = io::Result<String>> + 'a,
    {
        lines
            // Parse each raw line into a typed record.
            .map(move |line| -> Result<Event<String>> {
                Ok(self.parser.parse_line(&line?)?)
            })
            // Drop excluded event types; errors pass through to the consumer.
            .filter(move |result| match result {
                Ok(event) => self.filter.should_keep(&event.event_type),
                Err(_) => true,
            })
            // Parse the raw arguments text, then decode selected values.
            .map(move |result| {
                let event = self.args.parse(result?)?;
                let event = match &self.opt_augmenter {
                    Some(augmenter) => augmenter.augment(event)?,
                    None => event,
                };
                let event = match &self.fd_augmenter {
                    Some(augmenter) => augmenter.augment(event)?,
                    None => event,
                };
                Ok(event)
            })
    }
}
