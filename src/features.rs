//! Pluggable feature generation from decoded event records
//!
//! A [`FeatureGenerator`] maps one record to zero or more categorical
//! `(feature_name, feature_value)` pairs. The frequency counter wraps each
//! pair with the record's event type to form an [`EventFeatureTuple`]; a
//! record that generates nothing contributes the fallback `(event_type)`
//! tuple instead, so every line lands in at least one bucket.

use crate::augment::OptArgTable;
use crate::event::{ArgValue, Event, EventFeatureTuple};
use regex::Regex;

/// One categorical feature: name and value
pub type Feature = (String, String);

/// A pure function deriving categorical features from a decoded record
pub trait FeatureGenerator {
    /// Stable identifier, persisted with a trained model so detection can
    /// reconstruct the same generator list
    fn id(&self) -> &'static str;

    /// Derive this generator's features for one record
    fn generate(&self, event: &Event) -> Vec<Feature>;
}

/// Emits one feature per symbolic flag token of decoded optional arguments
#[derive(Debug, Clone)]
pub struct OptArgFeatures {
    table: OptArgTable,
}

impl OptArgFeatures {
    pub fn new(table: OptArgTable) -> Self {
        Self { table }
    }
}

impl FeatureGenerator for OptArgFeatures {
    fn id(&self) -> &'static str {
        "option-arg"
    }

    fn generate(&self, event: &Event) -> Vec<Feature> {
        let Some(names) = self.table.get(&event.event_type) else {
            return Vec::new();
        };

        let mut features = Vec::new();
        for name in names {
            if let Some(ArgValue::Opt(opt)) = event.args.get(name) {
                features.extend(
                    opt.options
                        .iter()
                        .map(|option| (name.clone(), option.clone())),
                );
            }
        }
        features
    }
}

/// Default path-prefix patterns: the top-level directories of a Linux root
pub const DEFAULT_FD_PATH_PATTERNS: [&str; 12] = [
    r"^/bin", r"^/dev", r"^/etc", r"^/home", r"^/lib", r"^/proc", r"^/run", r"^/sbin", r"^/sys",
    r"^/tmp", r"^/usr", r"^/var",
];

/// Emits the fd type and, for files and UNIX sockets, path-pattern matches
#[derive(Debug, Clone)]
pub struct FdFeatures {
    path_patterns: Vec<Regex>,
}

impl FdFeatures {
    /// Compile the given path-prefix patterns
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let path_patterns = patterns
            .into_iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { path_patterns })
    }
}

impl Default for FdFeatures {
    fn default() -> Self {
        Self::new(DEFAULT_FD_PATH_PATTERNS).expect("default path patterns are valid")
    }
}

impl FeatureGenerator for FdFeatures {
    fn id(&self) -> &'static str {
        "fd"
    }

    fn generate(&self, event: &Event) -> Vec<Feature> {
        let Some(ArgValue::Fd(fd)) = event.args.get("fd") else {
            // Absent, undecoded, or a syscall error: nothing to emit.
            return Vec::new();
        };

        let mut features = vec![("fd_type".to_string(), fd.fd_type.clone())];

        // Path patterns only apply to regular files and UNIX sockets.
        if fd.fd_type != "f" && fd.fd_type != "u" {
            return features;
        }
        for pattern in &self.path_patterns {
            if pattern.is_match(&fd.location) {
                features.push(("fd_path_pattern".to_string(), pattern.as_str().to_string()));
            }
        }
        features
    }
}

/// Build a record's full event-feature tuple set
///
/// Concatenates all active generators' features, each wrapped with the
/// record's event type; falls back to the singleton `(event_type)` when no
/// generator produced anything.
pub fn event_feature_tuples(
    event: &Event,
    generators: &[Box<dyn FeatureGenerator>],
) -> Vec<EventFeatureTuple> {
    let mut tuples: Vec<EventFeatureTuple> = generators
        .iter()
        .flat_map(|generator| generator.generate(event))
        .map(|(name, value)| EventFeatureTuple::feature(&event.event_type, &name, &value))
        .collect();

    if tuples.is_empty() {
        tuples.push(EventFeatureTuple::fallback(&event.event_type));
    }
    tuples
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::ArgParser;
    use crate::augment::{FdAugmenter, OptArgAugmenter};
    use crate::parser::LineParser;

    fn decoded_event(line: &str) -> Event {
        let event = LineParser::new().parse_line(line).unwrap();
        let event = ArgParser::default().parse(event).unwrap();
        let event = OptArgAugmenter::new(OptArgTable::default())
            .augment(event)
            .unwrap();
        FdAugmenter::new().augment(event).unwrap()
    }

    fn default_generators() -> Vec<Box<dyn FeatureGenerator>> {
        vec![
            Box::new(OptArgFeatures::new(OptArgTable::default())),
            Box::new(FdFeatures::default()),
        ]
    }

    #[test]
    fn test_opt_arg_features_one_pair_per_flag() {
        let event =
            decoded_event("1 00:00:01.000000000 0 cc (9) > mmap prot=3(PROT_READ|PROT_WRITE)");
        let features = OptArgFeatures::new(OptArgTable::default()).generate(&event);

        assert_eq!(
            features,
            vec![
                ("prot".to_string(), "PROT_READ".to_string()),
                ("prot".to_string(), "PROT_WRITE".to_string()),
            ]
        );
    }

    #[test]
    fn test_opt_arg_features_empty_for_unconfigured_event() {
        let event = decoded_event("1 00:00:01.000000000 0 cat (9) > read size=8");
        let features = OptArgFeatures::new(OptArgTable::default()).generate(&event);
        assert!(features.is_empty());
    }

    #[test]
    fn test_fd_features_type_always_emitted() {
        let event = decoded_event("1 00:00:01.000000000 0 curl (9) > connect fd=5(<4t>10.0.0.1:443)");
        let features = FdFeatures::default().generate(&event);

        // Not a file or UNIX socket, so only the type feature appears.
        assert_eq!(features, vec![("fd_type".to_string(), "4t".to_string())]);
    }

    #[test]
    fn test_fd_features_path_pattern_for_files() {
        let event = decoded_event("1 00:00:01.000000000 0 cat (9) > open fd=3(<f>/etc/passwd)");
        let features = FdFeatures::default().generate(&event);

        assert_eq!(
            features,
            vec![
                ("fd_type".to_string(), "f".to_string()),
                ("fd_path_pattern".to_string(), "^/etc".to_string()),
            ]
        );
    }

    #[test]
    fn test_fd_features_unix_socket_matches_patterns() {
        let event =
            decoded_event("1 00:00:01.000000000 0 dbus (9) > connect fd=4(<u>/run/dbus/socket)");
        let features = FdFeatures::default().generate(&event);

        assert!(features.contains(&("fd_type".to_string(), "u".to_string())));
        assert!(features.contains(&("fd_path_pattern".to_string(), "^/run".to_string())));
    }

    #[test]
    fn test_fd_features_no_match_outside_patterns() {
        let event = decoded_event("1 00:00:01.000000000 0 cat (9) > open fd=3(<f>/nonstandard/x)");
        let features = FdFeatures::default().generate(&event);
        assert_eq!(features, vec![("fd_type".to_string(), "f".to_string())]);
    }

    #[test]
    fn test_fd_features_skip_syscall_error() {
        let event = decoded_event("1 00:00:01.000000000 0 cat (9) < open fd=-2(ENOENT)");
        let features = FdFeatures::default().generate(&event);
        assert!(features.is_empty());
    }

    #[test]
    fn test_tuples_wrap_event_type() {
        let event = decoded_event("1 00:00:01.000000000 0 cat (9) > open fd=3(<f>/etc/passwd) flags=1(O_RDONLY)");
        let tuples = event_feature_tuples(&event, &default_generators());

        assert!(tuples.contains(&EventFeatureTuple::feature("open", "flags", "O_RDONLY")));
        assert!(tuples.contains(&EventFeatureTuple::feature("open", "fd_type", "f")));
        assert!(tuples.contains(&EventFeatureTuple::feature("open", "fd_path_pattern", "^/etc")));
        assert_eq!(tuples.len(), 3);
    }

    #[test]
    fn test_fallback_tuple_when_no_generator_fires() {
        let event = decoded_event("1 00:00:01.000000000 0 cat (9) > read size=8");
        let tuples = event_feature_tuples(&event, &default_generators());
        assert_eq!(tuples, vec![EventFeatureTuple::fallback("read")]);
    }

    #[test]
    fn test_fallback_tuple_with_no_generators() {
        let event = decoded_event("1 00:00:01.000000000 0 cat (9) > open flags=1(O_RDONLY)");
        let tuples = event_feature_tuples(&event, &[]);
        assert_eq!(tuples, vec![EventFeatureTuple::fallback("open")]);
    }

    #[test]
    fn test_custom_path_patterns() {
        let generator = FdFeatures::new([r"^/opt", r"^/srv"]).unwrap();
        let event = decoded_event("1 00:00:01.000000000 0 app (9) > open fd=3(<f>/srv/data.db)");
        let features = generator.generate(&event);
        assert!(features.contains(&("fd_path_pattern".to_string(), "^/srv".to_string())));
    }

    #[test]
    fn test_invalid_path_pattern_is_rejected() {
        assert!(FdFeatures::new(["("]).is_err());
    }
}
