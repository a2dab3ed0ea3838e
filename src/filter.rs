//! Event filtering by event type
//!
//! Drops records whose event type is in an exclusion set, e.g. the scheduler
//! `switch` events that dominate raw sysdig logs without carrying behavioral
//! signal. Surviving records pass through untouched, in order.

use std::collections::HashSet;

/// Filter that decides which event records survive the pipeline
#[derive(Debug, Clone)]
pub struct EventFilter {
    exclude: HashSet<String>,
}

impl EventFilter {
    /// A filter that keeps every event
    pub fn none() -> Self {
        Self {
            exclude: HashSet::new(),
        }
    }

    /// Build a filter from an exclusion set of event-type names
    pub fn excluding<I, S>(event_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exclude: event_types.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether a record with this event type survives
    pub fn should_keep(&self, event_type: &str) -> bool {
        !self.exclude.contains(event_type)
    }
}

impl Default for EventFilter {
    /// Exclude scheduler context switches, the usual noise floor
    fn default() -> Self {
        Self::excluding(["switch"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_none_keeps_everything() {
        let filter = EventFilter::none();
        assert!(filter.should_keep("open"));
        assert!(filter.should_keep("switch"));
        assert!(filter.should_keep("anything"));
    }

    #[test]
    fn test_default_filter_drops_switch() {
        let filter = EventFilter::default();
        assert!(!filter.should_keep("switch"));
        assert!(filter.should_keep("open"));
        assert!(filter.should_keep("read"));
    }

    #[test]
    fn test_filter_multiple_exclusions() {
        let filter = EventFilter::excluding(["switch", "sched_process_exit"]);
        assert!(!filter.should_keep("switch"));
        assert!(!filter.should_keep("sched_process_exit"));
        assert!(filter.should_keep("write"));
    }

    #[test]
    fn test_filter_clone() {
        let filter = EventFilter::excluding(["switch"]);
        let cloned = filter.clone();
        assert!(!cloned.should_keep("switch"));
        assert!(cloned.should_keep("open"));
    }
}
