//! Collaborator contracts for the remote graph and trace data sources.
//!
//! Implementations are blocking: they are called from worker threads of the
//! task executor. Any retry policy belongs to the implementation.

use std::sync::Arc;

use crate::{ServiceGraph, TraceSummary};

/// A closed time range in seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    /// Create a range.
    pub const fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Length of the range in seconds.
    pub const fn duration(&self) -> i64 {
        self.end.saturating_sub(self.start)
    }

    /// Keep at most the trailing `maximum` seconds of the range.
    pub fn clamp_to(self, maximum: i64) -> Self {
        if self.duration() > maximum {
            Self::new(self.end.saturating_sub(maximum), self.end)
        } else {
            self
        }
    }
}

/// Source of dependency graph snapshots.
pub trait GraphSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the graph for `range`.
    fn service_graph(&self, range: TimeRange) -> Result<ServiceGraph, Self::Error>;

    /// Region the source queries; used for logging and links.
    fn region(&self) -> &str;
}

/// A trace summary query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceQuery {
    pub range: TimeRange,
    pub filter_expression: String,
    /// Continuation token from a previous page.
    pub next_token: Option<String>,
}

/// One page of trace summaries.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TracePage {
    #[cfg_attr(feature = "serde", serde(default))]
    pub trace_summaries: Vec<TraceSummary>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub next_token: Option<String>,
}

/// Source of trace summaries.
pub trait TraceSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch one page of summaries matching `query`.
    fn trace_summaries(&self, query: &TraceQuery) -> Result<TracePage, Self::Error>;

    /// Region the source queries; used for logging and links.
    fn region(&self) -> &str;
}

impl<S: GraphSource + ?Sized> GraphSource for Arc<S> {
    type Error = S::Error;

    fn service_graph(&self, range: TimeRange) -> Result<ServiceGraph, Self::Error> {
        (**self).service_graph(range)
    }

    fn region(&self) -> &str {
        (**self).region()
    }
}

impl<S: TraceSource + ?Sized> TraceSource for Arc<S> {
    type Error = S::Error;

    fn trace_summaries(&self, query: &TraceQuery) -> Result<TracePage, Self::Error> {
        (**self).trace_summaries(query)
    }

    fn region(&self) -> &str {
        (**self).region()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_keeps_trailing_range() {
        let range = TimeRange::new(0, 1000);
        assert_eq!(range.clamp_to(300), TimeRange::new(700, 1000));
        assert_eq!(range.clamp_to(1000), range);
        assert_eq!(range.clamp_to(5000), range);
    }

    #[test]
    fn extreme_bounds_do_not_overflow() {
        let range = TimeRange::new(i64::MIN, i64::MAX);
        assert_eq!(range.duration(), i64::MAX);
        assert_eq!(range.clamp_to(600), TimeRange::new(i64::MAX - 600, i64::MAX));

        let inverted = TimeRange::new(i64::MAX, i64::MIN);
        assert_eq!(inverted.duration(), i64::MIN);
        assert_eq!(inverted.clamp_to(600), inverted);
    }
}
