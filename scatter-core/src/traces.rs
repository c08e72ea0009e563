//! Trace lookup for an entity over a time range.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat};
use scatter_types::{
    AnnotationValue, Entity, TimeRange, TraceCriteria, TraceKind, TraceQuery, TraceRecord,
    TraceSource, TraceSummary,
};
use tracing::{debug, info};

use crate::error::TraceLookupError;

/// Longest range a lookup may span, in seconds (6 days).
pub const DEFAULT_MAXIMUM_RANGE: i64 = 6 * 24 * 3600;

/// Maximum number of summaries returned by one lookup.
pub const DEFAULT_TRACE_LIMIT: usize = 100;

/// Link template; `{region}` and `{trace_id}` are substituted.
pub const DEFAULT_TIMELINE_LINK: &str =
    "https://console.aws.amazon.com/xray/home?region={region}#/traces/{trace_id}";

/// Limits and presentation settings for trace lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceSettings {
    /// Ranges longer than this keep only their trailing part.
    pub maximum_range: i64,
    pub limit: usize,
    pub timeline_link: String,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            maximum_range: DEFAULT_MAXIMUM_RANGE,
            limit: DEFAULT_TRACE_LIMIT,
            timeline_link: DEFAULT_TIMELINE_LINK.to_string(),
        }
    }
}

impl TraceSettings {
    /// Render the timeline link of one trace.
    pub fn timeline_link(&self, region: &str, trace_id: &str) -> String {
        self.timeline_link
            .replace("{region}", region)
            .replace("{trace_id}", trace_id)
    }
}

/// Which traces to look up.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRequest {
    pub entity: Entity,
    pub kind: TraceKind,
    pub range: TimeRange,
    pub response_time_min: Option<f64>,
    pub response_time_max: Option<f64>,
}

impl TraceRequest {
    pub fn new(entity: Entity, kind: TraceKind, range: TimeRange) -> Self {
        Self {
            entity,
            kind,
            range,
            response_time_min: None,
            response_time_max: None,
        }
    }

    /// Bound response times; ignored for status lookups.
    pub fn response_time(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.response_time_min = min;
        self.response_time_max = max;
        self
    }

    pub fn criteria(&self) -> TraceCriteria {
        TraceCriteria::new(self.kind, self.response_time_min, self.response_time_max)
    }

    /// The full filter expression sent to the trace source.
    pub fn filter_expression(&self) -> String {
        self.entity.filter_with(&self.criteria())
    }
}

/// Looks up traces through a [`TraceSource`].
pub struct TraceLookup<S> {
    source: Arc<S>,
    settings: TraceSettings,
}

impl<S: TraceSource> TraceLookup<S> {
    pub fn new(source: Arc<S>, settings: TraceSettings) -> Self {
        Self { source, settings }
    }

    pub fn settings(&self) -> &TraceSettings {
        &self.settings
    }

    /// Up to `limit` matching traces, paging through the source as needed.
    pub fn lookup(&self, request: &TraceRequest) -> Result<Vec<TraceRecord>, TraceLookupError> {
        let range = request.range.clamp_to(self.settings.maximum_range);
        if range != request.range {
            debug!(
                requested = request.range.start,
                clamped = range.start,
                "trace range clamped"
            );
        }

        let filter_expression = request.filter_expression();
        info!("filter expression: {}", filter_expression);

        let summaries = self.collect(range, filter_expression)?;
        let region = self.source.region();
        Ok(summaries
            .into_iter()
            .map(|summary| self.record(summary, region))
            .collect())
    }

    fn collect(
        &self,
        range: TimeRange,
        filter_expression: String,
    ) -> Result<Vec<TraceSummary>, TraceLookupError> {
        let limit = self.settings.limit;
        let mut query = TraceQuery {
            range,
            filter_expression,
            next_token: None,
        };
        let mut summaries = Vec::new();

        while summaries.len() < limit {
            let page = self
                .source
                .trace_summaries(&query)
                .map_err(|err| TraceLookupError::Upstream(Box::new(err)))?;
            summaries.extend(page.trace_summaries);

            match page.next_token {
                Some(token) if query.next_token.as_ref() != Some(&token) => {
                    query.next_token = Some(token);
                }
                _ => break,
            }
        }

        summaries.truncate(limit);
        Ok(summaries)
    }

    fn record(&self, summary: TraceSummary, region: &str) -> TraceRecord {
        let timestamp = summary
            .epoch_seconds()
            .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
            .map(|time| time.to_rfc3339_opts(SecondsFormat::Secs, true));
        let http = summary.http.unwrap_or_default();

        TraceRecord {
            timeline_link: self.settings.timeline_link(region, &summary.id),
            trace_id: summary.id,
            timestamp,
            http_url: http.http_url,
            http_status: http.http_status,
            response_time: summary.response_time,
            users: summary.users.into_iter().map(|user| user.user_name).collect(),
            annotations: summary
                .annotations
                .into_iter()
                .map(|(key, values)| {
                    let values = values.iter().filter_map(AnnotationValue::primitive).collect();
                    (key, values)
                })
                .collect(),
        }
    }
}
