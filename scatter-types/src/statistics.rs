//! Per-window statistics and their serialized report form.

use crate::{HistogramEntry, StatusCounts};

/// Aggregated statistics for one time window of the requested range.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowStatistics {
    /// End of the window, seconds since the Unix epoch.
    pub timestamp: i64,

    /// Window length in seconds.
    pub duration: i64,

    /// Response-time buckets, descending by value.
    pub histogram: Vec<HistogramEntry>,

    /// Traffic counters observed in the window.
    pub counts: StatusCounts,

    /// Observed time range of the matched node or edge.
    pub index: WindowIndex,
}

/// Observed start/end of the matched node or edge within a window.
///
/// Both fields are `None` when nothing matched; downstream trace lookups use
/// them to narrow their time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WindowIndex {
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
}

/// Request outcome category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Status {
    Ok,
    Error,
    Throttle,
    Fault,
}

impl Status {
    /// All statuses in report order.
    pub const ALL: [Status; 4] = [Status::Ok, Status::Error, Status::Throttle, Status::Fault];
}

/// Per-second rate of one status within a window.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatusRate {
    pub status: Status,
    pub request_rate: f64,
}

/// Serialized shape of a [`WindowStatistics`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StatisticsReport {
    pub timestamp: i64,
    pub histogram: Vec<HistogramEntry>,
    pub statuses: Vec<StatusRate>,
    pub index: WindowIndex,
}

impl StatusCounts {
    /// The counter for one status.
    pub fn get(&self, status: Status) -> u64 {
        match status {
            Status::Ok => self.ok,
            Status::Error => self.error,
            Status::Throttle => self.throttle,
            Status::Fault => self.fault,
        }
    }
}

impl WindowStatistics {
    /// Requests per second for `status`, rounded to 5 decimal places.
    pub fn request_rate(&self, status: Status) -> f64 {
        if self.duration <= 0 {
            return 0.0;
        }
        round5(self.counts.get(status) as f64 / self.duration as f64)
    }

    /// Rates for every status in report order.
    pub fn statuses(&self) -> Vec<StatusRate> {
        Status::ALL
            .iter()
            .map(|&status| StatusRate {
                status,
                request_rate: self.request_rate(status),
            })
            .collect()
    }

    /// Convert into the report consumed by the presentation layer.
    pub fn to_report(&self) -> StatisticsReport {
        StatisticsReport {
            timestamp: self.timestamp,
            histogram: self.histogram.clone(),
            statuses: self.statuses(),
            index: self.index,
        }
    }
}

fn round5(value: f64) -> f64 {
    (value * 100_000.0).round() / 100_000.0
}
