//! Trace summaries returned by the trace data source and the records built
//! from them.

use std::collections::BTreeMap;

/// Summary of one trace as reported by the trace data source.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceSummary {
    /// Trace id, `<version>-<hex-epoch>-<hex-random>` or `<hex-epoch>-<hex-random>`.
    pub id: String,

    #[cfg_attr(feature = "serde", serde(default))]
    pub http: Option<HttpInfo>,

    /// Response time in seconds.
    #[cfg_attr(feature = "serde", serde(default))]
    pub response_time: Option<f64>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub users: Vec<TraceUser>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub annotations: BTreeMap<String, Vec<AnnotationValue>>,
}

/// HTTP request details of a trace.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HttpInfo {
    #[cfg_attr(feature = "serde", serde(default))]
    pub http_url: Option<String>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub http_status: Option<u16>,
}

/// A user associated with a trace.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceUser {
    pub user_name: String,
}

/// An annotation value; exactly one field is expected to be populated.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnnotationValue {
    #[cfg_attr(feature = "serde", serde(default))]
    pub boolean_value: Option<bool>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub number_value: Option<f64>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub string_value: Option<String>,
}

/// A primitive annotation value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Primitive {
    Boolean(bool),
    Number(f64),
    String(String),
}

impl AnnotationValue {
    /// The populated value, preferring boolean, then number, then string.
    pub fn primitive(&self) -> Option<Primitive> {
        self.boolean_value
            .map(Primitive::Boolean)
            .or_else(|| self.number_value.map(Primitive::Number))
            .or_else(|| self.string_value.clone().map(Primitive::String))
    }
}

impl TraceSummary {
    /// Seconds since the epoch encoded in the trace id, if it parses.
    pub fn epoch_seconds(&self) -> Option<i64> {
        trace_epoch_seconds(&self.id)
    }
}

/// Extract the hex epoch segment from a trace id.
///
/// Ids carrying a leading version segment (`1-5759e988-bd86...`) use the
/// second segment; bare `<hex-epoch>-<hex-random>` ids use the first.
pub fn trace_epoch_seconds(id: &str) -> Option<i64> {
    let segments: Vec<&str> = id.split('-').collect();
    let epoch = match segments.len() {
        0 | 1 => return None,
        2 => segments[0],
        _ => segments[1],
    };
    i64::from_str_radix(epoch, 16).ok()
}

/// A trace matching a lookup, ready for display.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceRecord {
    pub trace_id: String,
    /// RFC 3339 time derived from the trace id.
    pub timestamp: Option<String>,
    pub http_url: Option<String>,
    pub http_status: Option<u16>,
    pub response_time: Option<f64>,
    pub users: Vec<String>,
    pub annotations: BTreeMap<String, Vec<Primitive>>,
    pub timeline_link: String,
}
