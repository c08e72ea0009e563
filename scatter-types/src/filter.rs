//! Trace filter criteria appended to an entity's filter expression.
//!
//! The full expression has the shape `service(id) { criteria }` or
//! `edge(id, id) { criteria }` where the criteria is either `!ok` or one or
//! two `responsetime` comparisons joined by `&&`.

use std::fmt;
use std::str::FromStr;

use crate::{Entity, EntityError};

/// Which traces a lookup selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceKind {
    /// Traces that did not complete successfully.
    Status,
    /// Traces within a response-time band.
    ResponseTime,
}

impl FromStr for TraceKind {
    type Err = EntityError;

    /// Parse a kind, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("status") {
            Ok(TraceKind::Status)
        } else if s.eq_ignore_ascii_case("responsetime") {
            Ok(TraceKind::ResponseTime)
        } else {
            Err(EntityError::InvalidTraceKind(s.to_string()))
        }
    }
}

/// Criteria block of a trace filter expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TraceCriteria {
    /// `!ok`
    Status,
    /// `responsetime >= min && responsetime <= max`, either bound optional.
    ResponseTime { min: Option<f64>, max: Option<f64> },
}

impl TraceCriteria {
    /// Build the criteria for a lookup kind; bounds only apply to response time.
    pub fn new(kind: TraceKind, min: Option<f64>, max: Option<f64>) -> Self {
        match kind {
            TraceKind::Status => TraceCriteria::Status,
            TraceKind::ResponseTime => TraceCriteria::ResponseTime { min, max },
        }
    }
}

impl fmt::Display for TraceCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceCriteria::Status => f.write_str("!ok"),
            TraceCriteria::ResponseTime { min, max } => match (min, max) {
                (Some(min), Some(max)) => {
                    write!(f, "responsetime >= {min} && responsetime <= {max}")
                }
                (Some(min), None) => write!(f, "responsetime >= {min}"),
                (None, Some(max)) => write!(f, "responsetime <= {max}"),
                (None, None) => Ok(()),
            },
        }
    }
}

impl Entity {
    /// Filter expression for this entity narrowed by `criteria`.
    pub fn filter_with(&self, criteria: &TraceCriteria) -> String {
        format!("{} {{ {} }}", self.filter_expression(), criteria)
    }
}
