//! # scatter-types
//!
//! Core types for scatter. This crate defines the data model shared by the
//! aggregation core, the data-source adapters and the CLI:
//!
//! - **Entities**: [`Service`] and [`Entity`] address a node or a directed edge
//!   of a service dependency graph, render to filter expressions and carry a
//!   deterministic total order
//! - **Snapshots**: [`ServiceGraph`] is the graph reported for one time window,
//!   with per-node and per-edge counters and response-time histograms
//! - **Statistics**: [`WindowStatistics`] is the aggregated record for one window
//! - **Traces**: [`TraceSummary`] and the display-ready [`TraceRecord`]
//! - **Sources**: [`GraphSource`] and [`TraceSource`] describe the remote services
//!
//! ## Features
//!
//! - `serde`: JSON (de)serialization, including [`Entity::parse`]
//!
//! ## Example
//!
//! ```rust
//! use scatter_types::{Entity, Service, TraceCriteria};
//!
//! let entity = Entity::node(Service::typed("checkout", "AWS::Lambda"));
//! assert_eq!(
//!     entity.filter_with(&TraceCriteria::Status),
//!     r#"service(id(name: "checkout", type: "AWS::Lambda")) { !ok }"#
//! );
//! ```

mod entity;
mod error;
mod filter;
mod graph;
mod source;
mod statistics;
mod trace;

pub use entity::*;
pub use error::*;
pub use filter::*;
pub use graph::*;
pub use source::*;
pub use statistics::*;
pub use trace::*;
