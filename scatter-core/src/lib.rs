//! # scatter-core
//!
//! Aggregation engine that turns a time range into per-window statistics for
//! one node or edge of a service dependency graph.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scatter_core::{Aggregator, SnapshotCache};
//! use scatter_types::{Entity, GraphSource, Service, ServiceGraph, TimeRange};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct Empty;
//!
//! impl GraphSource for Empty {
//!     type Error = std::io::Error;
//!
//!     fn service_graph(&self, _range: TimeRange) -> Result<ServiceGraph, Self::Error> {
//!         Ok(ServiceGraph::default())
//!     }
//!
//!     fn region(&self) -> &str {
//!         "us-east-1"
//!     }
//! }
//!
//! let cache = Arc::new(SnapshotCache::new(Duration::from_secs(7 * 24 * 3600)));
//! let aggregator = Aggregator::new(Arc::new(Empty), cache);
//!
//! let entity = Entity::node(Service::new("checkout"));
//! let statistics = aggregator.aggregate(&entity, 0, 3600, 60).unwrap();
//! assert_eq!(statistics.len(), 60);
//! ```
//!
//! ## Components
//!
//! - **[`TtlCache`]**: memoization with per-entry expiry and lazy eviction
//! - **[`Parallel`] / [`SharedPool`]**: order-preserving parallel map on OS threads
//! - **[`Aggregator`]**: windowing, snapshot fetch and extraction
//! - **[`entities`]**: the sorted node/edge catalog of a snapshot
//! - **[`TraceLookup`]**: filtered trace summaries for an entity

mod aggregator;
mod cache;
mod catalog;
mod error;
mod parallel;
mod traces;

pub use aggregator::{extract, windows, Aggregator, SnapshotCache, DEFAULT_WINDOW_THREADS};
pub use cache::TtlCache;
pub use catalog::entities;
pub use error::{AggregateError, BoxError, ConfigurationError, ParallelError, TraceLookupError};
pub use parallel::{Parallel, SharedPool, DEFAULT_THREADS};
pub use traces::{
    TraceLookup, TraceRequest, TraceSettings, DEFAULT_MAXIMUM_RANGE, DEFAULT_TIMELINE_LINK,
    DEFAULT_TRACE_LIMIT,
};

// Re-export types for convenience
pub use scatter_types::{Entity, Service, ServiceGraph, TimeRange, WindowStatistics};
