//! # scatter-adapters
//!
//! Clients for the remote data service that scatter aggregates from.
//!
//! ## Supported Sources
//!
//! - **HTTP** (`http` feature) - Fetches service graphs and paginated trace
//!   summaries as JSON, with bounded retries for throttling and transient
//!   failures
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scatter_adapters::http::HttpSource;
//! use scatter_types::{TimeRange, TraceQuery, TraceSource};
//! use std::time::Duration;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = HttpSource::builder()
//!         .endpoint("http://localhost:2000")
//!         .retry_limit(3)
//!         .timeout(Duration::from_secs(5))
//!         .build()?;
//!
//!     let page = source.trace_summaries(&TraceQuery {
//!         range: TimeRange::new(1_700_000_000, 1_700_003_600),
//!         filter_expression: r#"service(id(name: "api", type: null)) { !ok }"#.to_string(),
//!         next_token: None,
//!     })?;
//!
//!     println!("{} traces", page.trace_summaries.len());
//!     Ok(())
//! }
//! ```

pub mod error;

#[cfg(feature = "http")]
pub mod http;

pub use error::AdapterError;

// Re-export types for convenience
pub use scatter_types::{GraphSource, ServiceGraph, TracePage, TraceQuery, TraceSource};
