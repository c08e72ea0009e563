//! # scatter
//!
//! Response-time histograms and status rates for a node or an edge of a
//! service dependency graph, sliced into fixed-length windows.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                           Scatter                             │
//! │  ┌────────────┐   ┌──────────┐   ┌──────────┐   ┌───────────┐ │
//! │  │ Aggregator │──▶│ Parallel │──▶│ TtlCache │──▶│GraphSource│ │
//! │  └─────┬──────┘   └──────────┘   └──────────┘   └───────────┘ │
//! │        │ extract per window                                   │
//! │        ▼                                                      │
//! │  WindowStatistics ──▶ {"statistics": [...]}                   │
//! │                                                               │
//! │  TraceLookup ──▶ TraceSource ──▶ {"traces": [...]}            │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`Scatter`]**: service object holding the cache, optional shared pool
//!   and data-source clients
//! - **[`Settings`]**: defaults, TOML file and `SCATTER_*` environment layers
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! scatter entities --start 1700000000 --end 1700003600
//! scatter statistics --entity '{"name":"checkout"}' --start 1700000000 --end 1700003600 --duration 60
//! scatter traces responsetime --entity '{"name":"checkout"}' --start 1700000000 --end 1700003600 --min 1.5
//! ```
//!
//! ### As a library
//!
//! ```no_run
//! use scatter::{Scatter, Settings};
//! use scatter_types::Entity;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = Settings::load(None)?;
//! let scatter = Scatter::connect(&settings)?;
//!
//! let entity = Entity::parse(r#"{"name": "checkout", "type": "AWS::Lambda"}"#)?;
//! let document = scatter.statistics(&entity, 1_700_000_000, 1_700_003_600, 60)?;
//! println!("{}", serde_json::to_string(&document)?);
//! # Ok(())
//! # }
//! ```

mod error;
mod service;
mod settings;

pub use error::ScatterError;
pub use service::{EntitiesDocument, Scatter, StatisticsDocument, TracesDocument};
pub use settings::{Settings, SettingsError, ENV_PREFIX};

// Re-export the types needed to drive the service
pub use scatter_core::TraceRequest;
pub use scatter_types::{Entity, Service, TimeRange, TraceKind};
