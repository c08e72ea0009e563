//! The long-lived service object and the JSON documents it produces.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use scatter_adapters::http::HttpSource;
use scatter_core::{
    entities, Aggregator, SharedPool, SnapshotCache, TraceLookup, TraceRequest, TtlCache,
};
use scatter_types::{
    Entity, GraphSource, StatisticsReport, TimeRange, TraceRecord, TraceSource,
};

use crate::error::ScatterError;
use crate::settings::Settings;

/// `{"entities": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitiesDocument {
    pub entities: Vec<Entity>,
}

/// `{"statistics": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsDocument {
    pub statistics: Vec<StatisticsReport>,
}

/// `{"traces": [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracesDocument {
    pub traces: Vec<TraceRecord>,
}

/// Owns the process-wide state: snapshot cache, optional shared worker pool
/// and the data-source clients.
///
/// The shared pool, when configured, is enabled on construction and stopped
/// by [`shutdown`](Self::shutdown) or when the last reference is dropped.
pub struct Scatter<G, T = G> {
    graphs: Arc<G>,
    aggregator: Aggregator<G>,
    traces: TraceLookup<T>,
    pool: Option<Arc<SharedPool>>,
}

impl Scatter<HttpSource> {
    /// Build a service talking to the HTTP data service named in `settings`.
    pub fn connect(settings: &Settings) -> Result<Self, ScatterError> {
        let source = Arc::new(
            HttpSource::builder()
                .endpoint(&settings.endpoint)
                .region(&settings.region)
                .timeout(settings.request_timeout())
                .retry_limit(settings.retry_limit)
                .backoff(settings.retry_backoff())
                .build()?,
        );
        Self::new(settings, Arc::clone(&source), source)
    }
}

impl<G, T> Scatter<G, T>
where
    G: GraphSource + 'static,
    T: TraceSource,
{
    pub fn new(settings: &Settings, graphs: Arc<G>, traces: Arc<T>) -> Result<Self, ScatterError> {
        settings.validate()?;

        let cache: Arc<SnapshotCache> = Arc::new(TtlCache::new(settings.cache_ttl()));
        let mut aggregator =
            Aggregator::new(Arc::clone(&graphs), cache).threads(settings.window_threads);

        let pool = match settings.shared_pool_size {
            Some(size) => {
                let pool = Arc::new(SharedPool::new());
                pool.enable(size)?;
                info!(size, "shared worker pool enabled");
                aggregator = aggregator.shared_pool(Arc::clone(&pool));
                Some(pool)
            }
            None => None,
        };

        Ok(Self {
            graphs,
            aggregator,
            traces: TraceLookup::new(traces, settings.trace_settings()),
            pool,
        })
    }

    /// Sorted catalog of the nodes and edges active in `[start, end]`.
    pub fn entities(&self, start: i64, end: i64) -> Result<EntitiesDocument, ScatterError> {
        let graph = self
            .graphs
            .service_graph(TimeRange::new(start, end))
            .map_err(|err| ScatterError::Upstream(Box::new(err)))?;
        debug!(services = graph.services.len(), "service graph fetched");

        Ok(EntitiesDocument {
            entities: entities(&graph),
        })
    }

    /// Per-window statistics of `entity` over `[start, end]`.
    pub fn statistics(
        &self,
        entity: &Entity,
        start: i64,
        end: i64,
        duration: i64,
    ) -> Result<StatisticsDocument, ScatterError> {
        let windows = self.aggregator.aggregate(entity, start, end, duration)?;
        Ok(StatisticsDocument {
            statistics: windows.iter().map(|window| window.to_report()).collect(),
        })
    }

    /// Traces of an entity matching the request's criteria.
    pub fn traces(&self, request: &TraceRequest) -> Result<TracesDocument, ScatterError> {
        Ok(TracesDocument {
            traces: self.traces.lookup(request)?,
        })
    }

    /// Number of cached window snapshots.
    pub fn cached_windows(&self) -> usize {
        self.aggregator.cache().len()
    }

    /// Stop the shared worker pool, if one is running.
    pub fn shutdown(&self) -> Result<(), ScatterError> {
        if let Some(pool) = self.pool.as_ref().filter(|pool| pool.is_enabled()) {
            pool.disable()?;
            info!("shared worker pool disabled");
        }
        Ok(())
    }
}
