//! Time-sliced statistics aggregation.
//!
//! A range is cut into consecutive windows, the graph snapshot of every window
//! is fetched in parallel through the snapshot cache, and the traffic of one
//! entity is extracted from each snapshot.

use std::iter;
use std::sync::Arc;

use chrono::DateTime;
use scatter_types::{Entity, GraphSource, ServiceGraph, TimeRange, WindowIndex, WindowStatistics};
use tracing::{error, info};

use crate::cache::TtlCache;
use crate::error::AggregateError;
use crate::parallel::{Parallel, SharedPool};

/// Worker count used for window fetches when no shared pool is in use.
pub const DEFAULT_WINDOW_THREADS: usize = 6;

/// Snapshots keyed by the window they cover.
pub type SnapshotCache = TtlCache<TimeRange, Arc<ServiceGraph>>;

/// Cut `[start, end]` into consecutive windows of `duration` seconds.
///
/// Boundaries are `start, start + duration, ...` up to and including `end`,
/// consumed pairwise. A trailing remainder shorter than `duration` yields no
/// window.
///
/// ```rust
/// use scatter_core::windows;
/// use scatter_types::TimeRange;
///
/// let slices = windows(0, 200, 60).unwrap();
/// assert_eq!(
///     slices,
///     vec![TimeRange::new(0, 60), TimeRange::new(60, 120), TimeRange::new(120, 180)]
/// );
/// ```
pub fn windows(start: i64, end: i64, duration: i64) -> Result<Vec<TimeRange>, AggregateError> {
    if duration <= 0 {
        return Err(AggregateError::InvalidDuration(duration));
    }
    if end < start {
        return Err(AggregateError::InvalidRange { start, end });
    }

    let boundaries: Vec<i64> = iter::successors(Some(start), |t| t.checked_add(duration))
        .take_while(|t| *t <= end)
        .collect();

    Ok(boundaries
        .windows(2)
        .map(|pair| TimeRange::new(pair[0], pair[1]))
        .collect())
}

/// Build the statistics of `entity` for one window from its snapshot.
///
/// A node or edge missing from the snapshot yields zero counters, an empty
/// histogram and an empty index.
pub fn extract(graph: &ServiceGraph, entity: &Entity, range: TimeRange) -> WindowStatistics {
    let traffic = graph.locate(entity);

    let mut histogram = traffic
        .map(|traffic| traffic.histogram.to_vec())
        .unwrap_or_default();
    histogram.sort_by(|a, b| a.value.total_cmp(&b.value));
    histogram.reverse();

    WindowStatistics {
        timestamp: range.end,
        duration: range.duration(),
        histogram,
        counts: traffic.map(|traffic| traffic.counts()).unwrap_or_default(),
        index: WindowIndex {
            start_time: traffic.and_then(|traffic| traffic.start_time),
            end_time: traffic.and_then(|traffic| traffic.end_time),
        },
    }
}

/// Aggregates per-window statistics for an entity from a [`GraphSource`].
pub struct Aggregator<S> {
    source: Arc<S>,
    cache: Arc<SnapshotCache>,
    threads: usize,
    pool: Option<Arc<SharedPool>>,
}

impl<S> Aggregator<S>
where
    S: GraphSource + 'static,
{
    pub fn new(source: Arc<S>, cache: Arc<SnapshotCache>) -> Self {
        Self {
            source,
            cache,
            threads: DEFAULT_WINDOW_THREADS,
            pool: None,
        }
    }

    /// Worker count for ephemeral pools.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Run window fetches on `pool` while it is enabled.
    pub fn shared_pool(mut self, pool: Arc<SharedPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// The snapshot cache.
    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.cache
    }

    /// One [`WindowStatistics`] per window of `[start, end]`, in window order.
    ///
    /// Any failed snapshot fetch fails the whole aggregation with the
    /// lowest-index failure.
    pub fn aggregate(
        &self,
        entity: &Entity,
        start: i64,
        end: i64,
        duration: i64,
    ) -> Result<Vec<WindowStatistics>, AggregateError> {
        let slices = windows(start, end, duration)?;
        let total = slices.len();

        info!(
            "fetching {} histograms from {} to {} @ {}",
            total,
            format_time(start),
            format_time(end),
            self.source.region()
        );

        let source = Arc::clone(&self.source);
        let cache = Arc::clone(&self.cache);
        let entity = entity.clone();

        let work = move |range: TimeRange, index: usize| {
            let graph = cache.try_fetch(range, || {
                info!("cache miss for histogram: {} / {}", index + 1, total);
                source.service_graph(range).map(Arc::new)
            })?;
            Ok::<_, S::Error>(extract(&graph, &entity, range))
        };

        let parallel = match self.pool.as_deref() {
            Some(pool) if pool.is_enabled() => Parallel::new().pool(pool),
            _ => Parallel::new().threads(self.threads),
        };

        parallel.run(slices, work).map_err(|err| {
            error!(window = ?err.index(), "aggregation failed: {err}");
            AggregateError::from(err)
        })
    }
}

fn format_time(seconds: i64) -> String {
    match DateTime::from_timestamp(seconds, 0) {
        Some(time) => time.format("%D %T %Z").to_string(),
        None => seconds.to_string(),
    }
}
