//! Service graph snapshot - the dependency graph for one time window.

use crate::{Entity, Service};

/// The dependency graph returned by the graph data source for one window.
///
/// # Example
///
/// ```rust
/// use scatter_types::{Entity, Service, ServiceGraph};
///
/// let graph = ServiceGraph::builder()
///     .node("api", None, 1, |n| n.ok(10).histogram(0.2, 10).edge(2, |e| e.ok(4)))
///     .node("orders", Some("AWS::DynamoDB::Table"), 2, |n| n.ok(4))
///     .build();
///
/// let edge = Entity::edge(Service::new("api"), Service::typed("orders", "AWS::DynamoDB::Table"));
/// assert_eq!(graph.locate(&edge).map(|t| t.counts().ok), Some(4));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServiceGraph {
    /// Observed start of the graph, seconds since the Unix epoch.
    #[cfg_attr(feature = "serde", serde(default))]
    pub start_time: Option<i64>,

    /// Observed end of the graph, seconds since the Unix epoch.
    #[cfg_attr(feature = "serde", serde(default))]
    pub end_time: Option<i64>,

    /// Nodes of the graph.
    #[cfg_attr(feature = "serde", serde(default))]
    pub services: Vec<GraphNode>,
}

/// A service node within a snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphNode {
    pub name: String,

    #[cfg_attr(feature = "serde", serde(rename = "type", default))]
    pub service_type: Option<String>,

    /// Identifier of this node within its snapshot; edges target it.
    pub reference_id: i64,

    #[cfg_attr(feature = "serde", serde(default))]
    pub edges: Vec<GraphEdge>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub summary_statistics: Option<SummaryStatistics>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub response_time_histogram: Vec<HistogramEntry>,

    /// First time traffic was observed; absent if the node had none.
    #[cfg_attr(feature = "serde", serde(default))]
    pub start_time: Option<i64>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub end_time: Option<i64>,
}

/// An outgoing call edge of a node.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GraphEdge {
    /// Reference id of the target node.
    pub reference_id: i64,

    #[cfg_attr(feature = "serde", serde(default))]
    pub summary_statistics: Option<SummaryStatistics>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub response_time_histogram: Vec<HistogramEntry>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub start_time: Option<i64>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub end_time: Option<i64>,
}

/// Aggregated request outcomes; any counter may be missing.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SummaryStatistics {
    #[cfg_attr(feature = "serde", serde(default))]
    pub ok_count: Option<u64>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub error_statistics: Option<ErrorStatistics>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub fault_statistics: Option<FaultStatistics>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub total_count: Option<u64>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub total_response_time: Option<f64>,
}

/// Client error (4xx) breakdown.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorStatistics {
    #[cfg_attr(feature = "serde", serde(default))]
    pub throttle_count: Option<u64>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub other_count: Option<u64>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub total_count: Option<u64>,
}

/// Server fault (5xx) breakdown.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FaultStatistics {
    #[cfg_attr(feature = "serde", serde(default))]
    pub other_count: Option<u64>,

    #[cfg_attr(feature = "serde", serde(default))]
    pub total_count: Option<u64>,
}

/// One response-time histogram bucket.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HistogramEntry {
    /// Response time in seconds.
    pub value: f64,
    /// Number of requests observed at this value.
    pub count: u64,
}

/// The four traffic counters a window reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusCounts {
    pub ok: u64,
    pub error: u64,
    pub throttle: u64,
    pub fault: u64,
}

impl SummaryStatistics {
    /// Counters with every missing value taken as zero.
    ///
    /// `error` is the "other" client error count so that throttles are not
    /// counted twice.
    pub fn counts(&self) -> StatusCounts {
        let errors = self.error_statistics.as_ref();
        StatusCounts {
            ok: self.ok_count.unwrap_or(0),
            error: errors.and_then(|e| e.other_count).unwrap_or(0),
            throttle: errors.and_then(|e| e.throttle_count).unwrap_or(0),
            fault: self
                .fault_statistics
                .as_ref()
                .and_then(|f| f.total_count)
                .unwrap_or(0),
        }
    }
}

/// Borrowed view over the traffic data of a node or an edge.
#[derive(Debug, Clone, Copy)]
pub struct Traffic<'a> {
    pub summary: Option<&'a SummaryStatistics>,
    pub histogram: &'a [HistogramEntry],
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
}

impl Traffic<'_> {
    /// Traffic counters, zero where missing.
    pub fn counts(&self) -> StatusCounts {
        self.summary.map(SummaryStatistics::counts).unwrap_or_default()
    }
}

impl GraphNode {
    /// The service this node represents.
    pub fn service(&self) -> Service {
        Service {
            name: self.name.clone(),
            service_type: self.service_type.clone(),
        }
    }

    /// Whether this node has the same name and type as `service`.
    pub fn is(&self, service: &Service) -> bool {
        self.name == service.name && self.service_type == service.service_type
    }

    /// Traffic observed at this node.
    pub fn traffic(&self) -> Traffic<'_> {
        Traffic {
            summary: self.summary_statistics.as_ref(),
            histogram: &self.response_time_histogram,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

impl GraphEdge {
    /// Traffic observed along this edge.
    pub fn traffic(&self) -> Traffic<'_> {
        Traffic {
            summary: self.summary_statistics.as_ref(),
            histogram: &self.response_time_histogram,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

impl ServiceGraph {
    /// Create a builder for constructing graphs.
    pub fn builder() -> ServiceGraphBuilder {
        ServiceGraphBuilder::default()
    }

    /// The first node matching `service` by name and type.
    pub fn find(&self, service: &Service) -> Option<&GraphNode> {
        self.services.iter().find(|node| node.is(service))
    }

    /// The edge of `from` whose target is a node matching `to`.
    pub fn find_edge<'a>(&self, from: &'a GraphNode, to: &Service) -> Option<&'a GraphEdge> {
        from.edges.iter().find(|edge| {
            self.services
                .iter()
                .any(|node| node.reference_id == edge.reference_id && node.is(to))
        })
    }

    /// The node resolved by an edge's reference id.
    pub fn target(&self, edge: &GraphEdge) -> Option<&GraphNode> {
        self.services
            .iter()
            .find(|node| node.reference_id == edge.reference_id)
    }

    /// Traffic for the node or edge addressed by `entity`, if present.
    pub fn locate(&self, entity: &Entity) -> Option<Traffic<'_>> {
        let node = self.find(entity.left())?;
        match entity.right() {
            None => Some(node.traffic()),
            Some(right) => self.find_edge(node, right).map(GraphEdge::traffic),
        }
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Builder for `ServiceGraph`.
#[derive(Debug, Default)]
pub struct ServiceGraphBuilder {
    start_time: Option<i64>,
    end_time: Option<i64>,
    services: Vec<GraphNode>,
}

impl ServiceGraphBuilder {
    /// Set the observed time range of the graph.
    pub fn observed(mut self, start_time: i64, end_time: i64) -> Self {
        self.start_time = Some(start_time);
        self.end_time = Some(end_time);
        self
    }

    /// Add a node built using a closure.
    pub fn node<F>(mut self, name: &str, service_type: Option<&str>, reference_id: i64, f: F) -> Self
    where
        F: FnOnce(GraphNodeBuilder) -> GraphNodeBuilder,
    {
        let node = f(GraphNodeBuilder::new(name, service_type, reference_id)).build();
        self.services.push(node);
        self
    }

    /// Build the graph.
    pub fn build(self) -> ServiceGraph {
        ServiceGraph {
            start_time: self.start_time,
            end_time: self.end_time,
            services: self.services,
        }
    }
}

/// Builder for `GraphNode`.
#[derive(Debug)]
pub struct GraphNodeBuilder {
    node: GraphNode,
    traffic: TrafficBuilder,
}

impl GraphNodeBuilder {
    fn new(name: &str, service_type: Option<&str>, reference_id: i64) -> Self {
        Self {
            node: GraphNode {
                name: name.to_string(),
                service_type: service_type.map(str::to_string),
                reference_id,
                ..Default::default()
            },
            traffic: TrafficBuilder::default(),
        }
    }

    /// Set the ok count.
    pub fn ok(mut self, count: u64) -> Self {
        self.traffic = self.traffic.ok(count);
        self
    }

    /// Set the non-throttle client error count.
    pub fn errors(mut self, count: u64) -> Self {
        self.traffic = self.traffic.errors(count);
        self
    }

    /// Set the throttle count.
    pub fn throttles(mut self, count: u64) -> Self {
        self.traffic = self.traffic.throttles(count);
        self
    }

    /// Set the fault count.
    pub fn faults(mut self, count: u64) -> Self {
        self.traffic = self.traffic.faults(count);
        self
    }

    /// Append a histogram bucket.
    pub fn histogram(mut self, value: f64, count: u64) -> Self {
        self.traffic = self.traffic.histogram(value, count);
        self
    }

    /// Set the observed time range.
    pub fn observed(mut self, start_time: i64, end_time: i64) -> Self {
        self.traffic = self.traffic.observed(start_time, end_time);
        self
    }

    /// Add an edge to the node with the given reference id.
    pub fn edge<F>(mut self, reference_id: i64, f: F) -> Self
    where
        F: FnOnce(TrafficBuilder) -> TrafficBuilder,
    {
        let traffic = f(TrafficBuilder::default());
        self.node.edges.push(GraphEdge {
            reference_id,
            summary_statistics: traffic.summary,
            response_time_histogram: traffic.histogram,
            start_time: traffic.start_time,
            end_time: traffic.end_time,
        });
        self
    }

    /// Build the node.
    pub fn build(self) -> GraphNode {
        GraphNode {
            summary_statistics: self.traffic.summary,
            response_time_histogram: self.traffic.histogram,
            start_time: self.traffic.start_time,
            end_time: self.traffic.end_time,
            ..self.node
        }
    }
}

/// Builder for the traffic data shared by nodes and edges.
#[derive(Debug, Default)]
pub struct TrafficBuilder {
    summary: Option<SummaryStatistics>,
    histogram: Vec<HistogramEntry>,
    start_time: Option<i64>,
    end_time: Option<i64>,
}

impl TrafficBuilder {
    fn summary(&mut self) -> &mut SummaryStatistics {
        self.summary.get_or_insert_with(SummaryStatistics::default)
    }

    /// Set the ok count.
    pub fn ok(mut self, count: u64) -> Self {
        self.summary().ok_count = Some(count);
        self
    }

    /// Set the non-throttle client error count.
    pub fn errors(mut self, count: u64) -> Self {
        self.summary()
            .error_statistics
            .get_or_insert_with(ErrorStatistics::default)
            .other_count = Some(count);
        self
    }

    /// Set the throttle count.
    pub fn throttles(mut self, count: u64) -> Self {
        self.summary()
            .error_statistics
            .get_or_insert_with(ErrorStatistics::default)
            .throttle_count = Some(count);
        self
    }

    /// Set the fault count.
    pub fn faults(mut self, count: u64) -> Self {
        self.summary()
            .fault_statistics
            .get_or_insert_with(FaultStatistics::default)
            .total_count = Some(count);
        self
    }

    /// Append a histogram bucket.
    pub fn histogram(mut self, value: f64, count: u64) -> Self {
        self.histogram.push(HistogramEntry { value, count });
        self
    }

    /// Set the observed time range.
    pub fn observed(mut self, start_time: i64, end_time: i64) -> Self {
        self.start_time = Some(start_time);
        self.end_time = Some(end_time);
        self
    }
}
