//! End-to-end tests of the service facade against in-memory data sources.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;

use scatter::{Entity, Scatter, ScatterError, Service, Settings, TimeRange, TraceKind, TraceRequest};
use scatter_types::{
    GraphSource, ServiceGraph, TracePage, TraceQuery, TraceSource, TraceSummary,
};

#[derive(Debug, thiserror::Error)]
#[error("upstream unavailable")]
struct Unavailable;

/// Serves graphs by exact window and records trace queries.
#[derive(Default)]
struct MemorySource {
    graphs: HashMap<TimeRange, ServiceGraph>,
    fallback: ServiceGraph,
    traces: Vec<TraceSummary>,
    graph_calls: AtomicUsize,
    trace_queries: Mutex<Vec<TraceQuery>>,
}

impl GraphSource for MemorySource {
    type Error = Unavailable;

    fn service_graph(&self, range: TimeRange) -> Result<ServiceGraph, Self::Error> {
        self.graph_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .graphs
            .get(&range)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }

    fn region(&self) -> &str {
        "us-west-2"
    }
}

impl TraceSource for MemorySource {
    type Error = Unavailable;

    fn trace_summaries(&self, query: &TraceQuery) -> Result<TracePage, Self::Error> {
        self.trace_queries.lock().unwrap().push(query.clone());
        Ok(TracePage {
            trace_summaries: self.traces.clone(),
            next_token: None,
        })
    }

    fn region(&self) -> &str {
        "us-west-2"
    }
}

fn checkout_graph() -> ServiceGraph {
    ServiceGraph::builder()
        .node("web", Some("client"), 0, |n| n.edge(1, |e| e.ok(10)))
        .node("checkout", Some("AWS::Lambda"), 1, |n| {
            n.ok(10)
                .errors(3)
                .throttles(6)
                .faults(1)
                .histogram(0.05, 4)
                .histogram(0.25, 6)
                .observed(1_700_000_005, 1_700_000_055)
                .edge(2, |e| e.ok(8).histogram(0.01, 8))
        })
        .node("orders", Some("AWS::DynamoDB::Table"), 2, |n| n.ok(8))
        .build()
}

fn scatter_with(source: MemorySource, settings: &Settings) -> (Scatter<MemorySource>, Arc<MemorySource>) {
    let source = Arc::new(source);
    let scatter = Scatter::new(settings, Arc::clone(&source), Arc::clone(&source)).unwrap();
    (scatter, source)
}

fn checkout() -> Entity {
    Entity::node(Service::typed("checkout", "AWS::Lambda"))
}

// ============================================================================
// Statistics
// ============================================================================

#[test]
fn statistics_document_shape() {
    let mut source = MemorySource::default();
    source
        .graphs
        .insert(TimeRange::new(1_700_000_000, 1_700_000_060), checkout_graph());
    let (scatter, _) = scatter_with(source, &Settings::default());

    let document = scatter
        .statistics(&checkout(), 1_700_000_000, 1_700_000_120, 60)
        .unwrap();

    assert_eq!(
        serde_json::to_value(&document).unwrap(),
        json!({
            "statistics": [
                {
                    "timestamp": 1_700_000_060,
                    "histogram": [{"value": 0.25, "count": 6}, {"value": 0.05, "count": 4}],
                    "statuses": [
                        {"status": "ok", "request_rate": 0.16667},
                        {"status": "error", "request_rate": 0.05},
                        {"status": "throttle", "request_rate": 0.1},
                        {"status": "fault", "request_rate": 0.01667}
                    ],
                    "index": {"start_time": 1_700_000_005, "end_time": 1_700_000_055}
                },
                {
                    "timestamp": 1_700_000_120,
                    "histogram": [],
                    "statuses": [
                        {"status": "ok", "request_rate": 0.0},
                        {"status": "error", "request_rate": 0.0},
                        {"status": "throttle", "request_rate": 0.0},
                        {"status": "fault", "request_rate": 0.0}
                    ],
                    "index": {"start_time": null, "end_time": null}
                }
            ]
        })
    );
}

#[test]
fn statistics_for_parsed_edge() {
    let source = MemorySource {
        fallback: checkout_graph(),
        ..Default::default()
    };
    let (scatter, _) = scatter_with(source, &Settings::default());

    let entity = Entity::parse(
        r#"[{&quot;name&quot;:&quot;checkout&quot;,&quot;type&quot;:&quot;AWS::Lambda&quot;},{"name":"orders","type":"AWS::DynamoDB::Table"}]"#,
    )
    .unwrap();
    let document = scatter.statistics(&entity, 0, 120, 60).unwrap();

    assert_eq!(document.statistics.len(), 2);
    for report in &document.statistics {
        assert_eq!(report.statuses[0].request_rate, 0.13333);
        assert_eq!(report.histogram.len(), 1);
    }
}

#[test]
fn windows_are_served_from_cache() {
    let (scatter, source) = scatter_with(MemorySource::default(), &Settings::default());

    scatter.statistics(&checkout(), 0, 300, 60).unwrap();
    scatter.statistics(&checkout(), 0, 300, 60).unwrap();

    assert_eq!(source.graph_calls.load(Ordering::SeqCst), 5);
    assert_eq!(scatter.cached_windows(), 5);
}

#[test]
fn invalid_duration_is_a_client_error() {
    let (scatter, _) = scatter_with(MemorySource::default(), &Settings::default());

    let err = scatter.statistics(&checkout(), 0, 300, 0).unwrap_err();
    assert!(err.is_client_error());
}

#[test]
fn shared_pool_lifecycle() {
    let settings = Settings {
        shared_pool_size: Some(2),
        ..Settings::default()
    };
    let source = MemorySource {
        fallback: checkout_graph(),
        ..Default::default()
    };
    let (scatter, _) = scatter_with(source, &settings);

    let document = scatter.statistics(&checkout(), 0, 600, 60).unwrap();
    assert_eq!(document.statistics.len(), 10);

    scatter.shutdown().unwrap();
    scatter.shutdown().unwrap();

    // Without the pool, aggregation falls back to per-call workers.
    let document = scatter.statistics(&checkout(), 600, 720, 60).unwrap();
    assert_eq!(document.statistics.len(), 2);
}

#[test]
fn zero_sized_pool_is_rejected() {
    let settings = Settings {
        shared_pool_size: Some(0),
        ..Settings::default()
    };
    let source = Arc::new(MemorySource::default());
    let result = Scatter::new(&settings, Arc::clone(&source), source);
    assert!(matches!(result, Err(ScatterError::Settings(_))));
}

// ============================================================================
// Entities
// ============================================================================

#[test]
fn entities_document_shape() {
    let source = MemorySource {
        fallback: checkout_graph(),
        ..Default::default()
    };
    let (scatter, _) = scatter_with(source, &Settings::default());

    let document = scatter.entities(0, 3600).unwrap();

    assert_eq!(
        serde_json::to_value(&document).unwrap(),
        json!({
            "entities": [
                [{"name": "web", "type": "client"}, {"name": "checkout", "type": "AWS::Lambda"}],
                {"name": "checkout", "type": "AWS::Lambda"},
                [
                    {"name": "checkout", "type": "AWS::Lambda"},
                    {"name": "orders", "type": "AWS::DynamoDB::Table"}
                ],
                {"name": "orders", "type": "AWS::DynamoDB::Table"}
            ]
        })
    );

    for entity in &document.entities {
        assert_eq!(&Entity::parse(&entity.to_json().unwrap()).unwrap(), entity);
    }
}

// ============================================================================
// Traces
// ============================================================================

#[test]
fn traces_document() {
    let source = MemorySource {
        traces: vec![TraceSummary {
            id: "1-5759e988-bd862e3fe1be46a994272793".to_string(),
            response_time: Some(2.5),
            ..Default::default()
        }],
        ..Default::default()
    };
    let (scatter, source) = scatter_with(source, &Settings::default());

    let request = TraceRequest::new(
        checkout(),
        "ResponseTime".parse::<TraceKind>().unwrap(),
        TimeRange::new(0, 30 * 24 * 3600),
    )
    .response_time(Some(1.0), Some(3.0));
    let document = scatter.traces(&request).unwrap();

    assert_eq!(
        serde_json::to_value(&document).unwrap(),
        json!({
            "traces": [{
                "trace_id": "1-5759e988-bd862e3fe1be46a994272793",
                "timestamp": "2016-06-09T22:11:20Z",
                "http_url": null,
                "http_status": null,
                "response_time": 2.5,
                "users": [],
                "annotations": {},
                "timeline_link": "https://console.aws.amazon.com/xray/home?region=us-west-2#/traces/1-5759e988-bd862e3fe1be46a994272793"
            }]
        })
    );

    let queries = source.trace_queries.lock().unwrap();
    assert_eq!(
        queries[0].filter_expression,
        r#"service(id(name: "checkout", type: "AWS::Lambda")) { responsetime >= 1 && responsetime <= 3 }"#
    );
    assert_eq!(queries[0].range.duration(), 6 * 24 * 3600);
}

#[test]
fn unknown_trace_kind_is_rejected() {
    assert!("latency".parse::<TraceKind>().is_err());
}
