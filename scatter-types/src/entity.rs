//! Entities - addressable nodes and edges of a service graph.
//!
//! An [`Entity`] names either a single service or a directed edge between
//! two services. It renders to the filter-expression keyword understood by
//! the trace data source and carries a total order used for stable catalog
//! display.

use std::cmp::Ordering;
use std::fmt;

#[cfg(feature = "serde")]
use crate::EntityError;

/// Service type reported for the synthetic caller node of a graph.
pub const CLIENT_TYPE: &str = "client";

/// A node of the service graph, identified by name and optional type.
///
/// The type is e.g. `"client"`, `"AWS::Lambda"`, or absent for user code.
///
/// # Ordering
///
/// Services of type `client` sort first. Everything else compares by name;
/// when names are equal a typed service sorts before an untyped one, and two
/// typed services compare by type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(deny_unknown_fields))]
pub struct Service {
    /// Service name.
    pub name: String,

    /// Service type, absent for user code.
    #[cfg_attr(
        feature = "serde",
        serde(rename = "type", default, skip_serializing_if = "Option::is_none")
    )]
    pub service_type: Option<String>,
}

impl Service {
    /// Create an untyped service.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service_type: None,
        }
    }

    /// Create a service with a type.
    pub fn typed(name: impl Into<String>, service_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service_type: Some(service_type.into()),
        }
    }

    /// The service type, if any.
    pub fn service_type(&self) -> Option<&str> {
        self.service_type.as_deref()
    }

    /// Whether this is the synthetic `client` node.
    pub fn is_client(&self) -> bool {
        self.service_type() == Some(CLIENT_TYPE)
    }

    /// Whether this service has the given name and type.
    pub fn matches(&self, name: &str, service_type: Option<&str>) -> bool {
        self.name == name && self.service_type() == service_type
    }

    /// Filter expression id, e.g. `id(name: "orders", type: "AWS::Lambda")`.
    pub fn to_id(&self) -> String {
        match self.service_type() {
            Some(t) => format!(r#"id(name: "{}", type: "{}")"#, self.name, t),
            None => format!(r#"id(name: "{}", type: null)"#, self.name),
        }
    }
}

impl Ord for Service {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_client(), other.is_client()) {
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }

        self.name
            .cmp(&other.name)
            .then_with(|| match (self.service_type(), other.service_type()) {
                (Some(a), Some(b)) => a.cmp(b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    }
}

impl PartialOrd for Service {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A reference to a node or a directed edge of the service graph.
///
/// Serialized as the bare service object for a node and as a two-element
/// array `[left, right]` for an edge.
///
/// # Example
///
/// ```rust
/// use scatter_types::{Entity, Service};
///
/// let edge = Entity::edge(Service::new("api"), Service::typed("orders", "AWS::DynamoDB::Table"));
/// assert!(edge.is_edge());
/// assert_eq!(
///     edge.filter_expression(),
///     r#"edge(id(name: "api", type: null), id(name: "orders", type: "AWS::DynamoDB::Table"))"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Entity {
    /// A single service.
    Node(Service),
    /// A call edge from the first service to the second.
    Edge(Service, Service),
}

impl Entity {
    /// Create a node entity.
    pub fn node(service: Service) -> Self {
        Entity::Node(service)
    }

    /// Create an edge entity directed from `left` to `right`.
    pub fn edge(left: Service, right: Service) -> Self {
        Entity::Edge(left, right)
    }

    /// Decode an entity from its (possibly HTML-escaped) JSON form.
    ///
    /// Accepts `{"name": .., "type": ..}` for a node or a two-element array
    /// of such objects for an edge.
    #[cfg(feature = "serde")]
    pub fn parse(raw: &str) -> Result<Self, EntityError> {
        let decoded = unescape_html(raw);
        serde_json::from_str(&decoded).map_err(|_| EntityError::InvalidEntity(raw.to_string()))
    }

    /// Encode this entity as JSON; the inverse of [`Entity::parse`].
    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// The source service (the node itself for a node entity).
    pub fn left(&self) -> &Service {
        match self {
            Entity::Node(service) | Entity::Edge(service, _) => service,
        }
    }

    /// The target service of an edge.
    pub fn right(&self) -> Option<&Service> {
        match self {
            Entity::Node(_) => None,
            Entity::Edge(_, right) => Some(right),
        }
    }

    /// Whether this entity addresses an edge.
    pub fn is_edge(&self) -> bool {
        matches!(self, Entity::Edge(..))
    }

    /// Filter expression keyword for this entity.
    pub fn filter_expression(&self) -> String {
        match self {
            Entity::Node(service) => format!("service({})", service.to_id()),
            Entity::Edge(left, right) => format!("edge({}, {})", left.to_id(), right.to_id()),
        }
    }
}

impl Ord for Entity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.left()
            .cmp(other.left())
            .then_with(|| match (self.right(), other.right()) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for Entity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.filter_expression())
    }
}

// Decode the character references a browser or template layer produces when
// an entity round-trips through HTML attributes.
fn unescape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        let decoded = rest.find(';').and_then(|end| {
            let reference = &rest[1..end];
            decode_reference(reference).map(|c| (c, end + 1))
        });

        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_reference(reference: &str) -> Option<char> {
    match reference {
        "amp" => Some('&'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "lt" => Some('<'),
        "gt" => Some('>'),
        _ => {
            let numeric = reference.strip_prefix('#')?;
            let hex = numeric
                .strip_prefix('x')
                .or_else(|| numeric.strip_prefix('X'));
            let code = match hex {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => numeric.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
