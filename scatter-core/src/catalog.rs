//! Catalog of the nodes and edges active in a snapshot.

use scatter_types::{Entity, ServiceGraph};

/// Every addressable entity of `graph`, sorted.
///
/// Client nodes only contribute their outgoing edges. Edges whose reference
/// id does not resolve to a node of the same snapshot are skipped.
pub fn entities(graph: &ServiceGraph) -> Vec<Entity> {
    let mut entities = Vec::new();

    for node in &graph.services {
        let service = node.service();

        for edge in &node.edges {
            if let Some(target) = graph.target(edge) {
                entities.push(Entity::edge(service.clone(), target.service()));
            }
        }

        if !service.is_client() {
            entities.push(Entity::node(service));
        }
    }

    entities.sort();
    entities.dedup();
    entities
}
