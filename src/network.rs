//! Nodes, edges and the locations technologies are placed at.
use crate::id::define_id_type;
use crate::index::{IndexValue, impl_index_value_from_id};
use derive_more::Display;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

define_id_type! {NodeID}
define_id_type! {EdgeID}
impl_index_value_from_id!(NodeID, EdgeID);

/// A set of node IDs
pub type NodeSet = IndexSet<NodeID>;

/// Edges of the network, indexed by ID
pub type EdgeMap = IndexMap<EdgeID, Edge>;

/// A directed connection between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Unique identifier, by convention `from-to`
    pub id: EdgeID,
    /// The node the edge starts at
    pub node_from: NodeID,
    /// The node the edge ends at
    pub node_to: NodeID,
    /// The length of the edge. Infinite if the edge cannot be used.
    pub distance: f64,
}

impl Edge {
    /// Create an edge between two nodes with the conventional ID `from-to`
    pub fn between(node_from: &NodeID, node_to: &NodeID, distance: f64) -> Self {
        Self {
            id: format!("{node_from}-{node_to}").into(),
            node_from: node_from.clone(),
            node_to: node_to.clone(),
            distance,
        }
    }
}

/// Create an edge for every ordered pair of distinct nodes, with infinite distance
pub fn all_ordered_pairs(nodes: &NodeSet) -> EdgeMap {
    let mut edges = EdgeMap::new();
    for node_from in nodes {
        for node_to in nodes.iter().filter(|node| *node != node_from) {
            let edge = Edge::between(node_from, node_to, f64::INFINITY);
            edges.insert(edge.id.clone(), edge);
        }
    }

    edges
}

/// Find the edge running in the opposite direction, if there is one
pub fn reverse_edge<'a>(edges: &'a EdgeMap, edge: &Edge) -> Option<&'a EdgeID> {
    edges
        .values()
        .find(|other| other.node_from == edge.node_to && other.node_to == edge.node_from)
        .map(|other| &other.id)
}

/// Where a technology is placed: a node for conversion and storage, an edge for transport
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum Location {
    /// A node of the network
    #[display("{_0}")]
    Node(NodeID),
    /// An edge of the network
    #[display("{_0}")]
    Edge(EdgeID),
}

impl Location {
    /// The location's ID as a string
    pub fn as_str(&self) -> &str {
        match self {
            Self::Node(id) => &id.0,
            Self::Edge(id) => &id.0,
        }
    }
}

impl From<&Location> for IndexValue {
    fn from(value: &Location) -> Self {
        match value {
            Location::Node(id) => id.into(),
            Location::Edge(id) => id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;

    #[test]
    fn test_all_ordered_pairs() {
        let nodes: NodeSet = ["a".into(), "b".into(), "c".into()].into_iter().collect();
        let edges = all_ordered_pairs(&nodes);
        assert_eq!(
            edges.keys().map(ToString::to_string).collect_vec(),
            ["a-b", "a-c", "b-a", "b-c", "c-a", "c-b"]
        );
        assert!(edges.values().all(|edge| edge.distance.is_infinite()));
    }

    #[test]
    fn test_reverse_edge() {
        let mut edges = EdgeMap::new();
        let forward = Edge::between(&"a".into(), &"b".into(), 10.0);
        let backward = Edge::between(&"b".into(), &"a".into(), 10.0);
        let other = Edge::between(&"a".into(), &"c".into(), 5.0);
        for edge in [&forward, &backward, &other] {
            edges.insert(edge.id.clone(), edge.clone());
        }

        assert_eq!(reverse_edge(&edges, &forward), Some(&backward.id));
        assert_eq!(reverse_edge(&edges, &other), None);
    }

    #[test]
    fn test_location_display() {
        assert_eq!(Location::Node("node1".into()).to_string(), "node1");
        assert_eq!(Location::Edge("a-b".into()).to_string(), "a-b");
    }
}
