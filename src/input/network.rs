//! Code for reading the nodes and edges of the network from CSV files.
use super::*;
use crate::id::IDCollection;
use crate::network::{Edge, EdgeID, EdgeMap, NodeID, NodeSet, all_ordered_pairs};
use serde::Deserialize;

const NODES_FILE_NAME: &str = "nodes.csv";
const EDGES_FILE_NAME: &str = "edges.csv";

#[derive(Debug, Deserialize, PartialEq)]
struct NodeRaw {
    id: NodeID,
}

#[derive(Debug, Deserialize, PartialEq)]
struct EdgeRaw {
    id: EdgeID,
    node_from: String,
    node_to: String,
    distance: f64,
}

/// Read the nodes of the network.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
pub fn read_nodes(model_dir: &Path) -> Result<NodeSet> {
    let file_path = model_dir.join(NODES_FILE_NAME);
    let nodes = read_csv::<NodeRaw>(&file_path)?;
    read_nodes_from_iter(nodes).with_context(|| input_err_msg(&file_path))
}

fn read_nodes_from_iter<I>(iter: I) -> Result<NodeSet>
where
    I: Iterator<Item = NodeRaw>,
{
    let mut nodes = NodeSet::new();
    for node in iter {
        ensure!(!node.id.0.is_empty(), "Node IDs cannot be empty");
        ensure!(
            !node.id.0.contains('-'),
            "Node ID {} cannot contain a hyphen, which separates the nodes of edge IDs",
            node.id
        );
        ensure!(nodes.insert(node.id.clone()), "Duplicate node ID {}", node.id);
    }

    Ok(nodes)
}

/// Read the edges of the network.
///
/// If the edges file is absent, there is an edge of infinite distance between every ordered pair
/// of distinct nodes.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `nodes` - The nodes of the network
pub fn read_edges(model_dir: &Path, nodes: &NodeSet) -> Result<EdgeMap> {
    let file_path = model_dir.join(EDGES_FILE_NAME);
    if !file_path.exists() {
        return Ok(all_ordered_pairs(nodes));
    }

    let edges = read_csv_optional::<EdgeRaw>(&file_path)?;
    read_edges_from_iter(edges, nodes).with_context(|| input_err_msg(&file_path))
}

fn read_edges_from_iter<I>(iter: I, nodes: &NodeSet) -> Result<EdgeMap>
where
    I: Iterator<Item = EdgeRaw>,
{
    let mut edges = EdgeMap::new();
    for edge in iter {
        let node_from = nodes.get_id_by_str(&edge.node_from)?;
        let node_to = nodes.get_id_by_str(&edge.node_to)?;
        ensure!(
            node_from != node_to,
            "Edge {} must connect two different nodes",
            edge.id
        );
        ensure!(
            edge.distance >= 0.0,
            "Distance of edge {} cannot be negative",
            edge.id
        );
        ensure!(
            !edges
                .values()
                .any(|other: &Edge| other.node_from == node_from && other.node_to == node_to),
            "More than one edge from {node_from} to {node_to}"
        );

        let edge = Edge {
            id: edge.id,
            node_from,
            node_to,
            distance: edge.distance,
        };
        let id = edge.id.clone();
        ensure!(
            edges.insert(id.clone(), edge).is_none(),
            "Duplicate edge ID {id}"
        );
    }

    Ok(edges)
}
