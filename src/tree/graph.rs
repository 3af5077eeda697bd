use petgraph::graphmap::UnGraphMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::OptimizerError;

/// Opaque node identifier from the passive-tree JSON blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

/// Node-type taxonomy driving the neighbor generator's priority ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Keystone,
    Notable,
    Small,
    Travel,
}

impl NodeType {
    /// Numeric ranking weight: keystone > notable > small > travel.
    pub fn weight(&self) -> u32 {
        match self {
            NodeType::Keystone => 100,
            NodeType::Notable => 50,
            NodeType::Small => 20,
            NodeType::Travel => 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeNode {
    pub id: NodeId,
    pub stat_text: Vec<String>,
    pub node_type: NodeType,
    /// True if this node is a class-start node (one per class, roughly).
    #[serde(default)]
    pub is_class_start: bool,
    #[serde(default)]
    pub class_start_for: Option<String>,
}

/// On-disk shape of the passive-tree JSON blob (treated as pre-parsed
/// input per spec — the source blob format itself is out of scope, this
/// is just the loader for the already-reduced node/edge shape).
#[derive(Debug, Deserialize)]
struct TreeFile {
    nodes: Vec<TreeNode>,
    edges: Vec<(NodeId, NodeId)>,
}

/// Process-global, read-only-after-load passive tree graph.
pub struct PassiveTreeGraph {
    nodes: HashMap<NodeId, TreeNode>,
    adjacency: UnGraphMap<u32, ()>,
    class_starts: HashMap<String, NodeId>,
}

impl PassiveTreeGraph {
    pub fn load(path: &Path) -> Result<Self, OptimizerError> {
        let text = std::fs::read_to_string(path).map_err(|e| OptimizerError::EngineInit {
            reason: format!("reading passive tree file {}: {e}", path.display()),
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, OptimizerError> {
        let file: TreeFile = serde_json::from_str(text).map_err(|e| OptimizerError::EngineInit {
            reason: format!("parsing passive tree JSON: {e}"),
        })?;
        Ok(Self::from_parts(file.nodes, file.edges))
    }

    fn from_parts(nodes: Vec<TreeNode>, edges: Vec<(NodeId, NodeId)>) -> Self {
        let mut adjacency = UnGraphMap::new();
        let mut node_map = HashMap::with_capacity(nodes.len());
        let mut class_starts = HashMap::new();

        for node in nodes {
            adjacency.add_node(node.id.0);
            if node.is_class_start {
                if let Some(class) = &node.class_start_for {
                    class_starts.insert(class.clone(), node.id);
                }
            }
            node_map.insert(node.id, node);
        }
        for (a, b) in edges {
            adjacency.add_edge(a.0, b.0, ());
        }

        PassiveTreeGraph {
            nodes: node_map,
            adjacency,
            class_starts,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(&id)
    }

    pub fn class_start(&self, class: &str) -> Option<NodeId> {
        self.class_starts.get(class).copied()
    }

    pub fn neighbors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.adjacency.neighbors(id.0).map(NodeId)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Invariant check (Testable Property 2): every node in `allocated` must
    /// be reachable from `start` using only edges between allocated nodes.
    pub fn is_connected(&self, start: NodeId, allocated: &HashSet<NodeId>) -> bool {
        if !allocated.contains(&start) {
            return false;
        }
        let reached = self.reachable_from(start, allocated);
        allocated.iter().all(|n| reached.contains(n))
    }

    /// BFS over the subgraph induced by `allocated`, starting at `start`.
    /// Plain stack-based traversal rather than `petgraph::visit::Bfs`
    /// because the walk must stay inside the allocated subset, not the
    /// full tree graph.
    pub fn reachable_from(&self, start: NodeId, allocated: &HashSet<NodeId>) -> HashSet<NodeId> {
        let mut visited = HashSet::new();
        if !self.adjacency.contains_node(start.0) || !allocated.contains(&start) {
            return visited;
        }
        let mut stack = vec![start];
        visited.insert(start);
        while let Some(current) = stack.pop() {
            for neighbor in self.neighbors(current) {
                if allocated.contains(&neighbor) && visited.insert(neighbor) {
                    stack.push(neighbor);
                }
            }
        }
        visited
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PassiveTreeGraph {
        let nodes = vec![
            TreeNode {
                id: NodeId(1),
                stat_text: vec![],
                node_type: NodeType::Travel,
                is_class_start: true,
                class_start_for: Some("Warrior".into()),
            },
            TreeNode {
                id: NodeId(2),
                stat_text: vec![],
                node_type: NodeType::Small,
                is_class_start: false,
                class_start_for: None,
            },
            TreeNode {
                id: NodeId(3),
                stat_text: vec![],
                node_type: NodeType::Notable,
                is_class_start: false,
                class_start_for: None,
            },
            TreeNode {
                id: NodeId(4),
                stat_text: vec![],
                node_type: NodeType::Small,
                is_class_start: false,
                class_start_for: None,
            },
        ];
        let edges = vec![(NodeId(1), NodeId(2)), (NodeId(2), NodeId(3)), (NodeId(1), NodeId(4))];
        PassiveTreeGraph::from_parts(nodes, edges)
    }

    #[test]
    fn connected_allocation_passes() {
        let graph = sample();
        let allocated: HashSet<_> = [NodeId(1), NodeId(2), NodeId(3)].into_iter().collect();
        assert!(graph.is_connected(NodeId(1), &allocated));
    }

    #[test]
    fn disconnected_allocation_fails() {
        let graph = sample();
        // node 3 is only reachable through 2, which is absent here.
        let allocated: HashSet<_> = [NodeId(1), NodeId(3)].into_iter().collect();
        assert!(!graph.is_connected(NodeId(1), &allocated));
    }

    #[test]
    fn class_start_lookup() {
        let graph = sample();
        assert_eq!(graph.class_start("Warrior"), Some(NodeId(1)));
        assert_eq!(graph.class_start("Mage"), None);
    }
}
