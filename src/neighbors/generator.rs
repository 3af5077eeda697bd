use std::collections::HashSet;

use crate::build::{Build, BudgetLedger, TreeMutation};
use crate::tree::{NodeId, NodeType, PassiveTreeGraph};

/// Candidate set is capped after ranking; bounds per-iteration oracle calls.
const TOP_K: usize = 100;

/// A candidate mutation paired with its priority weight (node-type
/// ranking: keystone 100 > notable 50 > multi-stat small 20 > travel 5).
#[derive(Debug, Clone, Copy)]
pub struct RankedMutation {
    pub mutation: TreeMutation,
    pub weight: u32,
}

/// Produces the legal candidate set for `build` given the current budget
/// state. Empty return signals convergence to the hill-climbing engine
/// (surfaces as the "no_valid_neighbors" convergence reason).
pub fn generate_neighbors(
    build: &Build,
    graph: &PassiveTreeGraph,
    start: NodeId,
    budget: &BudgetLedger,
) -> Vec<RankedMutation> {
    let mut candidates = Vec::new();

    if !budget.free_exhausted() {
        candidates.extend(add_candidates(build, graph, start));
    }

    // Free-first rule: swaps are only emitted once
    // free budget is exhausted, or there are simply no adds available.
    let should_emit_swaps = budget.free_exhausted() || candidates.is_empty();
    if should_emit_swaps && !budget.respec_exhausted() {
        candidates.extend(swap_candidates(build, graph, start));
    }

    rank_and_truncate(candidates)
}

fn add_candidates(build: &Build, graph: &PassiveTreeGraph, start: NodeId) -> Vec<RankedMutation> {
    let mut frontier: HashSet<NodeId> = HashSet::new();
    for &allocated in &build.allocated {
        for neighbor in graph.neighbors(allocated) {
            if !build.contains(neighbor) {
                frontier.insert(neighbor);
            }
        }
    }

    frontier
        .into_iter()
        .filter_map(|node| {
            let mutation = TreeMutation::Add { node };
            if validates_connectivity(&mutation, build, graph, start) {
                Some(RankedMutation {
                    mutation,
                    weight: node_weight(graph, node),
                })
            } else {
                None
            }
        })
        .collect()
}

fn swap_candidates(build: &Build, graph: &PassiveTreeGraph, start: NodeId) -> Vec<RankedMutation> {
    let mut out = Vec::new();

    for &candidate_remove in &build.allocated {
        if candidate_remove == start {
            continue;
        }

        let mut reduced: HashSet<NodeId> = build.allocated.iter().copied().collect();
        reduced.remove(&candidate_remove);
        if !graph.is_connected(start, &reduced) {
            continue; // removing this node would orphan the rest — not a "leaf"
        }

        let mut frontier: HashSet<NodeId> = HashSet::new();
        for &allocated in &reduced {
            for neighbor in graph.neighbors(allocated) {
                if !reduced.contains(&neighbor) && neighbor != candidate_remove {
                    frontier.insert(neighbor);
                }
            }
        }

        for add in frontier {
            let mutation = TreeMutation::Swap {
                remove: candidate_remove,
                add,
            };
            if validates_connectivity(&mutation, build, graph, start) {
                out.push(RankedMutation {
                    mutation,
                    weight: node_weight(graph, add),
                });
            }
        }
    }

    out
}

fn node_weight(graph: &PassiveTreeGraph, node: NodeId) -> u32 {
    graph.node(node).map(|n| n.node_type.weight()).unwrap_or(NodeType::Travel.weight())
}

/// Every node in the resulting allocation must be
/// reachable from `start` using only edges between allocated nodes.
fn validates_connectivity(
    mutation: &TreeMutation,
    build: &Build,
    graph: &PassiveTreeGraph,
    start: NodeId,
) -> bool {
    let next = mutation.apply(build);
    let allocated: HashSet<NodeId> = next.allocated.iter().copied().collect();
    graph.is_connected(start, &allocated)
}

fn rank_and_truncate(mut candidates: Vec<RankedMutation>) -> Vec<RankedMutation> {
    candidates.sort_by(|a, b| {
        b.weight
            .cmp(&a.weight)
            .then_with(|| a.mutation.node_added().0.cmp(&b.mutation.node_added().0))
    });
    candidates.truncate(TOP_K);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::CharacterClass;

    fn sample_graph() -> PassiveTreeGraph {
        let text = r#"{
            "nodes": [
                {"id": 1, "stat_text": [], "node_type": "travel", "is_class_start": true, "class_start_for": "Witch"},
                {"id": 2, "stat_text": [], "node_type": "small", "is_class_start": false},
                {"id": 3, "stat_text": [], "node_type": "notable", "is_class_start": false},
                {"id": 4, "stat_text": [], "node_type": "travel", "is_class_start": false},
                {"id": 5, "stat_text": [], "node_type": "keystone", "is_class_start": false}
            ],
            "edges": [[1,2],[2,3],[1,4],[4,5]]
        }"#;
        PassiveTreeGraph::from_json(text).unwrap()
    }

    #[test]
    fn free_first_rule_suppresses_swaps_while_free_budget_remains() {
        let graph = sample_graph();
        let mut build = Build::new(CharacterClass::Witch, 90, NodeId(1));
        build.allocated.insert(NodeId(2));
        let budget = crate::build::BudgetLedger::new(10, Some(10));

        let neighbors = generate_neighbors(&build, &graph, NodeId(1), &budget);
        assert!(neighbors.iter().all(|n| n.mutation.respec_cost() == 0));
    }

    #[test]
    fn swaps_appear_once_free_budget_is_exhausted() {
        let graph = sample_graph();
        let mut build = Build::new(CharacterClass::Witch, 90, NodeId(1));
        build.allocated.insert(NodeId(2));
        let budget = crate::build::BudgetLedger::new(0, Some(10));

        let neighbors = generate_neighbors(&build, &graph, NodeId(1), &budget);
        assert!(neighbors.iter().any(|n| n.mutation.respec_cost() == 1));
    }

    #[test]
    fn empty_when_both_budgets_exhausted() {
        let graph = sample_graph();
        let build = Build::new(CharacterClass::Witch, 90, NodeId(1));
        let budget = crate::build::BudgetLedger::new(0, Some(0));

        assert!(generate_neighbors(&build, &graph, NodeId(1), &budget).is_empty());
    }

    #[test]
    fn keystone_outranks_travel_in_same_generation() {
        let graph = sample_graph();
        let mut build = Build::new(CharacterClass::Witch, 90, NodeId(1));
        build.allocated.insert(NodeId(4));
        let budget = crate::build::BudgetLedger::new(10, Some(0));

        let neighbors = generate_neighbors(&build, &graph, NodeId(1), &budget);
        // node 5 (keystone) should rank ahead of node 2 (small) off node 1/4.
        let node5_idx = neighbors.iter().position(|n| n.mutation.node_added() == NodeId(5));
        let node2_idx = neighbors.iter().position(|n| n.mutation.node_added() == NodeId(2));
        assert!(node5_idx.is_some() && node2_idx.is_some());
        assert!(node5_idx < node2_idx);
    }

    #[test]
    fn removing_a_non_leaf_node_is_not_offered_as_a_swap_source() {
        let graph = sample_graph();
        let mut build = Build::new(CharacterClass::Witch, 90, NodeId(1));
        build.allocated.insert(NodeId(2));
        build.allocated.insert(NodeId(3));
        build.allocated.insert(NodeId(4));
        // node 2 sits between start(1) and 3; removing it orphans node 3.
        let budget = crate::build::BudgetLedger::new(0, Some(10));
        let neighbors = generate_neighbors(&build, &graph, NodeId(1), &budget);
        assert!(neighbors
            .iter()
            .all(|n| n.mutation.node_removed() != Some(NodeId(2))));
    }
}
