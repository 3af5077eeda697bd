use crate::build::model::Build;
use crate::tree::NodeId;
use serde::{Deserialize, Serialize};

/// One legal single-step change to a build: either spending a free point
/// to add an unallocated node, or spending a respec point to swap one
/// allocated node for an adjacent unallocated one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TreeMutation {
    Add { node: NodeId },
    Swap { remove: NodeId, add: NodeId },
}

impl TreeMutation {
    pub fn free_cost(&self) -> u32 {
        match self {
            TreeMutation::Add { .. } => 1,
            TreeMutation::Swap { .. } => 0,
        }
    }

    pub fn respec_cost(&self) -> u32 {
        match self {
            TreeMutation::Add { .. } => 0,
            TreeMutation::Swap { .. } => 1,
        }
    }

    pub fn node_added(&self) -> NodeId {
        match self {
            TreeMutation::Add { node } => *node,
            TreeMutation::Swap { add, .. } => *add,
        }
    }

    pub fn node_removed(&self) -> Option<NodeId> {
        match self {
            TreeMutation::Add { .. } => None,
            TreeMutation::Swap { remove, .. } => Some(*remove),
        }
    }

    /// Applies the mutation, producing a fresh `Build`. Does not itself
    /// validate connectivity or budget — callers (the neighbor generator
    /// for candidate generation, the budget ledger for cost checks) are
    /// responsible for only presenting/applying legal mutations.
    ///
    /// A `Swap` whose `remove` and `add` are the same node is a pure
    /// removal: the node is dropped and not reinserted. This is never
    /// produced by the neighbor generator, but it is what `inverse()`
    /// returns for an `Add`, and a removal has to actually remove.
    pub fn apply(&self, build: &Build) -> Build {
        let mut next = build.clone();
        let removed = self.node_removed();
        if let Some(removed) = removed {
            next.allocated.remove(&removed);
        }
        if removed != Some(self.node_added()) {
            next.allocated.insert(self.node_added());
        }
        next
    }

    /// The inverse mutation: adding back what was removed, removing what
    /// was added. For an `Add`, this is a same-node `Swap` — which `apply`
    /// treats as a pure removal, so the inverse actually un-allocates the
    /// node rather than leaving it in place. Used by Testable Property 8
    /// (mutate then un-mutate).
    pub fn inverse(&self) -> TreeMutation {
        match self {
            TreeMutation::Add { node } => TreeMutation::Swap {
                remove: *node,
                add: *node,
            },
            TreeMutation::Swap { remove, add } => TreeMutation::Swap {
                remove: *add,
                add: *remove,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::model::CharacterClass;

    #[test]
    fn add_then_remove_same_node_round_trips() {
        let build = Build::new(CharacterClass::Ranger, 50, NodeId(1));
        let add = TreeMutation::Add { node: NodeId(2) };
        let grown = add.apply(&build);
        assert!(grown.contains(NodeId(2)));

        let shrink = TreeMutation::Swap {
            remove: NodeId(2),
            add: NodeId(2),
        };
        let back = shrink.apply(&grown);
        assert_eq!(back.allocated, build.allocated);
    }

    #[test]
    fn swap_replaces_one_node_with_another() {
        let mut build = Build::new(CharacterClass::Ranger, 50, NodeId(1));
        build.allocated.insert(NodeId(2));
        let swap = TreeMutation::Swap {
            remove: NodeId(2),
            add: NodeId(3),
        };
        let next = swap.apply(&build);
        assert!(!next.contains(NodeId(2)));
        assert!(next.contains(NodeId(3)));
    }
}
