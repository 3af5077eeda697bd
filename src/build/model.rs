use crate::tree::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Six playable classes. Kept as a closed enum (not a free-form string)
/// since the class set is part of the game's fixed rules, not user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CharacterClass {
    Warrior,
    Ranger,
    Witch,
    Duelist,
    Templar,
    Shadow,
}

impl CharacterClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            CharacterClass::Warrior => "Warrior",
            CharacterClass::Ranger => "Ranger",
            CharacterClass::Witch => "Witch",
            CharacterClass::Duelist => "Duelist",
            CharacterClass::Templar => "Templar",
            CharacterClass::Shadow => "Shadow",
        }
    }
}

/// Value type representing one build. Immutable once constructed: a
/// mutation produces a fresh `Build` rather than mutating in place, so the
/// previous allocation stays valid for comparison until it is discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Build {
    pub class: CharacterClass,
    pub level: u8,
    pub ascendancy: Option<String>,
    pub allocated: BTreeSet<NodeId>,
    /// Opaque items/skills payload, passed through to the oracle unchanged.
    /// The core never interprets its contents (out of scope per spec).
    pub items_skills_payload: serde_json::Value,
}

impl Build {
    pub fn new(class: CharacterClass, level: u8, class_start: NodeId) -> Self {
        let mut allocated = BTreeSet::new();
        allocated.insert(class_start);
        Build {
            class,
            level,
            ascendancy: None,
            allocated,
            items_skills_payload: serde_json::Value::Null,
        }
    }

    pub fn node_count(&self) -> usize {
        self.allocated.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.allocated.contains(&node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_build_starts_with_only_the_class_start_node() {
        let build = Build::new(CharacterClass::Witch, 90, NodeId(1));
        assert_eq!(build.node_count(), 1);
        assert!(build.contains(NodeId(1)));
    }
}
