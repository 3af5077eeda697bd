//! C2 — Passive Tree Graph: the parsed node graph, loaded once and shared
//! read-only for the process lifetime.

mod graph;

pub use graph::{NodeId, NodeType, PassiveTreeGraph, TreeNode};
