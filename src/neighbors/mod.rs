//! C5 — Neighbor Generator: from a current build plus budget state,
//! produces the legal single-step mutation set, pruned and ranked.

mod generator;

pub use generator::{generate_neighbors, RankedMutation};
