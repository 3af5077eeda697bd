//! Deterministic closed-form test double for [`EngineAdapter`]. Used by the
//! hill-climbing and HTTP integration tests so they exercise real
//! optimizer/session/HTTP code without the vendored Lua engine tree present
//! in the workspace — the same kind of trait boundary a database-backed
//! module would draw around its client so higher layers test without a
//! live dependency.
//!
//! The closed form has no gameplay meaning: it exists to give the
//! optimizer a smooth, strictly monotone-in-node-count surface so that
//! steepest-ascent has something non-trivial to climb, with a few
//! higher-weighted node ids standing in for keystones/notables.

use crate::build::Build;
use crate::error::OptimizerError;
use crate::oracle::{BuildStats, EngineAdapter};
use crate::tree::{NodeId, PassiveTreeGraph};

#[derive(Debug, Default)]
pub struct MockEngine {
    initialized: bool,
    gc_runs: u32,
}

impl MockEngine {
    pub fn new() -> Self {
        MockEngine::default()
    }

    /// Per-node contribution, stable across calls so the optimizer's
    /// candidate ranking is reproducible. Node ids that are multiples of 7
    /// or 13 stand in for notables/keystones, giving the search landscape
    /// a few clearly-better moves instead of a flat gradient.
    fn node_weight(node: NodeId) -> f64 {
        let n = node.0 as f64;
        if node.0 % 13 == 0 {
            40.0
        } else if node.0 % 7 == 0 {
            15.0
        } else {
            1.0 + (n % 5.0)
        }
    }
}

impl EngineAdapter for MockEngine {
    fn initialize(&mut self) -> Result<(), OptimizerError> {
        self.initialized = true;
        Ok(())
    }

    fn calculate(&mut self, build: &Build, _tree: &PassiveTreeGraph) -> Result<BuildStats, OptimizerError> {
        if !self.initialized {
            return Err(OptimizerError::EngineInit {
                reason: "MockEngine::calculate called before initialize".into(),
            });
        }

        let total: f64 = build.allocated.iter().map(|&n| Self::node_weight(n)).sum();
        let dps = 50.0 + total * 12.0;
        let life = 400.0 + total * 18.0;
        let energy_shield = 50.0 + total * 4.0;
        let ehp = life + energy_shield * 1.3;

        Ok(BuildStats {
            total_dps: dps,
            effective_hp: ehp,
            life,
            mana: 100.0 + total * 3.0,
            energy_shield,
            resistance_fire: (total * 0.4).min(75.0),
            resistance_cold: (total * 0.4).min(75.0),
            resistance_lightning: (total * 0.4).min(75.0),
            resistance_chaos: (total * 0.1).min(75.0),
            armour: total * 25.0,
            evasion: total * 20.0,
            block_chance: (total * 0.3).min(75.0),
            additional: Default::default(),
        })
    }

    fn collect_garbage(&mut self) {
        self.gc_runs += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::CharacterClass;

    #[test]
    fn calculate_fails_before_initialize() {
        let mut engine = MockEngine::new();
        let build = Build::new(CharacterClass::Witch, 90, NodeId(1));
        let tree = PassiveTreeGraph::from_json(r#"{"nodes":[],"edges":[]}"#).unwrap();
        assert!(engine.calculate(&build, &tree).is_err());
    }

    #[test]
    fn more_allocated_nodes_yields_higher_dps() {
        let mut engine = MockEngine::new();
        engine.initialize().unwrap();
        let tree = PassiveTreeGraph::from_json(r#"{"nodes":[],"edges":[]}"#).unwrap();

        let small = Build::new(CharacterClass::Witch, 90, NodeId(1));
        let small_stats = engine.calculate(&small, &tree).unwrap();

        let mut big = small.clone();
        big.allocated.insert(NodeId(2));
        big.allocated.insert(NodeId(3));
        let big_stats = engine.calculate(&big, &tree).unwrap();

        assert!(big_stats.total_dps > small_stats.total_dps);
    }
}
