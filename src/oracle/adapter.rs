use crate::build::Build;
use crate::error::OptimizerError;
use crate::tree::PassiveTreeGraph;
use serde::Serialize;
use std::collections::HashMap;

/// Stats extracted from one `calculate()` call. Everything the metric
/// functions need is a named field; anything the engine additionally
/// exposes (the game-math corpus has dozens of minor derived stats) goes
/// into `additional` rather than growing this struct unboundedly.
#[derive(Debug, Clone, Serialize)]
pub struct BuildStats {
    pub total_dps: f64,
    pub effective_hp: f64,
    pub life: f64,
    pub mana: f64,
    pub energy_shield: f64,
    pub resistance_fire: f64,
    pub resistance_cold: f64,
    pub resistance_lightning: f64,
    pub resistance_chaos: f64,
    pub armour: f64,
    pub evasion: f64,
    pub block_chance: f64,
    #[serde(flatten)]
    pub additional: HashMap<String, f64>,
}

impl BuildStats {
    pub fn zeroed() -> Self {
        BuildStats {
            total_dps: 0.0,
            effective_hp: 0.0,
            life: 0.0,
            mana: 0.0,
            energy_shield: 0.0,
            resistance_fire: 0.0,
            resistance_cold: 0.0,
            resistance_lightning: 0.0,
            resistance_chaos: 0.0,
            armour: 0.0,
            evasion: 0.0,
            block_chance: 0.0,
            additional: HashMap::new(),
        }
    }
}

/// Abstraction over "something that can turn a Build into BuildStats".
/// Production code uses [`crate::oracle::LuaEngine`]; tests use
/// [`crate::oracle::MockEngine`] so the hill-climbing engine and the HTTP
/// surface can be exercised without the vendored Lua tree present, the
/// same way a database-backed client is kept behind a trait boundary so
/// callers can be tested without a live connection.
pub trait EngineAdapter: Send {
    /// Idempotent, expensive bootstrap. Must run once before `calculate`.
    fn initialize(&mut self) -> Result<(), OptimizerError>;

    /// Synchronous, blocking. A failure on a specific candidate should be
    /// translated by the caller into a rejected candidate (metric = -inf),
    /// not propagated — except for the baseline build, where it is fatal.
    fn calculate(&mut self, build: &Build, tree: &PassiveTreeGraph) -> Result<BuildStats, OptimizerError>;

    /// Triggers an engine-internal full GC. Called after each completed
    /// session to bound memory (§4.1 "Performance").
    fn collect_garbage(&mut self);
}
