//! Production [`EngineAdapter`]: loads the vendored game-math engine (a
//! Lua 5.1-class corpus, `mlua` with the `lua51`/`vendored` features, same
//! choice as the WoW UI simulator reference's embedding of a dynamically
//! typed addon API) and drives it headlessly.
//!
//! The engine is consumed as a black box per spec — its source is not
//! reproduced here. What this module owns is the environment contract
//! (§4.1): host stubs, fixtures, load order, and the two safety patches,
//! all installed against a single long-lived [`mlua::Lua`] runtime that is
//! reused across `calculate()` calls (first call ~200ms JIT warm-up,
//! steady state <100ms).

use std::path::{Path, PathBuf};

use mlua::{Function, Lua, Table};

use crate::build::Build;
use crate::error::OptimizerError;
use crate::oracle::adapter::{BuildStats, EngineAdapter};
use crate::oracle::fixtures;
use crate::tree::PassiveTreeGraph;

/// Fixed load order (§4.1 point 7). Paths are relative to the engine
/// root directory (the parent of `Config::engine_path`). Out-of-order
/// loading surfaces as undefined-symbol errors from `mlua`, so this list
/// is authoritative rather than discovered by globbing.
const LOAD_ORDER: &[&str] = &[
    "Modules/Common/Hash.lua",
    "Modules/Common/XML.lua",
    "Data/GameVersions.lua",
    "Modules/Calcs/ModifierStore.lua",
    "Modules/Calcs/ModifierList.lua",
    "Modules/Calcs/ModifierDB.lua",
    "Modules/Calcs/CommonUtils.lua",
    "Modules/Calcs/ModTools.lua",
    "Modules/Calcs/CalcTools.lua",
];

pub struct LuaEngine {
    engine_root: PathBuf,
    entry_file: PathBuf,
    lua: Option<Lua>,
}

impl LuaEngine {
    pub fn new(entry_file: impl AsRef<Path>) -> Self {
        let entry_file = entry_file.as_ref().to_path_buf();
        let engine_root = entry_file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        LuaEngine {
            engine_root,
            entry_file,
            lua: None,
        }
    }

    fn load_module(lua: &Lua, path: &Path) -> Result<(), OptimizerError> {
        let source = std::fs::read_to_string(path).map_err(|e| OptimizerError::EngineInit {
            reason: format!("reading engine module {}: {e}", path.display()),
        })?;
        lua.load(&source)
            .set_name(path.display().to_string())
            .exec()
            .map_err(|e| OptimizerError::EngineInit {
                reason: format!("loading engine module {}: {e}", path.display()),
            })
    }

    /// Two arithmetic sites in the engine's modifier-store dereference
    /// values that can be unset in a minimal (headless, itemless) build.
    /// Patched after the modifier-store classes load, per §9 Open
    /// Questions: re-audit these two names if vendoring a different
    /// engine version.
    fn apply_safety_patches(lua: &Lua) -> Result<(), OptimizerError> {
        let patch = r#"
            if ModifierStore then
                local rawGetStat = ModifierStore.GetStat
                ModifierStore.GetStat = function(self, stat, ...)
                    local value = rawGetStat(self, stat, ...)
                    if value == nil then return 0 end
                    return value
                end
                local rawBreakdown = ModifierStore.GetModBreakdown
                ModifierStore.GetModBreakdown = function(self, stat, ...)
                    local value = rawBreakdown(self, stat, ...)
                    if value == nil then return 0 end
                    return value
                end
            end
        "#;
        lua.load(patch)
            .set_name("headless-safety-patches")
            .exec()
            .map_err(|e| OptimizerError::EngineInit {
                reason: format!("applying modifier-store safety patches: {e}"),
            })
    }
}

impl EngineAdapter for LuaEngine {
    fn initialize(&mut self) -> Result<(), OptimizerError> {
        if self.lua.is_some() {
            return Ok(());
        }

        let lua = Lua::new();

        // (c) host-function stubs, ahead of any module that might call them
        // during its own top-level execution.
        fixtures::install_host_stubs(&lua).map_err(|e| OptimizerError::EngineInit {
            reason: format!("installing host stubs: {e}"),
        })?;
        fixtures::install_compression(&lua).map_err(|e| OptimizerError::EngineInit {
            reason: format!("installing compression bridge: {e}"),
        })?;

        // (b) game-version/constants data, plus ailment and weapon/skill
        // fixtures, published under the engine's `data` global.
        let data = fixtures::install_game_constants(&lua).map_err(|e| OptimizerError::EngineInit {
            reason: format!("installing game constants: {e}"),
        })?;
        fixtures::install_ailment_fixtures(&lua, &data).map_err(|e| OptimizerError::EngineInit {
            reason: format!("installing ailment fixtures: {e}"),
        })?;
        fixtures::install_weapon_and_skill_fixtures(&lua, &data).map_err(|e| OptimizerError::EngineInit {
            reason: format!("installing weapon/skill fixtures: {e}"),
        })?;
        lua.globals().set("data", data).map_err(|e| OptimizerError::EngineInit {
            reason: format!("publishing data fixtures: {e}"),
        })?;

        // (a), (d), (e): fixed load order for the engine's own modules.
        for relative in LOAD_ORDER {
            let path = self.engine_root.join(relative);
            Self::load_module(&lua, &path)?;
        }

        Self::apply_safety_patches(&lua)?;

        // (f) calculation entry module: the headless entry file at
        // `Config::engine_path`, loaded last so every dependency it
        // references is already resolved.
        Self::load_module(&lua, &self.entry_file)?;

        self.lua = Some(lua);
        Ok(())
    }

    fn calculate(&mut self, build: &Build, tree: &PassiveTreeGraph) -> Result<BuildStats, OptimizerError> {
        let lua = self.lua.as_ref().ok_or_else(|| OptimizerError::EngineInit {
            reason: "LuaEngine::calculate called before initialize".into(),
        })?;

        let allocated: Vec<u32> = build.allocated.iter().map(|n| n.0).collect();
        let _ = tree; // node typing/adjacency isn't needed by the engine call itself, only by the neighbor generator
        let build_table = fixtures::build_object_shape(
            lua,
            build.class.as_str(),
            build.level,
            &allocated,
            "3_24",
        )
        .map_err(|e| OptimizerError::EngineRuntime {
            reason: format!("constructing build object: {e}"),
        })?;

        let run_calculation: Function =
            lua.globals()
                .get("RunCalculation")
                .map_err(|e| OptimizerError::EngineInit {
                    reason: format!("entry module did not define RunCalculation: {e}"),
                })?;

        let result: Table = run_calculation
            .call(build_table)
            .map_err(|e| OptimizerError::EngineRuntime {
                reason: format!("RunCalculation raised: {e}"),
            })?;

        read_stats(&result).map_err(|e| OptimizerError::EngineRuntime {
            reason: format!("reading calculation output: {e}"),
        })
    }

    fn collect_garbage(&mut self) {
        if let Some(lua) = &self.lua {
            lua.gc_collect().ok();
        }
    }
}

fn read_stats(result: &Table) -> mlua::Result<BuildStats> {
    let field = |name: &str| -> mlua::Result<f64> { result.get::<Option<f64>>(name).map(|v| v.unwrap_or(0.0)) };

    let mut stats = BuildStats::zeroed();
    stats.total_dps = field("TotalDPS")?;
    stats.effective_hp = field("EffectiveHitPoints")?;
    stats.life = field("Life")?;
    stats.mana = field("Mana")?;
    stats.energy_shield = field("EnergyShield")?;
    stats.resistance_fire = field("FireResist")?;
    stats.resistance_cold = field("ColdResist")?;
    stats.resistance_lightning = field("LightningResist")?;
    stats.resistance_chaos = field("ChaosResist")?;
    stats.armour = field("Armour")?;
    stats.evasion = field("Evasion")?;
    stats.block_chance = field("BlockChance")?;
    Ok(stats)
}
