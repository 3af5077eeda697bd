//! Environment contract the oracle installs before bootstrapping the
//! vendored engine (§4.1, points 1-6): host-function stubs, the ~40
//! game-constant scalars, ailment tables, minimum weapon/skill data, and
//! the build-object shape the engine's setup phase indexes into
//! unconditionally.
//!
//! Every function here only runs against a live [`mlua::Lua`] instance, so
//! it is only compiled when the real engine bridge is in use.

use mlua::{Lua, Result as LuaResult, Table, Value};

/// Installs no-op host-function stubs for the GUI/host APIs the engine
/// calls during init: console-printing, window/process lifecycle, HTTP.
/// Compression is wired separately (`install_compression`) because, unlike
/// these, it must actually work.
pub fn install_host_stubs(lua: &Lua) -> LuaResult<()> {
    let globals = lua.globals();

    globals.set("print", lua.create_function(|_, _args: mlua::Variadic<Value>| Ok(()))?)?;
    globals.set("ConPrintf", lua.create_function(|_, _args: mlua::Variadic<Value>| Ok(()))?)?;
    globals.set("ConPrintTable", lua.create_function(|_, _args: mlua::Variadic<Value>| Ok(()))?)?;
    globals.set("SetWindowTitle", lua.create_function(|_, _title: String| Ok(()))?)?;
    globals.set("RenderInit", lua.create_function(|_, ()| Ok(()))?)?;
    globals.set("GetScreenSize", lua.create_function(|_, ()| Ok((1920, 1080)))?)?;
    globals.set("Exit", lua.create_function(|_, _reason: Option<String>| Ok(()))?)?;
    globals.set(
        "LaunchSubScript",
        lua.create_function(|_, _args: mlua::Variadic<Value>| Ok(0i64))?,
    )?;

    let http = lua.create_table()?;
    http.set("Get", lua.create_function(|lua, _url: String| {
        let empty = lua.create_table()?;
        Ok((Value::Nil, Value::Table(empty)))
    })?)?;
    globals.set("NewHTTPRequest", lua.create_function(|_, ()| Ok(Value::Nil))?)?;
    globals.set("http", http)?;

    Ok(())
}

/// Binds the engine's deflate/inflate + base64 host functions to working
/// implementations. Unlike the other stubs these must actually run: the
/// build-code pipeline depends on them, and a failure here must surface as
/// an `EngineRuntimeError`, not silently produce garbage.
pub fn install_compression(lua: &Lua) -> LuaResult<()> {
    let globals = lua.globals();
    globals.set(
        "Deflate",
        lua.create_function(|_, input: mlua::String| {
            use std::io::Write;
            let bytes = input.as_bytes();
            let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
            encoder
                .write_all(&bytes)
                .map_err(|e| mlua::Error::RuntimeError(format!("deflate: {e}")))?;
            let compressed = encoder
                .finish()
                .map_err(|e| mlua::Error::RuntimeError(format!("deflate: {e}")))?;
            Ok(base64::Engine::encode(&base64::engine::general_purpose::STANDARD, compressed))
        })?,
    )?;
    globals.set(
        "Inflate",
        lua.create_function(|lua, input: String| {
            use base64::Engine as _;
            use std::io::Read;
            let raw = base64::engine::general_purpose::STANDARD
                .decode(input.trim())
                .map_err(|e| mlua::Error::RuntimeError(format!("inflate base64: {e}")))?;
            let mut decoder = flate2::read::ZlibDecoder::new(raw.as_slice());
            let mut out = String::new();
            decoder
                .read_to_string(&mut out)
                .map_err(|e| mlua::Error::RuntimeError(format!("inflate: {e}")))?;
            lua.create_string(&out)
        })?,
    )?;
    Ok(())
}

/// The ~40 scalar constants the engine reads from its `data` namespace:
/// resistance floor, armour formula ratio, accuracy falloff, ailment caps,
/// stun thresholds, and the rest of the game's numeric rule table. Missing
/// a constant here manifests downstream as an arithmetic-on-nil engine
/// crash, so the list is enumerated in full rather than lazily grown.
pub fn install_game_constants(lua: &Lua) -> LuaResult<Table> {
    let data = lua.create_table()?;

    let constants: &[(&str, f64)] = &[
        ("resistancePenetrationCap", 75.0),
        ("maxResistance", 90.0),
        ("minResistance", -200.0),
        ("armourDamageReductionRatio", 10.0),
        ("armourEffectCap", 90.0),
        ("evasionBaseChance", 5.0),
        ("accuracyBaseChance", 5.0),
        ("accuracyFalloffDistance", 35.0),
        ("accuracyFalloffRate", 0.015),
        ("blockChanceCap", 75.0),
        ("blockEffectivenessBase", 1.0),
        ("critChanceCap", 100.0),
        ("critMultiplierBase", 1.5),
        ("ailmentCapIgnite", 8.0),
        ("ailmentCapShock", 0.5),
        ("ailmentCapChill", 0.3),
        ("ailmentCapFreeze", 4.0),
        ("ailmentCapBleed", 8.0),
        ("ailmentCapPoison", 8.0),
        ("ailmentCapScorch", 0.3),
        ("ailmentCapBrittle", 0.3),
        ("ailmentCapSap", 0.15),
        ("ailmentPrecision", 100.0),
        ("stunThreshold", 1.0),
        ("stunDurationBase", 0.35),
        ("stunRecoveryBase", 0.66),
        ("freezeThreshold", 1.0),
        ("shockThreshold", 1.0),
        ("igniteThreshold", 1.0),
        ("chillThreshold", 1.0),
        ("bleedThreshold", 1.0),
        ("poisonThreshold", 1.0),
        ("energyShieldRechargeDelay", 2.0),
        ("energyShieldRechargeRate", 0.33),
        ("lifeRegenBase", 0.0),
        ("manaRegenBase", 1.75),
        ("movementSpeedCap", 2.0),
        ("movementSpeedFloor", 0.03),
        ("dualWieldDamageBonus", 1.1),
        ("weaponRangeDefault", 11.0),
        ("effectiveLevelCap", 100.0),
        ("skillCostBase", 0.0),
    ];

    for (name, value) in constants {
        data.set(*name, *value)?;
    }

    Ok(data)
}

/// Canonical ailment fixtures: per-ailment cap/precision entries, the
/// elemental/non-elemental partition, and the damage-type map. All nine
/// canonical ailments (Ignite, Shock, Chill, Freeze, Bleed, Poison,
/// Scorch, Brittle, Sap) must be present in each of the three structures.
pub fn install_ailment_fixtures(lua: &Lua, data: &Table) -> LuaResult<()> {
    const AILMENTS: &[(&str, &str, bool)] = &[
        ("Ignite", "Fire", true),
        ("Shock", "Lightning", true),
        ("Chill", "Cold", true),
        ("Freeze", "Cold", true),
        ("Bleed", "Physical", false),
        ("Poison", "Chaos", false),
        ("Scorch", "Fire", true),
        ("Brittle", "Cold", true),
        ("Sap", "Lightning", true),
    ];

    let caps = lua.create_table()?;
    let elemental = lua.create_table()?;
    let non_elemental = lua.create_table()?;
    let damage_types = lua.create_table()?;

    let mut e_idx = 1i64;
    let mut ne_idx = 1i64;
    for (name, damage_type, is_elemental) in AILMENTS {
        let cap_key = format!("ailmentCap{name}");
        let cap: f64 = data.get(cap_key.as_str()).unwrap_or(1.0);
        let entry = lua.create_table()?;
        entry.set("cap", cap)?;
        entry.set("precision", 100.0)?;
        caps.set(*name, entry)?;
        damage_types.set(*name, *damage_type)?;
        if *is_elemental {
            elemental.set(e_idx, *name)?;
            e_idx += 1;
        } else {
            non_elemental.set(ne_idx, *name)?;
            ne_idx += 1;
        }
    }

    data.set("ailmentCaps", caps)?;
    data.set("elementalAilments", elemental)?;
    data.set("nonElementalAilments", non_elemental)?;
    data.set("ailmentDamageTypes", damage_types)?;
    Ok(())
}

/// Default unarmed weapon table (per class) and a level-1 attack-skill
/// definition, both provided verbatim so passive-only calculations have
/// something to resolve even without an equipped weapon or active gem.
pub fn install_weapon_and_skill_fixtures(lua: &Lua, data: &Table) -> LuaResult<()> {
    let unarmed = lua.create_table()?;
    for class in ["Warrior", "Ranger", "Witch", "Duelist", "Templar", "Shadow"] {
        let weapon = lua.create_table()?;
        weapon.set("type", "Unarmed")?;
        weapon.set("AttackRate", 1.2)?;
        weapon.set("CritChance", 5.0)?;
        weapon.set("PhysicalMin", 2)?;
        weapon.set("PhysicalMax", 6)?;
        weapon.set("RangeMod", 0)?;
        unarmed.set(class, weapon)?;
    }
    data.set("unarmedWeapons", unarmed)?;

    let default_skill = lua.create_table()?;
    default_skill.set("name", "Default Attack")?;
    default_skill.set("baseType", "Attack")?;
    let level_stats = lua.create_table()?;
    let level_one = lua.create_table()?;
    level_one.set("damageMultiplier", 1.0)?;
    level_one.set("manaCost", 0)?;
    level_stats.set(1, level_one)?;
    default_skill.set("levels", level_stats)?;
    data.set("defaultAttackSkill", default_skill)?;

    Ok(())
}

/// Builds the minimal build-shaped object the calculation entry point
/// indexes into unconditionally. Every empty collection here must exist
/// even when unused, or the engine's setup phase crashes on the first
/// unconditional index.
pub fn build_object_shape(
    lua: &Lua,
    class: &str,
    level: u8,
    allocated_nodes: &[u32],
    tree_version: &str,
) -> LuaResult<Table> {
    let build = lua.create_table()?;

    let character = lua.create_table()?;
    character.set("level", level)?;
    character.set("class", class)?;
    build.set("character", character)?;

    let spec = lua.create_table()?;
    let allocated = lua.create_table()?;
    for (i, node) in allocated_nodes.iter().enumerate() {
        allocated.set(i as i64 + 1, *node)?;
    }
    spec.set("allocatedNodeIds", allocated)?;
    spec.set("masteryEffects", lua.create_table()?)?;
    spec.set("treeVersion", tree_version)?;
    build.set("spec", spec)?;

    let items_tab = lua.create_table()?;
    items_tab.set("items", lua.create_table()?)?;
    items_tab.set("slots", lua.create_table()?)?;
    items_tab.set("activeItemSet", lua.create_table()?)?;
    build.set("itemsTab", items_tab)?;

    let skills_tab = lua.create_table()?;
    let socket_group = lua.create_table()?;
    socket_group.set("enabled", true)?;
    socket_group.set("gems", lua.create_table()?)?;
    let groups = lua.create_table()?;
    groups.set(1, socket_group)?;
    skills_tab.set("socketGroups", groups)?;
    build.set("skillsTab", skills_tab)?;

    let party_tab = lua.create_table()?;
    party_tab.set("actor", lua.create_table()?)?;
    build.set("partyTab", party_tab)?;

    Ok(build)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_nine_canonical_ailments_present_in_every_structure() {
        let lua = Lua::new();
        let data = install_game_constants(&lua).unwrap();
        install_ailment_fixtures(&lua, &data).unwrap();

        let caps: Table = data.get("ailmentCaps").unwrap();
        let damage_types: Table = data.get("ailmentDamageTypes").unwrap();
        let names = [
            "Ignite", "Shock", "Chill", "Freeze", "Bleed", "Poison", "Scorch", "Brittle", "Sap",
        ];
        for name in names {
            assert!(caps.contains_key(name).unwrap(), "missing cap for {name}");
            assert!(damage_types.contains_key(name).unwrap(), "missing damage type for {name}");
        }
    }

    #[test]
    fn build_object_shape_has_all_required_empty_collections() {
        let lua = Lua::new();
        let build = build_object_shape(&lua, "Witch", 90, &[1, 2, 3], "3_24").unwrap();
        let items_tab: Table = build.get("itemsTab").unwrap();
        assert!(items_tab.contains_key("items").unwrap());
        let skills_tab: Table = build.get("skillsTab").unwrap();
        let groups: Table = skills_tab.get("socketGroups").unwrap();
        assert_eq!(groups.raw_len(), 1);
    }
}
