//! C4 — Calculation Oracle: loads the vendored game-math engine, installs
//! the host-function/fixture environment it expects, and extracts computed
//! stats for a build. Single-threaded and non-reentrant; callers must
//! serialize access through the [`crate::gate::RequestGate`].

mod adapter;
mod fixtures;
mod lua_engine;
mod mock_engine;

pub use adapter::{BuildStats, EngineAdapter};
pub use lua_engine::LuaEngine;
pub use mock_engine::MockEngine;
