use std::path::PathBuf;
use std::sync::Arc;

use actix_web::web;
use clap::Parser;

use ascent_engine::config::{Config, ConfigOverrides};
use ascent_engine::gate::RequestGate;
use ascent_engine::http::{self, AppState};
use ascent_engine::oracle::EngineAdapter;
use ascent_engine::session::{spawn_sweeper, SessionRegistry};
use ascent_engine::tree::PassiveTreeGraph;
use ascent_engine::{logging, oracle};

/// Single entry point, no subcommands — the server is the only mode of
/// operation — no batch/offline mode.
#[derive(Debug, Parser)]
#[command(name = "ascent-engine")]
struct Cli {
    /// Path to an optional config.toml; missing file falls back to defaults.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    #[arg(long)]
    bind_host: Option<String>,

    #[arg(long)]
    bind_port: Option<u16>,

    #[arg(long)]
    log_level: Option<String>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();
    let overrides = ConfigOverrides {
        bind_host: cli.bind_host,
        bind_port: cli.bind_port,
        log_level: cli.log_level,
    };
    let config = Config::load(Some(&cli.config), overrides).expect("load configuration");
    logging::init(&config);

    let tree = PassiveTreeGraph::load(&config.tree_path).expect("load passive tree");
    let engine = build_engine(&config);

    let gate = RequestGate::new(engine);
    let registry = Arc::new(SessionRegistry::new(gate, Arc::new(tree), config.gate_timeout()));
    spawn_sweeper(registry.clone(), config.sweeper_interval(), config.session_ttl());

    let state = web::Data::new(AppState { registry, config });
    http::run(state).await
}

#[cfg(feature = "mock-engine")]
fn build_engine(config: &Config) -> Box<dyn EngineAdapter> {
    if config.engine_path.exists() {
        let mut engine = oracle::LuaEngine::new(&config.engine_path);
        engine.initialize().expect("initialize calculation oracle");
        Box::new(engine)
    } else {
        log::warn!(
            "engine path {} not found, falling back to MockEngine (mock-engine feature)",
            config.engine_path.display()
        );
        let mut engine = oracle::MockEngine::new();
        engine.initialize().expect("initialize mock calculation oracle");
        Box::new(engine)
    }
}

#[cfg(not(feature = "mock-engine"))]
fn build_engine(config: &Config) -> Box<dyn EngineAdapter> {
    let mut engine = oracle::LuaEngine::new(&config.engine_path);
    engine.initialize().expect("initialize calculation oracle");
    Box::new(engine)
}
