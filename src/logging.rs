//! Dual-sink logging: terminal plus a rolled file under `Config::log_dir`,
//! both driven by a configured level instead of hardcoded `Debug`/`Info`.

use crate::config::Config;
use std::time::{SystemTime, UNIX_EPOCH};

pub fn init(config: &Config) {
    let level = config
        .log_level
        .parse::<log::LevelFilter>()
        .unwrap_or(log::LevelFilter::Info);

    std::fs::create_dir_all(&config.log_dir).expect("create log directory");

    let simplelog_config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();

    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time moves forward")
        .as_secs();
    let log_path = config.log_dir.join(format!("{timestamp}.log"));

    let file_logger = simplelog::WriteLogger::new(
        log::LevelFilter::Debug,
        simplelog_config.clone(),
        std::fs::File::create(&log_path).expect("create log file"),
    );
    let term_logger = simplelog::TermLogger::new(
        level,
        simplelog_config,
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    simplelog::CombinedLogger::init(vec![term_logger, file_logger]).expect("initialize logger");
}
