pub mod build;
pub mod climb;
pub mod codec;
pub mod config;
pub mod error;
pub mod gate;
pub mod http;
pub mod logging;
pub mod neighbors;
pub mod oracle;
pub mod progress;
pub mod session;
pub mod tree;
