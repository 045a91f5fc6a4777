use env_logger::{Builder, Env};
use log::LevelFilter;

use crate::config;

fn builder(level: LevelFilter) -> Builder {
    let mut builder = Builder::from_env(Env::default());
    builder.filter(None, level);
    builder
}

/// Install `env_logger` at `Info`; `RUST_LOG` directives still apply per module.
///
/// Calling it again after a logger is installed is a no-op.
pub fn init() {
    let _ = builder(LevelFilter::Info).try_init();
}

/// Install `env_logger` with the level from the routes config
pub fn init_with(config: &config::Log) {
    if builder(config.level_filter()).try_init().is_ok() {
        log::debug!("Logger initialized at {}", config.level);
    }
}
