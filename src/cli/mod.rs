//! Command line entry points.

mod app;
mod commands;
mod env;
mod runtime;

pub use app::run;
pub use commands::Commands;
pub use env::CliArgs;
pub use runtime::{init_logging, load_config, load_local_env_overrides, LoadedConfig};
