//! CLI command implementations

mod bootstrap;
mod config;
mod serve;
mod status;

pub use bootstrap::{bootstrap_command, plan_command, BootstrapOptions};
pub use config::{config_get, config_init, config_path, config_set, config_show, resolve_config_path};
pub use serve::serve_command;
pub use status::status_command;
