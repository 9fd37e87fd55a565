//! CLI command handlers, one per file.

mod config;
mod detect;
mod relay;
mod resolve;

pub use config::run_config;
pub use detect::run_detect;
pub use relay::{run_relay, RelayOptions};
pub use resolve::run_resolve;
