pub mod config;
pub mod logging;

pub mod detector;
pub mod pipeline;
pub mod relay;
pub mod resolver;
pub mod traffic;
