//! Infrastructure adapters: bundled resources, import resolution, and config.

pub mod config;
pub mod resolver;
pub mod resources;
