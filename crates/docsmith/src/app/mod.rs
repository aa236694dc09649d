//! Application layer: evaluation sessions, the transform stage and the
//! pipeline entry points built on them.

pub mod library;
pub mod output;
pub mod pipeline;
pub mod session;
pub mod transform;
