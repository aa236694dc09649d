//! Domain types: the documentation object model and error taxonomy.

pub mod errors;
pub mod model;
