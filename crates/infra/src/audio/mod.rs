//! Offline host and display consumers built on the core engine

pub mod render;
pub mod scope;

pub use render::*;
pub use scope::*;
