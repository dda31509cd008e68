//! Native side of the XrPhone Android library.
//!
//! The JVM reaches the engine through `bindings`; desktop tools and tests use
//! `engine` directly.

pub mod bindings;
pub mod engine;
pub mod utils;
