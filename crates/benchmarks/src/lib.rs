//! Benchmarks for the Concord conflict engine
//!
//! Measures the method library, the selector and the full engine
//! submit/outcome loop under growing agent counts and learned state.

/// Re-export the engine crates for benchmarks
pub use concord_core;
pub use concord_manager;
pub use concord_resolver;
