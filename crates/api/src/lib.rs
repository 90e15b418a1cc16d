//! HTTP layer for the Concord conflict engine

pub mod rest;

pub use rest::{create_router, router_with_state, ApiError, ApiState};
