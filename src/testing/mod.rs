//! Testing utilities and mock implementations
//!
//! Mock providers, embedders, and sinks for exercising the routing
//! pipeline without a model server or writable state directory.

pub mod mocks;

pub use mocks::*;
