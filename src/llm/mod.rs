//! LLM provider abstraction layer
//!
//! Provider-agnostic interface for the external classifier call, plus the
//! local-server adapter that backs it in production.

pub mod provider;
pub mod providers;

pub use provider::*;
pub use providers::*;
